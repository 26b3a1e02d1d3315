use cgmath::{perspective, Matrix4, Rad};

/// Remaps OpenGL clip-space depth (-1..1) to wgpu's 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Perspective projection with wgpu depth range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub aspect: f32,
    pub fovy: Rad<f32>,
    pub znear: f32,
    pub zfar: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32, fovy: impl Into<Rad<f32>>, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

pub fn convert_matrix4_to_array(matrix4: Matrix4<f32>) -> [[f32; 4]; 4] {
    matrix4.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Point3, Transform};

    #[test]
    fn test_projection_depth_range() {
        let projection = Projection::new(1600, 900, Deg(45.0), 0.1, 1000.0);
        let near = projection.matrix().transform_point(Point3::new(0.0, 0.0, -0.1));
        let far = projection.matrix().transform_point(Point3::new(0.0, 0.0, -1000.0));
        assert!(near.z.abs() < 1e-4);
        assert!((far.z - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let mut projection = Projection::new(100, 100, Deg(60.0), 0.1, 10.0);
        projection.resize(200, 100);
        assert_eq!(projection.aspect, 2.0);
        projection.resize(200, 0);
        assert!(projection.aspect.is_finite());
    }
}
