//! Directional shadow light
//!
//! Tracks the light's position and direction and derives the light-space
//! matrix the shadow and geometry passes share. Changes are recorded on the
//! CPU and uploaded with the next frame's uniforms.

use cgmath::{ortho, InnerSpace, Matrix4, Point3, Vector3};

use crate::{
    config::{LightConfig, ShadowConfig},
    gfx::camera::OPENGL_TO_WGPU_MATRIX,
};

/// Above this |cos| between direction and +Y, the look-at falls back to +Z up.
const PARALLEL_UP_THRESHOLD: f32 = 0.999;

/// Light-space view-projection: orthographic volume looking from `position` along `direction`.
pub fn light_space_matrix(
    position: Vector3<f32>,
    direction: Vector3<f32>,
    shadow: &ShadowConfig,
) -> Matrix4<f32> {
    let e = shadow.extent;
    let projection = OPENGL_TO_WGPU_MATRIX * ortho(-e, e, -e, e, shadow.near, shadow.far);

    let eye = Point3::new(position.x, position.y, position.z);
    let view = Matrix4::look_at_rh(eye, eye + direction, light_up(direction));
    projection * view
}

/// Replaces a zero or non-finite direction with the default light direction.
pub fn usable_direction(direction: Vector3<f32>) -> Vector3<f32> {
    let length2 = direction.magnitude2();
    if length2.is_finite() && length2 > f32::EPSILON {
        return direction;
    }
    let fallback = LightConfig::default().direction;
    log::warn!("Light direction {direction:?} has no length; using {fallback:?}");
    fallback
}

fn light_up(direction: Vector3<f32>) -> Vector3<f32> {
    if direction.normalize().dot(Vector3::unit_y()).abs() > PARALLEL_UP_THRESHOLD {
        Vector3::unit_z()
    } else {
        Vector3::unit_y()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightState {
    pub position: Vector3<f32>,
    pub direction: Vector3<f32>,
    pub view_proj_matrix: Matrix4<f32>,
}

impl LightState {
    pub fn new(position: Vector3<f32>, direction: Vector3<f32>, shadow: &ShadowConfig) -> Self {
        let direction = usable_direction(direction);
        Self {
            position,
            direction,
            view_proj_matrix: light_space_matrix(position, direction, shadow),
        }
    }

    /// Moves the light; returns whether anything changed.
    pub fn set(&mut self, position: Vector3<f32>, direction: Vector3<f32>, shadow: &ShadowConfig) -> bool {
        let direction = usable_direction(direction);
        if self.position == position && self.direction == direction {
            return false;
        }
        log::debug!("Light moved to {position:?} facing {direction:?}");
        *self = Self::new(position, direction, shadow);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Transform};

    #[test]
    fn test_vertical_direction_is_finite() {
        let shadow = ShadowConfig::default();
        for direction in [Vector3::unit_y(), -Vector3::unit_y(), Vector3::new(0.0, 3.0, 0.0)] {
            let m = light_space_matrix(Vector3::new(0.0, -100.0, 0.0), direction, &shadow);
            let values: &[f32; 16] = m.as_ref();
            assert!(values.iter().all(|v| v.is_finite()), "{direction:?}");
            assert!(m.determinant().abs() > 0.0);
        }
    }

    #[test]
    fn test_point_along_direction_projects_to_center() {
        let shadow = ShadowConfig::default();
        let position = Vector3::new(50.0, -100.0, 0.0);
        let direction = Vector3::new(-0.5, 1.0, 0.0);
        let m = light_space_matrix(position, direction, &shadow);

        let distance = (shadow.near + shadow.far) / 2.0;
        let target = position + direction.normalize() * distance;
        let clip = m.transform_point(Point3::new(target.x, target.y, target.z));

        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4, "{clip:?}");
        assert!((0.0..=1.0).contains(&clip.z), "{clip:?}");
    }

    #[test]
    fn test_zero_direction_falls_back_to_default() {
        let shadow = ShadowConfig::default();
        let light = LightState::new(Vector3::new(0.0, 60.0, 0.0), Vector3::new(0.0, 0.0, 0.0), &shadow);
        assert_eq!(light.direction, LightConfig::default().direction);
        let values: &[f32; 16] = light.view_proj_matrix.as_ref();
        assert!(values.iter().all(|v| v.is_finite()));

        let mut moved = light.clone();
        assert!(!moved.set(light.position, Vector3::new(f32::NAN, 0.0, 0.0), &shadow));
        assert_eq!(moved, light);
    }

    #[test]
    fn test_set_reports_changes() {
        let shadow = ShadowConfig::default();
        let mut light = LightState::new(Vector3::unit_x(), Vector3::unit_y(), &shadow);
        assert!(!light.set(Vector3::unit_x(), Vector3::unit_y(), &shadow));

        let before = light.view_proj_matrix;
        assert!(light.set(Vector3::unit_z(), Vector3::unit_y(), &shadow));
        assert_eq!(light.position, Vector3::unit_z());
        assert_ne!(light.view_proj_matrix, before);
    }
}
