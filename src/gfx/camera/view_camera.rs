//! Free-flying camera as an immutable value
//!
//! Every operation returns a new [`Camera`]. The basis is kept orthonormal:
//! `right = facing × up`.

use cgmath::{
    ElementWise, InnerSpace, Matrix3, Matrix4, Point3, Quaternion, Rad, Rotation, Rotation3,
    Vector3, VectorSpace,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    center: Vector3<f32>,
    facing: Vector3<f32>,
    up: Vector3<f32>,
    scale: Vector3<f32>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            center: Vector3::new(0.0, 0.0, 0.0),
            facing: Vector3::unit_z(),
            up: Vector3::unit_y(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Camera {
    pub fn new(
        center: Vector3<f32>,
        facing: Vector3<f32>,
        up: Vector3<f32>,
        scale: Vector3<f32>,
    ) -> Self {
        let facing = facing.normalize();
        Self {
            center,
            facing,
            up: orthogonalize(up, facing),
            scale,
        }
    }

    /// Camera at `center` looking at `target`, with up as close to +Y as possible.
    pub fn looking_at(center: Vector3<f32>, target: Vector3<f32>) -> Self {
        let facing = (target - center).normalize();
        let up = facing.cross(Vector3::unit_y()).cross(facing);
        let up = if up.magnitude2() > f32::EPSILON {
            up.normalize()
        } else {
            Vector3::unit_z()
        };
        Self {
            center,
            facing,
            up,
            ..Default::default()
        }
    }

    /// Rebuilds a camera from an orientation produced by [`Camera::orientation`].
    pub fn from_quat(center: Vector3<f32>, orientation: Quaternion<f32>, scale: Vector3<f32>) -> Self {
        Self {
            center,
            facing: orientation.rotate_vector(Vector3::unit_z()).normalize(),
            up: orientation.rotate_vector(Vector3::unit_y()).normalize(),
            scale,
        }
    }

    pub fn center(&self) -> Vector3<f32> {
        self.center
    }

    pub fn facing(&self) -> Vector3<f32> {
        self.facing
    }

    pub fn up(&self) -> Vector3<f32> {
        self.up
    }

    pub fn right(&self) -> Vector3<f32> {
        self.facing.cross(self.up)
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    /// World-to-view transform, with the view scale applied in world space.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let eye = Point3::new(self.center.x, self.center.y, self.center.z);
        Matrix4::look_at_rh(eye, eye + self.facing, self.up)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Rotation taking the default frame (facing +Z, up +Y) onto this camera's frame.
    pub fn orientation(&self) -> Quaternion<f32> {
        let basis = Matrix3::from_cols(self.up.cross(self.facing), self.up, self.facing);
        Quaternion::from(basis).normalize()
    }

    pub fn move_by(&self, delta: Vector3<f32>) -> Self {
        Self {
            center: self.center + delta,
            ..*self
        }
    }

    pub fn scaling(&self, factor: Vector3<f32>) -> Self {
        Self {
            scale: self.scale.mul_element_wise(factor),
            ..*self
        }
    }

    /// Turns the view by a facing-space offset, as mouse motion does.
    pub fn look_toward(&self, offset: Vector3<f32>) -> Self {
        let facing = (self.facing + offset).normalize();
        Self {
            facing,
            up: orthogonalize(self.up, facing),
            ..*self
        }
    }

    /// Rolls around the facing axis.
    pub fn rotate(&self, angle: Rad<f32>) -> Self {
        let roll = Quaternion::from_axis_angle(self.facing, angle);
        Self {
            up: roll.rotate_vector(self.up).normalize(),
            ..*self
        }
    }

    /// Interpolates center and scale linearly and orientation along the shorter arc.
    pub fn lerp(a: &Camera, b: &Camera, k: f32) -> Camera {
        debug_assert!((-1e-5..=1.0 + 1e-5).contains(&k));
        let qa = a.orientation();
        let mut qb = b.orientation();
        if qa.dot(qb) < 0.0 {
            qb = -qb;
        }
        Camera::from_quat(
            a.center.lerp(b.center, k),
            qa.nlerp(qb, k),
            a.scale.lerp(b.scale, k),
        )
    }
}

/// Removes the component of `up` along `facing` and normalizes it.
fn orthogonalize(up: Vector3<f32>, facing: Vector3<f32>) -> Vector3<f32> {
    let right = facing.cross(up);
    if right.magnitude2() <= f32::EPSILON {
        // `up` is parallel to `facing`; pick any perpendicular.
        let helper = if facing.y.abs() < 0.9 {
            Vector3::unit_y()
        } else {
            Vector3::unit_z()
        };
        return facing.cross(helper).cross(facing).normalize();
    }
    right.cross(facing).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Transform};

    fn assert_vec_close(a: Vector3<f32>, b: Vector3<f32>) {
        assert!((a - b).magnitude() < 1e-4, "{a:?} != {b:?}");
    }

    fn assert_orthonormal(camera: &Camera) {
        assert!((camera.facing().magnitude() - 1.0).abs() < 1e-4);
        assert!((camera.up().magnitude() - 1.0).abs() < 1e-4);
        assert!(camera.facing().dot(camera.up()).abs() < 1e-4);
        assert!((camera.right().magnitude() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_default_basis() {
        let camera = Camera::default();
        assert_vec_close(camera.right(), Vector3::new(-1.0, 0.0, 0.0));
        assert_orthonormal(&camera);
    }

    #[test]
    fn test_basis_stays_orthonormal() {
        let mut camera = Camera::default();
        for i in 0..200 {
            let t = i as f32 * 0.1;
            camera = camera
                .look_toward(camera.right() * t.sin() * 0.05 + camera.up() * t.cos() * 0.05)
                .rotate(Rad(0.01));
        }
        assert_orthonormal(&camera);
    }

    #[test]
    fn test_move_by_translates_center() {
        let camera = Camera::default().move_by(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(camera.center(), Vector3::new(1.0, 2.0, 3.0));

        // The eye maps to the view-space origin.
        let eye = camera.view_matrix().transform_point(Point3::new(1.0, 2.0, 3.0));
        assert_vec_close(Vector3::new(eye.x, eye.y, eye.z), Vector3::new(0.0, 0.0, 0.0));
    }

    #[test]
    fn test_view_looks_down_negative_z() {
        let camera = Camera::looking_at(Vector3::new(0.0, 0.0, 0.0), Vector3::new(0.0, 0.0, 5.0));
        let p = camera.view_matrix().transform_point(Point3::new(0.0, 0.0, 5.0));
        assert_vec_close(Vector3::new(p.x, p.y, p.z), Vector3::new(0.0, 0.0, -5.0));
    }

    #[test]
    fn test_lerp_hits_endpoints() {
        let a = Camera::default();
        let b = Camera::looking_at(Vector3::new(3.0, 1.0, 0.0), Vector3::new(0.0, 0.0, 0.0))
            .rotate(Deg(20.0).into())
            .scaling(Vector3::new(2.0, 2.0, 2.0));

        for (k, expected) in [(0.0, a), (1.0, b)] {
            let c = Camera::lerp(&a, &b, k);
            assert_vec_close(c.center(), expected.center());
            assert_vec_close(c.facing(), expected.facing());
            assert_vec_close(c.up(), expected.up());
            assert_vec_close(c.scale(), expected.scale());
        }

        assert_orthonormal(&Camera::lerp(&a, &b, 0.5));
    }

    #[test]
    fn test_orientation_round_trip() {
        let camera = Camera::looking_at(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, -1.0, 2.0));
        let rebuilt = Camera::from_quat(camera.center(), camera.orientation(), camera.scale());
        assert_vec_close(rebuilt.facing(), camera.facing());
        assert_vec_close(rebuilt.up(), camera.up());
    }
}
