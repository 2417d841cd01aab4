//! Local position/rotation/scale of a scene node.

use cgmath::{Deg, Euler, InnerSpace, Matrix4, Quaternion, Rad, Vector3};

/// Smallest magnitude any scale axis may take.
pub const SCALE_EPSILON: f32 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    position: Vector3<f32>,
    scale: Vector3<f32>,
    rotation: Quaternion<f32>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 0.0),
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
        }
    }
}

impl Transform {
    pub fn new(position: Vector3<f32>, rotation: Quaternion<f32>, scale: Vector3<f32>) -> Self {
        let mut transform = Self::default();
        transform.set_position(position);
        transform.set_rotation(rotation);
        transform.set_scale(scale);
        transform
    }

    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn rotation(&self) -> Quaternion<f32> {
        self.rotation
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
    }

    /// Each axis is clamped to at least [`SCALE_EPSILON`]; zero and
    /// negative values never reach the model matrix.
    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        let clamp = |v: f32| if v.is_nan() { SCALE_EPSILON } else { v.max(SCALE_EPSILON) };
        self.scale = Vector3::new(clamp(scale.x), clamp(scale.y), clamp(scale.z));
    }

    /// Stored normalised; a zero quaternion resets to identity.
    pub fn set_rotation(&mut self, rotation: Quaternion<f32>) {
        let magnitude = rotation.magnitude();
        self.rotation = if magnitude > f32::EPSILON && magnitude.is_finite() {
            rotation / magnitude
        } else {
            Quaternion::new(1.0, 0.0, 0.0, 0.0)
        };
    }

    /// XYZ euler angles in degrees, as shown in the inspector.
    pub fn rotation_euler(&self) -> [f32; 3] {
        let euler: Euler<Rad<f32>> = Euler::from(self.rotation);
        [
            Deg::from(euler.x).0,
            Deg::from(euler.y).0,
            Deg::from(euler.z).0,
        ]
    }

    pub fn set_rotation_euler(&mut self, degrees: [f32; 3]) {
        let euler = Euler::new(Deg(degrees[0]), Deg(degrees[1]), Deg(degrees[2]));
        self.set_rotation(Quaternion::from(euler));
    }

    /// translate × rotate × scale
    pub fn model_matrix(&self) -> Matrix4<f32> {
        Matrix4::from_translation(self.position)
            * Matrix4::from(self.rotation)
            * Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use cgmath::{Rotation3, Transform as _, Point3};

    #[test]
    fn test_scale_is_clamped_per_axis() {
        let mut transform = Transform::default();
        transform.set_scale(Vector3::new(0.0, -3.0, 2.0));
        assert_eq!(transform.scale(), Vector3::new(SCALE_EPSILON, SCALE_EPSILON, 2.0));

        transform.set_scale(Vector3::new(SCALE_EPSILON * 0.5, 1.0, f32::NAN));
        assert_eq!(transform.scale().x, SCALE_EPSILON);
        assert_eq!(transform.scale().z, SCALE_EPSILON);
    }

    #[test]
    fn test_model_matrix_applies_scale_then_rotation_then_translation() {
        let transform = Transform::new(
            Vector3::new(10.0, 0.0, 0.0),
            Quaternion::from_angle_z(Deg(90.0)),
            Vector3::new(2.0, 1.0, 1.0),
        );
        let p = transform.model_matrix().transform_point(Point3::new(1.0, 0.0, 0.0));
        // scale: (2,0,0) -> rotate 90° about Z: (0,2,0) -> translate
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_euler_yaw_rotates_x_toward_negative_z() {
        let mut transform = Transform::default();
        transform.set_rotation_euler([0.0, 90.0, 0.0]);
        let p = transform.model_matrix().transform_point(Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_zero_rotation_resets_to_identity() {
        let mut transform = Transform::default();
        transform.set_rotation(Quaternion::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(transform.rotation(), Quaternion::new(1.0, 0.0, 0.0, 0.0));
    }
}
