//! Per-instance model transform.
//!
//! A model carries one rotation/translation pair. Every material group of the
//! model holds a copy, and the group turns it into the view matrix it uploads
//! when its state is set.

use cgmath::{Deg, Matrix4, Vector3, Zero};

/// Euler rotation in degrees plus a translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub rotation: Vector3<f32>,
    pub translation: Vector3<f32>,
}

impl Transform {
    /// Identity transform (no rotation, no translation).
    pub fn new() -> Self {
        Self {
            rotation: Vector3::zero(),
            translation: Vector3::zero(),
        }
    }

    pub fn with_rotation(self, rotation: Vector3<f32>) -> Self {
        Self { rotation, ..self }
    }

    pub fn with_translation(self, translation: Vector3<f32>) -> Self {
        Self {
            translation,
            ..self
        }
    }

    /// `Rz · Ry · Rx · T`.
    ///
    /// The translation is applied first and the rotation happens about the
    /// origin afterwards, composed intrinsically Z then Y then X. Rendered
    /// output depends on this exact order.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        let translate = Matrix4::from_translation(self.translation);
        let rotate_x = Matrix4::from_angle_x(Deg(self.rotation.x));
        let rotate_y = Matrix4::from_angle_y(Deg(self.rotation.y));
        let rotate_z = Matrix4::from_angle_z(Deg(self.rotation.z));
        rotate_z * rotate_y * rotate_x * translate
    }

    /// Column-major matrix as stored in a uniform block.
    pub fn to_raw(&self) -> [[f32; 4]; 4] {
        self.view_matrix().into()
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vector3<f32>> for Transform {
    fn from(translation: Vector3<f32>) -> Self {
        Transform {
            translation,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Vector4, vec3};

    use super::*;

    fn close(a: Vector4<f32>, b: Vector4<f32>) -> bool {
        (a - b).x.abs() < 1e-5
            && (a - b).y.abs() < 1e-5
            && (a - b).z.abs() < 1e-5
            && (a - b).w.abs() < 1e-5
    }

    #[test]
    fn identity_transform_is_identity_matrix() {
        use cgmath::SquareMatrix;
        assert_eq!(Transform::new().view_matrix(), Matrix4::identity());
    }

    #[test]
    fn translation_is_applied_before_rotation() {
        let transform = Transform::new()
            .with_rotation(vec3(0.0, 0.0, 90.0))
            .with_translation(vec3(1.0, 0.0, 0.0));
        let origin = Vector4::new(0.0, 0.0, 0.0, 1.0);
        // Moved to +x first, then swung onto +y by the z rotation.
        let moved = transform.view_matrix() * origin;
        assert!(close(moved, Vector4::new(0.0, 1.0, 0.0, 1.0)), "{moved:?}");
    }

    #[test]
    fn x_rotation_happens_before_z_rotation() {
        let transform = Transform::new().with_rotation(vec3(90.0, 0.0, 90.0));
        let point = Vector4::new(0.0, 1.0, 0.0, 1.0);
        // Rx takes +y to +z, Rz leaves +z alone.
        let moved = transform.view_matrix() * point;
        assert!(close(moved, Vector4::new(0.0, 0.0, 1.0, 1.0)), "{moved:?}");
    }

    #[test]
    fn raw_matrix_is_column_major() {
        let transform = Transform::from(vec3(3.0, 4.0, 5.0));
        let raw = transform.to_raw();
        assert_eq!(raw[3], [3.0, 4.0, 5.0, 1.0]);
    }
}
