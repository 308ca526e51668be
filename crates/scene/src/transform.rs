//! Transform component for game objects.
//!
//! # Example
//!
//! ```
//! use engine_scene::TransformComponent;
//! use glam::Vec3;
//!
//! let transform = TransformComponent::new()
//!     .with_translation(Vec3::new(0.0, 0.5, 2.5))
//!     .with_scale(3.0);
//!
//! let model_matrix = transform.matrix();
//! ```

use glam::{Mat4, Vec3, Vec4};

/// Translation, uniform scale and Euler rotation (radians).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformComponent {
    pub translation: Vec3,
    pub scale: f32,
    /// Rotation around x, y and z, applied in Y, X, Z order.
    pub rotation: Vec3,
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: 1.0,
            rotation: Vec3::ZERO,
        }
    }
}

impl TransformComponent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    /// Model matrix `translate * Ry * Rx * Rz * scale`.
    ///
    /// Written out per column (Tait-Bryan angles, YXZ).
    pub fn matrix(&self) -> Mat4 {
        let (s3, c3) = self.rotation.z.sin_cos();
        let (s2, c2) = self.rotation.x.sin_cos();
        let (s1, c1) = self.rotation.y.sin_cos();
        let scale = self.scale;

        Mat4::from_cols(
            Vec4::new(
                scale * (c1 * c3 + s1 * s2 * s3),
                scale * (c2 * s3),
                scale * (c1 * s2 * s3 - c3 * s1),
                0.0,
            ),
            Vec4::new(
                scale * (c3 * s1 * s2 - c1 * s3),
                scale * (c2 * c3),
                scale * (c1 * c3 * s2 + s1 * s3),
                0.0,
            ),
            Vec4::new(scale * (c2 * s1), scale * (-s2), scale * (c1 * c2), 0.0),
            self.translation.extend(1.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use glam::{EulerRot, Quat};

    use super::*;

    #[test]
    fn test_transform_default() {
        let t = TransformComponent::default();
        assert_eq!(t.translation, Vec3::ZERO);
        assert_eq!(t.scale, 1.0);
        assert_eq!(t.rotation, Vec3::ZERO);
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_transform_builder() {
        let t = TransformComponent::new()
            .with_translation(Vec3::new(1.0, 2.0, 3.0))
            .with_scale(2.0)
            .with_rotation(Vec3::new(0.1, 0.2, 0.3));

        assert_eq!(t.translation, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, 2.0);
        assert_eq!(t.rotation, Vec3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_matrix_matches_yxz_composition() {
        let t = TransformComponent::new()
            .with_translation(Vec3::new(-1.0, 0.5, 4.0))
            .with_scale(1.5)
            .with_rotation(Vec3::new(0.4, -1.2, 2.0));

        let rotation = Quat::from_euler(EulerRot::YXZ, t.rotation.y, t.rotation.x, t.rotation.z);
        let expected =
            Mat4::from_scale_rotation_translation(Vec3::splat(t.scale), rotation, t.translation);

        assert!(t.matrix().abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn test_matrix_translation_column() {
        let t = TransformComponent::new().with_translation(Vec3::new(7.0, -3.0, 2.0));
        assert_eq!(t.matrix().w_axis, Vec4::new(7.0, -3.0, 2.0, 1.0));
    }
}
