//! Camera with explicit projection and view matrices.
//!
//! Projections are left-handed with depth in `0..1`, matching Vulkan clip
//! space with +Y pointing down.

use glam::{Mat4, Vec3, Vec4};

/// Projection, view and inverse view matrices.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    projection: Mat4,
    view: Mat4,
    inverse_view: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an orthographic projection of the given box.
    pub fn set_orthographic_projection(
        &mut self,
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) {
        self.projection = Mat4::from_cols(
            Vec4::new(2.0 / (right - left), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 / (bottom - top), 0.0, 0.0),
            Vec4::new(0.0, 0.0, 1.0 / (far - near), 0.0),
            Vec4::new(
                -(right + left) / (right - left),
                -(bottom + top) / (bottom - top),
                -near / (far - near),
                1.0,
            ),
        );
    }

    /// Sets a perspective projection. `fov_y` is in radians.
    pub fn set_perspective_projection(&mut self, aspect: f32, fov_y: f32, near: f32, far: f32) {
        debug_assert!(aspect.abs() > f32::EPSILON, "aspect ratio must be non-zero");

        let tan_half_fov = (fov_y / 2.0).tan();
        self.projection = Mat4::from_cols(
            Vec4::new(1.0 / (aspect * tan_half_fov), 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0 / tan_half_fov, 0.0, 0.0),
            Vec4::new(0.0, 0.0, far / (far - near), 1.0),
            Vec4::new(0.0, 0.0, -(far * near) / (far - near), 0.0),
        );
    }

    /// Looks from `position` along `direction`. `up` is usually `-Y`.
    pub fn set_view_direction(&mut self, position: Vec3, direction: Vec3, up: Vec3) {
        let w = direction.normalize();
        let u = w.cross(up).normalize();
        let v = w.cross(u);
        self.set_view_basis(position, u, v, w);
    }

    /// Looks from `position` towards `target`.
    pub fn set_view_target(&mut self, position: Vec3, target: Vec3, up: Vec3) {
        self.set_view_direction(position, target - position, up);
    }

    /// Places the camera at `position` rotated by Euler angles applied in Y, X, Z order.
    pub fn set_view_yxz(&mut self, position: Vec3, rotation: Vec3) {
        let (s3, c3) = rotation.z.sin_cos();
        let (s2, c2) = rotation.x.sin_cos();
        let (s1, c1) = rotation.y.sin_cos();

        let u = Vec3::new(c1 * c3 + s1 * s2 * s3, c2 * s3, c1 * s2 * s3 - c3 * s1);
        let v = Vec3::new(c3 * s1 * s2 - c1 * s3, c2 * c3, c1 * c3 * s2 + s1 * s3);
        let w = Vec3::new(c2 * s1, -s2, c1 * c2);
        self.set_view_basis(position, u, v, w);
    }

    /// The view matrix has `u`, `v`, `w` as rows; its inverse has them as columns.
    fn set_view_basis(&mut self, position: Vec3, u: Vec3, v: Vec3, w: Vec3) {
        self.view = Mat4::from_cols(
            Vec4::new(u.x, v.x, w.x, 0.0),
            Vec4::new(u.y, v.y, w.y, 0.0),
            Vec4::new(u.z, v.z, w.z, 0.0),
            Vec4::new(-u.dot(position), -v.dot(position), -w.dot(position), 1.0),
        );
        self.inverse_view = Mat4::from_cols(
            u.extend(0.0),
            v.extend(0.0),
            w.extend(0.0),
            position.extend(1.0),
        );
    }

    #[inline]
    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        self.view
    }

    #[inline]
    pub fn inverse_view(&self) -> Mat4 {
        self.inverse_view
    }

    /// Camera position in world space.
    #[inline]
    pub fn position(&self) -> Vec3 {
        self.inverse_view.w_axis.truncate()
    }
}

#[cfg(test)]
mod tests {
    use glam::{EulerRot, Quat};

    use super::*;

    #[test]
    fn test_perspective_matches_left_handed_zero_to_one() {
        let mut camera = Camera::new();
        camera.set_perspective_projection(16.0 / 9.0, 50f32.to_radians(), 0.1, 100.0);
        let expected = Mat4::perspective_lh(50f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        assert!(camera.projection().abs_diff_eq(expected, 1e-5));

        // Near plane maps to depth 0, far plane to depth 1
        let near = camera.projection() * Vec4::new(0.0, 0.0, 0.1, 1.0);
        let far = camera.projection() * Vec4::new(0.0, 0.0, 100.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-5);
        assert!((far.z / far.w - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_orthographic_maps_box_to_clip_space() {
        let mut camera = Camera::new();
        camera.set_orthographic_projection(-2.0, 2.0, -1.0, 1.0, 0.0, 10.0);

        let corner = camera.projection() * Vec4::new(2.0, 1.0, 10.0, 1.0);
        assert!(corner.truncate().abs_diff_eq(Vec3::new(1.0, -1.0, 1.0), 1e-6));

        let origin = camera.projection() * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!(origin.truncate().abs_diff_eq(Vec3::ZERO, 1e-6));
    }

    #[test]
    fn test_view_yxz_inverts_camera_transform() {
        let position = Vec3::new(1.0, -2.0, 3.0);
        let rotation = Vec3::new(0.3, 1.1, -0.4);
        let mut camera = Camera::new();
        camera.set_view_yxz(position, rotation);

        let world = Mat4::from_rotation_translation(
            Quat::from_euler(EulerRot::YXZ, rotation.y, rotation.x, rotation.z),
            position,
        );
        assert!(camera.inverse_view().abs_diff_eq(world, 1e-5));
        assert!((camera.view() * camera.inverse_view()).abs_diff_eq(Mat4::IDENTITY, 1e-5));
        assert!(camera.position().abs_diff_eq(position, 1e-6));
    }

    #[test]
    fn test_view_target_looks_down_positive_z_in_view_space() {
        let mut camera = Camera::new();
        let eye = Vec3::new(0.0, -1.0, -5.0);
        let target = Vec3::new(0.0, -1.0, 0.0);
        camera.set_view_target(eye, target, Vec3::NEG_Y);

        let in_view = camera.view() * target.extend(1.0);
        assert!(in_view.truncate().abs_diff_eq(Vec3::new(0.0, 0.0, 5.0), 1e-5));
        assert!((camera.view() * camera.inverse_view()).abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }
}
