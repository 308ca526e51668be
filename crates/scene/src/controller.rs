//! First-person player controller.

use std::f32::consts::TAU;

use engine_core::ControllerSettings;
use glam::Vec3;

use crate::camera::Camera;
use crate::transform::TransformComponent;

/// Pitch limit in radians, just short of straight up/down.
const PITCH_LIMIT: f32 = 1.5;

/// Moves and rotates a camera from input deltas.
///
/// Tunables come from [`ControllerSettings`], passed in on every call.
#[derive(Clone, Debug, Default)]
pub struct PlayerController {
    pub transform: TransformComponent,
    camera: Camera,
}

impl PlayerController {
    /// Creates a controller at the origin looking down +Z.
    pub fn new() -> Self {
        let mut controller = Self::default();
        controller.sync_camera();
        controller
    }

    /// Moves relative to the current yaw.
    ///
    /// Each component of `direction` is -1, 0 or 1: x strafes right, y moves
    /// up (towards -Y in world space) and z moves forward.
    pub fn move_player(&mut self, direction: Vec3, dt: f32, settings: &ControllerSettings) {
        let yaw = self.transform.rotation.y;
        let forward = Vec3::new(yaw.sin(), 0.0, yaw.cos());
        let right = Vec3::new(yaw.cos(), 0.0, -yaw.sin());
        let up = Vec3::NEG_Y;

        let velocity =
            right * axis(direction.x) + up * axis(direction.y) + forward * axis(direction.z);

        if velocity.length_squared() > f32::EPSILON {
            self.transform.translation += velocity.normalize() * dt * settings.movement_speed;
            self.sync_camera();
        }
    }

    /// Applies a mouse delta: x turns (yaw), y looks up/down (pitch).
    pub fn rotate_camera(&mut self, dx: f32, dy: f32, settings: &ControllerSettings) {
        let scale = settings.mouse_sensitivity / 100.0;
        let delta = Vec3::new(dy * scale, dx * scale, 0.0);

        if delta.length_squared() > f32::EPSILON {
            self.transform.rotation += delta;
        }

        self.transform.rotation.x = self.transform.rotation.x.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.transform.rotation.y = self.transform.rotation.y.rem_euclid(TAU);
        self.sync_camera();
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    fn sync_camera(&mut self) {
        self.camera
            .set_view_yxz(self.transform.translation, self.transform.rotation);
    }
}

/// -1, 0 or 1.
fn axis(value: f32) -> f32 {
    if value == 0.0 { 0.0 } else { value.signum() }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn settings() -> ControllerSettings {
        ControllerSettings {
            movement_speed: 2.0,
            mouse_sensitivity: 10.0,
        }
    }

    #[test]
    fn test_forward_follows_yaw() {
        let mut controller = PlayerController::new();
        controller.move_player(Vec3::Z, 0.5, &settings());
        assert!(controller.transform.translation.abs_diff_eq(Vec3::new(0.0, 0.0, 1.0), 1e-6));

        let mut turned = PlayerController::new();
        turned.transform.rotation.y = FRAC_PI_2;
        turned.move_player(Vec3::Z, 0.5, &settings());
        assert!(turned.transform.translation.abs_diff_eq(Vec3::new(1.0, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn test_diagonal_movement_is_normalized() {
        let mut controller = PlayerController::new();
        controller.move_player(Vec3::new(1.0, 1.0, 1.0), 1.0, &settings());
        assert!((controller.transform.translation.length() - 2.0).abs() < 1e-5);
        // Up is -Y
        assert!(controller.transform.translation.y < 0.0);
    }

    #[test]
    fn test_no_direction_does_not_move() {
        let mut controller = PlayerController::new();
        controller.move_player(Vec3::ZERO, 1.0, &settings());
        assert_eq!(controller.transform.translation, Vec3::ZERO);
    }

    #[test]
    fn test_rotation_clamps_pitch_and_wraps_yaw() {
        let mut controller = PlayerController::new();
        // 10 / 100 = 0.1 rad per unit
        controller.rotate_camera(5.0, 3.0, &settings());
        assert!((controller.transform.rotation.y - 0.5).abs() < 1e-6);
        assert!((controller.transform.rotation.x - 0.3).abs() < 1e-6);

        controller.rotate_camera(0.0, 100.0, &settings());
        assert_eq!(controller.transform.rotation.x, PITCH_LIMIT);

        controller.rotate_camera(-10.0, -200.0, &settings());
        assert_eq!(controller.transform.rotation.x, -PITCH_LIMIT);
        assert!((controller.transform.rotation.y - (TAU - 0.5)).abs() < 1e-5);
    }

    #[test]
    fn test_camera_tracks_transform() {
        let mut controller = PlayerController::new();
        controller.move_player(Vec3::Z, 1.0, &settings());
        assert!(controller.camera().position().abs_diff_eq(controller.transform.translation, 1e-6));
    }
}
