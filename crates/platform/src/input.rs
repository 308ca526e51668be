//! Keyboard and mouse state for camera control.

use std::collections::HashSet;

use winit::event::{ElementState, KeyEvent, MouseButton};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Keys that move the player, as (key, axis, sign). Axis 0 = right, 1 = up, 2 = forward.
const MOVE_BINDINGS: [(KeyCode, usize, f32); 6] = [
    (KeyCode::KeyD, 0, 1.0),
    (KeyCode::KeyA, 0, -1.0),
    (KeyCode::KeyE, 1, 1.0),
    (KeyCode::KeyQ, 1, -1.0),
    (KeyCode::KeyW, 2, 1.0),
    (KeyCode::KeyS, 2, -1.0),
];

/// Tracks held keys, keys pressed this frame and accumulated mouse motion.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    look_held: bool,
    mouse_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears per-frame state. Call once per frame after reading input.
    pub fn end_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.mouse_delta = (0.0, 0.0);
    }

    /// Feeds a winit keyboard event.
    pub fn on_key_event(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(key) = event.physical_key {
            self.set_key(key, event.state);
        }
    }

    pub fn set_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if self.pressed_keys.insert(key) {
                    self.just_pressed_keys.insert(key);
                }
            }
            ElementState::Released => {
                self.pressed_keys.remove(&key);
            }
        }
    }

    /// The right mouse button enables mouse look while held.
    pub fn on_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        if button == MouseButton::Right {
            self.look_held = state == ElementState::Pressed;
        }
    }

    /// Accumulates raw mouse motion. Ignored unless mouse look is held.
    pub fn on_mouse_motion(&mut self, dx: f64, dy: f64) {
        if self.look_held {
            self.mouse_delta.0 += dx as f32;
            self.mouse_delta.1 += dy as f32;
        }
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    /// Mouse look delta since the last [`end_frame`](Self::end_frame).
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    /// Movement request as `[right, up, forward]`, each -1, 0 or 1.
    pub fn movement_axes(&self) -> [f32; 3] {
        let mut axes = [0.0; 3];
        for (key, axis, sign) in MOVE_BINDINGS {
            if self.is_key_pressed(key) {
                axes[axis] += sign;
            }
        }
        axes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_press_and_release() {
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, ElementState::Pressed);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(input.is_key_just_pressed(KeyCode::KeyW));

        input.end_frame();
        input.set_key(KeyCode::KeyW, ElementState::Pressed);
        assert!(input.is_key_pressed(KeyCode::KeyW));
        assert!(!input.is_key_just_pressed(KeyCode::KeyW));

        input.set_key(KeyCode::KeyW, ElementState::Released);
        assert!(!input.is_key_pressed(KeyCode::KeyW));
    }

    #[test]
    fn test_movement_axes() {
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, ElementState::Pressed);
        input.set_key(KeyCode::KeyA, ElementState::Pressed);
        assert_eq!(input.movement_axes(), [-1.0, 0.0, 1.0]);

        // Opposite keys cancel out
        input.set_key(KeyCode::KeyD, ElementState::Pressed);
        input.set_key(KeyCode::KeyE, ElementState::Pressed);
        assert_eq!(input.movement_axes(), [0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mouse_look_requires_right_button() {
        let mut input = InputState::new();
        input.on_mouse_motion(4.0, 2.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));

        input.on_mouse_button(MouseButton::Right, ElementState::Pressed);
        input.on_mouse_motion(4.0, 2.0);
        input.on_mouse_motion(1.0, -1.0);
        assert_eq!(input.mouse_delta(), (5.0, 1.0));

        input.end_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));

        input.on_mouse_button(MouseButton::Right, ElementState::Released);
        input.on_mouse_motion(4.0, 2.0);
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }
}
