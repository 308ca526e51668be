//! Platform layer: the winit window and input state.
//!
//! This crate provides:
//! - [`Window`] - window creation, size tracking and raw handles for surface creation
//! - [`InputState`] - keyboard and mouse state for camera control

mod input;
mod window;

pub use input::InputState;
pub use window::Window;

// Re-export winit types the application loop needs
pub use winit::keyboard::KeyCode;
