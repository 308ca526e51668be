//! Scene objects and viewpoint.
//!
//! This crate provides scene management:
//! - [`ObjectRegistry`] - id-keyed game objects and point lights
//! - [`TransformComponent`] - translation, uniform scale and Euler rotation
//! - [`Camera`] and [`PlayerController`]

mod camera;
mod controller;
mod error;
mod game_object;
mod light;
mod registry;
mod transform;

pub use camera::Camera;
pub use controller::PlayerController;
pub use error::{SceneError, SceneResult};
pub use game_object::{GameObject, MeshSource};
pub use light::PointLight;
pub use registry::{ObjectId, ObjectRegistry};
pub use transform::TransformComponent;
