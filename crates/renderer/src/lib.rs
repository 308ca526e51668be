//! Frame orchestration for the engine.
//!
//! [`Renderer`] drives the acquire, record, submit and present cycle on top
//! of a [`FrameTarget`] and rebuilds the swapchain when the window changes.
//! [`FrameUniforms`] holds the per-slot uniform buffers and descriptor sets
//! the skinned mesh shaders read. [`SkinnedMeshSystem`] and
//! [`PointLightSystem`] bind those sets and record the draws.

pub mod mesh;
pub mod point_light_system;
pub mod render_system;
mod renderer;
mod target;
pub mod uniforms;
mod window;

pub use mesh::{SkinnedMesh, SkinnedVertex};
pub use point_light_system::{PointLightPushConstants, PointLightSystem};
pub use render_system::{SkinnedMeshSystem, SkinnedPushConstants};
pub use renderer::Renderer;
pub use target::{FrameTarget, SwapchainTarget};
pub use uniforms::{FrameUniforms, GlobalUbo, JointUbo, MAX_LIGHTS, PointLightUbo};
pub use window::WindowSurface;

pub use engine_rhi::swapchain::MAX_FRAMES_IN_FLIGHT;
