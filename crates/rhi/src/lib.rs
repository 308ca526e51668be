//! Vulkan abstraction layer (Render Hardware Interface).
//!
//! This crate provides a safe abstraction over Vulkan using the `ash` crate.
//! It handles:
//! - Instance, surface and device creation
//! - Buffers (host-visible and device-local) and depth images
//! - Descriptor set layouts, pools and writes
//! - The presentation swapchain and its frame slots
//! - Command buffer recording
//! - SPIR-V shader modules and graphics pipelines

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod frame_slot;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
