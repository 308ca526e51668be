//! RHI-specific error types.

use ash::vk;
use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] vk::Result),

    /// Failed to load Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No suitable GPU found
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// No memory type matches both the filter and the property flags
    #[error("No memory type matches filter {type_filter:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    },

    /// None of the candidate formats supports the requested features
    #[error("No supported format among {candidates:?} for {features:?}")]
    UnsupportedFormat {
        candidates: Vec<vk::Format>,
        features: vk::FormatFeatureFlags,
    },

    /// Buffer memory could not be mapped, or was used while unmapped
    #[error("Mapping error: {0}")]
    MappingError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Image or depth format changed across a swapchain rebuild
    #[error("Swapchain format changed across rebuild: {old:?} -> {new:?}")]
    SwapchainFormatChanged {
        old: (vk::Format, vk::Format),
        new: (vk::Format, vk::Format),
    },

    /// Shader loading or SPIR-V decoding error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Descriptor layout, pool or write error
    #[error("Descriptor error: {0}")]
    DescriptorError(String),

    /// Invalid handle error
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
