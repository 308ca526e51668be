//! Vulkan device context.
//!
//! # Overview
//!
//! The [`Device`] struct owns every long-lived Vulkan object the rest of the
//! engine builds on:
//! - the instance (and its debug messenger) and the window surface
//! - the selected physical device and the logical device
//! - the graphics and present queues
//! - the gpu-allocator instance backing buffer and image memory
//! - a command pool for per-frame and one-shot command buffers
//!
//! Construction runs in a fixed order (instance, messenger, surface, physical
//! device, logical device, allocator, command pool). A failure aborts it and
//! releases whatever was already created.
//! Drop tears everything down in reverse after waiting for the device to idle.
//!
//! # Example
//!
//! ```no_run
//! use engine_rhi::device::{Device, DeviceSettings};
//! use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
//!
//! # fn example(window: &(impl HasDisplayHandle + HasWindowHandle)) -> engine_rhi::RhiResult<()> {
//! let device = Device::new(&DeviceSettings::default(), window)?;
//!
//! let cmd = device.begin_single_time_commands()?;
//! // ... record a transfer ...
//! device.end_single_time_commands(cmd)?;
//! # Ok(())
//! # }
//! ```

use std::mem::ManuallyDrop;
use std::sync::{Arc, Mutex, MutexGuard};

use ash::vk;
use gpu_allocator::AllocationError;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, error, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{
    DEVICE_EXTENSIONS, PhysicalDeviceInfo, QueueFamilyIndices, select_physical_device,
};
use crate::surface::Surface;
use crate::swapchain::SwapchainSupportDetails;

/// Settings consumed by [`Device::new`].
#[derive(Clone, Debug)]
pub struct DeviceSettings {
    /// Name reported to the driver.
    pub application_name: String,
    /// Enables the validation layer and debug messenger when available.
    pub enable_validation: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            application_name: "Skinned Viewer".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

/// Vulkan device context.
///
/// # Thread Safety
///
/// The [`Device`] is shared through `Arc` by every RAII wrapper in this crate.
/// Submissions happen from the render thread only; the allocator is behind a
/// `Mutex` because gpu-allocator needs `&mut` access.
pub struct Device {
    /// Vulkan logical device handle.
    device: ash::Device,
    /// Selected physical device and its cached properties.
    physical_device: PhysicalDeviceInfo,
    /// GPU memory allocator, dropped before the logical device.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    /// Graphics queue handle.
    graphics_queue: vk::Queue,
    /// Presentation queue handle.
    present_queue: vk::Queue,
    /// Pool for per-frame and one-shot command buffers.
    command_pool: vk::CommandPool,
    /// Window surface, destroyed after the logical device.
    surface: ManuallyDrop<Surface>,
    /// Vulkan instance, destroyed last.
    instance: ManuallyDrop<Instance>,
}

impl Device {
    /// Creates the full device context for a window.
    ///
    /// # Arguments
    ///
    /// * `settings` - Application name and validation toggle
    /// * `window` - Window to create the presentation surface for; it must
    ///   outlive the returned device
    ///
    /// # Errors
    ///
    /// Returns an error if any creation step fails, including
    /// [`RhiError::NoSuitableGpu`] when no GPU meets the requirements.
    pub fn new(
        settings: &DeviceSettings,
        window: &(impl HasDisplayHandle + HasWindowHandle),
    ) -> RhiResult<Arc<Self>> {
        let display_handle = window
            .display_handle()
            .map_err(|e| RhiError::SurfaceError(format!("Failed to get display handle: {e}")))?
            .as_raw();

        let instance = Instance::new(
            &settings.application_name,
            settings.enable_validation,
            display_handle,
        )?;
        let surface = Surface::new(&instance, window)?;
        let physical_device = select_physical_device(instance.handle(), &surface)?;
        // Destroyed again if a later step fails
        let device = ReleaseOnDrop::new(
            create_logical_device(&instance, &physical_device)?,
            |device: &ash::Device| unsafe { device.destroy_device(None) },
        );

        let queue_families = physical_device.queue_families;
        let (graphics_family, present_family) =
            match (queue_families.graphics_family, queue_families.present_family) {
                (Some(graphics), Some(present)) => (graphics, present),
                _ => return Err(RhiError::NoSuitableGpu),
            };

        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        debug!(
            "Queues retrieved: graphics family {}, present family {}",
            graphics_family, present_family
        );

        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: instance.handle().clone(),
            device: (*device).clone(),
            physical_device: physical_device.device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: Default::default(),
        })?;
        info!("GPU memory allocator initialized");

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(graphics_family)
            .flags(
                vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            );
        let command_pool = unsafe { device.create_command_pool(&pool_info, None)? };
        debug!("Command pool created for family {}", graphics_family);

        Ok(Arc::new(Self {
            device: device.disarm(),
            physical_device,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            graphics_queue,
            present_queue,
            command_pool,
            surface: ManuallyDrop::new(surface),
            instance: ManuallyDrop::new(instance),
        }))
    }

    /// Returns the Vulkan logical device handle.
    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Returns the instance the device was created from.
    #[inline]
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Returns the presentation surface.
    #[inline]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Returns the physical device handle.
    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device.device
    }

    /// Returns the cached physical device information.
    #[inline]
    pub fn physical_device_info(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Returns the physical device properties.
    #[inline]
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.physical_device.properties
    }

    /// Returns the graphics queue handle.
    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Returns the presentation queue handle.
    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Returns the queue family indices.
    #[inline]
    pub fn queue_families(&self) -> &QueueFamilyIndices {
        &self.physical_device.queue_families
    }

    /// Returns the shared command pool.
    #[inline]
    pub fn command_pool(&self) -> vk::CommandPool {
        self.command_pool
    }

    /// Locks the GPU memory allocator.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::AllocatorError`] if a previous holder panicked.
    pub fn allocator(&self) -> RhiResult<MutexGuard<'_, Allocator>> {
        self.allocator.lock().map_err(|_| {
            RhiError::AllocatorError(AllocationError::Internal(
                "allocator mutex poisoned".to_string(),
            ))
        })
    }

    /// Queries the surface capabilities, formats and present modes.
    ///
    /// # Errors
    ///
    /// Returns an error if any surface query fails.
    pub fn swapchain_support(&self) -> RhiResult<SwapchainSupportDetails> {
        SwapchainSupportDetails::query(self.physical_device.device, &self.surface)
    }

    /// Finds a memory type index that matches `type_filter` and has all `properties`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::NoSuitableMemoryType`] when nothing matches.
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> RhiResult<u32> {
        find_memory_type_index(
            &self.physical_device.memory_properties,
            type_filter,
            properties,
        )
        .ok_or(RhiError::NoSuitableMemoryType {
            type_filter,
            properties,
        })
    }

    /// Returns the first candidate whose tiling supports `features`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::UnsupportedFormat`] when no candidate qualifies.
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> RhiResult<vk::Format> {
        choose_supported_format(candidates, tiling, features, |format| unsafe {
            self.instance
                .handle()
                .get_physical_device_format_properties(self.physical_device.device, format)
        })
        .ok_or_else(|| RhiError::UnsupportedFormat {
            candidates: candidates.to_vec(),
            features,
        })
    }

    /// Allocates a primary command buffer and begins it for one-time submission.
    ///
    /// Pair with [`end_single_time_commands`](Self::end_single_time_commands).
    /// Meant for infrequent transfers, not per-frame work.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation or begin fails.
    pub fn begin_single_time_commands(&self) -> RhiResult<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = unsafe { self.device.allocate_command_buffers(&alloc_info)? }
            .into_iter()
            .next()
            .ok_or_else(|| RhiError::InvalidHandle("No command buffer allocated".to_string()))?;

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        if let Err(e) = unsafe {
            self.device
                .begin_command_buffer(command_buffer, &begin_info)
        } {
            unsafe {
                self.device
                    .free_command_buffers(self.command_pool, &[command_buffer])
            };
            return Err(e.into());
        }

        Ok(command_buffer)
    }

    /// Ends, submits and frees a buffer from
    /// [`begin_single_time_commands`](Self::begin_single_time_commands).
    ///
    /// Blocks until the graphics queue is idle.
    ///
    /// # Errors
    ///
    /// Returns an error if end, submit or the idle wait fails. The command
    /// buffer is freed in every case.
    pub fn end_single_time_commands(&self, command_buffer: vk::CommandBuffer) -> RhiResult<()> {
        let result = unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .and_then(|()| {
                    let buffers = [command_buffer];
                    let submit_info = vk::SubmitInfo::default().command_buffers(&buffers);
                    self.device
                        .queue_submit(self.graphics_queue, &[submit_info], vk::Fence::null())
                })
                .and_then(|()| self.device.queue_wait_idle(self.graphics_queue))
        };

        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &[command_buffer])
        };

        result.map_err(RhiError::from)
    }

    /// Copies `size` bytes from the start of `src` to the start of `dst`.
    ///
    /// # Errors
    ///
    /// Returns an error if the one-shot submission fails.
    pub fn copy_buffer(
        &self,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    ) -> RhiResult<()> {
        let command_buffer = self.begin_single_time_commands()?;

        let region = vk::BufferCopy::default()
            .src_offset(0)
            .dst_offset(0)
            .size(size);
        unsafe {
            self.device
                .cmd_copy_buffer(command_buffer, src, dst, &[region])
        };

        self.end_single_time_commands(command_buffer)
    }

    /// Waits for the device to become idle.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                error!("Failed to wait for device idle during drop: {:?}", e);
            }

            self.device.destroy_command_pool(self.command_pool, None);

            // Every allocation must be freed before this point
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);
            info!("Logical device destroyed");

            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }
    }
}

/// Runs `release` on the held value when dropped, unless disarmed.
///
/// Holds partially built device state so an early return cleans up.
struct ReleaseOnDrop<T, F: FnOnce(&T)> {
    value: T,
    release: Option<F>,
}

impl<T: Clone, F: FnOnce(&T)> ReleaseOnDrop<T, F> {
    fn new(value: T, release: F) -> Self {
        Self {
            value,
            release: Some(release),
        }
    }

    /// Keeps the value alive past the guard; `release` never runs.
    fn disarm(mut self) -> T {
        self.release = None;
        self.value.clone()
    }
}

impl<T, F: FnOnce(&T)> std::ops::Deref for ReleaseOnDrop<T, F> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T, F: FnOnce(&T)> Drop for ReleaseOnDrop<T, F> {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            debug!("Releasing partially constructed device state");
            release(&self.value);
        }
    }
}

// Safety: Device is Send+Sync because:
// - ash::Device and ash::Instance are Send+Sync
// - queue, pool and physical device handles are plain handles
// - Allocator is protected by Mutex
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

/// Creates the logical device with anisotropy and descriptor indexing enabled.
fn create_logical_device(
    instance: &Instance,
    physical_device: &PhysicalDeviceInfo,
) -> RhiResult<ash::Device> {
    let unique_families = physical_device.queue_families.unique_families();
    let queue_priorities = [1.0f32];

    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(&queue_priorities)
        })
        .collect();

    debug!(
        "Creating {} queue(s) for families: {:?}",
        queue_create_infos.len(),
        unique_families
    );

    let indexing = physical_device.descriptor_indexing;
    let mut indexing_features = vk::PhysicalDeviceDescriptorIndexingFeatures::default()
        .descriptor_binding_partially_bound(true)
        .runtime_descriptor_array(true)
        .descriptor_binding_variable_descriptor_count(true)
        .descriptor_binding_sampled_image_update_after_bind(
            indexing.sampled_image_update_after_bind,
        )
        .descriptor_binding_update_unused_while_pending(indexing.update_unused_while_pending);

    let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);

    let extension_names: Vec<*const i8> =
        DEVICE_EXTENSIONS.iter().map(|ext| ext.as_ptr()).collect();

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features)
        .push_next(&mut indexing_features);

    let device = unsafe {
        instance
            .handle()
            .create_device(physical_device.device, &create_info, None)?
    };

    info!(
        "Logical device created with {} extension(s)",
        DEVICE_EXTENSIONS.len()
    );

    Ok(device)
}

/// Index of the first memory type allowed by `type_filter` that has every flag in `properties`.
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
) -> Option<u32> {
    memory_properties
        .memory_types
        .iter()
        .take(memory_properties.memory_type_count as usize)
        .enumerate()
        .find(|(i, memory_type)| {
            type_filter & (1 << i) != 0 && memory_type.property_flags.contains(properties)
        })
        .map(|(i, _)| i as u32)
}

/// First candidate whose linear or optimal tiling features contain `features`.
pub fn choose_supported_format(
    candidates: &[vk::Format],
    tiling: vk::ImageTiling,
    features: vk::FormatFeatureFlags,
    format_properties: impl Fn(vk::Format) -> vk::FormatProperties,
) -> Option<vk::Format> {
    candidates.iter().copied().find(|&format| {
        let props = format_properties(format);
        match tiling {
            vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
            vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
            _ => false,
        }
    })
}
