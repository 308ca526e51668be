//! Physical device (GPU) selection.
//!
//! # Overview
//!
//! The physical device selection process involves:
//! 1. Enumerating all available GPUs
//! 2. Checking each GPU for required queue families (graphics, present)
//! 3. Checking the swapchain extension and that the surface offers at least
//!    one format and one present mode
//! 4. Checking sampler anisotropy and descriptor indexing
//! 5. Selecting the first GPU that passes every check
//!
//! # Example
//!
//! ```no_run
//! use engine_rhi::instance::Instance;
//! use engine_rhi::physical_device::select_physical_device;
//! use engine_rhi::surface::Surface;
//!
//! # fn example(instance: &Instance, surface: &Surface) -> engine_rhi::RhiResult<()> {
//! let device_info = select_physical_device(instance.handle(), surface)?;
//! println!("Selected GPU: {:?}", device_info.device_name());
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};
use crate::surface::Surface;
use crate::swapchain::SwapchainSupportDetails;

/// Device extensions every selected GPU must expose.
pub const DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Queue family indices for different queue types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if both required queue families are available.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the unique queue family indices as a vector.
    ///
    /// Used when creating the logical device so that a family shared by
    /// graphics and present only gets one queue.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }
}

/// Information about the selected physical device.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features.
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for different operations.
    pub queue_families: QueueFamilyIndices,
    /// Descriptor indexing capabilities.
    pub descriptor_indexing: DescriptorIndexingSupport,
}

/// Descriptor indexing capabilities reported through `PhysicalDeviceFeatures2`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DescriptorIndexingSupport {
    pub partially_bound: bool,
    pub runtime_array: bool,
    pub variable_count: bool,
    pub sampled_image_update_after_bind: bool,
    pub update_unused_while_pending: bool,
}

impl DescriptorIndexingSupport {
    fn from_features(features: &vk::PhysicalDeviceDescriptorIndexingFeatures) -> Self {
        Self {
            partially_bound: features.descriptor_binding_partially_bound == vk::TRUE,
            runtime_array: features.runtime_descriptor_array == vk::TRUE,
            variable_count: features.descriptor_binding_variable_descriptor_count == vk::TRUE,
            sampled_image_update_after_bind: features
                .descriptor_binding_sampled_image_update_after_bind
                == vk::TRUE,
            update_unused_while_pending: features.descriptor_binding_update_unused_while_pending
                == vk::TRUE,
        }
    }

    /// Partially bound, runtime-sized and variable-count descriptor arrays.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        self.partially_bound && self.runtime_array && self.variable_count
    }
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("Unknown Device")
        }
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Minimum alignment for uniform buffer offsets.
    #[inline]
    pub fn min_uniform_buffer_offset_alignment(&self) -> vk::DeviceSize {
        self.properties.limits.min_uniform_buffer_offset_alignment
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the first physical device that satisfies every requirement.
///
/// Enumeration order is preserved; there is no scoring.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no GPU qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: &Surface,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let selected = first_suitable(devices, |device| {
        check_device_suitability(instance, device, surface)
    });

    match selected {
        Some(info) => {
            info!(
                "Selected GPU: '{}' ({})",
                info.device_name(),
                info.device_type_name()
            );
            Ok(info)
        }
        None => {
            warn!("No suitable GPU found with required capabilities");
            Err(RhiError::NoSuitableGpu)
        }
    }
}

/// Returns the first candidate `check` accepts, in the given order.
///
/// A check that fails counts as a rejection of that candidate only; the
/// remaining candidates are still tried.
fn first_suitable<D, T>(
    candidates: impl IntoIterator<Item = D>,
    mut check: impl FnMut(D) -> RhiResult<Option<T>>,
) -> Option<T> {
    candidates
        .into_iter()
        .enumerate()
        .find_map(|(index, candidate)| match check(candidate) {
            Ok(found) => found,
            Err(e) => {
                warn!("GPU #{} skipped: capability query failed: {}", index, e);
                None
            }
        })
}

/// Checks if a physical device is suitable for rendering.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: &Surface,
) -> RhiResult<Option<PhysicalDeviceInfo>> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let mut indexing = vk::PhysicalDeviceDescriptorIndexingFeatures::default();
    let features = {
        let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut indexing);
        unsafe { instance.get_physical_device_features2(device, &mut features2) };
        features2.features
    };

    let device_name = unsafe {
        CStr::from_ptr(properties.device_name.as_ptr())
            .to_str()
            .unwrap_or("Unknown")
    };

    let queue_families = find_queue_families(instance, device, surface);
    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing required queue families (graphics={}, present={})",
            device_name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return Ok(None);
    }

    let available = unsafe { instance.enumerate_device_extension_properties(device)? };
    let available_names: Vec<&CStr> = available
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) })
        .collect();
    if !supports_extensions(&available_names, DEVICE_EXTENSIONS) {
        debug!("GPU '{}' skipped: missing swapchain extension", device_name);
        return Ok(None);
    }

    let support = SwapchainSupportDetails::query(device, surface)?;
    if !support.is_adequate() {
        debug!("GPU '{}' skipped: inadequate swapchain support", device_name);
        return Ok(None);
    }

    if features.sampler_anisotropy == vk::FALSE {
        debug!(
            "GPU '{}' skipped: sampler anisotropy not supported",
            device_name
        );
        return Ok(None);
    }

    let descriptor_indexing = DescriptorIndexingSupport::from_features(&indexing);
    if !descriptor_indexing.is_adequate() {
        debug!(
            "GPU '{}' skipped: descriptor indexing not supported",
            device_name
        );
        return Ok(None);
    }

    Ok(Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families,
        descriptor_indexing,
    }))
}

/// True when every required extension name appears in `available`.
fn supports_extensions(available: &[&CStr], required: &[&CStr]) -> bool {
    required.iter().all(|name| available.contains(name))
}

/// Finds the first graphics family and the first family that can present.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: &Surface,
) -> QueueFamilyIndices {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let mut indices = QueueFamilyIndices::default();

    for (i, family) in queue_families.iter().enumerate() {
        let i = i as u32;

        if family.queue_count == 0 {
            continue;
        }

        if indices.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(i);
        }

        if indices.present_family.is_none() {
            let present_support = unsafe {
                surface
                    .loader()
                    .get_physical_device_surface_support(device, i, surface.handle())
                    .unwrap_or(false)
            };

            if present_support {
                indices.present_family = Some(i);
            }
        }

        if indices.is_complete() {
            break;
        }
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_suitable_skips_failed_queries() {
        let candidates = [
            Err(RhiError::VulkanError(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Ok(None),
            Ok(Some("discrete")),
            Ok(Some("integrated")),
        ];
        let mut checked = 0;

        let selected = first_suitable(candidates, |result| {
            checked += 1;
            result
        });

        assert_eq!(selected, Some("discrete"));
        assert_eq!(checked, 3);
    }

    #[test]
    fn test_first_suitable_none_when_all_fail() {
        let candidates = [
            Err(RhiError::VulkanError(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Ok(None),
        ];

        let selected: Option<u32> = first_suitable(candidates, |result| result);

        assert!(selected.is_none());
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(indices.graphics_family.is_none());
        assert!(indices.present_family.is_none());
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_queue_family_indices_incomplete() {
        let graphics_only = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        assert!(!graphics_only.is_complete());

        let present_only = QueueFamilyIndices {
            graphics_family: None,
            present_family: Some(0),
        };
        assert!(!present_only.is_complete());
    }

    #[test]
    fn test_unique_families() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_supports_extensions() {
        let available = [c"VK_KHR_maintenance1", ash::khr::swapchain::NAME];
        assert!(supports_extensions(&available, DEVICE_EXTENSIONS));
        assert!(!supports_extensions(&available[..1], DEVICE_EXTENSIONS));
        assert!(supports_extensions(&[], &[]));
    }

    #[test]
    fn test_supports_descriptor_indexing() {
        let full = vk::PhysicalDeviceDescriptorIndexingFeatures::default()
            .descriptor_binding_partially_bound(true)
            .runtime_descriptor_array(true)
            .descriptor_binding_variable_descriptor_count(true);
        let support = DescriptorIndexingSupport::from_features(&full);
        assert!(support.is_adequate());
        assert!(!support.sampled_image_update_after_bind);

        let no_variable_count = vk::PhysicalDeviceDescriptorIndexingFeatures::default()
            .descriptor_binding_partially_bound(true)
            .runtime_descriptor_array(true);
        assert!(!DescriptorIndexingSupport::from_features(&no_variable_count).is_adequate());
    }
}
