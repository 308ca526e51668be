//! Presentation swapchain.
//!
//! # Overview
//!
//! [`Swapchain`] owns everything tied to the chain of presentable images:
//! - the `VkSwapchainKHR` and one color view per image
//! - one depth image per swapchain image
//! - the shared render pass and one framebuffer per image
//! - the [`FrameSlot`]s (command buffer, semaphores and fence per frame in
//!   flight) and the image-to-fence table used to avoid rendering into an
//!   image the GPU still reads from
//!
//! Frames rotate over [`MAX_FRAMES_IN_FLIGHT`] slots. Each frame:
//!
//! 1. [`Swapchain::acquire_next_image`] waits on the slot's fence and acquires
//!    an image, signaling the slot's "image available" semaphore.
//! 2. [`Swapchain::submit_command_buffers`] waits on any fence still guarding
//!    the image, records the slot fence for it, submits and presents, then
//!    moves on to the next slot.
//!
//! Out-of-date and suboptimal results are reported through [`AcquireOutcome`]
//! and [`PresentOutcome`] rather than errors; the caller rebuilds with
//! [`Swapchain::with_previous`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use engine_rhi::device::Device;
//! use engine_rhi::swapchain::{AcquireOutcome, Swapchain};
//!
//! # fn example(device: Arc<Device>, cmd: vk::CommandBuffer) -> engine_rhi::RhiResult<()> {
//! let extent = vk::Extent2D { width: 1280, height: 720 };
//! let mut swapchain = Swapchain::new(device.clone(), extent)?;
//!
//! match swapchain.acquire_next_image()? {
//!     AcquireOutcome::Ready { image_index, .. } => {
//!         swapchain.submit_command_buffers(&[cmd], image_index)?;
//!     }
//!     AcquireOutcome::OutOfDate => {
//!         device.wait_idle()?;
//!         swapchain = Swapchain::with_previous(device, extent, swapchain)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{DepthImage, find_depth_format};
use crate::surface::Surface;
use crate::frame_slot::{FrameSlot, next_slot};

/// Number of frames the CPU may record ahead of the GPU.
pub use crate::frame_slot::MAX_FRAMES_IN_FLIGHT;

/// Swapchain surface support details.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    /// Surface capabilities (min/max image count, extents, transforms, etc.)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported surface formats (format and color space combinations)
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes (FIFO, MAILBOX, IMMEDIATE, etc.)
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    /// Queries swapchain support details for a physical device and surface.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the queries fail.
    pub fn query(physical_device: vk::PhysicalDevice, surface: &Surface) -> RhiResult<Self> {
        let loader = surface.loader();
        let handle = surface.handle();

        let capabilities =
            unsafe { loader.get_physical_device_surface_capabilities(physical_device, handle)? };
        let formats =
            unsafe { loader.get_physical_device_surface_formats(physical_device, handle)? };
        let present_modes =
            unsafe { loader.get_physical_device_surface_present_modes(physical_device, handle)? };

        debug!(
            "Swapchain support: {} formats, {} present modes, image count: {}-{}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Returns true if at least one format and one present mode are available.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Result of acquiring the next swapchain image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready for rendering. `suboptimal` still allows this frame.
    Ready { image_index: u32, suboptimal: bool },
    /// The swapchain no longer matches the surface and must be rebuilt.
    OutOfDate,
}

/// Result of submitting and presenting a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    Suboptimal,
    OutOfDate,
}

impl PresentOutcome {
    /// True when the swapchain should be rebuilt before the next frame.
    #[inline]
    pub fn needs_rebuild(self) -> bool {
        !matches!(self, PresentOutcome::Presented)
    }
}

/// Maps the raw acquire result onto [`AcquireOutcome`].
///
/// # Errors
///
/// Any failure other than `ERROR_OUT_OF_DATE_KHR` is returned as
/// [`RhiError::VulkanError`].
pub fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> RhiResult<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
            image_index,
            suboptimal,
        }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(err) => Err(err.into()),
    }
}

/// Maps the raw present result onto [`PresentOutcome`].
///
/// # Errors
///
/// Any failure other than `ERROR_OUT_OF_DATE_KHR` is returned as
/// [`RhiError::VulkanError`].
pub fn classify_present(result: Result<bool, vk::Result>) -> RhiResult<PresentOutcome> {
    match result {
        Ok(false) => Ok(PresentOutcome::Presented),
        Ok(true) => Ok(PresentOutcome::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
        Err(err) => Err(err.into()),
    }
}

/// Vulkan swapchain with its render pass, attachments and frame slots.
///
/// # Thread Safety
///
/// Not thread-safe. Only the render thread should interact with it.
pub struct Swapchain {
    /// Reference to the logical device
    device: Arc<Device>,
    /// Swapchain extension loader
    loader: ash::khr::swapchain::Device,
    swapchain: vk::SwapchainKHR,
    image_format: vk::Format,
    depth_format: vk::Format,
    extent: vk::Extent2D,
    /// Images owned by the presentation engine
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    depth_images: Vec<DepthImage>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,
    /// Frame slots, carried over to the successor on rebuild
    slots: Vec<FrameSlot>,
    /// Slot fence last submitted against each image, null when none
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,
}

impl Swapchain {
    /// Creates a swapchain for the device's surface.
    ///
    /// # Arguments
    ///
    /// * `device` - The logical device (owns the surface)
    /// * `window_extent` - Framebuffer size, used when the surface leaves the extent to us
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Surface queries fail or report no formats/present modes
    /// - No depth format is supported
    /// - Any Vulkan object creation fails
    pub fn new(device: Arc<Device>, window_extent: vk::Extent2D) -> RhiResult<Self> {
        Self::create(device, window_extent, vk::SwapchainKHR::null(), Vec::new(), 0)
    }

    /// Creates a swapchain that replaces `previous`.
    ///
    /// The old handle is passed to the presentation engine so it can reuse
    /// internal resources. The frame slots and the slot rotation move over
    /// from `previous`, which is released once the new swapchain exists. The
    /// caller must make sure the GPU is idle.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::SwapchainFormatChanged`] if the image or depth format
    /// differs from the previous swapchain, otherwise the errors of [`Swapchain::new`].
    pub fn with_previous(
        device: Arc<Device>,
        window_extent: vk::Extent2D,
        mut previous: Swapchain,
    ) -> RhiResult<Self> {
        let slots = std::mem::take(&mut previous.slots);
        let swapchain = Self::create(
            device,
            window_extent,
            previous.swapchain,
            slots,
            previous.current_frame,
        )?;
        let same_formats = swapchain.compare_swap_formats(&previous);
        let old = (previous.image_format, previous.depth_format);
        drop(previous);

        if !same_formats {
            return Err(RhiError::SwapchainFormatChanged {
                old,
                new: (swapchain.image_format, swapchain.depth_format),
            });
        }

        Ok(swapchain)
    }

    fn create(
        device: Arc<Device>,
        window_extent: vk::Extent2D,
        old_swapchain: vk::SwapchainKHR,
        slots: Vec<FrameSlot>,
        current_frame: usize,
    ) -> RhiResult<Self> {
        let loader = ash::khr::swapchain::Device::new(device.instance().handle(), device.handle());

        let support = device.swapchain_support()?;
        if !support.is_adequate() {
            return Err(RhiError::SwapchainError(
                "Inadequate swapchain support (no formats or present modes)".to_string(),
            ));
        }

        let surface_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(&support.capabilities, window_extent);
        let image_count = determine_image_count(&support.capabilities);
        let depth_format = find_depth_format(&device)?;

        info!(
            "Creating swapchain: {}x{}, format {:?}, depth {:?}, present mode {:?}, {} images",
            extent.width,
            extent.height,
            surface_format.format,
            depth_format,
            present_mode,
            image_count
        );

        let families = device.queue_families();
        let (graphics_family, present_family) =
            match (families.graphics_family, families.present_family) {
                (Some(graphics), Some(present)) => (graphics, present),
                _ => {
                    return Err(RhiError::SwapchainError(
                        "Queue families are incomplete".to_string(),
                    ));
                }
            };
        let family_indices = [graphics_family, present_family];
        let (sharing_mode, shared_families) = if graphics_family != present_family {
            (vk::SharingMode::CONCURRENT, family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(device.surface().handle())
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_families)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let handle = unsafe { loader.create_swapchain(&create_info, None)? };

        // Everything created from here on is released by Drop if a later step fails
        let mut swapchain = Self {
            device,
            loader,
            swapchain: handle,
            image_format: surface_format.format,
            depth_format,
            extent,
            images: Vec::new(),
            image_views: Vec::new(),
            depth_images: Vec::new(),
            render_pass: vk::RenderPass::null(),
            framebuffers: Vec::new(),
            slots,
            images_in_flight: Vec::new(),
            current_frame: current_frame % MAX_FRAMES_IN_FLIGHT,
        };

        swapchain.images = unsafe { swapchain.loader.get_swapchain_images(handle)? };
        swapchain.create_image_views()?;
        swapchain.create_render_pass()?;
        swapchain.create_depth_resources()?;
        swapchain.create_framebuffers()?;
        while swapchain.slots.len() < MAX_FRAMES_IN_FLIGHT {
            swapchain
                .slots
                .push(FrameSlot::new(swapchain.device.clone())?);
        }
        swapchain.images_in_flight = vec![vk::Fence::null(); swapchain.images.len()];

        info!("Swapchain created with {} images", swapchain.images.len());

        Ok(swapchain)
    }

    fn create_image_views(&mut self) -> RhiResult<()> {
        for &image in &self.images {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(self.image_format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );

            let view = unsafe { self.device.handle().create_image_view(&create_info, None)? };
            self.image_views.push(view);
        }

        debug!("Created {} swapchain image views", self.image_views.len());
        Ok(())
    }

    fn create_render_pass(&mut self) -> RhiResult<()> {
        let attachments = [
            vk::AttachmentDescription::default()
                .format(self.image_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::PRESENT_SRC_KHR),
            vk::AttachmentDescription::default()
                .format(self.depth_format)
                .samples(vk::SampleCountFlags::TYPE_1)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::DONT_CARE)
                .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                .initial_layout(vk::ImageLayout::UNDEFINED)
                .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
        ];

        let color_refs = [vk::AttachmentReference::default()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)];
        let depth_ref = vk::AttachmentReference::default()
            .attachment(1)
            .layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref)];

        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
        let dependencies = [vk::SubpassDependency::default()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(
                vk::AccessFlags::COLOR_ATTACHMENT_WRITE
                    | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )];

        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        self.render_pass = unsafe { self.device.handle().create_render_pass(&create_info, None)? };

        debug!("Created swapchain render pass");
        Ok(())
    }

    fn create_depth_resources(&mut self) -> RhiResult<()> {
        for _ in 0..self.images.len() {
            self.depth_images.push(DepthImage::new(
                self.device.clone(),
                self.extent,
                self.depth_format,
            )?);
        }
        Ok(())
    }

    fn create_framebuffers(&mut self) -> RhiResult<()> {
        for (color, depth) in self.image_views.iter().zip(&self.depth_images) {
            let attachments = [*color, depth.image_view()];
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.render_pass)
                .attachments(&attachments)
                .width(self.extent.width)
                .height(self.extent.height)
                .layers(1);

            let framebuffer = unsafe { self.device.handle().create_framebuffer(&create_info, None)? };
            self.framebuffers.push(framebuffer);
        }

        debug!("Created {} framebuffers", self.framebuffers.len());
        Ok(())
    }

    /// Waits for the current slot to retire, then acquires the next image.
    ///
    /// # Errors
    ///
    /// Returns an error if the fence wait fails or acquisition fails with
    /// anything other than out-of-date.
    pub fn acquire_next_image(&self) -> RhiResult<AcquireOutcome> {
        let slot = &self.slots[self.current_frame];
        slot.wait_retired()?;

        let result = unsafe {
            self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                slot.image_available(),
                vk::Fence::null(),
            )
        };

        classify_acquire(result)
    }

    /// Submits `buffers` for `image_index` and presents the image.
    ///
    /// The submission waits on the slot's "image available" semaphore at the
    /// color-attachment stage and signals its "render finished" semaphore,
    /// which presentation waits on. The frame slot advances before presenting.
    ///
    /// # Errors
    ///
    /// Returns an error if a fence operation or the submission fails, or if
    /// presentation fails with anything other than out-of-date.
    pub fn submit_command_buffers(
        &mut self,
        buffers: &[vk::CommandBuffer],
        image_index: u32,
    ) -> RhiResult<PresentOutcome> {
        let image = image_index as usize;
        let device = self.device.handle();

        let guard = self.images_in_flight[image];
        if guard != vk::Fence::null() {
            unsafe { device.wait_for_fences(&[guard], true, u64::MAX)? };
        }

        let slot = &self.slots[self.current_frame];
        self.images_in_flight[image] = slot.in_flight();

        let wait_semaphores = [slot.image_available()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [slot.render_finished()];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(buffers)
            .signal_semaphores(&signal_semaphores);

        slot.rearm()?;
        unsafe {
            device.queue_submit(
                self.device.graphics_queue(),
                &[submit_info],
                slot.in_flight(),
            )?;
        }

        self.current_frame = next_slot(self.current_frame);

        let swapchains = [self.swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.loader
                .queue_present(self.device.present_queue(), &present_info)
        };

        let outcome = classify_present(result)?;
        if outcome.needs_rebuild() {
            warn!("Presentation reported {:?}", outcome);
        }
        Ok(outcome)
    }

    /// Returns true if `other` uses the same image and depth formats.
    #[inline]
    pub fn compare_swap_formats(&self, other: &Swapchain) -> bool {
        self.image_format == other.image_format && self.depth_format == other.depth_format
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Returns the framebuffer for swapchain image `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.framebuffers[index]
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.extent.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.extent.height
    }

    /// Width divided by height.
    #[inline]
    pub fn extent_aspect_ratio(&self) -> f32 {
        aspect_ratio(self.extent)
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn image_format(&self) -> vk::Format {
        self.image_format
    }

    #[inline]
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Index of the frame slot the next acquire will use.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Frame slot `index`, in `0..MAX_FRAMES_IN_FLIGHT`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    #[inline]
    pub fn frame_slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        let device = self.device.handle();
        unsafe {
            for &framebuffer in &self.framebuffers {
                device.destroy_framebuffer(framebuffer, None);
            }
            for &view in &self.image_views {
                device.destroy_image_view(view, None);
            }
            if self.render_pass != vk::RenderPass::null() {
                device.destroy_render_pass(self.render_pass, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
        // Depth images and frame slots release themselves

        info!(
            "Swapchain destroyed (was {}x{}, {} images)",
            self.extent.width,
            self.extent.height,
            self.images.len()
        );
    }
}

/// Width divided by height of `extent`.
#[inline]
pub fn aspect_ratio(extent: vk::Extent2D) -> f32 {
    extent.width as f32 / extent.height as f32
}

/// Prefers B8G8R8A8_SRGB with SRGB_NONLINEAR, otherwise the first offered format.
///
/// `formats` must not be empty.
fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let preferred = formats.iter().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match preferred {
        Some(&format) => format,
        None => {
            warn!(
                "Using first available surface format: {:?}",
                formats[0].format
            );
            formats[0]
        }
    }
}

/// MAILBOX, then IMMEDIATE, then FIFO (always available).
fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    let mode = [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| present_modes.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO);

    debug!("Selected present mode {:?}", mode);
    mode
}

/// Uses the surface's current extent, or clamps `window_extent` to the surface limits.
fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: window_extent.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: window_extent.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum, capped by the maximum when there is one.
fn determine_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let preferred = capabilities.min_image_count + 1;

    if capabilities.max_image_count > 0 {
        preferred.min(capabilities.max_image_count)
    } else {
        preferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_choose_surface_format_prefers_srgb() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(selected.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_choose_surface_format_falls_back_to_first() {
        let formats = vec![
            vk::SurfaceFormatKHR {
                format: vk::Format::R8G8B8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
        ];

        let selected = choose_surface_format(&formats);
        assert_eq!(selected.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    fn test_choose_present_mode_preference_order() {
        let all = [
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::IMMEDIATE,
        ];
        assert_eq!(choose_present_mode(&all), vk::PresentModeKHR::MAILBOX);

        let no_mailbox = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(
            choose_present_mode(&no_mailbox),
            vk::PresentModeKHR::IMMEDIATE
        );

        let fifo_only = [vk::PresentModeKHR::FIFO];
        assert_eq!(choose_present_mode(&fifo_only), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_choose_extent_uses_current() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1920, 1080),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        };

        assert_eq!(
            choose_extent(&capabilities, extent(800, 600)),
            extent(1920, 1080)
        );
    }

    #[test]
    fn test_choose_extent_clamps_to_limits() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(100, 100),
            max_image_extent: extent(2000, 2000),
            ..Default::default()
        };

        assert_eq!(
            choose_extent(&capabilities, extent(3000, 3000)),
            extent(2000, 2000)
        );
        assert_eq!(
            choose_extent(&capabilities, extent(50, 50)),
            extent(100, 100)
        );
        assert_eq!(
            choose_extent(&capabilities, extent(800, 600)),
            extent(800, 600)
        );
    }

    #[test]
    fn test_determine_image_count() {
        let capped = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&capped), 2);

        let roomy = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&roomy), 3);

        let unlimited = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(determine_image_count(&unlimited), 4);
    }

    #[test]
    fn test_swapchain_support_details_is_adequate() {
        let adequate = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![vk::SurfaceFormatKHR::default()],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(adequate.is_adequate());

        let no_formats = SwapchainSupportDetails {
            formats: vec![],
            ..adequate.clone()
        };
        assert!(!no_formats.is_adequate());

        let no_modes = SwapchainSupportDetails {
            present_modes: vec![],
            ..adequate
        };
        assert!(!no_modes.is_adequate());
    }

    #[test]
    fn test_classify_acquire() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 2,
                suboptimal: false
            }
        );
        assert_eq!(
            classify_acquire(Ok((0, true))).unwrap(),
            AcquireOutcome::Ready {
                image_index: 0,
                suboptimal: true
            }
        );
        assert_eq!(
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            AcquireOutcome::OutOfDate
        );
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(RhiError::VulkanError(vk::Result::ERROR_DEVICE_LOST))
        ));
    }

    #[test]
    fn test_classify_present() {
        assert_eq!(
            classify_present(Ok(false)).unwrap(),
            PresentOutcome::Presented
        );
        assert_eq!(
            classify_present(Ok(true)).unwrap(),
            PresentOutcome::Suboptimal
        );
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            PresentOutcome::OutOfDate
        );
        assert!(classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());

        assert!(!PresentOutcome::Presented.needs_rebuild());
        assert!(PresentOutcome::Suboptimal.needs_rebuild());
        assert!(PresentOutcome::OutOfDate.needs_rebuild());
    }

    #[test]
    fn test_aspect_ratio() {
        assert!((aspect_ratio(extent(1280, 720)) - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(aspect_ratio(extent(600, 600)), 1.0);
    }
}
