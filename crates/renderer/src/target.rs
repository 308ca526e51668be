//! Presentation backends the frame orchestrator drives.
//!
//! [`FrameTarget`] is everything [`Renderer`](crate::Renderer) needs from
//! the GPU side of a frame: image acquisition, per-slot command recording,
//! submission with presentation, and the swapchain render pass. Slots are
//! indexed `0..MAX_FRAMES_IN_FLIGHT`; image indices come from
//! [`acquire`](FrameTarget::acquire).
//!
//! [`SwapchainTarget`] is the Vulkan implementation. Its slots are the
//! swapchain's [`FrameSlot`]s, so slot `k` records into the command buffer
//! guarded by slot `k`'s fence.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use engine_rhi::command::{full_scissor, full_viewport};
use engine_rhi::device::Device;
use engine_rhi::frame_slot::FrameSlot;
use engine_rhi::swapchain::{AcquireOutcome, PresentOutcome, Swapchain};
use engine_rhi::{RhiError, RhiResult};

/// GPU side of the frame loop.
pub trait FrameTarget {
    /// Waits for the oldest slot to retire and acquires the next image.
    ///
    /// # Errors
    ///
    /// Any failure other than an out-of-date surface.
    fn acquire(&mut self) -> RhiResult<AcquireOutcome>;

    /// Opens recording on the command buffer of `slot` and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if recording cannot begin.
    fn begin_commands(&mut self, slot: usize) -> RhiResult<vk::CommandBuffer>;

    /// Closes recording on the command buffer of `slot`.
    ///
    /// # Errors
    ///
    /// Returns an error if recording fails to close.
    fn end_commands(&mut self, slot: usize) -> RhiResult<()>;

    /// Submits the command buffer of `slot` and presents `image_index`.
    ///
    /// # Errors
    ///
    /// Any failure other than an out-of-date or suboptimal surface.
    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome>;

    /// Handle of the command buffer owned by `slot`.
    fn command_buffer(&self, slot: usize) -> vk::CommandBuffer;

    /// Begins the swapchain render pass on `slot` for `image_index` and sets
    /// a viewport and scissor covering the whole extent.
    fn begin_render_pass(&mut self, slot: usize, image_index: u32, clear_values: &[vk::ClearValue]);

    fn end_render_pass(&mut self, slot: usize);

    fn extent(&self) -> vk::Extent2D;

    fn render_pass(&self) -> vk::RenderPass;

    /// Blocks until the GPU has finished all submitted work.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    fn wait_idle(&self) -> RhiResult<()>;

    /// Rebuilds the presentation resources for `extent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the new swapchain cannot be created or its formats
    /// differ from the old one.
    fn rebuild(&mut self, extent: vk::Extent2D) -> RhiResult<()>;
}

/// Swapchain-backed frame target.
pub struct SwapchainTarget {
    // Dropped before the device reference goes away.
    swapchain: Option<Swapchain>,
    device: Arc<Device>,
}

impl SwapchainTarget {
    /// Creates the swapchain, and with it the frame slots, for `extent`.
    ///
    /// # Errors
    ///
    /// Returns an error if swapchain or frame slot creation fails.
    pub fn new(device: Arc<Device>, extent: vk::Extent2D) -> RhiResult<Self> {
        let swapchain = Swapchain::new(Arc::clone(&device), extent)?;
        debug!("Swapchain target ready at {}x{}", extent.width, extent.height);

        Ok(Self {
            swapchain: Some(swapchain),
            device,
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// The live swapchain. `None` only after a failed rebuild.
    #[inline]
    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.swapchain.as_ref()
    }

    fn live_swapchain(&self) -> RhiResult<&Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| RhiError::SwapchainError("Swapchain was lost in a failed rebuild".to_string()))
    }

    fn slot(&self, slot: usize) -> RhiResult<&FrameSlot> {
        Ok(self.live_swapchain()?.frame_slot(slot))
    }

    fn live_swapchain_mut(&mut self) -> RhiResult<&mut Swapchain> {
        self.swapchain
            .as_mut()
            .ok_or_else(|| RhiError::SwapchainError("Swapchain was lost in a failed rebuild".to_string()))
    }
}

impl FrameTarget for SwapchainTarget {
    fn acquire(&mut self) -> RhiResult<AcquireOutcome> {
        self.live_swapchain()?.acquire_next_image()
    }

    fn begin_commands(&mut self, slot: usize) -> RhiResult<vk::CommandBuffer> {
        let cmd = self.slot(slot)?.command_buffer();
        cmd.begin()?;
        Ok(cmd.handle())
    }

    fn end_commands(&mut self, slot: usize) -> RhiResult<()> {
        self.slot(slot)?.command_buffer().end()
    }

    fn submit(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentOutcome> {
        let cmd = self.slot(slot)?.command_buffer().handle();
        self.live_swapchain_mut()?
            .submit_command_buffers(&[cmd], image_index)
    }

    fn command_buffer(&self, slot: usize) -> vk::CommandBuffer {
        self.swapchain.as_ref().map_or_else(vk::CommandBuffer::null, |swapchain| {
            swapchain.frame_slot(slot).command_buffer().handle()
        })
    }

    fn begin_render_pass(&mut self, slot: usize, image_index: u32, clear_values: &[vk::ClearValue]) {
        let Some(swapchain) = self.swapchain.as_ref() else {
            return;
        };
        let extent = swapchain.extent();
        let cmd = swapchain.frame_slot(slot).command_buffer();

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(swapchain.render_pass())
            .framebuffer(swapchain.framebuffer(image_index as usize))
            .render_area(full_scissor(extent))
            .clear_values(clear_values);

        cmd.begin_render_pass(&begin_info);
        cmd.set_viewport(&full_viewport(extent));
        cmd.set_scissor(&full_scissor(extent));
    }

    fn end_render_pass(&mut self, slot: usize) {
        if let Some(swapchain) = self.swapchain.as_ref() {
            swapchain.frame_slot(slot).command_buffer().end_render_pass();
        }
    }

    fn extent(&self) -> vk::Extent2D {
        self.swapchain
            .as_ref()
            .map_or_else(vk::Extent2D::default, Swapchain::extent)
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.swapchain
            .as_ref()
            .map_or_else(vk::RenderPass::null, Swapchain::render_pass)
    }

    fn wait_idle(&self) -> RhiResult<()> {
        self.device.wait_idle()
    }

    fn rebuild(&mut self, extent: vk::Extent2D) -> RhiResult<()> {
        let swapchain = match self.swapchain.take() {
            Some(previous) => Swapchain::with_previous(Arc::clone(&self.device), extent, previous)?,
            None => Swapchain::new(Arc::clone(&self.device), extent)?,
        };

        info!(
            "Swapchain rebuilt at {}x{}",
            swapchain.width(),
            swapchain.height()
        );
        self.swapchain = Some(swapchain);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_swapchain_target_is_send_sync() {
        assert_send_sync::<SwapchainTarget>();
    }
}
