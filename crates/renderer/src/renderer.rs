//! Frame orchestration.
//!
//! # Overview
//!
//! A frame is bracketed by [`Renderer::begin_frame`] and
//! [`Renderer::end_frame`]. Between the two the caller records into the
//! returned command buffer, usually inside
//! [`begin_swap_chain_render_pass`](Renderer::begin_swap_chain_render_pass)
//! and [`end_swap_chain_render_pass`](Renderer::end_swap_chain_render_pass).
//!
//! An out-of-date surface during acquisition makes `begin_frame` rebuild the
//! swapchain and return `Ok(None)`; the caller skips the frame. A stale
//! surface or a window resize during presentation makes `end_frame` rebuild
//! without advancing the frame slot.
//!
//! # Example
//!
//! ```no_run
//! # use engine_renderer::{Renderer, WindowSurface};
//! # fn example(renderer: &mut Renderer, window: &mut impl WindowSurface) -> engine_rhi::RhiResult<()> {
//! if let Some(cmd) = renderer.begin_frame(window)? {
//!     renderer.begin_swap_chain_render_pass(cmd);
//!     // Bind pipelines and draw here...
//!     renderer.end_swap_chain_render_pass(cmd);
//!     renderer.end_frame(window)?;
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use engine_rhi::RhiResult;
use engine_rhi::device::Device;
use engine_rhi::swapchain::{AcquireOutcome, MAX_FRAMES_IN_FLIGHT, aspect_ratio};

use crate::target::{FrameTarget, SwapchainTarget};
use crate::window::WindowSurface;

/// Sequences frames on a [`FrameTarget`] and rebuilds it when the surface
/// goes stale.
pub struct Renderer<T: FrameTarget = SwapchainTarget> {
    target: T,
    clear_color: [f32; 4],
    current_image_index: u32,
    current_frame_index: usize,
    is_frame_started: bool,
}

impl Renderer<SwapchainTarget> {
    /// Creates the swapchain for the window's current size.
    ///
    /// Blocks while the window is minimized.
    ///
    /// # Errors
    ///
    /// Returns an error if the swapchain or its command buffers cannot be
    /// created.
    pub fn new(
        device: Arc<Device>,
        window: &mut impl WindowSurface,
        clear_color: [f32; 4],
    ) -> RhiResult<Self> {
        let extent = wait_for_drawable_extent(window);
        let target = SwapchainTarget::new(device, extent)?;
        info!("Renderer ready at {}x{}", extent.width, extent.height);
        Ok(Self::with_target(target, clear_color))
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        self.target.device()
    }
}

impl<T: FrameTarget> Renderer<T> {
    /// Wraps an already-built target.
    pub fn with_target(target: T, clear_color: [f32; 4]) -> Self {
        Self {
            target,
            clear_color,
            current_image_index: 0,
            current_frame_index: 0,
            is_frame_started: false,
        }
    }

    /// Acquires the next image and opens recording for the current slot.
    ///
    /// Returns `Ok(None)` when the surface was out of date; the swapchain has
    /// been rebuilt and nothing was recorded.
    ///
    /// Must not be called while a frame is in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if acquisition, the rebuild, or opening the command
    /// buffer fails.
    pub fn begin_frame(
        &mut self,
        window: &mut impl WindowSurface,
    ) -> RhiResult<Option<vk::CommandBuffer>> {
        debug_assert!(
            !self.is_frame_started,
            "cannot call begin_frame while a frame is in progress"
        );

        let image_index = match self.target.acquire()? {
            AcquireOutcome::OutOfDate => {
                self.recreate_swapchain(window)?;
                return Ok(None);
            }
            AcquireOutcome::Ready { image_index, .. } => image_index,
        };

        self.current_image_index = image_index;
        self.is_frame_started = true;

        let cmd = self.target.begin_commands(self.current_frame_index)?;
        Ok(Some(cmd))
    }

    /// Closes recording, submits and presents the frame.
    ///
    /// The frame slot advances unless the swapchain had to be rebuilt.
    ///
    /// # Errors
    ///
    /// Returns an error if recording, submission or the rebuild fails.
    pub fn end_frame(&mut self, window: &mut impl WindowSurface) -> RhiResult<()> {
        debug_assert!(
            self.is_frame_started,
            "cannot call end_frame while frame is not in progress"
        );

        self.target.end_commands(self.current_frame_index)?;
        self.is_frame_started = false;

        let outcome = self
            .target
            .submit(self.current_frame_index, self.current_image_index)?;

        if outcome.needs_rebuild() || window.was_resized() {
            window.reset_resized_flag();
            self.recreate_swapchain(window)?;
            return Ok(());
        }

        self.current_frame_index = (self.current_frame_index + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(())
    }

    /// Begins the swapchain render pass on `cmd`.
    ///
    /// Color clears to the configured clear color, depth to 1.0 and stencil
    /// to 0. Viewport and scissor cover the whole swapchain extent.
    pub fn begin_swap_chain_render_pass(&mut self, cmd: vk::CommandBuffer) {
        debug_assert!(
            self.is_frame_started,
            "cannot begin a render pass while no frame is in progress"
        );
        debug_assert!(
            cmd == self.target.command_buffer(self.current_frame_index),
            "cannot begin a render pass on a command buffer from another frame"
        );

        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        self.target.begin_render_pass(
            self.current_frame_index,
            self.current_image_index,
            &clear_values,
        );
    }

    pub fn end_swap_chain_render_pass(&mut self, cmd: vk::CommandBuffer) {
        debug_assert!(
            self.is_frame_started,
            "cannot end a render pass while no frame is in progress"
        );
        debug_assert!(
            cmd == self.target.command_buffer(self.current_frame_index),
            "cannot end a render pass on a command buffer from another frame"
        );

        self.target.end_render_pass(self.current_frame_index);
    }

    /// Rebuilds the swapchain for the window's current size.
    ///
    /// Waits out a minimized window, then waits for the device to go idle
    /// before anything is destroyed.
    ///
    /// # Errors
    ///
    /// Returns an error if the idle wait or the rebuild fails.
    pub fn recreate_swapchain(&mut self, window: &mut impl WindowSurface) -> RhiResult<()> {
        let extent = wait_for_drawable_extent(window);

        self.target.wait_idle()?;
        self.target.rebuild(extent)?;

        debug!("Recreated swapchain at {}x{}", extent.width, extent.height);
        Ok(())
    }

    /// Width over height of the swapchain extent.
    #[inline]
    pub fn aspect_ratio(&self) -> f32 {
        aspect_ratio(self.target.extent())
    }

    /// Slot of the frame being recorded.
    ///
    /// Only meaningful while a frame is in progress.
    #[inline]
    pub fn frame_index(&self) -> usize {
        debug_assert!(
            self.is_frame_started,
            "cannot get frame index when frame not in progress"
        );
        self.current_frame_index
    }

    #[inline]
    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        debug_assert!(
            self.is_frame_started,
            "cannot get command buffer when frame not in progress"
        );
        self.target.command_buffer(self.current_frame_index)
    }

    #[inline]
    pub fn is_frame_in_progress(&self) -> bool {
        self.is_frame_started
    }

    #[inline]
    pub fn render_pass(&self) -> vk::RenderPass {
        self.target.render_pass()
    }

    #[inline]
    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    #[inline]
    pub fn target(&self) -> &T {
        &self.target
    }

    /// Blocks until the GPU is idle. Call before tearing anything down.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails.
    pub fn wait_idle(&self) -> RhiResult<()> {
        self.target.wait_idle()
    }
}

fn wait_for_drawable_extent(window: &mut impl WindowSurface) -> vk::Extent2D {
    let mut extent = window.framebuffer_extent();
    while extent.width == 0 || extent.height == 0 {
        window.wait_events();
        extent = window.framebuffer_extent();
    }
    extent
}
