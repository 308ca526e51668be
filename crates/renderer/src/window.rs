//! The windowing side of the frame loop.

use std::time::Duration;

use ash::vk;

use engine_platform::Window;

/// What the frame orchestrator needs from the window it presents into.
pub trait WindowSurface {
    /// Current drawable size in pixels. Zero in either dimension while
    /// minimized.
    fn framebuffer_extent(&self) -> vk::Extent2D;

    /// Whether a resize was reported since the flag was last reset.
    fn was_resized(&self) -> bool;

    fn reset_resized_flag(&mut self);

    /// Blocks briefly so the platform can deliver pending window events.
    fn wait_events(&mut self);
}

/// Poll interval while waiting for a minimized window to come back.
const WAIT_INTERVAL: Duration = Duration::from_millis(16);

impl WindowSurface for Window {
    fn framebuffer_extent(&self) -> vk::Extent2D {
        let (width, height) = self.framebuffer_size();
        vk::Extent2D { width, height }
    }

    #[inline]
    fn was_resized(&self) -> bool {
        Window::was_resized(self)
    }

    #[inline]
    fn reset_resized_flag(&mut self) {
        Window::reset_resized_flag(self);
    }

    fn wait_events(&mut self) {
        // winit 0.30 owns the event pump, so the best we can do from inside a
        // callback is sleep and re-read the surface size.
        std::thread::sleep(WAIT_INTERVAL);
        self.refresh_size();
    }
}
