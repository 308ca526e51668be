//! Frame slots.
//!
//! A [`FrameSlot`] is everything one frame in flight needs while the CPU
//! records the next one: a primary command buffer, the semaphore the
//! presentation engine signals when an image is ready, the semaphore the
//! submission signals when rendering is done, and the fence the host waits
//! on before touching the slot again.
//!
//! ```text
//! wait_retired ─► acquire (signals image_available)
//!              ─► record command_buffer
//!              ─► rearm + submit (waits image_available,
//!                                 signals render_finished and in_flight)
//!              ─► present (waits render_finished)
//! ```
//!
//! [`MAX_FRAMES_IN_FLIGHT`] slots rotate round-robin, see [`next_slot`].

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::RhiResult;

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Slot index that follows `current` in the rotation.
#[inline]
pub fn next_slot(current: usize) -> usize {
    (current + 1) % MAX_FRAMES_IN_FLIGHT
}

/// Command buffer plus the synchronization objects of one frame in flight.
pub struct FrameSlot {
    device: Arc<Device>,
    command_buffer: CommandBuffer,
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    /// Created signaled so the first wait returns at once.
    in_flight: vk::Fence,
}

impl FrameSlot {
    /// Allocates the slot's command buffer and creates its semaphores and fence.
    ///
    /// # Errors
    ///
    /// Returns an error if any allocation or creation fails. Objects created
    /// before the failure are released.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let command_buffer = CommandBuffer::new(Arc::clone(&device))?;

        // Null handles are skipped by Drop
        let mut slot = Self {
            device: Arc::clone(&device),
            command_buffer,
            image_available: vk::Semaphore::null(),
            render_finished: vk::Semaphore::null(),
            in_flight: vk::Fence::null(),
        };

        let raw = device.handle();
        let semaphore_info = vk::SemaphoreCreateInfo::default();
        slot.image_available = unsafe { raw.create_semaphore(&semaphore_info, None)? };
        slot.render_finished = unsafe { raw.create_semaphore(&semaphore_info, None)? };

        let fence_info = vk::FenceCreateInfo::default().flags(vk::FenceCreateFlags::SIGNALED);
        slot.in_flight = unsafe { raw.create_fence(&fence_info, None)? };

        debug!("Created frame slot");
        Ok(slot)
    }

    /// Blocks until the slot's previous submission has finished on the GPU.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails, e.g. on device loss.
    pub fn wait_retired(&self) -> RhiResult<()> {
        unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.in_flight], true, u64::MAX)?
        };
        Ok(())
    }

    /// Unsignals the fence right before the slot is submitted again.
    ///
    /// # Errors
    ///
    /// Returns an error if the reset fails.
    pub fn rearm(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(&[self.in_flight])? };
        Ok(())
    }

    #[inline]
    pub fn command_buffer(&self) -> &CommandBuffer {
        &self.command_buffer
    }

    #[inline]
    pub fn image_available(&self) -> vk::Semaphore {
        self.image_available
    }

    #[inline]
    pub fn render_finished(&self) -> vk::Semaphore {
        self.render_finished
    }

    #[inline]
    pub fn in_flight(&self) -> vk::Fence {
        self.in_flight
    }
}

impl Drop for FrameSlot {
    fn drop(&mut self) {
        let device = self.device.handle();
        unsafe {
            if self.in_flight != vk::Fence::null() {
                device.destroy_fence(self.in_flight, None);
            }
            for semaphore in [self.image_available, self.render_finished] {
                if semaphore != vk::Semaphore::null() {
                    device.destroy_semaphore(semaphore, None);
                }
            }
        }
        debug!("Destroyed frame slot");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_slot_wraps() {
        let mut slot = 0;
        let visited: Vec<usize> = (0..5)
            .map(|_| {
                let current = slot;
                slot = next_slot(slot);
                current
            })
            .collect();
        assert_eq!(visited, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_frame_slot_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FrameSlot>();
    }
}
