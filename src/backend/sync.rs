// Synchronization primitives
//
// Fences for GPU-CPU and semaphores for GPU-GPU ordering.
// One FrameSync per frame in flight.

use super::api::DeviceApi;
use super::handle::Owned;
use crate::error::{RenderError, Result};
use ash::vk;
use std::sync::Arc;

/// Frame synchronization - one per frame in flight
pub struct FrameSync<D: DeviceApi> {
    /// Signaled by the presentation engine once the acquired image is usable
    pub image_available: Owned<D, vk::Semaphore>,
    /// Signaled by the graphics queue once the frame's commands finished
    pub render_finished: Owned<D, vk::Semaphore>,
    /// Signaled when the GPU is done with this slot's command buffer
    pub in_flight: Owned<D, vk::Fence>,
}

impl<D: DeviceApi> FrameSync<D> {
    /// # Safety
    /// `device` must be valid.
    pub unsafe fn new(device: &Arc<D>) -> Result<Self> {
        let image_available = create_semaphore(device)?;
        let render_finished = create_semaphore(device)?;
        // Start signaled so the first wait returns immediately
        let in_flight = create_fence(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// Block until the GPU has finished the work last submitted with this
    /// slot, or until `timeout_ns` expires.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &D, timeout_ns: u64) -> Result<()> {
        match device.wait_for_fence(self.in_flight.raw(), timeout_ns) {
            Ok(()) => Ok(()),
            Err(vk::Result::TIMEOUT) => Err(RenderError::Timeout("frame fence")),
            Err(e) => Err(RenderError::vulkan("wait for frame fence", e)),
        }
    }

    /// Reset the fence for the next submission.
    ///
    /// # Safety
    /// The fence must not be part of a pending submission.
    pub unsafe fn reset(&self, device: &D) -> Result<()> {
        device
            .reset_fence(self.in_flight.raw())
            .map_err(|e| RenderError::vulkan("reset frame fence", e))
    }
}

/// # Safety
/// `device` must be valid.
pub unsafe fn create_semaphore<D: DeviceApi>(device: &Arc<D>) -> Result<Owned<D, vk::Semaphore>> {
    let semaphore = device
        .create_semaphore()
        .map_err(|e| RenderError::vulkan("create semaphore", e))?;
    Ok(Owned::new(device, semaphore))
}

/// # Safety
/// `device` must be valid.
pub unsafe fn create_fence<D: DeviceApi>(device: &Arc<D>, signaled: bool) -> Result<Owned<D, vk::Fence>> {
    let fence = device
        .create_fence(signaled)
        .map_err(|e| RenderError::vulkan("create fence", e))?;
    Ok(Owned::new(device, fence))
}
