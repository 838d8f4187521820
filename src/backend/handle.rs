// Owning handle wrapper
//
// Vulkan handles are plain integers with no ownership. `Owned` pairs a
// handle with the device that created it and destroys it on drop, so a
// constructor that fails halfway releases everything it already made, in
// reverse order, just by returning early.

use super::api::DeviceApi;
use ash::vk::{self, Handle};
use std::fmt;
use std::sync::Arc;

/// A device-owned object type with a matching destroy call.
pub trait DeviceObject: Handle + Copy {
    /// # Safety
    /// The handle must belong to `device` and must not be in use by the GPU.
    unsafe fn destroy_with<D: DeviceApi + ?Sized>(self, device: &D);
}

macro_rules! device_object {
    ($($ty:ty => $destroy:ident),* $(,)?) => {
        $(
            impl DeviceObject for $ty {
                unsafe fn destroy_with<D: DeviceApi + ?Sized>(self, device: &D) {
                    device.$destroy(self);
                }
            }
        )*
    };
}

device_object! {
    vk::Semaphore => destroy_semaphore,
    vk::Fence => destroy_fence,
    vk::CommandPool => destroy_command_pool,
    vk::Framebuffer => destroy_framebuffer,
    vk::Pipeline => destroy_pipeline,
    vk::PipelineLayout => destroy_pipeline_layout,
    vk::RenderPass => destroy_render_pass,
    vk::ShaderModule => destroy_shader_module,
    vk::ImageView => destroy_image_view,
    vk::SwapchainKHR => destroy_swapchain,
}

/// Handle destroyed through its device when dropped.
pub struct Owned<D: DeviceApi, H: DeviceObject> {
    handle: H,
    device: Arc<D>,
}

impl<D: DeviceApi, H: DeviceObject> Owned<D, H> {
    /// Take ownership of `handle`.
    ///
    /// # Safety
    /// `handle` must have been created by `device` and not be owned elsewhere.
    pub unsafe fn new(device: &Arc<D>, handle: H) -> Self {
        Self {
            handle,
            device: Arc::clone(device),
        }
    }

    pub fn raw(&self) -> H {
        self.handle
    }
}

impl<D: DeviceApi, H: DeviceObject> Drop for Owned<D, H> {
    fn drop(&mut self) {
        if self.handle.as_raw() != 0 {
            unsafe { self.handle.destroy_with(&*self.device) };
        }
    }
}

impl<D: DeviceApi, H: DeviceObject + fmt::Debug> fmt::Debug for Owned<D, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Owned").field(&self.handle).finish()
    }
}
