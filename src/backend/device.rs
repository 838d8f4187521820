// Device context - Logical device and its queues
//
// Responsibilities:
// - One queue-creation request per unique queue family
// - Required device extensions (swapchain is mandatory)
// - Graphics / present queue handles
//
// The device is shared through an Arc by every object created from it and
// is destroyed when the last of them is gone.

use super::api::{DeviceApi, InstanceApi};
use super::capability::QueueFamilies;
use crate::error::{RenderError, Result};
use ash::vk;
use std::ffi::CStr;
use std::sync::Arc;

/// Device extensions the renderer cannot run without.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

pub struct DeviceContext<D: DeviceApi> {
    pub physical_device: vk::PhysicalDevice,
    pub queue_families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    device: Arc<D>,
}

impl<D: DeviceApi> DeviceContext<D> {
    /// Create the logical device for `physical_device`.
    ///
    /// # Safety
    /// `physical_device` must belong to `instance`, and `queue_families` must
    /// come from that device.
    pub unsafe fn new<I>(
        instance: &I,
        physical_device: vk::PhysicalDevice,
        queue_families: QueueFamilies,
        required_extensions: &[&CStr],
    ) -> Result<Self>
    where
        I: InstanceApi<Device = D>,
    {
        let queue_priorities = [1.0];
        let queue_create_infos: Vec<_> = queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        let extension_names: Vec<_> = required_extensions.iter().map(|ext| ext.as_ptr()).collect();
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features);

        let device = instance
            .create_device(physical_device, &create_info)
            .map_err(RenderError::DeviceCreation)?;

        let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
        let present_queue = device.get_device_queue(queue_families.present, 0);

        log::info!(
            "Logical device created (graphics family {}, present family {})",
            queue_families.graphics,
            queue_families.present
        );

        Ok(Self {
            physical_device,
            queue_families,
            graphics_queue,
            present_queue,
            device: Arc::new(device),
        })
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Block until every queue on the device is idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }
            .map_err(|e| RenderError::vulkan("wait for device idle", e))
    }
}
