// Capability queries
//
// Read-only questions about physical devices and the surface: which queue
// families can draw and present, which extensions exist, what the surface
// supports, and which device to use. Nothing here owns GPU state.

use super::api::InstanceApi;
use crate::error::{RenderError, Result};
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CStr;

/// Queue family indices for the two roles the renderer needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn resolve(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }

    /// Scan `families` in index order. The lowest index satisfying each role
    /// wins and the scan stops once both roles are filled.
    pub fn scan<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> Result<Self>
    where
        F: FnMut(u32) -> Result<bool>,
    {
        let mut indices = Self::default();

        for (index, family) in (0u32..).zip(families) {
            if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics = Some(index);
            }
            if indices.present.is_none() && supports_present(index)? {
                indices.present = Some(index);
            }
            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }
}

/// Resolved queue family indices. Graphics and present may be equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// Distinct family indices, in ascending order.
    pub fn unique(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = [self.graphics, self.present].into_iter().collect();
        set.into_iter().collect()
    }

    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }
}

/// Snapshot of what a surface supports on one physical device.
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// A swapchain needs at least one format and one present mode.
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// # Safety
/// `physical_device` and `surface` must belong to `instance`.
pub unsafe fn find_queue_families<I: InstanceApi>(
    instance: &I,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<QueueFamilyIndices> {
    let families = instance.get_physical_device_queue_family_properties(physical_device);

    QueueFamilyIndices::scan(&families, |index| {
        instance
            .get_physical_device_surface_support(physical_device, index, surface)
            .map_err(|e| RenderError::vulkan("query surface support", e))
    })
}

/// # Safety
/// `physical_device` and `surface` must belong to `instance`.
pub unsafe fn query_surface_support<I: InstanceApi>(
    instance: &I,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
) -> Result<SurfaceSupport> {
    let capabilities = instance
        .get_physical_device_surface_capabilities(physical_device, surface)
        .map_err(|e| RenderError::vulkan("query surface capabilities", e))?;
    let formats = instance
        .get_physical_device_surface_formats(physical_device, surface)
        .map_err(|e| RenderError::vulkan("query surface formats", e))?;
    let present_modes = instance
        .get_physical_device_surface_present_modes(physical_device, surface)
        .map_err(|e| RenderError::vulkan("query surface present modes", e))?;

    Ok(SurfaceSupport {
        capabilities,
        formats,
        present_modes,
    })
}

/// # Safety
/// `physical_device` must belong to `instance`.
pub unsafe fn check_device_extension_support<I: InstanceApi>(
    instance: &I,
    physical_device: vk::PhysicalDevice,
    required: &[&CStr],
) -> Result<bool> {
    let available = instance
        .enumerate_device_extension_names(physical_device)
        .map_err(|e| RenderError::vulkan("enumerate device extensions", e))?;

    Ok(required
        .iter()
        .all(|name| available.iter().any(|ext| ext.as_c_str() == *name)))
}

/// Discrete GPU with geometry shaders, every required extension, both queue
/// roles resolvable against `surface`, and a usable surface.
///
/// # Safety
/// `physical_device` and `surface` must belong to `instance`.
pub unsafe fn is_device_suitable<I: InstanceApi>(
    instance: &I,
    physical_device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    required_extensions: &[&CStr],
) -> Result<bool> {
    let properties = instance.get_physical_device_properties(physical_device);
    let features = instance.get_physical_device_features(physical_device);

    if properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU
        || features.geometry_shader != vk::TRUE
    {
        return Ok(false);
    }

    if !check_device_extension_support(instance, physical_device, required_extensions)? {
        return Ok(false);
    }

    if !find_queue_families(instance, physical_device, surface)?.is_complete() {
        return Ok(false);
    }

    // Surface queries are only valid once the swapchain extension is known to exist
    Ok(query_surface_support(instance, physical_device, surface)?.is_adequate())
}

/// Pick the first suitable device in enumeration order.
///
/// # Safety
/// Every candidate and `surface` must belong to `instance`.
pub unsafe fn select_physical_device<I: InstanceApi>(
    instance: &I,
    candidates: &[vk::PhysicalDevice],
    surface: vk::SurfaceKHR,
    required_extensions: &[&CStr],
) -> Result<vk::PhysicalDevice> {
    if candidates.is_empty() {
        return Err(RenderError::NoDevice);
    }

    for &candidate in candidates {
        if is_device_suitable(instance, candidate, surface, required_extensions)? {
            let properties = instance.get_physical_device_properties(candidate);
            log::info!(
                "Selected GPU: {}",
                properties
                    .device_name_as_c_str()
                    .unwrap_or(c"<unnamed>")
                    .to_string_lossy()
            );
            log::info!(
                "API Version: {}.{}.{}",
                vk::api_version_major(properties.api_version),
                vk::api_version_minor(properties.api_version),
                vk::api_version_patch(properties.api_version)
            );
            return Ok(candidate);
        }
        log::debug!("Skipping unsuitable physical device {:?}", candidate);
    }

    Err(RenderError::NoSuitableDevice)
}
