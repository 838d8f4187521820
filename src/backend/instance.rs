// Vulkan instance and presentation surface
//
// Responsibilities:
// - Load the Vulkan library
// - Validation layer check (debug builds)
// - Instance creation with the windowing system's surface extensions
// - Surface creation for a window
//
// The instance is shared through an Arc; the surface and the logical device
// must be gone before the last reference drops.

use super::api::InstanceApi;
use super::debug::{self, DebugMessenger};
use super::native::AshDevice;
use crate::error::{RenderError, Result};
use ash::prelude::VkResult;
use ash::{vk, Entry};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

pub struct AshInstance {
    debug_messenger: Option<DebugMessenger>,
    surface_loader: ash::khr::surface::Instance,
    instance: ash::Instance,
    entry: Entry,
}

impl AshInstance {
    /// Create the Vulkan instance
    ///
    /// # Arguments
    /// * `app_name` - Application name reported to the driver
    /// * `display` - Display the surfaces will be created on
    /// * `enable_validation` - Enable validation layers and the debug messenger
    pub fn new(app_name: &str, display: RawDisplayHandle, enable_validation: bool) -> Result<Arc<Self>> {
        log::info!("Creating Vulkan instance: {}", app_name);

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }?;

        // Step 2: Make sure validation is actually available
        if enable_validation {
            check_validation_layer_support(&entry)?;
        }

        // Step 3: Create instance
        let instance = create_instance(&entry, app_name, display, enable_validation)?;

        // Step 4: Setup debug messenger if validation enabled
        let debug_messenger = if enable_validation {
            match unsafe { DebugMessenger::new(&entry, &instance) } {
                Ok(messenger) => messenger,
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        Ok(Arc::new(Self {
            debug_messenger,
            surface_loader,
            instance,
            entry,
        }))
    }

    /// Create a presentation surface for a window on this instance's display.
    pub fn create_surface(
        self: &Arc<Self>,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> Result<Surface<Self>> {
        let handle = unsafe {
            ash_window::create_surface(&self.entry, &self.instance, display, window, None)
        }
        .map_err(|e| RenderError::SurfaceCreation(e.to_string()))?;

        log::info!("Window surface created");
        Ok(unsafe { Surface::from_raw(self, handle) })
    }
}

impl Drop for AshInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        log::info!("Vulkan instance destroyed");
    }
}

fn check_validation_layer_support(entry: &Entry) -> Result<()> {
    let layers = unsafe { entry.enumerate_instance_layer_properties() }
        .map_err(|e| RenderError::vulkan("enumerate instance layers", e))?;

    log::info!("Checking for validation layers");
    let found = layers
        .iter()
        .any(|layer| matches!(layer.layer_name_as_c_str(), Ok(name) if name == VALIDATION_LAYER));

    let name = VALIDATION_LAYER.to_string_lossy();
    if found {
        log::info!("Requested validation layer {} was found", name);
        Ok(())
    } else {
        log::error!("Requested validation layer {} was not found", name);
        Err(RenderError::ValidationLayerUnavailable(name.into_owned()))
    }
}

fn create_instance(
    entry: &Entry,
    app_name: &str,
    display: RawDisplayHandle,
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name_cstr = CString::new(app_name)
        .map_err(|_| RenderError::InstanceCreation(vk::Result::ERROR_INITIALIZATION_FAILED))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name_cstr)
        .application_version(vk::make_api_version(0, 0, 0, 1))
        .engine_name(c"RevoVR")
        .engine_version(vk::make_api_version(0, 0, 0, 1))
        .api_version(vk::API_VERSION_1_0);

    // Surface extensions for this windowing system, plus debug utils
    let mut extensions: Vec<*const c_char> = ash_window::enumerate_required_extensions(display)
        .map_err(RenderError::InstanceCreation)?
        .to_vec();
    if enable_validation {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }
    log_required_extensions(&extensions);
    log_available_extensions(entry, &extensions);

    let layer_names = if enable_validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    // Reports problems with instance creation itself
    let mut instance_debug_info = debug::messenger_create_info(true);

    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names);
    if enable_validation {
        create_info = create_info.push_next(&mut instance_debug_info);
        debug::begin(debug::INSTANCE_CHANNEL);
    }

    let instance = unsafe { entry.create_instance(&create_info, None) };

    if enable_validation {
        debug::end(debug::INSTANCE_CHANNEL);
    }
    instance.map_err(RenderError::InstanceCreation)
}

fn log_required_extensions(extensions: &[*const c_char]) {
    log::info!("Extensions Required:");
    for (i, &name) in extensions.iter().enumerate() {
        let name = unsafe { CStr::from_ptr(name) };
        log::info!("{}) {}", i + 1, name.to_string_lossy());
    }
}

fn log_available_extensions(entry: &Entry, required: &[*const c_char]) {
    let available = match unsafe { entry.enumerate_instance_extension_properties(None) } {
        Ok(available) => available,
        Err(e) => {
            log::warn!("Could not enumerate instance extensions: {}", e);
            return;
        }
    };

    log::debug!("Available Extensions:");
    for (i, extension) in available.iter().enumerate() {
        let Ok(name) = extension.extension_name_as_c_str() else {
            continue;
        };
        let is_required = required
            .iter()
            .any(|&req| unsafe { CStr::from_ptr(req) } == name);
        log::debug!(
            "{}) {}{}",
            i + 1,
            name.to_string_lossy(),
            if is_required { " <--- Required" } else { "" }
        );
    }
}

impl InstanceApi for AshInstance {
    type Device = AshDevice;

    unsafe fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        self.instance.enumerate_physical_devices()
    }

    unsafe fn get_physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        self.instance.get_physical_device_properties(physical_device)
    }

    unsafe fn get_physical_device_features(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceFeatures {
        self.instance.get_physical_device_features(physical_device)
    }

    unsafe fn get_physical_device_queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        self.instance
            .get_physical_device_queue_family_properties(physical_device)
    }

    unsafe fn enumerate_device_extension_names(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<CString>> {
        let properties = self
            .instance
            .enumerate_device_extension_properties(physical_device)?;
        Ok(properties
            .iter()
            .filter_map(|p| p.extension_name_as_c_str().ok().map(CStr::to_owned))
            .collect())
    }

    unsafe fn get_physical_device_surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        self.surface_loader
            .get_physical_device_surface_support(physical_device, queue_family_index, surface)
    }

    unsafe fn get_physical_device_surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        self.surface_loader
            .get_physical_device_surface_capabilities(physical_device, surface)
    }

    unsafe fn get_physical_device_surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        self.surface_loader
            .get_physical_device_surface_formats(physical_device, surface)
    }

    unsafe fn get_physical_device_surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        self.surface_loader
            .get_physical_device_surface_present_modes(physical_device, surface)
    }

    unsafe fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        create_info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<AshDevice> {
        let device = self
            .instance
            .create_device(physical_device, create_info, None)?;
        Ok(AshDevice::new(&self.instance, device))
    }

    unsafe fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.surface_loader.destroy_surface(surface, None);
    }
}

/// Presentation surface, destroyed through its instance on drop.
pub struct Surface<I: InstanceApi> {
    handle: vk::SurfaceKHR,
    instance: Arc<I>,
}

impl<I: InstanceApi> Surface<I> {
    /// # Safety
    /// `handle` must have been created from `instance` and not be owned
    /// elsewhere.
    pub unsafe fn from_raw(instance: &Arc<I>, handle: vk::SurfaceKHR) -> Self {
        Self {
            handle,
            instance: Arc::clone(instance),
        }
    }

    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    pub fn instance(&self) -> &Arc<I> {
        &self.instance
    }
}

impl<I: InstanceApi> Drop for Surface<I> {
    fn drop(&mut self) {
        unsafe { self.instance.destroy_surface(self.handle) };
    }
}
