// Validation diagnostics
//
// Driver and layer messages are routed into `log` under one target. Two
// channels exist: one for messages emitted while the instance itself is
// being created (chained into the instance create info), and one for the
// long-lived messenger.

use crate::error::{RenderError, Result};
use ash::vk;
use std::borrow::Cow;
use std::ffi::{c_void, CStr};

pub const LOG_TARGET: &str = "vulkan::validation";
pub const INSTANCE_CHANNEL: &str = "Instance Validation Log";
pub const MESSENGER_CHANNEL: &str = "Validation Log";

pub fn marker(edge: &str, channel: &str) -> String {
    format!("****** {edge} {channel} ******")
}

pub fn begin(channel: &str) {
    log::info!(target: LOG_TARGET, "{}", marker("BEGIN", channel));
}

pub fn end(channel: &str) {
    log::info!(target: LOG_TARGET, "{}", marker("END", channel));
}

/// Map a message severity to a log level. The most severe bit wins.
pub fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

    if severity.contains(Severity::ERROR) {
        log::Level::Error
    } else if severity.contains(Severity::WARNING) {
        log::Level::Warn
    } else if severity.contains(Severity::INFO) {
        log::Level::Debug
    } else {
        log::Level::Trace
    }
}

unsafe fn forward(
    channel: &str,
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
) -> vk::Bool32 {
    let message = if callback_data.is_null() || (*callback_data).p_message.is_null() {
        Cow::Borrowed("<no message>")
    } else {
        CStr::from_ptr((*callback_data).p_message).to_string_lossy()
    };

    log::log!(
        target: LOG_TARGET,
        severity_level(severity),
        "[{}] {:?}: {}",
        channel,
        message_type,
        message
    );

    // Never abort the call that triggered the message
    vk::FALSE
}

unsafe extern "system" fn instance_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    forward(INSTANCE_CHANNEL, severity, message_type, callback_data)
}

unsafe extern "system" fn messenger_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut c_void,
) -> vk::Bool32 {
    forward(MESSENGER_CHANNEL, severity, message_type, callback_data)
}

/// Messenger settings. `for_instance` selects the instance-creation channel.
pub fn messenger_create_info(for_instance: bool) -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    let callback: vk::PFN_vkDebugUtilsMessengerCallbackEXT = if for_instance {
        Some(instance_callback)
    } else {
        Some(messenger_callback)
    };

    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(callback)
}

/// Long-lived debug messenger. Destroyed explicitly by the owning instance,
/// before the instance itself.
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// Create the messenger if the loader exposes the debug-utils entry
    /// points. `Ok(None)` means the capability is not available.
    ///
    /// # Safety
    /// `instance` must have been created from `entry` with the debug-utils
    /// extension requested.
    pub unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Option<Self>> {
        let create_fn =
            entry.get_instance_proc_addr(instance.handle(), c"vkCreateDebugUtilsMessengerEXT".as_ptr());
        if create_fn.is_none() {
            log::warn!("Debug messenger extension not available");
            return Ok(None);
        }

        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = messenger_create_info(false);
        let messenger = loader
            .create_debug_utils_messenger(&create_info, None)
            .map_err(|e| RenderError::vulkan("create debug messenger", e))?;

        begin(MESSENGER_CHANNEL);
        Ok(Some(Self { loader, messenger }))
    }

    /// # Safety
    /// Must be called once, before the instance is destroyed.
    pub unsafe fn destroy(&self) {
        self.loader.destroy_debug_utils_messenger(self.messenger, None);
        end(MESSENGER_CHANNEL);
    }
}
