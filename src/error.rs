//! Renderer error types.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// Every way bringing up or driving the renderer can fail.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The Vulkan loader library could not be loaded.
    #[error("Failed to load Vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    /// Validation was requested but the layer is not installed.
    #[error("Validation layer {0} requested, but not available")]
    ValidationLayerUnavailable(String),

    #[error("Failed to create instance: {0}")]
    InstanceCreation(vk::Result),

    #[error("Failed to create window surface: {0}")]
    SurfaceCreation(String),

    /// Enumeration returned zero physical devices.
    #[error("Failed to find GPUs with Vulkan support")]
    NoDevice,

    /// Devices exist, but none passed the suitability predicate.
    #[error("Failed to find suitable GPU")]
    NoSuitableDevice,

    #[error("Failed to create logical device: {0}")]
    DeviceCreation(vk::Result),

    #[error("Surface does not offer B8G8R8A8_SRGB with SRGB_NONLINEAR color space")]
    NoAcceptableFormat,

    #[error("Failed to create swapchain: {0}")]
    SwapchainCreation(vk::Result),

    #[error("Failed to create image view: {0}")]
    ImageViewCreation(vk::Result),

    #[error("Failed to read shader {}: {source}", path.display())]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create shader module: {0}")]
    ShaderModuleCreation(String),

    #[error("Failed to create graphics pipeline: {0}")]
    PipelineCreation(vk::Result),

    #[error("Failed to acquire swapchain image: {0}")]
    Acquire(vk::Result),

    #[error("Failed to submit draw command buffer: {0}")]
    Submit(vk::Result),

    #[error("Failed to present swapchain image: {0}")]
    Present(vk::Result),

    /// The surface changed under the swapchain. Swapchain and pipeline
    /// outputs must be rebuilt; frame state is still consistent.
    #[error("Swapchain is out of date with its surface")]
    SurfaceOutOfDate,

    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// A frame failed between acquiring an image and submitting. The slot's
    /// acquire semaphore still carries that signal and cannot be reused.
    #[error("A previous frame was abandoned after acquiring an image")]
    AbandonedFrame,

    /// Any other native failure, tagged with the call that produced it.
    #[error("{context}: {result}")]
    Vulkan {
        context: &'static str,
        result: vk::Result,
    },
}

impl RenderError {
    pub(crate) fn vulkan(context: &'static str, result: vk::Result) -> Self {
        Self::Vulkan { context, result }
    }

    /// Whether the caller can continue after rebuilding surface-dependent
    /// objects instead of shutting down.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::SurfaceOutOfDate)
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
