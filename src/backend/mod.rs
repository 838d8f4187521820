// Backend module - Vulkan abstraction layer
//
// Design: everything above `api` is written against the InstanceApi /
// DeviceApi traits; `instance` and `native` are the ash-backed
// implementations.

pub mod api;
pub mod capability;
pub mod debug;
pub mod device;
pub mod frame;
pub mod handle;
pub mod instance;
pub mod native;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

#[cfg(test)]
pub(crate) mod mock;

pub use api::{DeviceApi, InstanceApi};
pub use device::DeviceContext;
pub use frame::{FrameExecutor, FrameOutcome, FrameState};
pub use instance::{AshInstance, Surface};
pub use native::AshDevice;
pub use pipeline::PipelineResources;
pub use shader::ShaderSet;
pub use swapchain::Swapchain;
