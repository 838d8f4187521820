//! Vulkan device, swapchain and frame-loop bring-up for a single window.
//!
//! The [`Renderer`] owns every GPU object it creates and releases them in
//! reverse creation order when dropped. The frame loop keeps one frame in
//! flight by default.

pub mod backend;
pub mod config;
pub mod error;
pub mod renderer;

pub use backend::{AshInstance, FrameOutcome, ShaderSet, Surface};
pub use config::Config;
pub use error::{RenderError, Result};
pub use renderer::{RenderSettings, Renderer};
