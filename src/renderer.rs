// Renderer - owns every GPU object for one window
//
// CREATION ORDER:
//   surface (given) -> physical device -> logical device -> swapchain
//   -> pipeline + framebuffers -> command pool/buffers + sync objects
//
// Teardown is the exact reverse and falls out of the field order below.

use crate::backend::capability::{find_queue_families, query_surface_support, select_physical_device};
use crate::backend::device::REQUIRED_DEVICE_EXTENSIONS;
use crate::backend::{
    DeviceContext, FrameExecutor, FrameOutcome, InstanceApi, PipelineResources, ShaderSet, Surface,
    Swapchain,
};
use crate::error::{RenderError, Result};
use ash::vk;
use std::time::Duration;

/// Knobs for the swapchain and the frame loop.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Used when the surface offers it; FIFO otherwise
    pub preferred_present_mode: vk::PresentModeKHR,
    pub clear_color: [f32; 4],
    pub frames_in_flight: usize,
    pub vertex_count: u32,
    /// Bound on fence waits and image acquisition. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            preferred_present_mode: vk::PresentModeKHR::MAILBOX,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            frames_in_flight: 1,
            vertex_count: 3,
            timeout: None,
        }
    }
}

impl RenderSettings {
    pub fn timeout_ns(&self) -> u64 {
        self.timeout
            .map_or(u64::MAX, |t| u64::try_from(t.as_nanos()).unwrap_or(u64::MAX))
    }
}

/// Everything that depends on the surface's current size and format.
struct Presentation<D: crate::backend::DeviceApi> {
    pipeline: PipelineResources<D>,
    swapchain: Swapchain<D>,
}

pub struct Renderer<I: InstanceApi> {
    // Drop order matters!
    frame: FrameExecutor<I::Device>,
    presentation: Option<Presentation<I::Device>>,
    device: DeviceContext<I::Device>,
    surface: Surface<I>,

    shaders: ShaderSet,
    settings: RenderSettings,
    framebuffer_extent: vk::Extent2D,
    /// Work was submitted since the last idle wait
    needs_idle: bool,
}

impl<I: InstanceApi> Renderer<I> {
    /// Bring up device, swapchain, pipeline and frame resources for `surface`.
    ///
    /// `framebuffer_extent` is the window's size in pixels, used when the
    /// surface leaves the extent to the application.
    pub fn new(
        surface: Surface<I>,
        framebuffer_extent: vk::Extent2D,
        shaders: ShaderSet,
        settings: RenderSettings,
    ) -> Result<Self> {
        let instance = &**surface.instance();

        let physical_device = unsafe {
            let candidates = instance
                .enumerate_physical_devices()
                .map_err(|e| RenderError::vulkan("enumerate physical devices", e))?;
            select_physical_device(instance, &candidates, surface.handle(), REQUIRED_DEVICE_EXTENSIONS)?
        };

        let queue_families = unsafe { find_queue_families(instance, physical_device, surface.handle()) }?
            .resolve()
            .ok_or(RenderError::NoSuitableDevice)?;

        let device = unsafe {
            DeviceContext::new(instance, physical_device, queue_families, REQUIRED_DEVICE_EXTENSIONS)
        }?;

        let presentation = build_presentation(&device, &surface, framebuffer_extent, &shaders, &settings)?;

        let frame =
            unsafe { FrameExecutor::new(&device, presentation.swapchain.image_count(), &settings) }?;

        Ok(Self {
            frame,
            presentation: Some(presentation),
            device,
            surface,
            shaders,
            settings,
            framebuffer_extent,
            needs_idle: false,
        })
    }

    /// Render and present one frame.
    pub fn draw_frame(&mut self) -> Result<FrameOutcome> {
        let Some(presentation) = &self.presentation else {
            return Err(RenderError::SurfaceOutOfDate);
        };
        self.needs_idle = true;
        unsafe { self.frame.draw_frame(&presentation.swapchain, &presentation.pipeline) }
    }

    /// Rebuild swapchain, pipeline and framebuffers for the surface's
    /// current state.
    pub fn recreate_swapchain(&mut self, framebuffer_extent: vk::Extent2D) -> Result<()> {
        self.wait_idle()?;
        self.framebuffer_extent = framebuffer_extent;

        // The old swapchain must be gone before the surface gets a new one
        self.presentation = None;
        let presentation = build_presentation(
            &self.device,
            &self.surface,
            framebuffer_extent,
            &self.shaders,
            &self.settings,
        )?;
        self.frame
            .reset_image_tracking(presentation.swapchain.image_count());
        self.presentation = Some(presentation);
        Ok(())
    }

    /// Block until the device has finished all submitted work.
    pub fn wait_idle(&mut self) -> Result<()> {
        self.device.wait_idle()?;
        self.needs_idle = false;
        Ok(())
    }

    /// Draw frames until `should_close` returns true, then wait for the
    /// device to go idle. Returns the number of frames presented.
    ///
    /// An out-of-date surface rebuilds the presentation objects and keeps
    /// going; every other error ends the loop.
    pub fn run_until<F>(&mut self, mut should_close: F) -> Result<u64>
    where
        F: FnMut() -> bool,
    {
        let mut presented = 0;

        while !should_close() {
            match self.draw_frame() {
                Ok(FrameOutcome::Presented) => presented += 1,
                Ok(FrameOutcome::Suboptimal) => {
                    log::debug!("Swapchain is suboptimal for the surface");
                    presented += 1;
                }
                Err(e) if e.is_recoverable() => {
                    log::warn!("{}; recreating swapchain", e);
                    self.recreate_swapchain(self.framebuffer_extent)?;
                }
                Err(e) => return Err(e),
            }
        }

        self.wait_idle()?;
        Ok(presented)
    }

    pub fn frame_index(&self) -> u64 {
        self.frame.frame_index()
    }

    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.presentation.as_ref().map(|p| p.swapchain.extent)
    }

    pub fn present_mode(&self) -> Option<vk::PresentModeKHR> {
        self.presentation.as_ref().map(|p| p.swapchain.present_mode)
    }
}

impl<I: InstanceApi> Drop for Renderer<I> {
    fn drop(&mut self) {
        // Nothing may be destroyed while the GPU still uses it
        if self.needs_idle {
            if let Err(e) = self.wait_idle() {
                log::error!("Failed to wait for device idle during teardown: {}", e);
            }
        }
        log::info!("Destroying renderer after {} frames", self.frame.frame_index());
    }
}

fn build_presentation<I: InstanceApi>(
    device: &DeviceContext<I::Device>,
    surface: &Surface<I>,
    framebuffer_extent: vk::Extent2D,
    shaders: &ShaderSet,
    settings: &RenderSettings,
) -> Result<Presentation<I::Device>> {
    unsafe {
        let support = query_surface_support(&**surface.instance(), device.physical_device, surface.handle())?;
        let swapchain = Swapchain::new(
            device.device(),
            surface.handle(),
            &support,
            device.queue_families,
            framebuffer_extent,
            settings.preferred_present_mode,
        )?;
        let pipeline = PipelineResources::new(device.device(), &swapchain, shaders)?;
        Ok(Presentation { pipeline, swapchain })
    }
}
