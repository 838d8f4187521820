// Recording backend for tests
//
// Implements both API traits without a GPU. Every call that matters to the
// renderer's ordering guarantees is appended to a shared log; fences carry a
// signaled flag so a wait that would hang on real hardware reports TIMEOUT.
// Semaphores carry a pending-signal flag; misuse that the validation layer
// would reject panics the test.

use super::api::{DeviceApi, InstanceApi};
use super::capability::SurfaceSupport;
use ash::prelude::VkResult;
use ash::vk::{self, Handle};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const SURFACE: u64 = 0x5000;
const QUEUE_BASE: u64 = 0x1000;

/// One observable API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateDevice { queue_families: Vec<u32>, extensions: Vec<String> },
    CreateSwapchain {
        min_image_count: u32,
        extent: vk::Extent2D,
        sharing_mode: vk::SharingMode,
        queue_families: Vec<u32>,
        present_mode: vk::PresentModeKHR,
    },
    CreateImageView,
    CreateRenderPass,
    CreatePipelineLayout,
    CreateShaderModule,
    CreateGraphicsPipeline,
    CreateFramebuffer { extent: vk::Extent2D },
    CreateCommandPool,
    AllocateCommandBuffers { count: u32 },
    CreateSemaphore,
    CreateFence { signaled: bool },

    WaitForFence,
    ResetFence,
    AcquireNextImage { image_index: u32, signal: vk::Semaphore },
    ResetCommandBuffer,
    BeginCommandBuffer,
    BeginRenderPass { framebuffer: vk::Framebuffer },
    BindPipeline,
    SetViewport { extent: vk::Extent2D },
    SetScissor { extent: vk::Extent2D },
    Draw { vertex_count: u32 },
    EndRenderPass,
    EndCommandBuffer,
    QueueSubmit {
        wait_semaphores: Vec<vk::Semaphore>,
        wait_stage: vk::PipelineStageFlags,
        signal_semaphores: Vec<vk::Semaphore>,
        signals_fence: bool,
    },
    QueuePresent { image_index: u32, wait_semaphores: Vec<vk::Semaphore> },
    WaitIdle,

    DestroySemaphore,
    DestroyFence,
    DestroyCommandPool,
    DestroyFramebuffer,
    DestroyPipeline,
    DestroyPipelineLayout,
    DestroyRenderPass,
    DestroyShaderModule,
    DestroyImageView,
    DestroySwapchain,
    DestroyDevice,
    DestroySurface,
    DestroyInstance,
}

impl Call {
    pub fn is_destroy(&self) -> bool {
        matches!(
            self,
            Call::DestroySemaphore
                | Call::DestroyFence
                | Call::DestroyCommandPool
                | Call::DestroyFramebuffer
                | Call::DestroyPipeline
                | Call::DestroyPipelineLayout
                | Call::DestroyRenderPass
                | Call::DestroyShaderModule
                | Call::DestroyImageView
                | Call::DestroySwapchain
                | Call::DestroyDevice
                | Call::DestroySurface
                | Call::DestroyInstance
        )
    }
}

/// Description of one fake physical device.
#[derive(Debug, Clone)]
pub struct MockPhysicalDevice {
    pub device_type: vk::PhysicalDeviceType,
    pub geometry_shader: bool,
    pub extensions: Vec<CString>,
    /// Flags and surface-present support per family
    pub queue_families: Vec<(vk::QueueFlags, bool)>,
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl MockPhysicalDevice {
    /// A discrete GPU that passes every suitability check.
    pub fn suitable() -> Self {
        Self {
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            geometry_shader: true,
            extensions: vec![ash::khr::swapchain::NAME.to_owned()],
            queue_families: vec![(
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
                true,
            )],
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: vk::Extent2D { width: 800, height: 600 },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
                max_image_array_layers: 1,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                ..Default::default()
            },
            formats: vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    /// Expected outcome of the renderer's suitability check.
    pub fn is_suitable(&self) -> bool {
        self.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
            && self.geometry_shader
            && self.extensions.iter().any(|e| e.as_c_str() == ash::khr::swapchain::NAME)
            && self.queue_families.iter().any(|(flags, _)| flags.contains(vk::QueueFlags::GRAPHICS))
            && self.queue_families.iter().any(|(_, present)| *present)
            && !self.formats.is_empty()
            && !self.present_modes.is_empty()
    }

    pub fn surface_support(&self) -> SurfaceSupport {
        SurfaceSupport {
            capabilities: self.capabilities,
            formats: self.formats.clone(),
            present_modes: self.present_modes.clone(),
        }
    }
}

#[derive(Default)]
struct Failures {
    device_creation: Option<vk::Result>,
    image_views_before_failure: Option<usize>,
    pipeline: Option<vk::Result>,
    acquire: Option<vk::Result>,
    submit: Option<vk::Result>,
    present: Option<vk::Result>,
    fence_reset: Option<vk::Result>,
}

#[derive(Default)]
struct Inner {
    calls: Vec<Call>,
    fences: HashMap<u64, bool>,
    /// Semaphores with a signal operation nobody has waited on yet
    pending_semaphores: HashSet<u64>,
    /// Swapchain handle -> (image count, next image to hand out)
    swapchains: HashMap<u64, (u32, u32)>,
    failures: Failures,
}

impl Inner {
    fn consume(&mut self, waits: &[vk::Semaphore]) {
        for semaphore in waits {
            assert!(
                self.pending_semaphores.remove(&semaphore.as_raw()),
                "wait on a semaphore with no pending signal"
            );
        }
    }
}

struct MockState {
    devices: Vec<MockPhysicalDevice>,
    next_handle: AtomicU64,
    inner: Mutex<Inner>,
}

impl MockState {
    fn record(&self, call: Call) {
        self.inner.lock().calls.push(call);
    }

    fn handle<H: Handle>(&self) -> H {
        H::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed))
    }

    fn physical(&self, physical_device: vk::PhysicalDevice) -> &MockPhysicalDevice {
        &self.devices[physical_device.as_raw() as usize - 1]
    }
}

/// Shared handle to a fake GPU and its call log.
#[derive(Clone)]
pub struct MockGpu {
    state: Arc<MockState>,
    device: Arc<MockDevice>,
}

impl MockGpu {
    pub fn new(devices: Vec<MockPhysicalDevice>) -> Self {
        let state = Arc::new(MockState {
            devices,
            next_handle: AtomicU64::new(0x10000),
            inner: Mutex::new(Inner::default()),
        });
        // Standalone device for component tests; never counted as destroyed
        let device = Arc::new(MockDevice {
            state: Arc::clone(&state),
            logical: false,
        });
        Self { state, device }
    }

    pub fn instance(&self) -> MockInstance {
        MockInstance {
            state: Arc::clone(&self.state),
        }
    }

    pub fn device(&self) -> Arc<MockDevice> {
        Arc::clone(&self.device)
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(SURFACE)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.inner.lock().calls.clear();
    }

    pub fn fail_device_creation(&self, result: vk::Result) {
        self.state.inner.lock().failures.device_creation = Some(result);
    }

    /// Let `successes` image views be created, then fail the next one.
    pub fn fail_image_view_after(&self, successes: usize) {
        self.state.inner.lock().failures.image_views_before_failure = Some(successes);
    }

    pub fn fail_pipeline_creation(&self, result: vk::Result) {
        self.state.inner.lock().failures.pipeline = Some(result);
    }

    pub fn fail_next_acquire(&self, result: vk::Result) {
        self.state.inner.lock().failures.acquire = Some(result);
    }

    pub fn fail_next_submit(&self, result: vk::Result) {
        self.state.inner.lock().failures.submit = Some(result);
    }

    pub fn fail_next_fence_reset(&self, result: vk::Result) {
        self.state.inner.lock().failures.fence_reset = Some(result);
    }

    /// `SUBOPTIMAL_KHR` is reported as a successful but suboptimal present.
    pub fn fail_next_present(&self, result: vk::Result) {
        self.state.inner.lock().failures.present = Some(result);
    }
}

unsafe fn slice<'a, T>(ptr: *const T, len: u32) -> &'a [T] {
    if len == 0 || ptr.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(ptr, len as usize)
    }
}

pub struct MockInstance {
    state: Arc<MockState>,
}

impl Drop for MockInstance {
    fn drop(&mut self) {
        self.state.record(Call::DestroyInstance);
    }
}

impl InstanceApi for MockInstance {
    type Device = MockDevice;

    unsafe fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok((1..=self.state.devices.len() as u64)
            .map(vk::PhysicalDevice::from_raw)
            .collect())
    }

    unsafe fn get_physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        let mut properties = vk::PhysicalDeviceProperties {
            device_type: self.state.physical(physical_device).device_type,
            api_version: vk::make_api_version(0, 1, 3, 0),
            ..Default::default()
        };
        for (dst, src) in properties.device_name.iter_mut().zip(b"Mock GPU") {
            *dst = *src as std::ffi::c_char;
        }
        properties
    }

    unsafe fn get_physical_device_features(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceFeatures {
        let geometry_shader = if self.state.physical(physical_device).geometry_shader {
            vk::TRUE
        } else {
            vk::FALSE
        };
        vk::PhysicalDeviceFeatures {
            geometry_shader,
            ..Default::default()
        }
    }

    unsafe fn get_physical_device_queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Vec<vk::QueueFamilyProperties> {
        self.state
            .physical(physical_device)
            .queue_families
            .iter()
            .map(|(flags, _)| vk::QueueFamilyProperties {
                queue_flags: *flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect()
    }

    unsafe fn enumerate_device_extension_names(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<CString>> {
        Ok(self.state.physical(physical_device).extensions.clone())
    }

    unsafe fn get_physical_device_surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        Ok(self
            .state
            .physical(physical_device)
            .queue_families
            .get(queue_family_index as usize)
            .is_some_and(|(_, present)| *present))
    }

    unsafe fn get_physical_device_surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.state.physical(physical_device).capabilities)
    }

    unsafe fn get_physical_device_surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.state.physical(physical_device).formats.clone())
    }

    unsafe fn get_physical_device_surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.state.physical(physical_device).present_modes.clone())
    }

    unsafe fn create_device(
        &self,
        _physical_device: vk::PhysicalDevice,
        create_info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<MockDevice> {
        if let Some(result) = self.state.inner.lock().failures.device_creation.take() {
            return Err(result);
        }

        let queue_families = slice(create_info.p_queue_create_infos, create_info.queue_create_info_count)
            .iter()
            .map(|info| info.queue_family_index)
            .collect();
        let extensions = slice(
            create_info.pp_enabled_extension_names,
            create_info.enabled_extension_count,
        )
        .iter()
        .map(|&name| CStr::from_ptr(name).to_string_lossy().into_owned())
        .collect();
        self.state.record(Call::CreateDevice {
            queue_families,
            extensions,
        });

        Ok(MockDevice {
            state: Arc::clone(&self.state),
            logical: true,
        })
    }

    unsafe fn destroy_surface(&self, _surface: vk::SurfaceKHR) {
        self.state.record(Call::DestroySurface);
    }
}

pub struct MockDevice {
    state: Arc<MockState>,
    /// Created through `create_device`, so dropping it destroys a device
    logical: bool,
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        if self.logical {
            self.state.record(Call::DestroyDevice);
        }
    }
}

impl DeviceApi for MockDevice {
    unsafe fn get_device_queue(&self, queue_family_index: u32, _queue_index: u32) -> vk::Queue {
        vk::Queue::from_raw(QUEUE_BASE + queue_family_index as u64)
    }

    unsafe fn create_swapchain(
        &self,
        create_info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        let swapchain: vk::SwapchainKHR = self.state.handle();
        let queue_families = slice(
            create_info.p_queue_family_indices,
            create_info.queue_family_index_count,
        )
        .to_vec();

        let mut inner = self.state.inner.lock();
        inner
            .swapchains
            .insert(swapchain.as_raw(), (create_info.min_image_count, 0));
        inner.calls.push(Call::CreateSwapchain {
            min_image_count: create_info.min_image_count,
            extent: create_info.image_extent,
            sharing_mode: create_info.image_sharing_mode,
            queue_families,
            present_mode: create_info.present_mode,
        });
        Ok(swapchain)
    }

    unsafe fn get_swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let count = self
            .state
            .inner
            .lock()
            .swapchains
            .get(&swapchain.as_raw())
            .map_or(0, |(count, _)| *count);
        Ok((0..count).map(|_| self.state.handle()).collect())
    }

    unsafe fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut inner = self.state.inner.lock();
        inner.swapchains.remove(&swapchain.as_raw());
        inner.calls.push(Call::DestroySwapchain);
    }

    unsafe fn create_image_view(
        &self,
        _create_info: &vk::ImageViewCreateInfo<'_>,
    ) -> VkResult<vk::ImageView> {
        {
            let mut inner = self.state.inner.lock();
            match inner.failures.image_views_before_failure {
                Some(0) => {
                    inner.failures.image_views_before_failure = None;
                    return Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
                }
                Some(remaining) => inner.failures.image_views_before_failure = Some(remaining - 1),
                None => {}
            }
        }
        self.state.record(Call::CreateImageView);
        Ok(self.state.handle())
    }

    unsafe fn destroy_image_view(&self, _image_view: vk::ImageView) {
        self.state.record(Call::DestroyImageView);
    }

    unsafe fn create_render_pass(
        &self,
        _create_info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        self.state.record(Call::CreateRenderPass);
        Ok(self.state.handle())
    }

    unsafe fn destroy_render_pass(&self, _render_pass: vk::RenderPass) {
        self.state.record(Call::DestroyRenderPass);
    }

    unsafe fn create_pipeline_layout(
        &self,
        _create_info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        self.state.record(Call::CreatePipelineLayout);
        Ok(self.state.handle())
    }

    unsafe fn destroy_pipeline_layout(&self, _layout: vk::PipelineLayout) {
        self.state.record(Call::DestroyPipelineLayout);
    }

    unsafe fn create_shader_module(
        &self,
        _create_info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        self.state.record(Call::CreateShaderModule);
        Ok(self.state.handle())
    }

    unsafe fn destroy_shader_module(&self, _module: vk::ShaderModule) {
        self.state.record(Call::DestroyShaderModule);
    }

    unsafe fn create_graphics_pipeline(
        &self,
        _create_info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        if let Some(result) = self.state.inner.lock().failures.pipeline.take() {
            return Err(result);
        }
        self.state.record(Call::CreateGraphicsPipeline);
        Ok(self.state.handle())
    }

    unsafe fn destroy_pipeline(&self, _pipeline: vk::Pipeline) {
        self.state.record(Call::DestroyPipeline);
    }

    unsafe fn create_framebuffer(
        &self,
        create_info: &vk::FramebufferCreateInfo<'_>,
    ) -> VkResult<vk::Framebuffer> {
        self.state.record(Call::CreateFramebuffer {
            extent: vk::Extent2D {
                width: create_info.width,
                height: create_info.height,
            },
        });
        Ok(self.state.handle())
    }

    unsafe fn destroy_framebuffer(&self, _framebuffer: vk::Framebuffer) {
        self.state.record(Call::DestroyFramebuffer);
    }

    unsafe fn create_command_pool(
        &self,
        _create_info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        self.state.record(Call::CreateCommandPool);
        Ok(self.state.handle())
    }

    unsafe fn destroy_command_pool(&self, _pool: vk::CommandPool) {
        self.state.record(Call::DestroyCommandPool);
    }

    unsafe fn allocate_command_buffers(
        &self,
        allocate_info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        let count = allocate_info.command_buffer_count;
        self.state.record(Call::AllocateCommandBuffers { count });
        Ok((0..count).map(|_| self.state.handle()).collect())
    }

    unsafe fn reset_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.state.record(Call::ResetCommandBuffer);
        Ok(())
    }

    unsafe fn begin_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.state.record(Call::BeginCommandBuffer);
        Ok(())
    }

    unsafe fn end_command_buffer(&self, _command_buffer: vk::CommandBuffer) -> VkResult<()> {
        self.state.record(Call::EndCommandBuffer);
        Ok(())
    }

    unsafe fn cmd_begin_render_pass(
        &self,
        _command_buffer: vk::CommandBuffer,
        begin_info: &vk::RenderPassBeginInfo<'_>,
    ) {
        self.state.record(Call::BeginRenderPass {
            framebuffer: begin_info.framebuffer,
        });
    }

    unsafe fn cmd_bind_pipeline(&self, _command_buffer: vk::CommandBuffer, _pipeline: vk::Pipeline) {
        self.state.record(Call::BindPipeline);
    }

    unsafe fn cmd_set_viewport(&self, _command_buffer: vk::CommandBuffer, viewport: vk::Viewport) {
        self.state.record(Call::SetViewport {
            extent: vk::Extent2D {
                width: viewport.width as u32,
                height: viewport.height as u32,
            },
        });
    }

    unsafe fn cmd_set_scissor(&self, _command_buffer: vk::CommandBuffer, scissor: vk::Rect2D) {
        self.state.record(Call::SetScissor {
            extent: scissor.extent,
        });
    }

    unsafe fn cmd_draw(
        &self,
        _command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        _instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.state.record(Call::Draw { vertex_count });
    }

    unsafe fn cmd_end_render_pass(&self, _command_buffer: vk::CommandBuffer) {
        self.state.record(Call::EndRenderPass);
    }

    unsafe fn create_semaphore(&self) -> VkResult<vk::Semaphore> {
        self.state.record(Call::CreateSemaphore);
        Ok(self.state.handle())
    }

    unsafe fn destroy_semaphore(&self, _semaphore: vk::Semaphore) {
        self.state.record(Call::DestroySemaphore);
    }

    unsafe fn create_fence(&self, signaled: bool) -> VkResult<vk::Fence> {
        let fence: vk::Fence = self.state.handle();
        let mut inner = self.state.inner.lock();
        inner.fences.insert(fence.as_raw(), signaled);
        inner.calls.push(Call::CreateFence { signaled });
        Ok(fence)
    }

    unsafe fn destroy_fence(&self, fence: vk::Fence) {
        let mut inner = self.state.inner.lock();
        inner.fences.remove(&fence.as_raw());
        inner.calls.push(Call::DestroyFence);
    }

    unsafe fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> VkResult<()> {
        let mut inner = self.state.inner.lock();
        inner.calls.push(Call::WaitForFence);
        match inner.fences.get(&fence.as_raw()) {
            Some(true) => Ok(()),
            Some(false) => Err(vk::Result::TIMEOUT),
            None => Err(vk::Result::ERROR_UNKNOWN),
        }
    }

    unsafe fn reset_fence(&self, fence: vk::Fence) -> VkResult<()> {
        let mut inner = self.state.inner.lock();
        if let Some(result) = inner.failures.fence_reset.take() {
            return Err(result);
        }
        inner.fences.insert(fence.as_raw(), false);
        inner.calls.push(Call::ResetFence);
        Ok(())
    }

    unsafe fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> VkResult<(u32, bool)> {
        let mut inner = self.state.inner.lock();
        if let Some(result) = inner.failures.acquire.take() {
            return Err(result);
        }
        let Some((count, next)) = inner.swapchains.get_mut(&swapchain.as_raw()) else {
            return Err(vk::Result::ERROR_SURFACE_LOST_KHR);
        };
        let image_index = *next;
        *next = (*next + 1) % *count;
        assert!(
            inner.pending_semaphores.insert(semaphore.as_raw()),
            "acquire signals a semaphore that already has a pending signal"
        );
        inner.calls.push(Call::AcquireNextImage {
            image_index,
            signal: semaphore,
        });
        Ok((image_index, false))
    }

    unsafe fn queue_submit(
        &self,
        _queue: vk::Queue,
        submit_info: &vk::SubmitInfo<'_>,
        fence: vk::Fence,
    ) -> VkResult<()> {
        let mut inner = self.state.inner.lock();
        if let Some(result) = inner.failures.submit.take() {
            return Err(result);
        }
        let wait_semaphores =
            slice(submit_info.p_wait_semaphores, submit_info.wait_semaphore_count).to_vec();
        let wait_stage = slice(submit_info.p_wait_dst_stage_mask, submit_info.wait_semaphore_count)
            .first()
            .copied()
            .unwrap_or_default();
        let signal_semaphores =
            slice(submit_info.p_signal_semaphores, submit_info.signal_semaphore_count).to_vec();

        inner.consume(&wait_semaphores);
        for semaphore in &signal_semaphores {
            assert!(
                inner.pending_semaphores.insert(semaphore.as_raw()),
                "submit signals a semaphore that already has a pending signal"
            );
        }
        // Work completes instantly
        if fence != vk::Fence::null() {
            inner.fences.insert(fence.as_raw(), true);
        }
        inner.calls.push(Call::QueueSubmit {
            wait_semaphores,
            wait_stage,
            signal_semaphores,
            signals_fence: fence != vk::Fence::null(),
        });
        Ok(())
    }

    unsafe fn queue_present(
        &self,
        _queue: vk::Queue,
        present_info: &vk::PresentInfoKHR<'_>,
    ) -> VkResult<bool> {
        let image_index = slice(present_info.p_image_indices, present_info.swapchain_count)
            .first()
            .copied()
            .unwrap_or_default();
        let wait_semaphores =
            slice(present_info.p_wait_semaphores, present_info.wait_semaphore_count).to_vec();
        let mut inner = self.state.inner.lock();
        inner.consume(&wait_semaphores);
        inner.calls.push(Call::QueuePresent {
            image_index,
            wait_semaphores,
        });
        match inner.failures.present.take() {
            None => Ok(false),
            Some(vk::Result::SUBOPTIMAL_KHR) => Ok(true),
            Some(result) => Err(result),
        }
    }

    unsafe fn device_wait_idle(&self) -> VkResult<()> {
        self.state.record(Call::WaitIdle);
        Ok(())
    }
}
