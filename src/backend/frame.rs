// Frame executor - per-frame acquire, record, submit, present
//
// FRAME TIMELINE (one slot):
// ┌──────────────────────────────────────────────────────────────────────┐
// │  wait_fence ─> acquire ─> reset_fence ─> record ─> submit ─> present │
// │                                                                      │
// │  (CPU blocks  (GPU-side   (only once an   (GPU waits on  (waits on   │
// │   here only)   signal)     image is ours)  image_avail)   render_fin)│
// └──────────────────────────────────────────────────────────────────────┘
//
// The fence wait is the only CPU suspension point. Everything after it is
// expressed as semaphore dependencies the driver resolves.

use super::api::DeviceApi;
use super::device::DeviceContext;
use super::handle::Owned;
use super::pipeline::PipelineResources;
use super::swapchain::Swapchain;
use super::sync::FrameSync;
use crate::error::{RenderError, Result};
use crate::renderer::RenderSettings;
use ash::vk;
use std::sync::Arc;

/// Where the executor is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Acquiring,
    Recording,
    Submitted,
    Presenting,
}

/// How a successfully presented frame went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Presented, but the swapchain no longer matches the surface exactly.
    Suboptimal,
}

struct FrameSlot<D: DeviceApi> {
    command_buffer: vk::CommandBuffer,
    sync: FrameSync<D>,
}

pub struct FrameExecutor<D: DeviceApi> {
    // Sync objects are destroyed before the pool that owns the buffers
    slots: Vec<FrameSlot<D>>,
    command_pool: Owned<D, vk::CommandPool>,
    device: Arc<D>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    /// Fence of the slot that last rendered to each swapchain image
    images_in_flight: Vec<vk::Fence>,
    current_slot: usize,
    frame_index: u64,
    state: FrameState,
    /// The current slot's acquire semaphore was signaled but never waited on
    acquire_pending: bool,
    clear_color: [f32; 4],
    vertex_count: u32,
    timeout_ns: u64,
    /// Pre-allocated to avoid per-frame allocations
    wait_stages: [vk::PipelineStageFlags; 1],
}

impl<D: DeviceApi> FrameExecutor<D> {
    /// # Safety
    /// `image_count` must be the image count of the swapchain that will be
    /// passed to [`draw_frame`](Self::draw_frame).
    pub unsafe fn new(
        context: &DeviceContext<D>,
        image_count: usize,
        settings: &RenderSettings,
    ) -> Result<Self> {
        let device = context.device();
        let frames_in_flight = settings.frames_in_flight.max(1);
        let buffer_count = u32::try_from(frames_in_flight).map_err(|_| {
            RenderError::vulkan("allocate command buffers", vk::Result::ERROR_OUT_OF_HOST_MEMORY)
        })?;

        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(context.queue_families.graphics)
            // RESET: the buffer is re-recorded every frame
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let command_pool = device
            .create_command_pool(&pool_info)
            .map_err(|e| RenderError::vulkan("create command pool", e))?;
        let command_pool = Owned::new(device, command_pool);

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool.raw())
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(buffer_count);
        let command_buffers = device
            .allocate_command_buffers(&alloc_info)
            .map_err(|e| RenderError::vulkan("allocate command buffers", e))?;

        let mut slots = Vec::with_capacity(frames_in_flight);
        for command_buffer in command_buffers {
            slots.push(FrameSlot {
                command_buffer,
                sync: FrameSync::new(device)?,
            });
        }

        log::info!("Frame executor ready ({} frame(s) in flight)", frames_in_flight);

        Ok(Self {
            slots,
            command_pool,
            device: Arc::clone(device),
            graphics_queue: context.graphics_queue,
            present_queue: context.present_queue,
            images_in_flight: vec![vk::Fence::null(); image_count],
            current_slot: 0,
            frame_index: 0,
            state: FrameState::Idle,
            acquire_pending: false,
            clear_color: settings.clear_color,
            vertex_count: settings.vertex_count,
            timeout_ns: settings.timeout_ns(),
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
        })
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Frames presented so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Forget which slot used which image. Call after the swapchain was
    /// rebuilt, with the device idle.
    pub fn reset_image_tracking(&mut self, image_count: usize) {
        self.images_in_flight.clear();
        self.images_in_flight.resize(image_count, vk::Fence::null());
    }

    /// Render and present one frame. The executor is back in
    /// [`FrameState::Idle`] when this returns, whatever the outcome.
    ///
    /// Only `SurfaceOutOfDate` and `Timeout` from the fence wait or the
    /// acquire leave the slot reusable, so the executor can be driven again
    /// once the caller has rebuilt whatever depended on the surface. A
    /// failure after the image was acquired and before submission leaves the
    /// acquire semaphore signaled; every later call then fails with
    /// `AbandonedFrame`.
    ///
    /// # Safety
    /// `swapchain` and `resources` must be built from this executor's device
    /// and belong together.
    pub unsafe fn draw_frame(
        &mut self,
        swapchain: &Swapchain<D>,
        resources: &PipelineResources<D>,
    ) -> Result<FrameOutcome> {
        let outcome = self.run_frame(swapchain, resources);
        self.state = FrameState::Idle;
        outcome
    }

    unsafe fn run_frame(
        &mut self,
        swapchain: &Swapchain<D>,
        resources: &PipelineResources<D>,
    ) -> Result<FrameOutcome> {
        let slot = &self.slots[self.current_slot];
        let device = &*self.device;

        // ─────────────────────────────────────────────────────────────────
        // STEP 1: Wait until the GPU is done with this slot
        // ─────────────────────────────────────────────────────────────────
        slot.sync.wait(device, self.timeout_ns)?;
        if self.acquire_pending {
            return Err(RenderError::AbandonedFrame);
        }

        // ─────────────────────────────────────────────────────────────────
        // STEP 2: Acquire next swapchain image (GPU-side signal)
        // ─────────────────────────────────────────────────────────────────
        self.state = FrameState::Acquiring;
        let acquired = device.acquire_next_image(
            swapchain.handle(),
            self.timeout_ns,
            slot.sync.image_available.raw(),
        );
        let (image_index, acquire_suboptimal) = acquired.map_err(|error| match error {
            vk::Result::ERROR_OUT_OF_DATE_KHR => RenderError::SurfaceOutOfDate,
            vk::Result::TIMEOUT | vk::Result::NOT_READY => RenderError::Timeout("swapchain image"),
            other => RenderError::Acquire(other),
        })?;
        self.acquire_pending = true;

        let framebuffer = resources
            .framebuffer(image_index)
            .ok_or(RenderError::Acquire(vk::Result::ERROR_UNKNOWN))?;

        // Another slot may still be rendering into this image
        let slot_fence = slot.sync.in_flight.raw();
        let image_fence = self.images_in_flight[image_index as usize];
        if image_fence != vk::Fence::null() && image_fence != slot_fence {
            match device.wait_for_fence(image_fence, self.timeout_ns) {
                Ok(()) => {}
                Err(vk::Result::TIMEOUT) => return Err(RenderError::Timeout("image fence")),
                Err(e) => return Err(RenderError::vulkan("wait for image fence", e)),
            }
        }
        self.images_in_flight[image_index as usize] = slot_fence;

        // Only reset once we are certain to submit work that signals it
        slot.sync.reset(device)?;

        // ─────────────────────────────────────────────────────────────────
        // STEP 3: Record
        // ─────────────────────────────────────────────────────────────────
        self.state = FrameState::Recording;
        record_commands(
            device,
            slot.command_buffer,
            resources,
            framebuffer,
            self.clear_color,
            self.vertex_count,
        )
        .map_err(|e| RenderError::vulkan("record command buffer", e))?;

        // ─────────────────────────────────────────────────────────────────
        // STEP 4: Submit
        // ─────────────────────────────────────────────────────────────────
        let wait_semaphores = [slot.sync.image_available.raw()];
        let signal_semaphores = [slot.sync.render_finished.raw()];
        let command_buffers = [slot.command_buffer];

        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores) // Wait for image to be available
            .wait_dst_stage_mask(&self.wait_stages) // ...only at color output
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores); // Signal when done

        device
            .queue_submit(self.graphics_queue, &submit_info, slot_fence)
            .map_err(RenderError::Submit)?;
        self.acquire_pending = false;
        self.state = FrameState::Submitted;

        // ─────────────────────────────────────────────────────────────────
        // STEP 5: Present once rendering finished
        // ─────────────────────────────────────────────────────────────────
        self.state = FrameState::Presenting;
        let swapchains = [swapchain.handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let presented = device.queue_present(self.present_queue, &present_info);

        // The submission happened either way; move to the next slot
        self.current_slot = (self.current_slot + 1) % self.slots.len();
        self.frame_index += 1;

        match presented {
            Ok(present_suboptimal) if present_suboptimal || acquire_suboptimal => {
                Ok(FrameOutcome::Suboptimal)
            }
            Ok(_) => Ok(FrameOutcome::Presented),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Err(RenderError::SurfaceOutOfDate),
            Err(e) => Err(RenderError::Present(e)),
        }
    }
}

unsafe fn record_commands<D: DeviceApi>(
    device: &D,
    cmd: vk::CommandBuffer,
    resources: &PipelineResources<D>,
    framebuffer: vk::Framebuffer,
    clear_color: [f32; 4],
    vertex_count: u32,
) -> ash::prelude::VkResult<()> {
    let extent = resources.extent;

    device.reset_command_buffer(cmd)?;
    device.begin_command_buffer(cmd)?;

    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue { float32: clear_color },
    }];
    let render_pass_info = vk::RenderPassBeginInfo::default()
        .render_pass(resources.render_pass())
        .framebuffer(framebuffer)
        .render_area(vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        })
        .clear_values(&clear_values);

    device.cmd_begin_render_pass(cmd, &render_pass_info);
    device.cmd_bind_pipeline(cmd, resources.pipeline());
    device.cmd_set_viewport(
        cmd,
        vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        },
    );
    device.cmd_set_scissor(
        cmd,
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        },
    );
    device.cmd_draw(cmd, vertex_count, 1, 0, 0);
    device.cmd_end_render_pass(cmd);

    device.end_command_buffer(cmd)
}
