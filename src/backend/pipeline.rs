// Graphics pipeline creation and management
//
// The graphics pipeline defines how vertices are processed and rasterized.
// Geometry is generated in the vertex shader, so there is no vertex input;
// viewport and scissor are dynamic and set while recording each frame.

use super::api::DeviceApi;
use super::handle::Owned;
use super::shader::{create_shader_module, ShaderSet};
use super::swapchain::Swapchain;
use crate::error::{RenderError, Result};
use ash::vk;
use std::sync::Arc;

/// Render pass, pipeline and one framebuffer per swapchain image view.
///
/// Framebuffers are index-aligned with the swapchain's image views and go
/// stale with them; all of this is rebuilt together.
pub struct PipelineResources<D: DeviceApi> {
    // Drop order: framebuffers, pipeline, layout, render pass
    framebuffers: Vec<Owned<D, vk::Framebuffer>>,
    pipeline: Owned<D, vk::Pipeline>,
    layout: Owned<D, vk::PipelineLayout>,
    render_pass: Owned<D, vk::RenderPass>,
    pub extent: vk::Extent2D,
}

impl<D: DeviceApi> PipelineResources<D> {
    /// # Safety
    /// `swapchain` must have been created from `device`.
    pub unsafe fn new(device: &Arc<D>, swapchain: &Swapchain<D>, shaders: &ShaderSet) -> Result<Self> {
        let render_pass = create_render_pass(device, swapchain.format)?;
        let layout = create_pipeline_layout(device)?;
        let pipeline = create_graphics_pipeline(
            device,
            layout.raw(),
            render_pass.raw(),
            swapchain.extent,
            shaders,
        )?;
        let framebuffers = create_framebuffers(
            device,
            render_pass.raw(),
            &swapchain.image_views(),
            swapchain.extent,
        )?;

        log::info!("Graphics pipeline ready ({} framebuffers)", framebuffers.len());

        Ok(Self {
            framebuffers,
            pipeline,
            layout,
            render_pass,
            extent: swapchain.extent,
        })
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.raw()
    }

    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline.raw()
    }

    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout.raw()
    }

    /// Framebuffer for swapchain image `image_index`.
    pub fn framebuffer(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).map(Owned::raw)
    }

    pub fn framebuffer_count(&self) -> usize {
        self.framebuffers.len()
    }
}

/// Create a render pass with one color attachment that ends ready to present
///
/// # Safety
/// `device` must be valid.
pub unsafe fn create_render_pass<D: DeviceApi>(
    device: &Arc<D>,
    format: vk::Format,
) -> Result<Owned<D, vk::RenderPass>> {
    // Color attachment (the swapchain image)
    let color_attachment = vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR);

    let color_attachment_ref = vk::AttachmentReference::default()
        .attachment(0)
        .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);

    let color_attachments = [color_attachment_ref];
    let subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_attachments);

    // The layout transition happens at the start of the subpass; hold color
    // writes until the acquired image is actually available.
    let dependency = vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE);

    let attachments = [color_attachment];
    let subpasses = [subpass];
    let dependencies = [dependency];

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(&subpasses)
        .dependencies(&dependencies);

    let render_pass = device
        .create_render_pass(&render_pass_info)
        .map_err(|e| RenderError::vulkan("create render pass", e))?;
    Ok(Owned::new(device, render_pass))
}

/// Empty layout: the triangle pipeline has no descriptors or push constants.
///
/// # Safety
/// `device` must be valid.
pub unsafe fn create_pipeline_layout<D: DeviceApi>(
    device: &Arc<D>,
) -> Result<Owned<D, vk::PipelineLayout>> {
    let layout_info = vk::PipelineLayoutCreateInfo::default();

    let layout = device
        .create_pipeline_layout(&layout_info)
        .map_err(|e| RenderError::vulkan("create pipeline layout", e))?;
    Ok(Owned::new(device, layout))
}

/// Create the fixed triangle pipeline
///
/// # Safety
/// `layout` and `render_pass` must belong to `device`.
pub unsafe fn create_graphics_pipeline<D: DeviceApi>(
    device: &Arc<D>,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
    extent: vk::Extent2D,
    shaders: &ShaderSet,
) -> Result<Owned<D, vk::Pipeline>> {
    // Dropped at the end of this function, after the pipeline exists
    let vert_module = create_shader_module(device, &shaders.vertex)?;
    let frag_module = create_shader_module(device, &shaders.fragment)?;

    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(vert_module.raw())
            .name(c"main"),
        vk::PipelineShaderStageCreateInfo::default()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(frag_module.raw())
            .name(c"main"),
    ];

    // No vertex buffers
    let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::default();

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false);

    // Sized to the swapchain, but dynamic: the values recorded per frame win
    let viewports = [vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }];
    let scissors = [vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }];
    let viewport_state = vk::PipelineViewportStateCreateInfo::default()
        .viewports(&viewports)
        .scissors(&scissors);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&dynamic_states);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::CLOCKWISE)
        .depth_bias_enable(false);

    // Multisampling (disabled)
    let multisampling = vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    // Color blending (no blending, opaque)
    let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)];
    let color_blending = vk::PipelineColorBlendStateCreateInfo::default()
        .logic_op_enable(false)
        .attachments(&color_blend_attachments);

    // No depth/stencil state: the render pass has no depth attachment
    let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input_info)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipeline = device
        .create_graphics_pipeline(&pipeline_info)
        .map_err(RenderError::PipelineCreation)?;
    Ok(Owned::new(device, pipeline))
}

/// Create one framebuffer per swapchain image view
///
/// # Safety
/// `render_pass` and `image_views` must belong to `device`.
pub unsafe fn create_framebuffers<D: DeviceApi>(
    device: &Arc<D>,
    render_pass: vk::RenderPass,
    image_views: &[vk::ImageView],
    extent: vk::Extent2D,
) -> Result<Vec<Owned<D, vk::Framebuffer>>> {
    let mut framebuffers = Vec::with_capacity(image_views.len());
    for &image_view in image_views {
        let attachments = [image_view];
        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = device
            .create_framebuffer(&framebuffer_info)
            .map_err(|e| RenderError::vulkan("create framebuffer", e))?;
        framebuffers.push(Owned::new(device, framebuffer));
    }
    Ok(framebuffers)
}
