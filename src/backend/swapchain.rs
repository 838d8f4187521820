// Swapchain - Window presentation
//
// Manages the chain of images we render to and present to the screen.
// Images belong to the presentation engine; the views over them are ours
// and are destroyed before the swapchain itself.

use super::api::DeviceApi;
use super::capability::{QueueFamilies, SurfaceSupport};
use super::handle::Owned;
use crate::error::{RenderError, Result};
use ash::vk;
use std::sync::Arc;

/// How swapchain images are shared between queue families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSharing {
    /// One family owns the images; no family list.
    Exclusive,
    /// Graphics and present families access the images concurrently.
    Concurrent([u32; 2]),
}

impl ImageSharing {
    pub fn for_families(families: QueueFamilies) -> Self {
        if families.is_shared() {
            Self::Exclusive
        } else {
            Self::Concurrent([families.graphics, families.present])
        }
    }

    pub fn mode(&self) -> vk::SharingMode {
        match self {
            Self::Exclusive => vk::SharingMode::EXCLUSIVE,
            Self::Concurrent(_) => vk::SharingMode::CONCURRENT,
        }
    }

    pub fn queue_family_indices(&self) -> &[u32] {
        match self {
            Self::Exclusive => &[],
            Self::Concurrent(indices) => indices,
        }
    }
}

/// Only 8-bit BGRA sRGB with the non-linear sRGB color space is accepted;
/// the render pass is built for exactly that format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Result<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .ok_or(RenderError::NoAcceptableFormat)
}

/// Use `preferred` when offered, otherwise FIFO, which every surface supports.
pub fn choose_present_mode(
    available: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    if available.contains(&preferred) {
        preferred
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// A current extent of `u32::MAX` means the window decides; take the
/// framebuffer size clamped into the supported range.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: framebuffer.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width,
        ),
        height: framebuffer.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height,
        ),
    }
}

/// One more than the minimum so one image can queue for presentation while
/// the next is rendered. A maximum of 0 means unbounded.
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && image_count > capabilities.max_image_count {
        capabilities.max_image_count
    } else {
        image_count
    }
}

pub struct Swapchain<D: DeviceApi> {
    // Field order matters for drop: views go before the swapchain
    image_views: Vec<Owned<D, vk::ImageView>>,
    swapchain: Owned<D, vk::SwapchainKHR>,
    images: Vec<vk::Image>,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
}

impl<D: DeviceApi> Swapchain<D> {
    /// # Safety
    /// `surface` must be the surface `support` was queried for, and
    /// `families` must belong to the device.
    pub unsafe fn new(
        device: &Arc<D>,
        surface: vk::SurfaceKHR,
        support: &SurfaceSupport,
        families: QueueFamilies,
        framebuffer: vk::Extent2D,
        preferred_present_mode: vk::PresentModeKHR,
    ) -> Result<Self> {
        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes, preferred_present_mode);
        let extent = choose_extent(&support.capabilities, framebuffer);
        let image_count = choose_image_count(&support.capabilities);
        let sharing = ImageSharing::for_families(families);

        log::info!(
            "Creating swapchain: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            image_count,
            present_mode,
            sharing.mode()
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing.mode())
            .queue_family_indices(sharing.queue_family_indices())
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let swapchain = device
            .create_swapchain(&create_info)
            .map_err(RenderError::SwapchainCreation)?;
        let swapchain = Owned::new(device, swapchain);

        let images = device
            .get_swapchain_images(swapchain.raw())
            .map_err(|e| RenderError::vulkan("get swapchain images", e))?;

        log::info!("Created swapchain with {} images", images.len());

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            let view = create_image_view(device, image, surface_format.format)?;
            image_views.push(view);
        }

        Ok(Self {
            image_views,
            swapchain,
            images,
            format: surface_format.format,
            color_space: surface_format.color_space,
            extent,
            present_mode,
        })
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain.raw()
    }

    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    pub fn image_views(&self) -> Vec<vk::ImageView> {
        self.image_views.iter().map(Owned::raw).collect()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

unsafe fn create_image_view<D: DeviceApi>(
    device: &Arc<D>,
    image: vk::Image,
    format: vk::Format,
) -> Result<Owned<D, vk::ImageView>> {
    let create_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    let view = device
        .create_image_view(&create_info)
        .map_err(RenderError::ImageViewCreation)?;
    Ok(Owned::new(device, view))
}
