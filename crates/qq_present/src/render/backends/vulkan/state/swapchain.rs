//! Swapchain and the color attachment views over its images

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device};

use crate::config::PresentModePreference;
use crate::render::frame::selection::{
    choose_image_count, choose_present_mode, choose_surface_format, choose_swap_extent,
};
use crate::render::frame::{PresentError, PresentResult, SurfaceExtent};
use crate::render::backends::vulkan::initialization::QueueFamilyIndices;

/// Everything the builder needs to know about the surface and device
pub struct SwapchainRequest<'a> {
    /// Physical device the surface is queried on
    pub physical_device: vk::PhysicalDevice,
    /// The surface
    pub surface: vk::SurfaceKHR,
    /// Surface extension functions
    pub surface_loader: &'a Surface,
    /// Graphics and present families, for the sharing mode
    pub queue_families: QueueFamilyIndices,
    /// Current window framebuffer size
    pub window_extent: SurfaceExtent,
    /// Present mode preference
    pub present_mode: PresentModePreference,
}

/// Swapchain and the images it owns
///
/// The images go with the swapchain; views over them are an
/// [`ImageViews`] owned separately so they can be released first.
pub struct Swapchain {
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Query the surface, pick a configuration and create the swapchain
    ///
    /// No old swapchain is passed: the previous resource set is destroyed
    /// before a new one is built.
    pub fn new(
        swapchain_loader: SwapchainLoader,
        request: &SwapchainRequest<'_>,
    ) -> PresentResult<Self> {
        let loader = request.surface_loader;
        let (caps, formats, modes) = unsafe {
            (
                loader
                    .get_physical_device_surface_capabilities(
                        request.physical_device,
                        request.surface,
                    )
                    .map_err(PresentError::api("vkGetPhysicalDeviceSurfaceCapabilitiesKHR"))?,
                loader
                    .get_physical_device_surface_formats(request.physical_device, request.surface)
                    .map_err(PresentError::api("vkGetPhysicalDeviceSurfaceFormatsKHR"))?,
                loader
                    .get_physical_device_surface_present_modes(
                        request.physical_device,
                        request.surface,
                    )
                    .map_err(PresentError::api("vkGetPhysicalDeviceSurfacePresentModesKHR"))?,
            )
        };

        let format = choose_surface_format(&formats)?;
        let present_mode = choose_present_mode(&modes, request.present_mode)?;
        let extent = choose_swap_extent(&caps, request.window_extent)?;
        let image_count = choose_image_count(&caps);

        let family_indices = request.queue_families.unique();
        let sharing_mode = if request.queue_families.is_split() {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(request.surface)
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());
        if request.queue_families.is_split() {
            create_info = create_info.queue_family_indices(&family_indices);
        }

        let swapchain = unsafe {
            swapchain_loader
                .create_swapchain(&create_info, None)
                .map_err(PresentError::api("vkCreateSwapchainKHR"))?
        };

        let mut this = Self {
            swapchain_loader,
            swapchain,
            images: Vec::new(),
            format,
            present_mode,
            extent,
        };

        // Drop destroys the swapchain if querying its images fails
        this.images = unsafe {
            this.swapchain_loader
                .get_swapchain_images(swapchain)
                .map_err(PresentError::api("vkGetSwapchainImagesKHR"))?
        };

        log::debug!(
            "Created swapchain: {} images, {:?}/{:?}, {:?}, {}x{}",
            this.images.len(),
            format.format,
            format.color_space,
            present_mode,
            extent.width,
            extent.height
        );
        Ok(this)
    }

    /// Swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Images owned by the swapchain, in presentation-engine index order
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Number of images (M)
    pub fn image_count(&self) -> u32 {
        u32::try_from(self.images.len()).unwrap_or(u32::MAX)
    }

    /// Chosen surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Chosen present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// One color view per swapchain image
///
/// Must be dropped before the render pass and the swapchain it views.
pub struct ImageViews {
    device: Device,
    views: Vec<vk::ImageView>,
}

impl ImageViews {
    /// Create a 2D color view of each image
    ///
    /// Views created before a failing one are released by `Drop`.
    pub fn new(device: Device, images: &[vk::Image], format: vk::Format) -> PresentResult<Self> {
        let mut this = Self {
            device,
            views: Vec::with_capacity(images.len()),
        };

        for &image in images {
            let create_info = vk::ImageViewCreateInfo::builder()
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

            let view = unsafe {
                this.device
                    .create_image_view(&create_info, None)
                    .map_err(PresentError::api("vkCreateImageView"))?
            };
            this.views.push(view);
        }

        Ok(this)
    }

    /// View handles, one per image
    pub fn as_slice(&self) -> &[vk::ImageView] {
        &self.views
    }
}

impl Drop for ImageViews {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.views {
                self.device.destroy_image_view(view, None);
            }
        }
    }
}
