//! Framebuffers and the shared depth target

use ash::{vk, Device};

use crate::render::backends::vulkan::resources::buffer::find_memory_type;
use crate::render::frame::{PresentError, PresentResult};

/// Depth format of the shared depth target
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer over `attachments`
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> PresentResult<Self> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device
                .create_framebuffer(&create_info, None)
                .map_err(PresentError::api("vkCreateFramebuffer"))?
        };

        Ok(Self { device, framebuffer })
    }

    /// Framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// One depth image shared by every framebuffer of a resource set
///
/// Frames in flight overlap on the GPU, so each frame's load-op clear must
/// wait for the previous frame's late fragment tests to finish writing.
/// The forward pass's external dependency provides that ordering; see
/// [`external_dependency`](super::super::rendering::render_pass::external_dependency).
pub struct DepthTarget {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    image_view: vk::ImageView,
}

impl DepthTarget {
    /// Create a device-local depth image and view
    ///
    /// Anything created before a failing step is released by `Drop`.
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        extent: vk::Extent2D,
    ) -> PresentResult<Self> {
        let mut this = Self {
            device,
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            image_view: vk::ImageView::null(),
        };

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(DEPTH_FORMAT)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        unsafe {
            this.image = this
                .device
                .create_image(&image_info, None)
                .map_err(PresentError::api("vkCreateImage"))?;

            let requirements = this.device.get_image_memory_requirements(this.image);
            let memory_type_index = find_memory_type(
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                memory_properties,
            )?;
            let alloc_info = vk::MemoryAllocateInfo::builder()
                .allocation_size(requirements.size)
                .memory_type_index(memory_type_index);

            this.memory = this
                .device
                .allocate_memory(&alloc_info, None)
                .map_err(PresentError::api("vkAllocateMemory"))?;
            this.device
                .bind_image_memory(this.image, this.memory, 0)
                .map_err(PresentError::api("vkBindImageMemory"))?;
        }

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(this.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(DEPTH_FORMAT)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::DEPTH,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        this.image_view = unsafe {
            this.device
                .create_image_view(&view_info, None)
                .map_err(PresentError::api("vkCreateImageView"))?
        };

        Ok(this)
    }

    /// Depth attachment view
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }
}

impl Drop for DepthTarget {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.image_view, None);
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
