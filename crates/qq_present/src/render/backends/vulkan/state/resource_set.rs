//! Everything that depends on the swapchain, built and released as one unit

use ash::{vk, Device};

use crate::config::PresentModePreference;
use crate::render::backends::vulkan::initialization::VulkanContext;
use crate::render::backends::vulkan::rendering::commands::forward_clear_values;
use crate::render::backends::vulkan::rendering::{
    CommandBuffers, CommandPool, CommandRecorder, GraphicsPipeline, PipelineFactory, PipelineTarget,
    RenderPass,
};
use crate::render::backends::vulkan::resources::{
    Buffer, DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder,
};
use crate::render::frame::{
    ImageIndex, PerImage, PresentResult, ResourceSet, SurfaceExtent, SwapchainGeneration,
};

use super::framebuffer::{DepthTarget, Framebuffer};
use super::swapchain::{ImageViews, Swapchain, SwapchainRequest};

/// Binding of the per-image uniform buffer in descriptor set 0
pub const UNIFORM_BINDING: u32 = 0;

/// A complete swapchain-dependent resource set
///
/// Fields drop top to bottom: framebuffers, then the attachment views they
/// reference, then the render pass, then the swapchain and its images.
pub struct SwapchainResources {
    command_buffers: CommandBuffers,
    framebuffers: PerImage<Framebuffer>,
    pipeline: GraphicsPipeline,
    descriptor_sets: PerImage<vk::DescriptorSet>,
    _descriptor_pool: DescriptorPool,
    _descriptor_layout: DescriptorSetLayout,
    uniforms: PerImage<Buffer>,
    _depth: DepthTarget,
    _image_views: ImageViews,
    render_pass: RenderPass,
    swapchain: Swapchain,
    generation: SwapchainGeneration,
}

impl SwapchainResources {
    /// The swapchain this set presents to
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Prebuilt command buffer for `image`
    pub fn command_buffer(&self, image: ImageIndex) -> PresentResult<vk::CommandBuffer> {
        self.framebuffers.get(image)?;
        Ok(self.command_buffers.as_slice()[image.as_usize()])
    }

    /// Copy `value` into the uniform buffer read by `image`'s commands
    ///
    /// Only valid once the image's previous submission has completed, which
    /// the frame driver guarantees before calling its hook.
    pub fn write_uniform<T: bytemuck::Pod>(
        &mut self,
        image: ImageIndex,
        value: &T,
    ) -> PresentResult<()> {
        self.uniforms.get_mut(image)?.write(bytemuck::bytes_of(value))
    }

    /// Descriptor set binding `image`'s uniform buffer
    pub fn descriptor_set(&self, image: ImageIndex) -> PresentResult<vk::DescriptorSet> {
        self.descriptor_sets.get(image).copied()
    }

    /// Pipeline the prebuilt commands draw with
    pub fn pipeline(&self) -> &GraphicsPipeline {
        &self.pipeline
    }

    /// Forward render pass the framebuffers were built against
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }
}

impl ResourceSet for SwapchainResources {
    fn generation(&self) -> SwapchainGeneration {
        self.generation
    }

    fn extent(&self) -> SurfaceExtent {
        self.swapchain.extent().into()
    }

    fn image_count(&self) -> u32 {
        self.swapchain.image_count()
    }
}

/// Inputs shared by every build of a resource set
pub struct ResourceSetBuilder<'a> {
    /// Device, surface and queues
    pub context: &'a VulkanContext,
    /// Pool the per-image command buffers come from; must outlive the set
    pub command_pool: &'a CommandPool,
    /// Builds the pipeline against the new extent and render pass
    pub pipeline_factory: &'a dyn PipelineFactory,
    /// Bytes in each per-image uniform buffer
    pub uniform_size: vk::DeviceSize,
    /// Color the render pass clears to
    pub clear_color: [f32; 4],
    /// Present mode preference for the swapchain
    pub present_mode: PresentModePreference,
}

impl ResourceSetBuilder<'_> {
    /// Build a full set for `window_extent`
    ///
    /// Each object is owned by a local as soon as it exists, so an early
    /// return drops everything built so far in reverse order.
    pub fn build(
        &self,
        window_extent: SurfaceExtent,
        generation: SwapchainGeneration,
    ) -> PresentResult<SwapchainResources> {
        let context = self.context;
        let device = context.device();
        let physical = context.physical_device();

        let swapchain = Swapchain::new(
            context.swapchain_loader().clone(),
            &SwapchainRequest {
                physical_device: physical.device,
                surface: context.surface(),
                surface_loader: context.surface_loader(),
                queue_families: context.queue_families(),
                window_extent,
                present_mode: self.present_mode,
            },
        )?;
        let extent = swapchain.extent();
        let image_count = swapchain.image_count();

        let color_format = swapchain.format().format;

        let render_pass = RenderPass::new_forward_pass(device.clone(), color_format)?;
        let image_views = ImageViews::new(device.clone(), swapchain.images(), color_format)?;
        let depth = DepthTarget::new(device.clone(), &physical.memory_properties, extent)?;

        let uniforms = (0..image_count)
            .map(|_| {
                Buffer::new_uniform(device.clone(), &physical.memory_properties, self.uniform_size)
            })
            .collect::<PresentResult<Vec<_>>>()?;
        let uniforms = PerImage::new(generation, uniforms);

        let descriptor_layout = DescriptorSetLayoutBuilder::new()
            .add_uniform_buffer(UNIFORM_BINDING, vk::ShaderStageFlags::VERTEX)
            .build(device)?;
        let descriptor_pool = DescriptorPool::new_uniform(device.clone(), image_count)?;
        let layouts = vec![descriptor_layout.handle(); uniforms.len()];
        let sets = descriptor_pool.allocate_descriptor_sets(&layouts)?;
        for (set, uniform) in sets.iter().zip(uniforms.iter()) {
            descriptor_pool.write_uniform_buffer(
                *set,
                UNIFORM_BINDING,
                uniform.handle(),
                uniform.size(),
            );
        }
        let descriptor_sets = PerImage::new(generation, sets);

        let pipeline = self.pipeline_factory.create(
            device,
            &PipelineTarget {
                extent,
                color_format,
                render_pass: render_pass.handle(),
                set_layouts: &[descriptor_layout.handle()],
            },
        )?;

        let framebuffers = image_views
            .as_slice()
            .iter()
            .map(|&view| {
                let attachments = [view, depth.image_view()];
                Framebuffer::new(device.clone(), render_pass.handle(), &attachments, extent)
            })
            .collect::<PresentResult<Vec<_>>>()?;
        let framebuffers = PerImage::new(generation, framebuffers);

        let command_buffers = self.command_pool.allocate_command_buffers(image_count)?;
        for ((&command_buffer, framebuffer), &set) in command_buffers
            .as_slice()
            .iter()
            .zip(framebuffers.iter())
            .zip(descriptor_sets.iter())
        {
            let draw = DrawCommands {
                render_pass: render_pass.handle(),
                framebuffer: framebuffer.handle(),
                extent,
                pipeline: &pipeline,
                descriptor_set: set,
                clear_color: self.clear_color,
            };
            record_draw(device, command_buffer, &draw)?;
        }

        log::info!(
            "Built swapchain resources {generation}: {} images at {}x{}, {:?}",
            image_count,
            extent.width,
            extent.height,
            swapchain.present_mode()
        );

        Ok(SwapchainResources {
            command_buffers,
            framebuffers,
            pipeline,
            descriptor_sets,
            _descriptor_pool: descriptor_pool,
            _descriptor_layout: descriptor_layout,
            uniforms,
            _depth: depth,
            _image_views: image_views,
            render_pass,
            swapchain,
            generation,
        })
    }
}

struct DrawCommands<'a> {
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    extent: vk::Extent2D,
    pipeline: &'a GraphicsPipeline,
    descriptor_set: vk::DescriptorSet,
    clear_color: [f32; 4],
}

fn record_draw(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    draw: &DrawCommands<'_>,
) -> PresentResult<()> {
    let mut recorder = CommandRecorder::begin(device, command_buffer)?;
    let clear_values = forward_clear_values(draw.clear_color);
    {
        let mut pass = recorder.begin_render_pass(
            draw.render_pass,
            draw.framebuffer,
            vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: draw.extent,
            },
            &clear_values,
        );
        pass.cmd_bind_pipeline(draw.pipeline.handle());
        pass.cmd_bind_descriptor_set(draw.pipeline.layout(), draw.descriptor_set);
        pass.cmd_draw(draw.pipeline.vertex_count());
    }
    recorder.end()?;
    Ok(())
}
