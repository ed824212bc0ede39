//! Vulkan implementation of the frame driver's GPU timeline

use ash::vk;

use crate::config::{PresentConfig, PresentModePreference};
use crate::render::frame::{
    AcquireOutcome, ImageIndex, PresentBackend, PresentError, PresentOutcome, PresentResult,
    SurfaceExtent, SwapchainGeneration,
};

use super::initialization::{VulkanContext, Window};
use super::rendering::{CommandPool, PipelineFactory, SpirvPipelineFactory};
use super::state::{sync, ResourceSetBuilder, SwapchainResources};

/// Uniform bytes per image when none is requested: one column-major 4x4 `f32` matrix
pub const DEFAULT_UNIFORM_SIZE: vk::DeviceSize = 64;

/// Vertices drawn by the default shader pair
pub const DEFAULT_VERTEX_COUNT: u32 = 3;

/// Owns the device and everything that outlives a swapchain
///
/// The command pool is declared before the context so it is destroyed
/// while the device still exists.
pub struct VulkanBackend {
    command_pool: CommandPool,
    pipeline_factory: Box<dyn PipelineFactory>,
    uniform_size: vk::DeviceSize,
    clear_color: [f32; 4],
    present_mode: PresentModePreference,
    context: VulkanContext,
}

impl VulkanBackend {
    /// Bring up Vulkan for `window` with the configured shader pair
    pub fn new(window: &mut Window, config: &PresentConfig) -> PresentResult<Self> {
        config
            .shaders
            .validate()
            .map_err(|e| PresentError::InitializationFailed(e.to_string()))?;
        let factory = SpirvPipelineFactory::new(config.shaders.clone(), DEFAULT_VERTEX_COUNT);
        Self::with_pipeline_factory(window, config, Box::new(factory), DEFAULT_UNIFORM_SIZE)
    }

    /// Bring up Vulkan with a caller-supplied pipeline and uniform size
    pub fn with_pipeline_factory(
        window: &mut Window,
        config: &PresentConfig,
        pipeline_factory: Box<dyn PipelineFactory>,
        uniform_size: vk::DeviceSize,
    ) -> PresentResult<Self> {
        let context = VulkanContext::new(window, config)?;
        let command_pool =
            CommandPool::new(context.device().clone(), context.queue_families().graphics)?;

        log::info!(
            "Vulkan backend ready on {} ({} uniform bytes per image)",
            context.physical_device().name(),
            uniform_size
        );

        Ok(Self {
            command_pool,
            pipeline_factory,
            uniform_size,
            clear_color: config.clear_color,
            present_mode: config.present_mode,
            context,
        })
    }
}

impl PresentBackend for VulkanBackend {
    type Fence = vk::Fence;
    type Semaphore = vk::Semaphore;
    type Resources = SwapchainResources;

    fn create_fence(&mut self, signaled: bool) -> PresentResult<vk::Fence> {
        sync::create_fence(self.context.device(), signaled)
    }

    fn destroy_fence(&mut self, fence: vk::Fence) {
        unsafe { self.context.device().destroy_fence(fence, None) };
    }

    fn create_semaphore(&mut self) -> PresentResult<vk::Semaphore> {
        sync::create_semaphore(self.context.device())
    }

    fn destroy_semaphore(&mut self, semaphore: vk::Semaphore) {
        unsafe { self.context.device().destroy_semaphore(semaphore, None) };
    }

    fn wait_for_fence(&mut self, fence: vk::Fence, timeout_ns: u64) -> PresentResult<()> {
        sync::wait_for_fence(self.context.device(), fence, timeout_ns)
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> PresentResult<()> {
        sync::reset_fence(self.context.device(), fence)
    }

    fn wait_idle(&mut self) -> PresentResult<()> {
        unsafe { self.context.device().device_wait_idle() }
            .map_err(PresentError::api("vkDeviceWaitIdle"))
    }

    fn build_resources(
        &mut self,
        extent: SurfaceExtent,
        generation: SwapchainGeneration,
    ) -> PresentResult<SwapchainResources> {
        ResourceSetBuilder {
            context: &self.context,
            command_pool: &self.command_pool,
            pipeline_factory: self.pipeline_factory.as_ref(),
            uniform_size: self.uniform_size,
            clear_color: self.clear_color,
            present_mode: self.present_mode,
        }
        .build(extent, generation)
    }

    fn destroy_resources(&mut self, resources: SwapchainResources) {
        drop(resources);
    }

    fn acquire_next_image(
        &mut self,
        resources: &SwapchainResources,
        signal: vk::Semaphore,
        timeout_ns: u64,
    ) -> PresentResult<AcquireOutcome> {
        let result = unsafe {
            self.context.swapchain_loader().acquire_next_image(
                resources.swapchain().handle(),
                timeout_ns,
                signal,
                vk::Fence::null(),
            )
        };

        match result {
            Ok((index, suboptimal)) => Ok(AcquireOutcome::Ready { index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => {
                Err(PresentError::FenceTimeout { timeout_ns })
            }
            Err(result) => Err(PresentError::Api {
                operation: "vkAcquireNextImageKHR",
                result,
            }),
        }
    }

    fn submit(
        &mut self,
        resources: &SwapchainResources,
        image: ImageIndex,
        wait: vk::Semaphore,
        signal: vk::Semaphore,
        fence: vk::Fence,
    ) -> PresentResult<()> {
        let command_buffers = [resources.command_buffer(image)?];
        let wait_semaphores = [wait];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let signal_semaphores = [signal];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        unsafe {
            self.context
                .device()
                .queue_submit(self.context.graphics_queue(), &[submit_info], fence)
        }
        .map_err(PresentError::api("vkQueueSubmit"))
    }

    fn present(
        &mut self,
        resources: &SwapchainResources,
        image: ImageIndex,
        wait: vk::Semaphore,
    ) -> PresentResult<PresentOutcome> {
        let wait_semaphores = [wait];
        let swapchains = [resources.swapchain().handle()];
        let image_indices = [image.raw()];

        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let result = unsafe {
            self.context
                .swapchain_loader()
                .queue_present(self.context.present_queue(), &present_info)
        };

        match result {
            Ok(false) => Ok(PresentOutcome::Optimal),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(result) => Err(PresentError::Api {
                operation: "vkQueuePresentKHR",
                result,
            }),
        }
    }
}
