//! Command pool and per-image command buffer recording

use ash::{vk, Device};

use crate::render::frame::{PresentError, PresentResult};

/// Command pool whose buffers can be individually reset or freed
pub struct CommandPool {
    device: Device,
    command_pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool for the given queue family
    pub fn new(device: Device, queue_family_index: u32) -> PresentResult<Self> {
        let pool_create_info = vk::CommandPoolCreateInfo::builder()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);

        let command_pool = unsafe { device.create_command_pool(&pool_create_info, None) }
            .map_err(PresentError::api("vkCreateCommandPool"))?;

        Ok(Self { device, command_pool })
    }

    /// Allocate `count` primary buffers, freed back to this pool on drop
    pub fn allocate_command_buffers(&self, count: u32) -> PresentResult<CommandBuffers> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        let buffers = unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(PresentError::api("vkAllocateCommandBuffers"))?;

        Ok(CommandBuffers {
            device: self.device.clone(),
            pool: self.command_pool,
            buffers,
        })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Command buffers borrowed from a [`CommandPool`]
///
/// The pool must outlive this value.
pub struct CommandBuffers {
    device: Device,
    pool: vk::CommandPool,
    buffers: Vec<vk::CommandBuffer>,
}

impl CommandBuffers {
    /// Buffer handles in allocation order
    pub fn as_slice(&self) -> &[vk::CommandBuffer] {
        &self.buffers
    }

    /// Number of buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffers were allocated
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

impl Drop for CommandBuffers {
    fn drop(&mut self) {
        if self.buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.pool, &self.buffers);
        }
    }
}

/// Command buffer in the recording state
///
/// Recorded buffers are resubmitted every time their image comes round, so
/// recording omits `ONE_TIME_SUBMIT`.
pub struct CommandRecorder {
    command_buffer: vk::CommandBuffer,
    device: Device,
}

impl CommandRecorder {
    /// Begin recording into `command_buffer`
    pub fn begin(device: &Device, command_buffer: vk::CommandBuffer) -> PresentResult<Self> {
        let begin_info = vk::CommandBufferBeginInfo::builder();

        unsafe { device.begin_command_buffer(command_buffer, &begin_info) }
            .map_err(PresentError::api("vkBeginCommandBuffer"))?;

        Ok(Self {
            command_buffer,
            device: device.clone(),
        })
    }

    /// Begin an inline render pass; it ends when the returned guard drops
    pub fn begin_render_pass(
        &mut self,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) -> ActiveRenderPass<'_> {
        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }

        ActiveRenderPass { recorder: self }
    }

    /// Finish recording
    pub fn end(self) -> PresentResult<vk::CommandBuffer> {
        unsafe { self.device.end_command_buffer(self.command_buffer) }
            .map_err(PresentError::api("vkEndCommandBuffer"))?;
        Ok(self.command_buffer)
    }
}

/// Render pass scope inside a [`CommandRecorder`]
pub struct ActiveRenderPass<'a> {
    recorder: &'a mut CommandRecorder,
}

impl ActiveRenderPass<'_> {
    /// Bind a graphics pipeline
    pub fn cmd_bind_pipeline(&mut self, pipeline: vk::Pipeline) {
        unsafe {
            self.recorder.device.cmd_bind_pipeline(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                pipeline,
            );
        }
    }

    /// Bind `set` at set index 0 of `layout`
    pub fn cmd_bind_descriptor_set(
        &mut self,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.recorder.device.cmd_bind_descriptor_sets(
                self.recorder.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    /// Draw one instance of `vertex_count` generated vertices
    pub fn cmd_draw(&mut self, vertex_count: u32) {
        unsafe {
            self.recorder.device.cmd_draw(self.recorder.command_buffer, vertex_count, 1, 0, 0);
        }
    }
}

impl Drop for ActiveRenderPass<'_> {
    fn drop(&mut self) {
        unsafe {
            self.recorder.device.cmd_end_render_pass(self.recorder.command_buffer);
        }
    }
}

/// Clear values for the forward pass: color then depth
pub fn forward_clear_values(clear_color: [f32; 4]) -> [vk::ClearValue; 2] {
    [
        vk::ClearValue {
            color: vk::ClearColorValue { float32: clear_color },
        },
        vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_values_carry_color_and_far_depth() {
        let values = forward_clear_values([0.1, 0.2, 0.3, 1.0]);
        unsafe {
            assert_eq!(values[0].color.float32, [0.1, 0.2, 0.3, 1.0]);
            assert_eq!(values[1].depth_stencil.depth, 1.0);
            assert_eq!(values[1].depth_stencil.stencil, 0);
        }
    }
}
