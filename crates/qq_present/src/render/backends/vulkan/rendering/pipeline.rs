//! Shader modules and the graphics pipeline baked against a swapchain extent

use std::ffi::CStr;
use std::io::Cursor;
use std::path::Path;

use ash::{vk, Device};

use crate::config::ShaderConfig;
use crate::render::frame::{PresentError, PresentResult};

const SHADER_ENTRY: &CStr = c"main";

/// Decode SPIR-V bytes into words, checking length and magic number
pub fn spirv_words(bytes: &[u8]) -> PresentResult<Vec<u32>> {
    ash::util::read_spv(&mut Cursor::new(bytes))
        .map_err(|e| PresentError::InitializationFailed(format!("invalid SPIR-V: {e}")))
}

/// Shader module with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create from SPIR-V bytes
    pub fn from_bytes(device: &Device, bytes: &[u8]) -> PresentResult<Self> {
        let words = spirv_words(bytes)?;
        log::debug!("Creating shader module from {} SPIR-V words", words.len());

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);
        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(PresentError::api("vkCreateShaderModule"))?;

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Create from a SPIR-V file on disk
    pub fn from_file<P: AsRef<Path>>(device: &Device, path: P) -> PresentResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            PresentError::InitializationFailed(format!(
                "failed to read shader {}: {e}",
                path.display()
            ))
        })?;
        log::debug!("Read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(device, &bytes)
    }

    fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(SHADER_ENTRY)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Pipeline and its layout, plus the vertex count its draw call uses
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    vertex_count: u32,
}

impl GraphicsPipeline {
    /// Pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Layout the descriptor sets bind against
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Vertices per draw
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

/// Everything a pipeline is built against
#[derive(Debug, Clone, Copy)]
pub struct PipelineTarget<'a> {
    /// Viewport and scissor size
    pub extent: vk::Extent2D,
    /// Swapchain image format
    pub color_format: vk::Format,
    /// Pass the pipeline renders in, subpass 0
    pub render_pass: vk::RenderPass,
    /// Descriptor set layouts, in set order
    pub set_layouts: &'a [vk::DescriptorSetLayout],
}

/// Builds the graphics pipeline for each resource set
///
/// Viewport and scissor are baked in, so the pipeline is rebuilt whenever the
/// swapchain is.
pub trait PipelineFactory {
    /// Build a pipeline for `target`
    fn create(
        &self,
        device: &Device,
        target: &PipelineTarget<'_>,
    ) -> PresentResult<GraphicsPipeline>;
}

/// Pipeline from a SPIR-V vertex/fragment pair with no vertex input
///
/// The vertex shader generates its own positions from `gl_VertexIndex`.
pub struct SpirvPipelineFactory {
    shaders: ShaderConfig,
    vertex_count: u32,
}

impl SpirvPipelineFactory {
    /// Factory drawing `vertex_count` vertices with `shaders`
    pub fn new(shaders: ShaderConfig, vertex_count: u32) -> Self {
        Self { shaders, vertex_count }
    }
}

impl PipelineFactory for SpirvPipelineFactory {
    fn create(
        &self,
        device: &Device,
        target: &PipelineTarget<'_>,
    ) -> PresentResult<GraphicsPipeline> {
        let vertex_shader = ShaderModule::from_file(device, &self.shaders.vertex_shader_path)?;
        let fragment_shader = ShaderModule::from_file(device, &self.shaders.fragment_shader_path)?;

        let shader_stages = [
            vertex_shader.stage_info(vk::ShaderStageFlags::VERTEX),
            fragment_shader.stage_info(vk::ShaderStageFlags::FRAGMENT),
        ];

        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        let viewports = [full_viewport(target.extent)];
        let scissors = [vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: target.extent,
        }];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        // Both faces are visible while the triangle spins.
        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(target.set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(PresentError::api("vkCreatePipelineLayout"))?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(target.render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };
        let pipeline = match pipelines {
            Ok(pipelines) => pipelines.first().copied().unwrap_or_else(vk::Pipeline::null),
            Err((_, err)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(PresentError::Api {
                    operation: "vkCreateGraphicsPipelines",
                    result: err,
                });
            }
        };

        log::debug!(
            "Built pipeline for {}x{} {:?} from {}",
            target.extent.width,
            target.extent.height,
            target.color_format,
            self.shaders.vertex_shader_path
        );

        Ok(GraphicsPipeline {
            device: device.clone(),
            pipeline,
            layout,
            vertex_count: self.vertex_count,
        })
    }
}

/// Viewport covering the whole extent with the standard depth range
#[allow(clippy::cast_precision_loss)]
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}
