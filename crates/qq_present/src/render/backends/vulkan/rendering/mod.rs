//! Render pass, pipeline and command recording

pub mod commands;
pub mod pipeline;
pub mod render_pass;

pub use commands::{ActiveRenderPass, CommandBuffers, CommandPool, CommandRecorder};
pub use pipeline::{
    GraphicsPipeline, PipelineFactory, PipelineTarget, ShaderModule, SpirvPipelineFactory,
};
pub use render_pass::RenderPass;
