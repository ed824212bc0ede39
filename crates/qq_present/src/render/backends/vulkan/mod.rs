//! Vulkan backend for the frame driver
//!
//! `initialization` brings up the window, instance and device; `state`
//! holds the swapchain-dependent resource set; `rendering` and `resources`
//! hold the objects that set is built from.

pub mod backend;
pub mod initialization;
pub mod rendering;
pub mod resources;
pub mod state;

pub use backend::{VulkanBackend, DEFAULT_UNIFORM_SIZE, DEFAULT_VERTEX_COUNT};
pub use initialization::{QueueFamilyIndices, VulkanContext, Window, WindowError, WindowResult};
pub use rendering::{PipelineFactory, PipelineTarget, SpirvPipelineFactory};
pub use state::SwapchainResources;
