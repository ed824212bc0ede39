//! Swapchain-dependent state and synchronization primitives

pub mod framebuffer;
pub mod resource_set;
pub mod swapchain;
pub mod sync;

pub use framebuffer::{DepthTarget, Framebuffer, DEPTH_FORMAT};
pub use resource_set::{ResourceSetBuilder, SwapchainResources};
pub use swapchain::{ImageViews, Swapchain, SwapchainRequest};
