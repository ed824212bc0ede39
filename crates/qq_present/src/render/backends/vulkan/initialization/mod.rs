//! Vulkan bring-up: window, instance, device

pub mod context;
pub mod window;

pub use context::{
    device_score, LogicalDevice, PhysicalDeviceInfo, QueueFamilyIndices, VulkanContext,
    VulkanInstance,
};
pub use window::{Window, WindowError, WindowResult};
