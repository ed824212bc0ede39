//! Backend implementations of the frame controller seams

pub mod vulkan;
