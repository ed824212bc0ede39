//! GPU memory resources: uniform buffers and descriptors

pub mod buffer;
pub mod descriptor_set;

pub use buffer::Buffer;
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder};
