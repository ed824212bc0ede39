//! Host-visible buffers for per-image uniform data

use ash::{vk, Device};

use crate::render::frame::{PresentError, PresentResult};

/// Find a memory type allowed by `type_filter` with all of `properties`
pub fn find_memory_type(
    type_filter: u32,
    properties: vk::MemoryPropertyFlags,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
) -> PresentResult<u32> {
    (0..memory_properties.memory_type_count)
        .find(|&i| {
            (type_filter & (1 << i)) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties)
        })
        .ok_or_else(|| {
            PresentError::InitializationFailed(format!("no memory type with {properties:?}"))
        })
}

/// A persistently mapped, host-coherent buffer
///
/// Writes are visible to the GPU without flushing. The frame driver only
/// lets the frame hook write while no in-flight submission reads the
/// buffer, so no further synchronization is needed here.
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    mapped: *mut u8,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create a mapped uniform buffer of `size` bytes
    pub fn new_uniform(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
    ) -> PresentResult<Self> {
        let mut this = Self {
            device,
            buffer: vk::Buffer::null(),
            memory: vk::DeviceMemory::null(),
            mapped: std::ptr::null_mut(),
            size,
        };

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(vk::BufferUsageFlags::UNIFORM_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        this.buffer = unsafe {
            this.device
                .create_buffer(&buffer_info, None)
                .map_err(PresentError::api("vkCreateBuffer"))?
        };

        let requirements = unsafe { this.device.get_buffer_memory_requirements(this.buffer) };
        let memory_type_index = find_memory_type(
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            memory_properties,
        )?;

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        unsafe {
            this.memory = this
                .device
                .allocate_memory(&alloc_info, None)
                .map_err(PresentError::api("vkAllocateMemory"))?;
            this.device
                .bind_buffer_memory(this.buffer, this.memory, 0)
                .map_err(PresentError::api("vkBindBufferMemory"))?;
            this.mapped = this
                .device
                .map_memory(this.memory, 0, size, vk::MemoryMapFlags::empty())
                .map_err(PresentError::api("vkMapMemory"))?
                .cast::<u8>();
        }

        Ok(this)
    }

    /// Copy `data` to the start of the buffer
    pub fn write(&mut self, data: &[u8]) -> PresentResult<()> {
        check_write_fits(data.len(), self.size)?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.mapped, data.len());
        }
        Ok(())
    }

    /// Buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

/// Reject writes larger than the mapped range
pub fn check_write_fits(len: usize, capacity: vk::DeviceSize) -> PresentResult<()> {
    let len = len as vk::DeviceSize;
    if len > capacity {
        return Err(PresentError::UniformOverflow { len, capacity });
    }
    Ok(())
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            if !self.mapped.is_null() {
                self.device.unmap_memory(self.memory);
            }
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
