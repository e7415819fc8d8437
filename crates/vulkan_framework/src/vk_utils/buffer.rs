//! GPU buffers backed by the VMA allocator

use ash::vk;
use std::sync::Arc;
use vk_mem::Alloc;

use super::{Context, VulkanError, VulkanResult};

/// Where a buffer or image should live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// Device-local memory, filled through transfers
    GpuOnly,
    /// Host-visible memory written sequentially by the CPU
    CpuToGpu,
}

impl MemoryLocation {
    pub(crate) fn allocation_info(self) -> vk_mem::AllocationCreateInfo {
        match self {
            MemoryLocation::GpuOnly => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            MemoryLocation::CpuToGpu => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::Auto,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
                ..Default::default()
            },
        }
    }

    /// Whether the CPU may write the memory directly
    pub fn is_host_visible(self) -> bool {
        matches!(self, MemoryLocation::CpuToGpu)
    }
}

/// Buffer wrapper with RAII cleanup
pub struct Buffer {
    context: Arc<Context>,
    buffer: vk::Buffer,
    allocation: vk_mem::Allocation,
    size: vk::DeviceSize,
    location: MemoryLocation,
}

impl Buffer {
    /// Create a new buffer
    pub fn new(
        context: Arc<Context>,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        location: MemoryLocation,
    ) -> VulkanResult<Self> {
        if size == 0 {
            return Err(VulkanError::InvalidOperation {
                reason: "Buffers cannot be empty".to_string(),
            });
        }

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let (buffer, allocation) = unsafe {
            context
                .allocator()
                .create_buffer(&buffer_info, &location.allocation_info())
                .map_err(VulkanError::Allocation)?
        };

        log::trace!("Allocated {} byte buffer ({:?}, {:?})", size, usage, location);

        Ok(Self {
            context,
            buffer,
            allocation,
            size,
            location,
        })
    }

    /// Create a host-visible buffer holding `data`
    pub fn with_data<T: bytemuck::Pod>(
        context: Arc<Context>,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> VulkanResult<Self> {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let mut buffer = Self::new(context, bytes.len() as vk::DeviceSize, usage, MemoryLocation::CpuToGpu)?;
        buffer.write_bytes(0, bytes)?;
        Ok(buffer)
    }

    /// Create a device-local buffer and fill it through a staging buffer
    pub fn device_local_with_data<T: bytemuck::Pod>(
        context: Arc<Context>,
        usage: vk::BufferUsageFlags,
        data: &[T],
    ) -> VulkanResult<Self> {
        let staging = Self::with_data(context.clone(), vk::BufferUsageFlags::TRANSFER_SRC, data)?;
        let buffer = Self::new(
            context.clone(),
            staging.size,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::GpuOnly,
        )?;

        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size: staging.size,
        };
        context.submit_one_shot(|device, cmd| unsafe {
            device.cmd_copy_buffer(cmd, staging.buffer, buffer.buffer, &[region]);
        })?;

        Ok(buffer)
    }

    /// Write typed data at the start of a host-visible buffer
    pub fn write<T: bytemuck::Pod>(&mut self, data: &[T]) -> VulkanResult<()> {
        self.write_bytes(0, bytemuck::cast_slice(data))
    }

    /// Write raw bytes at `offset` in a host-visible buffer
    pub fn write_bytes(&mut self, offset: vk::DeviceSize, bytes: &[u8]) -> VulkanResult<()> {
        if !self.location.is_host_visible() {
            return Err(VulkanError::InvalidOperation {
                reason: "Cannot map a GPU-only buffer".to_string(),
            });
        }
        let (start, len) = write_range(self.size, offset, bytes.len())?;

        let allocator = self.context.allocator();
        unsafe {
            let ptr = allocator
                .map_memory(&mut self.allocation)
                .map_err(VulkanError::Allocation)?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.add(start), len);
            allocator.unmap_memory(&mut self.allocation);
            // No-op on coherent memory; required when VMA picked a non-coherent type.
            allocator
                .flush_allocation(&self.allocation, start, len)
                .map_err(VulkanError::Allocation)?;
        }
        Ok(())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

/// Byte range `(start, len)` of a write, checked against the buffer size
fn write_range(size: vk::DeviceSize, offset: vk::DeviceSize, len: usize) -> VulkanResult<(usize, usize)> {
    let end = offset.checked_add(len as vk::DeviceSize);
    match end {
        Some(end) if end <= size => Ok((offset as usize, len)),
        _ => Err(VulkanError::InvalidOperation {
            reason: format!("Write of {} bytes at {} exceeds buffer size {}", len, offset, size),
        }),
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.context
                .allocator()
                .destroy_buffer(self.buffer, &mut self.allocation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_location_usage() {
        let gpu = MemoryLocation::GpuOnly.allocation_info();
        assert!(matches!(gpu.usage, vk_mem::MemoryUsage::AutoPreferDevice));
        assert!(!MemoryLocation::GpuOnly.is_host_visible());

        let upload = MemoryLocation::CpuToGpu.allocation_info();
        assert!(upload
            .flags
            .contains(vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE));
        assert!(MemoryLocation::CpuToGpu.is_host_visible());
    }

    #[test]
    fn test_write_range_covers_exactly_the_written_bytes() {
        assert_eq!(write_range(256, 64, 80).unwrap(), (64, 80));
        assert_eq!(write_range(256, 0, 256).unwrap(), (0, 256));
        assert!(write_range(256, 200, 57).is_err());
        assert!(write_range(256, u64::MAX, 1).is_err());
    }
}
