//! GPU buffer management
//!
//! [`GpuBuffer`] pairs a `vk::Buffer` with its backing `vk::DeviceMemory` so
//! the two are always created, bound and destroyed together. Constructors
//! cover the three cases the renderer needs: host-visible staging buffers,
//! device-local buffers filled through a staging copy, and persistently
//! rewritten uniform buffers.

use ash::vk::Handle;
use ash::{vk, Device};

use super::context::VulkanContext;
use super::tracker;
use super::transfer::TransferContext;
use super::{VulkanError, VulkanResult};

/// Buffer with bound device memory and RAII cleanup
pub struct GpuBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl GpuBuffer {
    /// Create a buffer and allocate + bind memory with the given properties
    pub fn new(
        ctx: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = ctx.raw_device();

        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            device
                .create_buffer(&buffer_info, None)
                .map_err(|result| VulkanError::ResourceCreation {
                    what: "buffer",
                    result,
                })?
        };

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_type = match ctx.find_memory_type(requirements.memory_type_bits, properties) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(result) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(VulkanError::ResourceCreation {
                    what: "buffer memory",
                    result,
                });
            }
        };

        if let Err(result) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::ResourceCreation {
                what: "buffer memory binding",
                result,
            });
        }

        tracker::track("buffer", buffer.as_raw());

        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }

    /// Host-visible staging buffer pre-filled with `data`
    pub fn staging(ctx: &VulkanContext, data: &[u8]) -> VulkanResult<Self> {
        let buffer = Self::new(
            ctx,
            data.len() as vk::DeviceSize,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        buffer.write_bytes(data)?;
        Ok(buffer)
    }

    /// Device-local buffer filled with `data` through a one-shot staging copy
    pub fn device_local_with_data(
        ctx: &VulkanContext,
        transfer: &TransferContext,
        data: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        let staging = Self::staging(ctx, data)?;
        let buffer = Self::new(
            ctx,
            data.len() as vk::DeviceSize,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        transfer.copy_buffer(staging.handle(), buffer.handle(), data.len() as vk::DeviceSize)?;
        Ok(buffer)
    }

    /// Host-visible uniform buffer, rewritten every frame
    pub fn uniform(ctx: &VulkanContext, size: vk::DeviceSize) -> VulkanResult<Self> {
        Self::new(
            ctx,
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
    }

    /// Map, copy a value into the buffer, unmap. The memory must be
    /// host-visible and at least `size_of::<T>()` bytes.
    pub fn write_data<T>(&self, data: &T) -> VulkanResult<()> {
        let size = std::mem::size_of::<T>() as vk::DeviceSize;
        debug_assert!(size <= self.size);
        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, size, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(data as *const T as *const u8, mapped as *mut u8, size as usize);
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Map, copy a byte slice into the buffer, unmap
    pub fn write_bytes(&self, data: &[u8]) -> VulkanResult<()> {
        debug_assert!(data.len() as vk::DeviceSize <= self.size);
        unsafe {
            let mapped = self
                .device
                .map_memory(
                    self.memory,
                    0,
                    data.len() as vk::DeviceSize,
                    vk::MemoryMapFlags::empty(),
                )
                .map_err(VulkanError::Api)?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped as *mut u8, data.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for GpuBuffer {
    fn drop(&mut self) {
        tracker::untrack("buffer", self.buffer.as_raw());
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}
