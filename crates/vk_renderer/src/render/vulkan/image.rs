//! GPU image management
//!
//! [`GpuImage`] owns a 2D `vk::Image` together with its bound device memory.
//! Used for the depth attachment and for sampled textures; swapchain images
//! stay unowned because the swapchain itself owns them.

use ash::vk::Handle;
use ash::{vk, Device};

use super::context::VulkanContext;
use super::tracker;
use super::{VulkanError, VulkanResult};

/// 2D image with bound device memory and RAII cleanup
pub struct GpuImage {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl GpuImage {
    /// Create a single-mip, single-layer 2D image in UNDEFINED layout
    pub fn new(
        ctx: &VulkanContext,
        extent: vk::Extent2D,
        format: vk::Format,
        tiling: vk::ImageTiling,
        usage: vk::ImageUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = ctx.raw_device();

        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .format(format)
            .tiling(tiling)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(usage)
            .samples(vk::SampleCountFlags::TYPE_1)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let image = unsafe {
            device
                .create_image(&image_info, None)
                .map_err(|result| VulkanError::ResourceCreation {
                    what: "image",
                    result,
                })?
        };

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type = match ctx.find_memory_type(requirements.memory_type_bits, properties) {
            Ok(index) => index,
            Err(e) => {
                unsafe { device.destroy_image(image, None) };
                return Err(e);
            }
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);

        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(result) => {
                unsafe { device.destroy_image(image, None) };
                return Err(VulkanError::ResourceCreation {
                    what: "image memory",
                    result,
                });
            }
        };

        if let Err(result) = unsafe { device.bind_image_memory(image, memory, 0) } {
            unsafe {
                device.destroy_image(image, None);
                device.free_memory(memory, None);
            }
            return Err(VulkanError::ResourceCreation {
                what: "image memory binding",
                result,
            });
        }

        tracker::track("image", image.as_raw());

        Ok(Self {
            device,
            image,
            memory,
            format,
            extent,
        })
    }

    pub fn handle(&self) -> vk::Image {
        self.image
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for GpuImage {
    fn drop(&mut self) {
        tracker::untrack("image", self.image.as_raw());
        unsafe {
            self.device.destroy_image(self.image, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Create a 2D image view over a single mip level and layer
pub fn create_image_view(
    device: &Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> VulkanResult<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    unsafe {
        device
            .create_image_view(&view_info, None)
            .map_err(|result| VulkanError::ResourceCreation {
                what: "image view",
                result,
            })
    }
}
