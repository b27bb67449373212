//! Descriptor pool and set management
//!
//! One descriptor set per swapchain image, each binding that image's uniform
//! buffer and the shared texture sampler. The pool is sized exactly and torn
//! down with the rest of the swapchain-dependent state; individual sets are
//! freed implicitly when the pool is destroyed.

use ash::{vk, Device};

use crate::render::UniformBufferObject;

use super::buffer::GpuBuffer;
use super::texture::Texture;
use super::{VulkanError, VulkanResult};

/// Descriptor pool plus the sets allocated from it
pub struct DescriptorArena {
    device: Device,
    pool: vk::DescriptorPool,
    sets: Vec<vk::DescriptorSet>,
}

impl DescriptorArena {
    /// Allocate and write one set per uniform buffer
    pub fn new(
        device: Device,
        layout: vk::DescriptorSetLayout,
        uniform_buffers: &[GpuBuffer],
        texture: &Texture,
    ) -> VulkanResult<Self> {
        let count = uniform_buffers.len() as u32;

        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: count,
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: count,
            },
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .pool_sizes(&pool_sizes)
            .max_sets(count);

        let pool = unsafe {
            device
                .create_descriptor_pool(&pool_info, None)
                .map_err(|result| VulkanError::ResourceCreation {
                    what: "descriptor pool",
                    result,
                })?
        };

        let layouts = vec![layout; uniform_buffers.len()];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(&layouts);

        let sets = match unsafe { device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => sets,
            Err(result) => {
                unsafe { device.destroy_descriptor_pool(pool, None) };
                return Err(VulkanError::ResourceCreation {
                    what: "descriptor sets",
                    result,
                });
            }
        };

        for (set, buffer) in sets.iter().zip(uniform_buffers) {
            let buffer_info = [vk::DescriptorBufferInfo {
                buffer: buffer.handle(),
                offset: 0,
                range: std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize,
            }];
            let image_info = [vk::DescriptorImageInfo {
                sampler: texture.sampler(),
                image_view: texture.view(),
                image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            }];

            let writes = [
                vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_info)
                    .build(),
                vk::WriteDescriptorSet::builder()
                    .dst_set(*set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_info)
                    .build(),
            ];

            unsafe {
                device.update_descriptor_sets(&writes, &[]);
            }
        }

        Ok(Self { device, pool, sets })
    }

    pub fn set(&self, image_index: usize) -> vk::DescriptorSet {
        self.sets[image_index]
    }
}

impl Drop for DescriptorArena {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}
