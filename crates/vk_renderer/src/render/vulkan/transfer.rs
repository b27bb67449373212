//! One-shot transfer commands
//!
//! Uploads run through short-lived command buffers allocated from the
//! renderer's command pool: record, submit to the graphics queue, wait for
//! the queue to drain, free. Layout transitions are restricted to the two
//! pairs the texture upload path needs; anything else is rejected rather
//! than guessed at.

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// Command pool with RAII cleanup
pub struct CommandPool {
    device: Device,
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool for the given queue family with resettable buffers
    pub fn new(device: Device, queue_family: u32) -> VulkanResult<Self> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe {
            device
                .create_command_pool(&create_info, None)
                .map_err(|result| VulkanError::ResourceCreation {
                    what: "command pool",
                    result,
                })?
        };

        Ok(Self { device, pool })
    }

    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Allocate primary command buffers from this pool
    pub fn allocate(&self, count: u32) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device
                .allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::Api)
        }
    }

    /// Return command buffers to the pool
    pub fn free(&self, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        unsafe {
            self.device.free_command_buffers(self.pool, buffers);
        }
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

/// Source/destination access masks and pipeline stages for an image layout
/// transition barrier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionMasks {
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stage: vk::PipelineStageFlags,
    pub dst_stage: vk::PipelineStageFlags,
}

/// Barrier parameters for the supported layout transitions
pub fn transition_masks(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> VulkanResult<TransitionMasks> {
    match (old, new) {
        (vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::empty(),
                dst_access: vk::AccessFlags::TRANSFER_WRITE,
                src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
                dst_stage: vk::PipelineStageFlags::TRANSFER,
            })
        }
        (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL) => {
            Ok(TransitionMasks {
                src_access: vk::AccessFlags::TRANSFER_WRITE,
                dst_access: vk::AccessFlags::SHADER_READ,
                src_stage: vk::PipelineStageFlags::TRANSFER,
                dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
            })
        }
        (old, new) => Err(VulkanError::UnsupportedTransition { old, new }),
    }
}

/// Borrowed handles needed to record and submit one-shot commands
pub struct TransferContext<'a> {
    device: &'a Device,
    pool: &'a CommandPool,
    queue: vk::Queue,
}

impl<'a> TransferContext<'a> {
    pub fn new(device: &'a Device, pool: &'a CommandPool, queue: vk::Queue) -> Self {
        Self {
            device,
            pool,
            queue,
        }
    }

    fn begin_one_shot(&self) -> VulkanResult<vk::CommandBuffer> {
        let buffer = self.pool.allocate(1)?[0];

        let begin_info = vk::CommandBufferBeginInfo::builder()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        unsafe {
            self.device
                .begin_command_buffer(buffer, &begin_info)
                .map_err(VulkanError::Api)?;
        }
        Ok(buffer)
    }

    fn end_one_shot(&self, buffer: vk::CommandBuffer) -> VulkanResult<()> {
        let result = unsafe {
            self.device
                .end_command_buffer(buffer)
                .map_err(VulkanError::Api)
                .and_then(|_| {
                    let buffers = [buffer];
                    let submit_info = vk::SubmitInfo::builder().command_buffers(&buffers);
                    self.device
                        .queue_submit(self.queue, &[submit_info.build()], vk::Fence::null())
                        .map_err(VulkanError::Api)
                })
                .and_then(|_| {
                    self.device
                        .queue_wait_idle(self.queue)
                        .map_err(VulkanError::Api)
                })
        };
        self.pool.free(&[buffer]);
        result
    }

    /// Copy `size` bytes between buffers
    pub fn copy_buffer(
        &self,
        src: vk::Buffer,
        dst: vk::Buffer,
        size: vk::DeviceSize,
    ) -> VulkanResult<()> {
        let buffer = self.begin_one_shot()?;

        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        unsafe {
            self.device.cmd_copy_buffer(buffer, src, dst, &[region]);
        }

        self.end_one_shot(buffer)
    }

    /// Copy a tightly packed buffer into the color aspect of a 2D image. The
    /// image must already be in TRANSFER_DST_OPTIMAL layout.
    pub fn copy_buffer_to_image(
        &self,
        src: vk::Buffer,
        dst: vk::Image,
        extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        let buffer = self.begin_one_shot()?;

        let region = vk::BufferImageCopy {
            buffer_offset: 0,
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: vk::ImageSubresourceLayers {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                mip_level: 0,
                base_array_layer: 0,
                layer_count: 1,
            },
            image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
            image_extent: vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            },
        };
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                buffer,
                src,
                dst,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );
        }

        self.end_one_shot(buffer)
    }

    /// Transition an image between the supported layouts with a full
    /// subresource-range barrier
    pub fn transition_image_layout(
        &self,
        image: vk::Image,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let masks = transition_masks(old_layout, new_layout)?;

        let buffer = self.begin_one_shot()?;

        let barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            })
            .src_access_mask(masks.src_access)
            .dst_access_mask(masks.dst_access);

        unsafe {
            self.device.cmd_pipeline_barrier(
                buffer,
                masks.src_stage,
                masks.dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[barrier.build()],
            );
        }

        self.end_one_shot(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_transition_waits_on_nothing() {
        let masks = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )
        .expect("supported transition");
        assert_eq!(masks.src_access, vk::AccessFlags::empty());
        assert_eq!(masks.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn sample_transition_orders_write_before_read() {
        let masks = transition_masks(
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )
        .expect("supported transition");
        assert_eq!(masks.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(masks.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(masks.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn unknown_transition_is_rejected() {
        // Skipping the upload step is not a supported path
        let result = transition_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        assert!(matches!(
            result,
            Err(VulkanError::UnsupportedTransition { .. })
        ));

        let result = transition_masks(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        assert!(matches!(
            result,
            Err(VulkanError::UnsupportedTransition { .. })
        ));
    }
}
