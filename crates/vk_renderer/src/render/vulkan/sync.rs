//! Frame synchronization primitives
//!
//! Each in-flight frame slot owns an independent [`FrameSync`] trio: an
//! acquire semaphore, a render-finished semaphore, and a fence created
//! signaled so the first wait on every slot passes immediately.
//! [`ImagesInFlight`] records which slot fence last submitted work against
//! each swapchain image, closing the race where an image comes back from the
//! presentation engine while an older frame still renders to it.

use ash::{vk, Device};

use super::{VulkanError, VulkanResult};

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    device: Device,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Device) -> VulkanResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::builder();

        let semaphore = unsafe {
            device
                .create_semaphore(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, semaphore })
    }

    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Device,
    fence: vk::Fence,
}

impl Fence {
    pub fn new(device: Device, signaled: bool) -> VulkanResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::builder().flags(flags);

        let fence = unsafe {
            device
                .create_fence(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, fence })
    }

    /// Block until the fence signals
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, timeout)
                .map_err(VulkanError::Api)
        }
    }

    /// Return the fence to the unsignaled state
    pub fn reset(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(VulkanError::Api)
        }
    }

    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_fence(self.fence, None);
        }
    }
}

/// Synchronization objects for one in-flight frame slot
pub struct FrameSync {
    /// Signaled when the acquired swapchain image is ready to render to
    pub image_available: Semaphore,
    /// Signaled when rendering commands finish, waited on by present
    pub render_finished: Semaphore,
    /// Signaled when the slot's submitted work completes on the GPU
    pub in_flight: Fence,
}

impl FrameSync {
    pub fn new(device: Device) -> VulkanResult<Self> {
        Ok(Self {
            image_available: Semaphore::new(device.clone())?,
            render_finished: Semaphore::new(device.clone())?,
            // Signaled so the first frame's wait returns immediately
            in_flight: Fence::new(device, true)?,
        })
    }
}

/// Per-swapchain-image record of the slot fence that last rendered to it
pub struct ImagesInFlight {
    fences: Vec<vk::Fence>,
}

impl ImagesInFlight {
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![vk::Fence::null(); image_count],
        }
    }

    /// Clear all records, e.g. after swapchain recreation
    pub fn reset(&mut self, image_count: usize) {
        self.fences.clear();
        self.fences.resize(image_count, vk::Fence::null());
    }

    /// Fence to wait on before reusing `image_index`, if a previous frame's
    /// work against that image may still be pending. No wait is needed when
    /// the image has never been rendered to or when the owning slot is the
    /// current one (its fence was already waited on this frame).
    pub fn fence_to_wait(&self, image_index: usize, current_slot_fence: vk::Fence) -> Option<vk::Fence> {
        let fence = self.fences[image_index];
        if fence == vk::Fence::null() || fence == current_slot_fence {
            None
        } else {
            Some(fence)
        }
    }

    /// Mark `image_index` as owned by the current slot's fence
    pub fn claim(&mut self, image_index: usize, fence: vk::Fence) {
        self.fences[image_index] = fence;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn fence(raw: u64) -> vk::Fence {
        vk::Fence::from_raw(raw)
    }

    #[test]
    fn untouched_image_needs_no_wait() {
        let images = ImagesInFlight::new(3);
        assert_eq!(images.fence_to_wait(0, fence(1)), None);
        assert_eq!(images.fence_to_wait(2, fence(1)), None);
    }

    #[test]
    fn image_owned_by_other_slot_needs_wait() {
        let mut images = ImagesInFlight::new(3);
        images.claim(1, fence(7));
        assert_eq!(images.fence_to_wait(1, fence(9)), Some(fence(7)));
    }

    #[test]
    fn image_owned_by_current_slot_needs_no_wait() {
        let mut images = ImagesInFlight::new(3);
        images.claim(1, fence(7));
        assert_eq!(images.fence_to_wait(1, fence(7)), None);
    }

    #[test]
    fn reset_clears_ownership() {
        let mut images = ImagesInFlight::new(2);
        images.claim(0, fence(7));
        images.reset(4);
        assert_eq!(images.fence_to_wait(0, fence(9)), None);
        assert_eq!(images.fence_to_wait(3, fence(9)), None);
    }
}
