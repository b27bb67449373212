//! Sampled textures
//!
//! A texture is an sRGB RGBA8 device-local image uploaded through a staging
//! buffer, plus the view and sampler the descriptor sets bind. The upload
//! transitions the image UNDEFINED -> TRANSFER_DST before the copy and
//! TRANSFER_DST -> SHADER_READ_ONLY after it.

use ash::vk::Handle;
use ash::{vk, Device};

use super::buffer::GpuBuffer;
use super::context::VulkanContext;
use super::image::{create_image_view, GpuImage};
use super::tracker;
use super::transfer::TransferContext;
use super::{VulkanError, VulkanResult};

/// The staging copy reads exactly width * height * 4 bytes; a short buffer
/// would make the GPU read past the staging allocation.
fn check_pixel_data_size(len: usize, width: u32, height: u32) -> VulkanResult<()> {
    let expected = width as usize * height as usize * 4;
    if len != expected {
        return Err(VulkanError::PixelDataSize {
            width,
            height,
            expected,
            actual: len,
        });
    }
    Ok(())
}

/// Device-local sampled image with its view and sampler
pub struct Texture {
    device: Device,
    sampler: vk::Sampler,
    view: vk::ImageView,
    image: GpuImage,
}

impl Texture {
    /// Upload tightly packed RGBA8 pixels and make them shader-visible
    pub fn from_pixels(
        ctx: &VulkanContext,
        transfer: &TransferContext,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> VulkanResult<Self> {
        check_pixel_data_size(pixels.len(), width, height)?;

        let device = ctx.raw_device();
        let extent = vk::Extent2D { width, height };

        let staging = GpuBuffer::staging(ctx, pixels)?;

        let image = GpuImage::new(
            ctx,
            extent,
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        transfer.transition_image_layout(
            image.handle(),
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        )?;
        transfer.copy_buffer_to_image(staging.handle(), image.handle(), extent)?;
        transfer.transition_image_layout(
            image.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        )?;

        let view = create_image_view(
            &device,
            image.handle(),
            vk::Format::R8G8B8A8_SRGB,
            vk::ImageAspectFlags::COLOR,
        )?;

        let sampler = match Self::create_sampler(&device, ctx.physical_device.max_sampler_anisotropy())
        {
            Ok(sampler) => sampler,
            Err(e) => {
                unsafe { device.destroy_image_view(view, None) };
                return Err(e);
            }
        };

        tracker::track("sampler", sampler.as_raw());

        log::info!("Texture uploaded: {}x{}", width, height);

        Ok(Self {
            device,
            sampler,
            view,
            image,
        })
    }

    fn create_sampler(device: &Device, device_max_anisotropy: f32) -> VulkanResult<vk::Sampler> {
        let sampler_info = vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(true)
            .max_anisotropy(device_max_anisotropy.min(16.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(0.0);

        unsafe {
            device
                .create_sampler(&sampler_info, None)
                .map_err(|result| VulkanError::ResourceCreation {
                    what: "sampler",
                    result,
                })
        }
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.image.extent()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        tracker::untrack("sampler", self.sampler.as_raw());
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.view, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_rgba8_buffer_passes() {
        assert!(check_pixel_data_size(2 * 2 * 4, 2, 2).is_ok());
    }

    #[test]
    fn short_pixel_buffer_is_rejected() {
        let result = check_pixel_data_size(2 * 2 * 3, 2, 2);
        assert!(matches!(
            result,
            Err(VulkanError::PixelDataSize {
                expected: 16,
                actual: 12,
                ..
            })
        ));
    }

    #[test]
    fn oversized_pixel_buffer_is_rejected() {
        assert!(check_pixel_data_size(64, 2, 2).is_err());
    }
}
