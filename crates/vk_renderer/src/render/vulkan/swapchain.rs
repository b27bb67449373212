//! Swapchain and presentation targets
//!
//! [`Swapchain`] wraps the raw chain plus its image views. [`SwapchainState`]
//! layers the depth attachment, render pass and framebuffers on top, which is
//! exactly the set of objects that must be rebuilt together when the surface
//! resizes or reports out-of-date. The choose_* helpers are pure functions
//! over queried surface data so the selection rules stay testable.

use ash::{vk, Device};

use super::context::VulkanContext;
use super::image::{create_image_view, GpuImage};
use super::{VulkanError, VulkanResult};

/// Preferred surface format: sRGB BGRA8 with an sRGB colorspace, falling
/// back to whatever the surface lists first.
///
/// `formats` must be non-empty; device selection rejects devices with an
/// empty surface format set.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    debug_assert!(!formats.is_empty(), "surface reported no formats");
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .copied()
        .unwrap_or(formats[0])
}

/// MAILBOX when available and vsync is off, otherwise FIFO (always present)
pub fn choose_present_mode(modes: &[vk::PresentModeKHR], vsync: bool) -> vk::PresentModeKHR {
    if !vsync && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Surface extent: the surface-mandated extent when fixed, otherwise the
/// framebuffer size clamped to the surface bounds
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer_size: (u32, u32),
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer_size.0.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: framebuffer_size.1.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One more image than the minimum so the renderer rarely waits on the
/// presentation engine, clamped to the maximum when one exists (0 = none)
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 && count > capabilities.max_image_count {
        count = capabilities.max_image_count;
    }
    count
}

/// Swapchain with its images and views
pub struct Swapchain {
    device: Device,
    loader: ash::extensions::khr::Swapchain,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain sized to the current framebuffer
    pub fn new(
        ctx: &VulkanContext,
        framebuffer_size: (u32, u32),
        vsync: bool,
    ) -> VulkanResult<Self> {
        let physical = ctx.physical_device.device;
        let capabilities = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_capabilities(physical, ctx.surface)
                .map_err(VulkanError::Api)?
        };
        let formats = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_formats(physical, ctx.surface)
                .map_err(VulkanError::Api)?
        };
        let present_modes = unsafe {
            ctx.surface_loader
                .get_physical_device_surface_present_modes(physical, ctx.surface)
                .map_err(VulkanError::Api)?
        };

        let surface_format = choose_surface_format(&formats);
        let present_mode = choose_present_mode(&present_modes, vsync);
        let extent = choose_extent(&capabilities, framebuffer_size);
        let image_count = choose_image_count(&capabilities);

        let families = ctx.queue_families();
        let family_indices = [families.graphics, families.present];

        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(ctx.surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        // Images used by distinct queue families need concurrent sharing
        create_info = if families.are_separate() {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&family_indices)
        } else {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        };

        let loader = ctx.swapchain_loader().clone();
        let swapchain = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(|result| VulkanError::ResourceCreation {
                    what: "swapchain",
                    result,
                })?
        };

        let device = ctx.raw_device();
        let images = unsafe {
            loader
                .get_swapchain_images(swapchain)
                .map_err(VulkanError::Api)?
        };

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            match create_image_view(
                &device,
                image,
                surface_format.format,
                vk::ImageAspectFlags::COLOR,
            ) {
                Ok(view) => image_views.push(view),
                Err(e) => {
                    unsafe {
                        for view in image_views {
                            device.destroy_image_view(view, None);
                        }
                        loader.destroy_swapchain(swapchain, None);
                    }
                    return Err(e);
                }
            }
        }

        log::info!(
            "Swapchain created: {}x{}, {} images, {:?}",
            extent.width,
            extent.height,
            images.len(),
            present_mode
        );

        Ok(Self {
            device,
            loader,
            swapchain,
            images,
            image_views,
            format: surface_format.format,
            extent,
        })
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    pub fn loader(&self) -> &ash::extensions::khr::Swapchain {
        &self.loader
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn format(&self) -> vk::Format {
        self.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

/// Swapchain plus everything sized to it: depth attachment, render pass and
/// per-image framebuffers. Rebuilt wholesale on resize.
pub struct SwapchainState {
    device: Device,
    framebuffers: Vec<vk::Framebuffer>,
    render_pass: vk::RenderPass,
    depth_view: vk::ImageView,
    // RAII fields drop after the raw handles above are destroyed
    _depth_image: GpuImage,
    pub swapchain: Swapchain,
}

impl SwapchainState {
    pub fn new(
        ctx: &VulkanContext,
        framebuffer_size: (u32, u32),
        vsync: bool,
    ) -> VulkanResult<Self> {
        let swapchain = Swapchain::new(ctx, framebuffer_size, vsync)?;
        let device = ctx.raw_device();

        let depth_format = ctx.find_depth_format()?;
        let depth_image = GpuImage::new(
            ctx,
            swapchain.extent(),
            depth_format,
            vk::ImageTiling::OPTIMAL,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let depth_view = create_image_view(
            &device,
            depth_image.handle(),
            depth_format,
            vk::ImageAspectFlags::DEPTH,
        )?;

        let render_pass = match Self::create_render_pass(&device, swapchain.format(), depth_format)
        {
            Ok(render_pass) => render_pass,
            Err(e) => {
                unsafe { device.destroy_image_view(depth_view, None) };
                return Err(e);
            }
        };

        let mut framebuffers = Vec::with_capacity(swapchain.image_count());
        for &color_view in swapchain.image_views() {
            let attachments = [color_view, depth_view];
            let framebuffer_info = vk::FramebufferCreateInfo::builder()
                .render_pass(render_pass)
                .attachments(&attachments)
                .width(swapchain.extent().width)
                .height(swapchain.extent().height)
                .layers(1);

            match unsafe { device.create_framebuffer(&framebuffer_info, None) } {
                Ok(framebuffer) => framebuffers.push(framebuffer),
                Err(result) => {
                    unsafe {
                        for framebuffer in framebuffers {
                            device.destroy_framebuffer(framebuffer, None);
                        }
                        device.destroy_render_pass(render_pass, None);
                        device.destroy_image_view(depth_view, None);
                    }
                    return Err(VulkanError::ResourceCreation {
                        what: "framebuffer",
                        result,
                    });
                }
            }
        }

        Ok(Self {
            device,
            framebuffers,
            render_pass,
            depth_view,
            _depth_image: depth_image,
            swapchain,
        })
    }

    fn create_render_pass(
        device: &Device,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> VulkanResult<vk::RenderPass> {
        let attachments = [
            // Color: clear on load, keep for presentation
            vk::AttachmentDescription {
                format: color_format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::STORE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
                ..Default::default()
            },
            // Depth: clear on load, contents discarded after the pass
            vk::AttachmentDescription {
                format: depth_format,
                samples: vk::SampleCountFlags::TYPE_1,
                load_op: vk::AttachmentLoadOp::CLEAR,
                store_op: vk::AttachmentStoreOp::DONT_CARE,
                stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
                stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
                initial_layout: vk::ImageLayout::UNDEFINED,
                final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                ..Default::default()
            },
        ];

        let color_ref = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = vk::AttachmentReference {
            attachment: 1,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        };

        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_ref)
            .depth_stencil_attachment(&depth_ref);

        // Delay attachment writes until the acquire semaphore's stage
        let dependency = vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            src_access_mask: vk::AccessFlags::empty(),
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
                | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ
                | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            ..Default::default()
        };

        let subpasses = [subpass.build()];
        let dependencies = [dependency];
        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe {
            device
                .create_render_pass(&render_pass_info, None)
                .map_err(|result| VulkanError::ResourceCreation {
                    what: "render pass",
                    result,
                })
        }
    }

    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    pub fn framebuffer(&self, image_index: usize) -> vk::Framebuffer {
        self.framebuffers[image_index]
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }
}

impl Drop for SwapchainState {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            self.device.destroy_render_pass(self.render_pass, None);
            self.device.destroy_image_view(self.depth_view, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space,
        }
    }

    #[test]
    fn surface_format_prefers_bgra8_srgb() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn surface_format_falls_back_to_first() {
        let formats = [format(
            vk::Format::R8G8B8A8_UNORM,
            vk::ColorSpaceKHR::SRGB_NONLINEAR,
        )];
        let chosen = choose_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);
    }

    #[test]
    #[should_panic]
    fn surface_format_requires_candidates() {
        let _ = choose_surface_format(&[]);
    }

    #[test]
    fn present_mode_prefers_mailbox_without_vsync() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&modes, false),
            vk::PresentModeKHR::MAILBOX
        );
    }

    #[test]
    fn present_mode_vsync_forces_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(choose_present_mode(&modes, true), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn present_mode_defaults_to_fifo() {
        let modes = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE];
        assert_eq!(choose_present_mode(&modes, false), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn extent_uses_surface_mandated_size() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, (1920, 1080));
        assert_eq!(extent.width, 640);
        assert_eq!(extent.height, 480);
    }

    #[test]
    fn extent_clamps_framebuffer_size_when_flexible() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
            max_image_extent: vk::Extent2D {
                width: 1000,
                height: 1000,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, (2000, 50));
        assert_eq!(extent.width, 1000);
        assert_eq!(extent.height, 100);
    }

    #[test]
    fn extent_clamps_zero_framebuffer_to_surface_minimum() {
        // A minimized window never reaches here (the renderer waits for a
        // renderable framebuffer first), but the clamp still holds the floor.
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };
        let extent = choose_extent(&capabilities, (0, 0));
        assert_eq!(extent.width, 1);
        assert_eq!(extent.height, 1);
    }

    #[test]
    fn image_count_is_min_plus_one() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0, // no upper bound
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);
    }

    #[test]
    fn image_count_respects_maximum() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 3,
            ..Default::default()
        };
        assert_eq!(choose_image_count(&capabilities), 3);
    }
}
