//! Renderer core and frame scheduler
//!
//! [`Renderer`] owns the static resources (mesh buffers, texture, shader
//! code, per-slot sync objects) plus the swapchain-dependent state bundled
//! in [`FrameTargets`]. The bundle lives behind an `Option` so recreation
//! can tear it down and rebuild it as a unit while the renderer stays alive.
//!
//! `draw_frame` runs the scheduler: wait on the slot fence, acquire an
//! image, cross-wait on whichever slot last rendered to that image, write
//! the slot's uniform buffer, submit, present. Out-of-date surfaces at
//! acquire abandon the frame without advancing the slot index; at present
//! they recreate after the frame's work is already queued.

use ash::{vk, Device};
use thiserror::Error;

use crate::config::RendererConfig;
use crate::render::{MeshData, UniformBufferObject};

use super::buffer::GpuBuffer;
use super::context::VulkanContext;
use super::descriptor::DescriptorArena;
use super::pipeline::GraphicsPipeline;
use super::swapchain::SwapchainState;
use super::sync::{FrameSync, ImagesInFlight};
use super::texture::Texture;
use super::transfer::{CommandPool, TransferContext};
use super::window::{Window, WindowError};
use super::{VulkanError, VulkanResult};

/// Renderer-level errors
#[derive(Error, Debug)]
pub enum RendererError {
    #[error(transparent)]
    Vulkan(#[from] VulkanError),

    #[error(transparent)]
    Window(#[from] WindowError),
}

/// Outcome of a completed `draw_frame` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and queued for presentation
    Presented,
    /// The swapchain was rebuilt; the caller's next frame renders at the
    /// new extent
    SwapchainRecreated,
}

/// Typed result of an image acquire. Out-of-date is an expected state, not
/// an error; everything else unexpected is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcquireOutcome {
    Acquired { index: u32, suboptimal: bool },
    OutOfDate,
}

fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> VulkanResult<AcquireOutcome> {
    match result {
        Ok((index, suboptimal)) => Ok(AcquireOutcome::Acquired { index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
        Err(result) => Err(VulkanError::Presentation(result)),
    }
}

/// Everything that must be rebuilt together when the surface changes
struct FrameTargets {
    command_buffers: Vec<vk::CommandBuffer>,
    descriptors: DescriptorArena,
    uniform_buffers: Vec<GpuBuffer>,
    pipeline: GraphicsPipeline,
    swapchain: SwapchainState,
}

/// Vulkan renderer for a single textured mesh
pub struct Renderer {
    index_count: u32,
    vertex_buffer: GpuBuffer,
    index_buffer: GpuBuffer,
    texture: Texture,
    vert_code: Vec<u32>,
    frag_code: Vec<u32>,
    targets: Option<FrameTargets>,
    frames: Vec<FrameSync>,
    images_in_flight: ImagesInFlight,
    current_frame: usize,
    command_pool: CommandPool,
    vsync: bool,
    // Dropped last so every wrapper above outlives its device
    ctx: VulkanContext,
}

impl Renderer {
    /// Upload the mesh and texture, build the first set of presentation
    /// targets and the per-slot synchronization objects
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        window: &mut Window,
        config: &RendererConfig,
        mesh: &MeshData,
        texture_pixels: &[u8],
        texture_width: u32,
        texture_height: u32,
        vert_code: Vec<u32>,
        frag_code: Vec<u32>,
    ) -> Result<Self, RendererError> {
        let ctx = VulkanContext::new(window, &config.window.title)?;
        let device = ctx.raw_device();

        let command_pool = CommandPool::new(device.clone(), ctx.queue_families().graphics)?;

        let (vertex_buffer, index_buffer, texture) = {
            let transfer = TransferContext::new(&device, &command_pool, ctx.graphics_queue());
            let vertex_buffer = GpuBuffer::device_local_with_data(
                &ctx,
                &transfer,
                mesh.vertex_bytes(),
                vk::BufferUsageFlags::VERTEX_BUFFER,
            )?;
            let index_buffer = GpuBuffer::device_local_with_data(
                &ctx,
                &transfer,
                mesh.index_bytes(),
                vk::BufferUsageFlags::INDEX_BUFFER,
            )?;
            let texture = Texture::from_pixels(
                &ctx,
                &transfer,
                texture_pixels,
                texture_width,
                texture_height,
            )?;
            (vertex_buffer, index_buffer, texture)
        };

        let index_count = mesh.indices.len() as u32;

        let frames = (0..config.frames_in_flight())
            .map(|_| FrameSync::new(device.clone()))
            .collect::<VulkanResult<Vec<_>>>()?;

        let targets = Self::build_targets(
            &ctx,
            &command_pool,
            window.get_framebuffer_size(),
            config.vsync,
            &vert_code,
            &frag_code,
            vertex_buffer.handle(),
            index_buffer.handle(),
            index_count,
            &texture,
        )?;
        let images_in_flight = ImagesInFlight::new(targets.swapchain.image_count());

        log::info!(
            "Renderer initialized: {} indices, {} frames in flight",
            index_count,
            frames.len()
        );

        Ok(Self {
            index_count,
            vertex_buffer,
            index_buffer,
            texture,
            vert_code,
            frag_code,
            targets: Some(targets),
            frames,
            images_in_flight,
            current_frame: 0,
            command_pool,
            vsync: config.vsync,
            ctx,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn build_targets(
        ctx: &VulkanContext,
        command_pool: &CommandPool,
        framebuffer_size: (u32, u32),
        vsync: bool,
        vert_code: &[u32],
        frag_code: &[u32],
        vertex_buffer: vk::Buffer,
        index_buffer: vk::Buffer,
        index_count: u32,
        texture: &Texture,
    ) -> VulkanResult<FrameTargets> {
        let device = ctx.raw_device();

        let swapchain = SwapchainState::new(ctx, framebuffer_size, vsync)?;
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            swapchain.render_pass(),
            swapchain.extent(),
            vert_code,
            frag_code,
        )?;

        let ubo_size = std::mem::size_of::<UniformBufferObject>() as vk::DeviceSize;
        let uniform_buffers = (0..swapchain.image_count())
            .map(|_| GpuBuffer::uniform(ctx, ubo_size))
            .collect::<VulkanResult<Vec<_>>>()?;

        let descriptors = DescriptorArena::new(
            device.clone(),
            pipeline.descriptor_set_layout(),
            &uniform_buffers,
            texture,
        )?;

        let command_buffers = command_pool.allocate(swapchain.image_count() as u32)?;
        if let Err(e) = Self::record_commands(
            &device,
            &command_buffers,
            &swapchain,
            &pipeline,
            &descriptors,
            vertex_buffer,
            index_buffer,
            index_count,
        ) {
            command_pool.free(&command_buffers);
            return Err(e);
        }

        Ok(FrameTargets {
            command_buffers,
            descriptors,
            uniform_buffers,
            pipeline,
            swapchain,
        })
    }

    /// Record the static draw into one command buffer per swapchain image
    #[allow(clippy::too_many_arguments)]
    fn record_commands(
        device: &Device,
        command_buffers: &[vk::CommandBuffer],
        swapchain: &SwapchainState,
        pipeline: &GraphicsPipeline,
        descriptors: &DescriptorArena,
        vertex_buffer: vk::Buffer,
        index_buffer: vk::Buffer,
        index_count: u32,
    ) -> VulkanResult<()> {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: [0.0, 0.0, 0.0, 1.0],
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
        ];

        for (image_index, &command_buffer) in command_buffers.iter().enumerate() {
            let begin_info = vk::CommandBufferBeginInfo::builder();
            unsafe {
                device
                    .begin_command_buffer(command_buffer, &begin_info)
                    .map_err(VulkanError::Api)?;
            }

            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(swapchain.render_pass())
                .framebuffer(swapchain.framebuffer(image_index))
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent: swapchain.extent(),
                })
                .clear_values(&clear_values);

            unsafe {
                device.cmd_begin_render_pass(
                    command_buffer,
                    &render_pass_info,
                    vk::SubpassContents::INLINE,
                );
                device.cmd_bind_pipeline(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline.handle(),
                );
                device.cmd_bind_vertex_buffers(command_buffer, 0, &[vertex_buffer], &[0]);
                device.cmd_bind_index_buffer(
                    command_buffer,
                    index_buffer,
                    0,
                    vk::IndexType::UINT32,
                );
                device.cmd_bind_descriptor_sets(
                    command_buffer,
                    vk::PipelineBindPoint::GRAPHICS,
                    pipeline.layout(),
                    0,
                    &[descriptors.set(image_index)],
                    &[],
                );
                device.cmd_draw_indexed(command_buffer, index_count, 1, 0, 0, 0);
                device.cmd_end_render_pass(command_buffer);
                device
                    .end_command_buffer(command_buffer)
                    .map_err(VulkanError::Api)?;
            }
        }

        Ok(())
    }

    fn targets(&self) -> VulkanResult<&FrameTargets> {
        self.targets.as_ref().ok_or_else(|| {
            VulkanError::InitializationFailed("presentation targets not built".to_string())
        })
    }

    /// Width over height of the current swapchain extent
    pub fn aspect_ratio(&self) -> f32 {
        match &self.targets {
            Some(targets) => {
                let extent = targets.swapchain.extent();
                extent.width as f32 / extent.height.max(1) as f32
            }
            None => 1.0,
        }
    }

    /// Render and present one frame with the given per-frame uniforms
    pub fn draw_frame(
        &mut self,
        window: &mut Window,
        ubo: &UniformBufferObject,
    ) -> Result<FrameStatus, RendererError> {
        // A previous recreation may have failed partway through
        if self.targets.is_none() {
            self.recreate_swapchain(window)?;
        }

        let device = self.ctx.raw_device();
        let image_available = self.frames[self.current_frame].image_available.handle();
        let render_finished = self.frames[self.current_frame].render_finished.handle();
        let in_flight = self.frames[self.current_frame].in_flight.handle();
        let swapchain = self.targets()?.swapchain.swapchain.handle();

        // 1. Wait for this slot's previous frame to finish
        self.frames[self.current_frame]
            .in_flight
            .wait(u64::MAX)
            .map_err(RendererError::Vulkan)?;

        // 2. Acquire. An out-of-date surface abandons the frame without
        //    advancing the slot: nothing was submitted, so the slot's
        //    semaphores and fence remain in a known state.
        let acquire_result = unsafe {
            self.ctx.swapchain_loader().acquire_next_image(
                swapchain,
                u64::MAX,
                image_available,
                vk::Fence::null(),
            )
        };
        let image_index = match classify_acquire(acquire_result).map_err(RendererError::Vulkan)? {
            AcquireOutcome::Acquired { index, .. } => index as usize,
            AcquireOutcome::OutOfDate => {
                self.recreate_swapchain(window)?;
                return Ok(FrameStatus::SwapchainRecreated);
            }
        };

        // 3. If another slot still has work in flight against this image,
        //    wait it out before reusing the image's resources
        if let Some(fence) = self.images_in_flight.fence_to_wait(image_index, in_flight) {
            unsafe {
                device
                    .wait_for_fences(&[fence], true, u64::MAX)
                    .map_err(VulkanError::Api)
                    .map_err(RendererError::Vulkan)?;
            }
        }
        self.images_in_flight.claim(image_index, in_flight);

        // 4. Write this image's uniforms while nothing references them
        self.targets()?.uniform_buffers[image_index]
            .write_data(ubo)
            .map_err(RendererError::Vulkan)?;

        let command_buffer = self.targets()?.command_buffers[image_index];

        // 5. Submit, fencing the slot
        self.frames[self.current_frame]
            .in_flight
            .reset()
            .map_err(RendererError::Vulkan)?;

        let wait_semaphores = [image_available];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [render_finished];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            device
                .queue_submit(self.ctx.graphics_queue(), &[submit_info.build()], in_flight)
                .map_err(VulkanError::Api)
                .map_err(RendererError::Vulkan)?;
        }

        // 6. Present
        let present_wait = [render_finished];
        let swapchains = [swapchain];
        let image_indices = [image_index as u32];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&present_wait)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let present_result = unsafe {
            self.ctx
                .swapchain_loader()
                .queue_present(self.ctx.present_queue(), &present_info)
        };

        let resized = window.take_resized_flag();
        let needs_recreate = match present_result {
            Ok(suboptimal) => suboptimal || resized,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => true,
            Err(result) => return Err(VulkanError::Presentation(result).into()),
        };

        let status = if needs_recreate {
            self.recreate_swapchain(window)?;
            FrameStatus::SwapchainRecreated
        } else {
            FrameStatus::Presented
        };

        // 7. Work was submitted, advance to the next slot
        self.current_frame = (self.current_frame + 1) % self.frames.len();

        Ok(status)
    }

    /// Tear down and rebuild everything sized to the surface. Spins while
    /// the framebuffer is zero-sized (minimized window).
    pub fn recreate_swapchain(&mut self, window: &mut Window) -> Result<(), RendererError> {
        let framebuffer_size = window.wait_for_nonzero_framebuffer();

        self.ctx.wait_idle()?;

        if let Some(targets) = self.targets.take() {
            self.command_pool.free(&targets.command_buffers);
        }

        let targets = Self::build_targets(
            &self.ctx,
            &self.command_pool,
            framebuffer_size,
            self.vsync,
            &self.vert_code,
            &self.frag_code,
            self.vertex_buffer.handle(),
            self.index_buffer.handle(),
            self.index_count,
            &self.texture,
        )?;
        self.images_in_flight.reset(targets.swapchain.image_count());
        self.targets = Some(targets);

        log::info!(
            "Swapchain recreated at {}x{}",
            framebuffer_size.0,
            framebuffer_size.1
        );

        Ok(())
    }

    /// Block until all submitted GPU work completes
    pub fn wait_idle(&self) -> Result<(), RendererError> {
        Ok(self.ctx.wait_idle()?)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // GPU work must drain before any owned resource is destroyed
        let _ = self.ctx.wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_acquire_carries_index_and_suboptimal_flag() {
        let outcome = classify_acquire(Ok((2, true))).expect("not an error");
        assert_eq!(
            outcome,
            AcquireOutcome::Acquired {
                index: 2,
                suboptimal: true
            }
        );
    }

    #[test]
    fn out_of_date_acquire_is_a_state_not_an_error() {
        let outcome =
            classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).expect("not an error");
        assert_eq!(outcome, AcquireOutcome::OutOfDate);
    }

    #[test]
    fn device_loss_at_acquire_is_fatal() {
        let result = classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST));
        assert!(matches!(
            result,
            Err(VulkanError::Presentation(vk::Result::ERROR_DEVICE_LOST))
        ));
    }
}
