//! Vulkan backend
//!
//! Module layout mirrors the GPU object lifecycle: [`context`] selects the
//! device and owns the instance/surface/device trio, [`buffer`] and [`image`]
//! wrap memory-backed resources, [`transfer`] runs one-shot copy commands,
//! [`swapchain`] owns the presentation chain plus its render pass and
//! framebuffers, [`pipeline`] builds the fixed graphics pipeline, and
//! [`renderer`] ties everything together under the per-frame scheduler in
//! [`sync`].

pub mod buffer;
pub mod context;
pub mod descriptor;
pub mod image;
pub mod pipeline;
pub mod renderer;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod tracker;
pub mod transfer;
pub mod window;

pub use buffer::GpuBuffer;
pub use context::VulkanContext;
pub use descriptor::DescriptorArena;
pub use image::GpuImage;
pub use pipeline::GraphicsPipeline;
pub use renderer::{FrameStatus, Renderer, RendererError};
pub use swapchain::SwapchainState;
pub use texture::Texture;
pub use transfer::TransferContext;
pub use window::{Window, WindowError};

use ash::vk;
use thiserror::Error;

/// Errors raised by the Vulkan backend
#[derive(Error, Debug)]
pub enum VulkanError {
    #[error("Vulkan API error: {0}")]
    Api(vk::Result),

    #[error("no suitable physical device found")]
    NoSuitableDevice,

    #[error("no suitable memory type for requested properties")]
    NoSuitableMemoryType,

    #[error("none of the candidate formats are supported")]
    NoSupportedFormat,

    #[error("failed to create {what}: {result}")]
    ResourceCreation {
        what: &'static str,
        result: vk::Result,
    },

    #[error("pixel data is {actual} bytes but a {width}x{height} RGBA8 image needs {expected}")]
    PixelDataSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported image layout transition: {old:?} -> {new:?}")]
    UnsupportedTransition {
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    },

    #[error("presentation failed: {0}")]
    Presentation(vk::Result),

    #[error("initialization failed: {0}")]
    InitializationFailed(String),
}

/// Convenience alias used throughout the backend
pub type VulkanResult<T> = Result<T, VulkanError>;
