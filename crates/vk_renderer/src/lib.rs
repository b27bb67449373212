//! # vk_renderer
//!
//! A small Vulkan forward renderer built on `ash`. The crate owns the full
//! GPU lifecycle for a textured-model viewer: device selection, buffer and
//! image allocation, one-shot transfer submission, swapchain management with
//! resize recreation, a fixed graphics pipeline, and the fence/semaphore
//! frame scheduler that bounds the number of frames in flight.
//!
//! Asset loading (OBJ meshes, texture images, SPIR-V bytecode) lives in
//! [`assets`] behind narrow interfaces; the renderer core only ever sees
//! flat vertex/index arrays, RGBA8 pixel buffers and SPIR-V words.

pub mod assets;
pub mod config;
pub mod render;
pub mod scene;

pub use config::{ConfigError, RendererConfig};
pub use render::camera::Camera;
pub use render::vulkan::{
    FrameStatus, Renderer, RendererError, VulkanError, VulkanResult, Window, WindowError,
};
pub use render::{MeshData, UniformBufferObject, Vertex};
pub use scene::{NodeKey, SceneGraph, SceneNode};
