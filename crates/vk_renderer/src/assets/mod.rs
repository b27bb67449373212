//! Asset loading
//!
//! Loaders convert external formats into the flat data the renderer uploads:
//! wavefront OBJ meshes into vertex/index arrays, images into RGBA8 pixel
//! buffers, SPIR-V files into validated word vectors.

pub mod image_loader;
pub mod obj_loader;
pub mod shader_loader;

pub use image_loader::{load_texture, TextureData, TextureError};
pub use obj_loader::{load_obj, ModelError};
pub use shader_loader::{load_spirv, ShaderError};
