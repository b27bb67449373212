//! Texture image loading
//!
//! Decodes an image file and converts it to tightly packed RGBA8, the only
//! pixel format the texture upload path accepts.

use std::path::Path;
use thiserror::Error;

/// Texture loading errors
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("image has zero extent")]
    ZeroExtent,
}

/// Decoded RGBA8 pixels ready for upload
pub struct TextureData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Load an image file as RGBA8
pub fn load_texture<P: AsRef<Path>>(path: P) -> Result<TextureData, TextureError> {
    let image = image::open(path)?.to_rgba8();
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(TextureError::ZeroExtent);
    }

    Ok(TextureData {
        pixels: image.into_raw(),
        width,
        height,
    })
}
