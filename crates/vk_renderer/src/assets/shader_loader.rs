//! SPIR-V bytecode loading
//!
//! Shaders are compiled offline (see `scripts/compile_shaders.sh`); at run
//! time the bytes are validated for alignment and magic number and returned
//! as the u32 words `vkCreateShaderModule` expects.

use std::path::Path;
use thiserror::Error;

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Shader loading errors
#[derive(Error, Debug)]
pub enum ShaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SPIR-V length {0} is not a multiple of 4")]
    Misaligned(usize),

    #[error("not SPIR-V: bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("SPIR-V module is empty")]
    Empty,
}

/// Read a SPIR-V file and validate it
pub fn load_spirv<P: AsRef<Path>>(path: P) -> Result<Vec<u32>, ShaderError> {
    let bytes = std::fs::read(path)?;
    parse_spirv(&bytes)
}

/// Validate raw bytes as little-endian SPIR-V words
pub fn parse_spirv(bytes: &[u8]) -> Result<Vec<u32>, ShaderError> {
    if bytes.is_empty() {
        return Err(ShaderError::Empty);
    }
    if bytes.len() % 4 != 0 {
        return Err(ShaderError::Misaligned(bytes.len()));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words[0] != SPIRV_MAGIC {
        return Err(ShaderError::BadMagic(words[0]));
    }

    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_words() {
        let bytes = [
            SPIRV_MAGIC.to_le_bytes(),
            0x0001_0000u32.to_le_bytes(),
        ]
        .concat();
        let words = parse_spirv(&bytes).expect("valid SPIR-V header");
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn rejects_misaligned_input() {
        let result = parse_spirv(&[0x03, 0x02, 0x23]);
        assert!(matches!(result, Err(ShaderError::Misaligned(3))));
    }

    #[test]
    fn rejects_wrong_magic() {
        let bytes = 0xdead_beefu32.to_le_bytes();
        let result = parse_spirv(&bytes);
        assert!(matches!(result, Err(ShaderError::BadMagic(0xdead_beef))));
    }

    #[test]
    fn rejects_empty_input() {
        assert!(matches!(parse_spirv(&[]), Err(ShaderError::Empty)));
    }
}
