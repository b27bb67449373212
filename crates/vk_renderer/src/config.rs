//! Renderer configuration
//!
//! All tunables live in one serializable struct with sensible defaults so the
//! viewer runs without a config file. Values can be overridden from a TOML
//! file passed on the command line.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Window creation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial window width in pixels
    pub width: u32,
    /// Initial window height in pixels
    pub height: u32,
    /// Window title
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Model Viewer".to_string(),
        }
    }
}

/// Shader bytecode locations (precompiled SPIR-V)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex_shader_path: "shaders/model.vert.spv".to_string(),
            fragment_shader_path: "shaders/model.frag.spv".to_string(),
        }
    }
}

/// Top-level renderer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Window parameters
    pub window: WindowConfig,
    /// Upper bound on frames with outstanding GPU work (clamped to >= 1)
    pub max_frames_in_flight: u32,
    /// Force FIFO presentation instead of preferring MAILBOX
    pub vsync: bool,
    /// Path to the wavefront OBJ model to display
    pub model_path: String,
    /// Path to the texture image sampled by the fragment shader
    pub texture_path: String,
    /// Shader bytecode paths
    pub shaders: ShaderConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            max_frames_in_flight: 2,
            vsync: false,
            model_path: "resources/models/model.obj".to_string(),
            texture_path: "resources/textures/model.png".to_string(),
            shaders: ShaderConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Frames-in-flight bound, guarded against a zero value in the file
    pub fn frames_in_flight(&self) -> usize {
        self.max_frames_in_flight.max(1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_values() {
        let config = RendererConfig::default();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.max_frames_in_flight, 2);
        assert!(!config.vsync);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config: RendererConfig = toml::from_str(
            r#"
            max_frames_in_flight = 3
            vsync = true

            [window]
            width = 1280
            "#,
        )
        .expect("valid TOML");
        assert_eq!(config.max_frames_in_flight, 3);
        assert!(config.vsync);
        assert_eq!(config.window.width, 1280);
        // Untouched fields keep their defaults
        assert_eq!(config.window.height, 600);
        assert_eq!(config.shaders.vertex_shader_path, "shaders/model.vert.spv");
    }

    #[test]
    fn round_trips_through_toml() {
        let mut config = RendererConfig::default();
        config.window.width = 1024;
        config.vsync = true;
        config.model_path = "assets/teapot.obj".to_string();

        let serialized = toml::to_string(&config).expect("serializable");
        let parsed: RendererConfig = toml::from_str(&serialized).expect("parseable");
        assert_eq!(parsed.window.width, 1024);
        assert!(parsed.vsync);
        assert_eq!(parsed.model_path, "assets/teapot.obj");
    }

    #[test]
    fn frames_in_flight_never_zero() {
        let mut config = RendererConfig::default();
        config.max_frames_in_flight = 0;
        assert_eq!(config.frames_in_flight(), 1);
    }
}
