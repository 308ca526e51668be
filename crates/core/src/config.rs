//! Engine configuration loaded from TOML.
//!
//! Every section falls back to its defaults, so a partial file (or no file at
//! all) still yields a usable configuration.
//!
//! ```toml
//! [window]
//! title = "Skinned Viewer"
//! width = 1600
//!
//! [graphics]
//! shader_dir = "assets/shaders"
//!
//! [controller]
//! movement_speed = 8.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Top-level configuration for the engine and its viewer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window settings.
    pub window: WindowConfig,
    /// Graphics device settings.
    pub graphics: GraphicsConfig,
    /// Tunables of the player controller.
    pub controller: ControllerSettings,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Window settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Skinned Viewer".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Graphics device settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    /// Name reported to the Vulkan driver.
    pub application_name: String,
    /// Enables the Khronos validation layer and debug messenger.
    pub enable_validation: bool,
    /// Color the swapchain render pass clears to.
    pub clear_color: [f32; 4],
    /// Directory holding the compiled `.spv` shaders.
    pub shader_dir: PathBuf,
    /// Draws a billboard for every point light.
    pub draw_point_lights: bool,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            application_name: "Skinned Viewer".to_string(),
            enable_validation: cfg!(debug_assertions),
            clear_color: [0.005, 0.005, 0.005, 1.0],
            shader_dir: PathBuf::from("shaders"),
            draw_point_lights: true,
        }
    }
}

/// Player controller tunables.
///
/// Passed by reference to the controller; overlays that want to tweak movement
/// edit this struct instead of reaching into the controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    /// Units per second.
    pub movement_speed: f32,
    /// Scales raw mouse deltas before they become radians.
    pub mouse_sensitivity: f32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            movement_speed: 5.0,
            mouse_sensitivity: 0.1,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,engine=debug".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not valid TOML or has
    /// mistyped fields.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads a configuration file, falling back to defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// A file that exists but cannot be read or parsed is still an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match Self::load(path) {
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            other => other,
        }
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.controller.movement_speed, 5.0);
        assert_eq!(config.controller.mouse_sensitivity, 0.1);
        assert_eq!(config.graphics.clear_color, [0.005, 0.005, 0.005, 1.0]);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [window]
            width = 1920

            [controller]
            movement_speed = 8.0
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1920);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.window.title, "Skinned Viewer");
        assert_eq!(config.controller.movement_speed, 8.0);
        assert_eq!(config.controller.mouse_sensitivity, 0.1);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_shader_settings() {
        let defaults = GraphicsConfig::default();
        assert_eq!(defaults.shader_dir, PathBuf::from("shaders"));
        assert!(defaults.draw_point_lights);

        let config = EngineConfig::from_toml_str(
            r#"
            [graphics]
            shader_dir = "assets/spv"
            draw_point_lights = false
            "#,
        )
        .unwrap();
        assert_eq!(config.graphics.shader_dir, PathBuf::from("assets/spv"));
        assert!(!config.graphics.draw_point_lights);
        assert_eq!(config.graphics.clear_color, defaults.clear_color);
    }

    #[test]
    fn test_empty_text_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_malformed_is_config_error() {
        let result = EngineConfig::from_toml_str("[window]\nwidth = \"wide\"");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = EngineConfig::load_or_default("does/not/exist/engine.toml").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(matches!(
            EngineConfig::load("does/not/exist/engine.toml"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_toml_round_trip_preserves_values() {
        let mut config = EngineConfig::default();
        config.window.title = "Test".to_string();
        config.controller.mouse_sensitivity = 0.25;
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }
}
