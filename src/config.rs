//! # Editor Configuration
//!
//! Startup settings for the editor window and renderer, loaded from a TOML
//! file. Every field has a default so partial files are accepted.
//!
//! ```toml
//! [window]
//! width = 1600
//! height = 900
//!
//! [render]
//! msaa_samples = 4
//! exposure = 1.2
//! mode = "ibl"
//!
//! [shadows]
//! point_resolution = 512
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gfx::lighting::MAX_SHADOW_RESOLUTION;
use crate::gfx::rendering::settings::{RenderMode, RenderSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub window: WindowConfig,
    pub render: RenderConfig,
    pub shadows: ShadowResolutionConfig,
    /// Directory watched for `<name>.wgsl` overrides when reloading shaders.
    pub shader_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Sample count of the light pass targets, 1 or 4.
    pub msaa_samples: u32,
    pub exposure: f32,
    pub gamma: f32,
    pub clear_color: [f32; 4],
    pub outline_color: [f32; 4],
    pub outline_scale: f32,
    pub mode: RenderMode,
    pub shadows_enabled: bool,
}

/// Shadow-map edge length in texels for each light kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowResolutionConfig {
    pub directional_resolution: u32,
    pub spot_resolution: u32,
    pub point_resolution: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Trellis".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        let settings = RenderSettings::default();
        Self {
            msaa_samples: 4,
            exposure: settings.exposure,
            gamma: settings.gamma,
            clear_color: [0.08, 0.08, 0.1, 1.0],
            outline_color: settings.outline_color,
            outline_scale: settings.outline_scale,
            mode: settings.mode,
            shadows_enabled: settings.shadows_enabled,
        }
    }
}

impl Default for ShadowResolutionConfig {
    fn default() -> Self {
        Self {
            directional_resolution: 2048,
            spot_resolution: 1024,
            point_resolution: 512,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            render: RenderConfig::default(),
            shadows: ShadowResolutionConfig::default(),
            shader_dir: None,
        }
    }
}

const MIN_SHADOW_RESOLUTION: u32 = 16;

impl EditorConfig {
    /// Loads a configuration file. Only `.toml` is understood.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            return Err(ConfigError::UnsupportedFormat(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: EditorConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config.sanitized())
    }

    /// Replaces out-of-range values with usable ones, warning for each.
    pub fn sanitized(mut self) -> Self {
        if !matches!(self.render.msaa_samples, 1 | 4) {
            log::warn!(
                "msaa_samples = {} is not supported, using 4",
                self.render.msaa_samples
            );
            self.render.msaa_samples = 4;
        }
        if self.render.exposure <= 0.0 {
            log::warn!("exposure must be positive, got {}", self.render.exposure);
            self.render.exposure = RenderConfig::default().exposure;
        }
        if self.render.gamma <= 0.0 {
            log::warn!("gamma must be positive, got {}", self.render.gamma);
            self.render.gamma = RenderConfig::default().gamma;
        }
        if self.render.outline_scale < 1.0 {
            log::warn!(
                "outline_scale {} would hide the outline, using 1.0",
                self.render.outline_scale
            );
            self.render.outline_scale = 1.0;
        }
        for resolution in [
            &mut self.shadows.directional_resolution,
            &mut self.shadows.spot_resolution,
            &mut self.shadows.point_resolution,
        ] {
            let clamped = (*resolution).clamp(MIN_SHADOW_RESOLUTION, MAX_SHADOW_RESOLUTION);
            if clamped != *resolution {
                log::warn!("shadow resolution {} clamped to {}", resolution, clamped);
                *resolution = clamped;
            }
        }
        self.window.width = self.window.width.max(1);
        self.window.height = self.window.height.max(1);
        self
    }

    /// Initial render settings for a scene created from this configuration.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            mode: self.render.mode,
            shadows_enabled: self.render.shadows_enabled,
            exposure: self.render.exposure,
            gamma: self.render.gamma,
            outline_color: self.render.outline_color,
            outline_scale: self.render.outline_scale,
            ..RenderSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = EditorConfig::from_toml_str(
            r#"
            [window]
            width = 1600

            [render]
            mode = "wireframe"
            exposure = 2.0
            "#,
        )
        .unwrap();

        assert_eq!(config.window.width, 1600);
        assert_eq!(config.window.height, 720);
        assert_eq!(config.render.mode, RenderMode::Wireframe);
        assert_eq!(config.render.exposure, 2.0);
        assert_eq!(config.render.outline_scale, 1.03);
        assert_eq!(config.shadows, ShadowResolutionConfig::default());
    }

    #[test]
    fn test_invalid_values_are_replaced() {
        let config = EditorConfig::from_toml_str(
            r#"
            [render]
            msaa_samples = 3
            gamma = -1.0

            [shadows]
            spot_resolution = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.render.msaa_samples, 4);
        assert_eq!(config.render.gamma, 2.2);
        assert_eq!(config.shadows.spot_resolution, MIN_SHADOW_RESOLUTION);
    }

    #[test]
    fn test_shadow_resolution_fits_device_limit() {
        use crate::gfx::resources::texture_resource::MAX_TEXTURE_DIMENSION;

        let config = EditorConfig::from_toml_str(
            r#"
            [shadows]
            directional_resolution = 8192
            point_resolution = 4096
            "#,
        )
        .unwrap();

        assert_eq!(config.shadows.directional_resolution, MAX_TEXTURE_DIMENSION);
        assert_eq!(config.shadows.point_resolution, 4096);
        assert_eq!(config.shadows.spot_resolution, 1024);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let result = EditorConfig::from_toml_str("[window\nwidth = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_only_toml_is_supported() {
        let result = EditorConfig::load("editor.ron");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_render_settings_follow_config() {
        let mut config = EditorConfig::default();
        config.render.shadows_enabled = false;
        config.render.mode = RenderMode::Ibl;

        let settings = config.render_settings();
        assert!(!settings.shadows_enabled);
        assert_eq!(settings.mode, RenderMode::Ibl);
    }
}
