//! Per-scene render state that the editor toggles at runtime.

use serde::{Deserialize, Serialize};

/// Shading mode of the light pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Analytic lights with a constant ambient term.
    #[default]
    Standard,
    /// Analytic lights plus image-based ambient and reflections.
    Ibl,
    /// Line polygon mode for the light pass only.
    Wireframe,
}

impl RenderMode {
    pub const ALL: [RenderMode; 3] = [RenderMode::Standard, RenderMode::Ibl, RenderMode::Wireframe];

    pub fn label(self) -> &'static str {
        match self {
            RenderMode::Standard => "Standard",
            RenderMode::Ibl => "IBL",
            RenderMode::Wireframe => "Wireframe",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub mode: RenderMode,
    pub shadows_enabled: bool,
    pub exposure: f32,
    pub gamma: f32,
    pub outline_color: [f32; 4],
    /// Uniform scale applied to selected meshes when drawing the outline fringe.
    pub outline_scale: f32,
    pub show_skybox: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            mode: RenderMode::Standard,
            shadows_enabled: true,
            exposure: 1.0,
            gamma: 2.2,
            outline_color: [1.0, 0.55, 0.1, 1.0],
            outline_scale: 1.03,
            show_skybox: true,
        }
    }
}

/// Bits of the `flags` word in the lights uniform block.
pub mod flags {
    pub const SHADOWS: u32 = 1 << 0;
    pub const IBL: u32 = 1 << 1;
}

impl RenderSettings {
    pub fn shader_flags(&self) -> u32 {
        let mut bits = 0;
        if self.shadows_enabled {
            bits |= flags::SHADOWS;
        }
        if self.mode == RenderMode::Ibl {
            bits |= flags::IBL;
        }
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_flags() {
        let mut settings = RenderSettings::default();
        assert_eq!(settings.shader_flags(), flags::SHADOWS);

        settings.mode = RenderMode::Ibl;
        settings.shadows_enabled = false;
        assert_eq!(settings.shader_flags(), flags::IBL);

        settings.mode = RenderMode::Wireframe;
        assert_eq!(settings.shader_flags(), 0);
    }
}
