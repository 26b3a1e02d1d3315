// src/config.rs
//! Renderer configuration
//!
//! Plain values with builder-style setters. [`RendererConfig::from_env`]
//! overlays a few environment variables on top, which is how the viewer is
//! usually tweaked without recompiling:
//!
//! - `SSAO_RENDERER`: `ssao` (default) or `baseline`
//! - `SSAO_SEED`: fixed seed for the occlusion kernel and noise
//! - `SSAO_SHADER_DIR`: directory holding WGSL overrides

use std::{path::PathBuf, str::FromStr};

use cgmath::Vector3;

use crate::gfx::scene::material::TextureSlot;

/// Which renderer a scene is built with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RendererKind {
    /// Single forward pass, no shadows or occlusion
    Baseline,
    /// Full deferred pipeline with shadows, SSAO and skybox
    #[default]
    Ssao,
}

impl FromStr for RendererKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" | "forward" => Ok(RendererKind::Baseline),
            "ssao" | "deferred" => Ok(RendererKind::Ssao),
            other => Err(format!("unknown renderer `{other}`")),
        }
    }
}

/// Which material texture maps a renderer samples
///
/// A map is used only when it is enabled here *and* the mesh has it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureMaps {
    pub diffuse: bool,
    pub specular: bool,
    pub normals: bool,
    pub height: bool,
}

impl Default for TextureMaps {
    fn default() -> Self {
        Self {
            diffuse: true,
            specular: false,
            normals: true,
            height: false,
        }
    }
}

impl TextureMaps {
    pub const fn all() -> Self {
        Self {
            diffuse: true,
            specular: true,
            normals: true,
            height: true,
        }
    }

    pub fn is_enabled(&self, slot: TextureSlot) -> bool {
        match slot {
            TextureSlot::Diffuse => self.diffuse,
            TextureSlot::Specular => self.specular,
            TextureSlot::Normals => self.normals,
            TextureSlot::Height => self.height,
        }
    }

    /// Bit mask in the layout the shaders expect (see [`TextureSlot::bit`]).
    pub fn bits(&self) -> u32 {
        TextureSlot::ALL
            .iter()
            .filter(|slot| self.is_enabled(**slot))
            .fold(0, |bits, slot| bits | slot.bit())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightConfig {
    pub position: Vector3<f32>,
    pub direction: Vector3<f32>,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: Vector3::new(50.0, -100.0, 0.0),
            direction: Vector3::new(-0.5, 1.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SsaoConfig {
    /// Number of hemisphere samples, at most [`crate::gfx::rendering::ssao_kernel::MAX_KERNEL_SIZE`]
    pub kernel_size: usize,
    /// View-space sampling radius
    pub radius: f32,
    /// Depth bias against self-occlusion
    pub bias: f32,
    /// Seed for kernel and noise generation; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for SsaoConfig {
    fn default() -> Self {
        Self {
            kernel_size: 64,
            radius: 0.5,
            bias: 0.025,
            seed: None,
        }
    }
}

/// Shadow map resolution and the orthographic volume it covers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowConfig {
    pub map_size: u32,
    /// Half-width of the square light frustum
    pub extent: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            map_size: 4096,
            extent: 80.0,
            near: 50.0,
            far: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub width: u32,
    pub height: u32,
    pub renderer: RendererKind,
    pub maps: TextureMaps,
    pub light: LightConfig,
    pub ssao: SsaoConfig,
    pub shadow: ShadowConfig,
    /// Equirectangular HDR panorama for the skybox
    pub skybox: Option<PathBuf>,
    /// Load WGSL from this directory instead of the built-in sources
    pub shader_dir: Option<PathBuf>,
    /// Rotate the model from Z-up into the renderer's Y-up frame
    pub z_up: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 900,
            renderer: RendererKind::default(),
            maps: TextureMaps::default(),
            light: LightConfig::default(),
            ssao: SsaoConfig::default(),
            shadow: ShadowConfig::default(),
            skybox: None,
            shader_dir: None,
            z_up: false,
        }
    }
}

impl RendererConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_renderer(mut self, renderer: RendererKind) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_maps(mut self, maps: TextureMaps) -> Self {
        self.maps = maps;
        self
    }

    pub fn with_light(mut self, position: Vector3<f32>, direction: Vector3<f32>) -> Self {
        self.light = LightConfig {
            position,
            direction,
        };
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.ssao.seed = Some(seed);
        self
    }

    pub fn with_skybox(mut self, path: impl Into<PathBuf>) -> Self {
        self.skybox = Some(path.into());
        self
    }

    pub fn with_shader_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.shader_dir = Some(path.into());
        self
    }

    pub fn with_z_up(mut self, z_up: bool) -> Self {
        self.z_up = z_up;
        self
    }

    /// Overlays `SSAO_*` environment variables on this configuration
    pub fn from_env(self) -> Self {
        self.overlay(|key| std::env::var(key).ok())
    }

    fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup("SSAO_RENDERER") {
            match value.parse() {
                Ok(kind) => self.renderer = kind,
                Err(err) => log::warn!("Ignoring SSAO_RENDERER: {err}"),
            }
        }
        if let Some(value) = lookup("SSAO_SEED") {
            match value.trim().parse() {
                Ok(seed) => self.ssao.seed = Some(seed),
                Err(err) => log::warn!("Ignoring SSAO_SEED `{value}`: {err}"),
            }
        }
        if let Some(value) = lookup("SSAO_SHADER_DIR") {
            self.shader_dir = Some(PathBuf::from(value));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_renderer_kind_parsing() {
        assert_eq!("baseline".parse::<RendererKind>(), Ok(RendererKind::Baseline));
        assert_eq!(" SSAO ".parse::<RendererKind>(), Ok(RendererKind::Ssao));
        assert!("raytraced".parse::<RendererKind>().is_err());
    }

    #[test]
    fn test_texture_map_bits() {
        let maps = TextureMaps::default();
        assert_eq!(
            maps.bits(),
            TextureSlot::Diffuse.bit() | TextureSlot::Normals.bit()
        );
        assert_eq!(TextureMaps::all().bits(), 0b1111);
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            ("SSAO_RENDERER", "baseline"),
            ("SSAO_SEED", "42"),
            ("SSAO_SHADER_DIR", "/tmp/shaders"),
        ]
        .into_iter()
        .collect();

        let config = RendererConfig::default().overlay(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.renderer, RendererKind::Baseline);
        assert_eq!(config.ssao.seed, Some(42));
        assert_eq!(config.shader_dir, Some(PathBuf::from("/tmp/shaders")));
    }

    #[test]
    fn test_env_overlay_ignores_bad_values() {
        let config = RendererConfig::default().overlay(|key| match key {
            "SSAO_SEED" => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(config, RendererConfig::default());
    }
}
