//! Materials and the texture cache
//!
//! A [`Material`] owns one bind group with its parameters and its four texture
//! maps. Maps a mesh does not have are bound to neutral 1×1 fallbacks and
//! flagged absent in the uniform, so every material binds the same layout.

use std::{collections::HashMap, fmt::Display, path::Path, sync::Arc};

use crate::{
    gfx::resources::TextureResource,
    wgpu_utils::{binding_types, BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc, UniformBuffer},
};

/// Texture map slot of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Diffuse = 0,
    Specular = 1,
    Normals = 2,
    Height = 3,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 4] = [
        TextureSlot::Diffuse,
        TextureSlot::Specular,
        TextureSlot::Normals,
        TextureSlot::Height,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Flag of this slot in the `maps` masks shared with the shaders.
    pub const fn bit(self) -> u32 {
        1 << self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            TextureSlot::Diffuse => "diffuse",
            TextureSlot::Specular => "specular",
            TextureSlot::Normals => "normals",
            TextureSlot::Height => "height",
        }
    }

    /// Only color maps are sRGB encoded.
    pub fn is_srgb(self) -> bool {
        matches!(self, TextureSlot::Diffuse)
    }

    fn fallback_rgba(self) -> [u8; 4] {
        match self {
            // Flat tangent-space normal
            TextureSlot::Normals => [128, 128, 255, 255],
            TextureSlot::Height => [0, 0, 0, 255],
            TextureSlot::Diffuse | TextureSlot::Specular => [255, 255, 255, 255],
        }
    }
}

/// Scalar material parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub diffuse: [f32; 3],
    pub shininess: f32,
    pub shininess_strength: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            diffuse: [1.0, 1.0, 1.0],
            shininess: 32.0,
            shininess_strength: 1.0,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniform {
    pub diffuse: [f32; 3],
    pub shininess: f32,
    pub shininess_strength: f32,
    /// [`TextureSlot::bit`] flags of the maps this material actually has
    pub maps: u32,
    pub _padding: [u32; 2],
}

impl MaterialUniform {
    pub fn new(params: &MaterialParams, maps: u32) -> Self {
        Self {
            diffuse: params.diffuse,
            shininess: params.shininess,
            shininess_strength: params.shininess_strength,
            maps,
            _padding: [0; 2],
        }
    }
}

/// Cache key: the same file decodes differently as a color or a data map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureKey {
    pub file_name: String,
    pub srgb: bool,
}

impl TextureKey {
    pub fn new(file_name: &str, srgb: bool) -> Self {
        Self {
            file_name: file_name.to_owned(),
            srgb,
        }
    }
}

/// Textures keyed by source filename and color space
///
/// Failed loads are remembered too, so a missing file is reported once
/// rather than once per mesh that references it.
pub struct TextureCache<T = TextureResource> {
    entries: HashMap<TextureKey, Option<Arc<T>>>,
}

impl<T> Default for TextureCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> TextureCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached entry for `key`, running `load` on first request.
    pub fn get_or_insert_with<E: Display>(
        &mut self,
        key: TextureKey,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Option<Arc<T>> {
        if let Some(entry) = self.entries.get(&key) {
            return entry.clone();
        }

        let entry = match load() {
            Ok(value) => Some(Arc::new(value)),
            Err(err) => {
                log::warn!("Failed to load texture {}: {err}", key.file_name);
                None
            }
        };
        self.entries.insert(key, entry.clone());
        entry
    }

    /// Number of distinct textures requested so far, including failures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn loaded(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_some()).count()
    }
}

impl TextureCache<TextureResource> {
    /// Loads `file_name` relative to `dir`, or returns the cached texture.
    pub fn load(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        dir: &Path,
        file_name: &str,
        slot: TextureSlot,
    ) -> Option<Arc<TextureResource>> {
        self.get_or_insert_with(TextureKey::new(file_name, slot.is_srgb()), || {
            log::debug!("Loading {} map {file_name}", slot.name());
            TextureResource::from_file(device, queue, &dir.join(file_name), slot.is_srgb())
        })
    }
}

/// The texture maps a mesh was imported with, by slot.
#[derive(Default, Clone)]
pub struct MaterialMaps {
    maps: [Option<Arc<TextureResource>>; 4],
}

impl MaterialMaps {
    pub fn set(&mut self, slot: TextureSlot, texture: Option<Arc<TextureResource>>) {
        self.maps[slot.index()] = texture;
    }

    pub fn get(&self, slot: TextureSlot) -> Option<&Arc<TextureResource>> {
        self.maps[slot.index()].as_ref()
    }

    pub fn bits(&self) -> u32 {
        TextureSlot::ALL
            .iter()
            .filter(|slot| self.get(**slot).is_some())
            .fold(0, |bits, slot| bits | slot.bit())
    }
}

/// Bind group layout, sampler and fallback maps shared by every material
///
/// Layout:
/// - 0: [`MaterialUniform`]
/// - 1..=4: diffuse, specular, normals and height maps
/// - 5: filtering sampler
pub struct MaterialBindings {
    layout: BindGroupLayoutWithDesc,
    sampler: wgpu::Sampler,
    fallbacks: [TextureResource; 4],
}

impl MaterialBindings {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let layout = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::uniform())
            .next_binding_fragment(binding_types::texture_2d())
            .next_binding_fragment(binding_types::texture_2d())
            .next_binding_fragment(binding_types::texture_2d())
            .next_binding_fragment(binding_types::texture_2d())
            .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::Filtering))
            .create(device, "Material Bind Group Layout");

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let fallbacks = TextureSlot::ALL.map(|slot| {
            TextureResource::solid_color(
                device,
                queue,
                slot.fallback_rgba(),
                &format!("Fallback {} map", slot.name()),
            )
        });

        Self {
            layout,
            sampler,
            fallbacks,
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout.layout
    }

    pub fn create_material(
        &self,
        device: &wgpu::Device,
        label: &str,
        maps: MaterialMaps,
        params: MaterialParams,
    ) -> Material {
        let uniform = UniformBuffer::new_with_data(device, &MaterialUniform::new(&params, maps.bits()));

        let mut builder = BindGroupBuilder::new(&self.layout).resource(uniform.binding_resource());
        for slot in TextureSlot::ALL {
            let texture = maps.get(slot).map_or(&self.fallbacks[slot.index()], |t| &**t);
            builder = builder.texture(&texture.view);
        }
        let bind_group = builder
            .sampler(&self.sampler)
            .create(device, &format!("Material: {label}"));

        Material {
            name: label.to_owned(),
            params,
            maps,
            _uniform: uniform,
            bind_group,
        }
    }
}

/// A mesh's material: parameters, maps and the bind group exposing them
pub struct Material {
    pub name: String,
    pub params: MaterialParams,
    maps: MaterialMaps,
    _uniform: UniformBuffer<MaterialUniform>,
    bind_group: wgpu::BindGroup,
}

impl Material {
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn has(&self, slot: TextureSlot) -> bool {
        self.maps.get(slot).is_some()
    }

    pub fn texture(&self, slot: TextureSlot) -> Option<&Arc<TextureResource>> {
        self.maps.get(slot)
    }

    pub fn present_bits(&self) -> u32 {
        self.maps.bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_slot_bits_are_distinct() {
        let all = TextureSlot::ALL.iter().fold(0, |acc, slot| {
            assert_eq!(acc & slot.bit(), 0);
            acc | slot.bit()
        });
        assert_eq!(all, 0b1111);
        assert_eq!(TextureSlot::Normals.index(), 2);
    }

    #[test]
    fn test_cache_returns_same_arc_for_same_name() {
        let loads = Cell::new(0);
        let mut cache: TextureCache<String> = TextureCache::new();
        let mut load = |name: &str| {
            cache.get_or_insert_with(TextureKey::new(name, true), || {
                loads.set(loads.get() + 1);
                Ok::<_, String>(name.to_uppercase())
            })
        };

        let first = load("brick.png").unwrap();
        let second = load("brick.png").unwrap();
        let other = load("stone.png").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(loads.get(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_remembers_failures() {
        let mut cache: TextureCache<String> = TextureCache::new();
        let mut attempts = 0;
        for _ in 0..3 {
            let entry = cache.get_or_insert_with(TextureKey::new("missing.png", true), || {
                attempts += 1;
                Err("not found")
            });
            assert!(entry.is_none());
        }
        assert_eq!(attempts, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.loaded(), 0);
    }

    #[test]
    fn test_cache_separates_color_spaces() {
        let mut cache: TextureCache<bool> = TextureCache::new();
        let diffuse = cache
            .get_or_insert_with(TextureKey::new("brick.png", TextureSlot::Diffuse.is_srgb()), || {
                Ok::<_, String>(true)
            })
            .unwrap();
        let normals = cache
            .get_or_insert_with(TextureKey::new("brick.png", TextureSlot::Normals.is_srgb()), || {
                Ok::<_, String>(false)
            })
            .unwrap();

        assert!(*diffuse);
        assert!(!*normals);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_material_uniform_layout() {
        // Must match the WGSL struct: vec3 + f32, f32 + u32, padded to 32 bytes.
        assert_eq!(std::mem::size_of::<MaterialUniform>(), 32);
        let uniform = MaterialUniform::new(&MaterialParams::default(), TextureSlot::Diffuse.bit());
        assert_eq!(uniform.maps, 1);
        assert_eq!(uniform.shininess_strength, 1.0);
    }
}
