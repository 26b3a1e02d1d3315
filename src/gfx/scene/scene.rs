//! Top-level scene: meshes, scene graph, texture cache and renderer
//!
//! A scene is built once from a model file and is immutable afterwards apart
//! from its light. Every imported sub-mesh becomes one child of the root node.

use std::path::Path;

use cgmath::{Deg, Matrix4, Vector3};

use crate::{
    config::{RendererConfig, RendererKind},
    error::{RenderError, Result},
    gfx::{
        camera::{Camera, Projection},
        rendering::{
            frame_plan::FramePlan,
            renderer::{create_renderer, FrameContext, Renderer},
        },
    },
};

use super::{
    material::{MaterialBindings, MaterialMaps, MaterialParams, TextureCache, TextureSlot},
    mesh::{GpuMesh, MeshData},
    node::Node,
};

/// Main scene containing meshes, their graph, shared textures and the renderer
pub struct Scene {
    meshes: Vec<GpuMesh>,
    root: Node,
    textures: TextureCache,
    material_bindings: MaterialBindings,
    renderer: Box<dyn Renderer>,
}

impl Scene {
    /// Imports an OBJ model and builds the renderer `config` selects
    ///
    /// Textures are resolved relative to the model's directory. A missing MTL
    /// file or texture is logged and replaced by defaults.
    ///
    /// # Returns
    /// [`RenderError::ModelImport`] if the model cannot be parsed, or any
    /// renderer construction error
    pub fn load(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        path: &Path,
        config: &RendererConfig,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let (models, materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
        )
        .map_err(|source| RenderError::ModelImport {
            path: path.to_owned(),
            source,
        })?;

        let materials = materials.unwrap_or_else(|err| {
            log::warn!("No materials for {}: {err}", path.display());
            Vec::new()
        });

        let meshes: Vec<MeshData> = models.iter().map(MeshData::from_tobj).collect();
        let triangles: usize = meshes.iter().map(MeshData::triangle_count).sum();
        log::info!(
            "Imported {}: {} meshes, {} triangles, {} materials",
            path.display(),
            meshes.len(),
            triangles,
            materials.len()
        );

        let texture_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_mesh_data(
            device,
            queue,
            &meshes,
            &materials,
            texture_dir,
            config,
            surface_format,
        )
    }

    /// Builds a scene from already imported meshes
    pub fn from_mesh_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        meshes: &[MeshData],
        materials: &[tobj::Material],
        texture_dir: &Path,
        config: &RendererConfig,
        surface_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let material_bindings = MaterialBindings::new(device, queue);
        let mut textures = TextureCache::new();

        let gpu_meshes: Vec<GpuMesh> = meshes
            .iter()
            .map(|data| {
                let imported = data.material.and_then(|index| materials.get(index));
                let mut maps = MaterialMaps::default();
                let params = match imported {
                    Some(material) => {
                        for (slot, file_name) in texture_files(material) {
                            if let Some(file_name) = file_name {
                                maps.set(slot, textures.load(device, queue, texture_dir, file_name, slot));
                            }
                        }
                        material_params(material)
                    }
                    None => MaterialParams::default(),
                };
                let label = imported.map_or(data.name.as_str(), |material| material.name.as_str());
                let material = material_bindings.create_material(device, label, maps, params);
                GpuMesh::new(device, data, material)
            })
            .collect();

        log::info!(
            "Texture cache: {} loaded, {} requested",
            textures.loaded(),
            textures.len()
        );

        let root = build_graph(gpu_meshes.len(), config.z_up);
        let renderer = create_renderer(device, queue, config, material_bindings.layout(), surface_format)?;

        Ok(Self {
            meshes: gpu_meshes,
            root,
            textures,
            material_bindings,
            renderer,
        })
    }

    /// Records one frame with the scene's renderer
    pub fn render(&mut self, frame: &mut FrameContext<'_>, projection: &Projection, camera: &Camera) -> FramePlan {
        self.renderer
            .render(frame, &self.root, &self.meshes, projection, camera)
    }

    pub fn set_light(&mut self, position: Vector3<f32>, direction: Vector3<f32>) {
        self.renderer.set_light(position, direction);
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<()> {
        self.renderer.resize(device, width, height)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn meshes(&self) -> &[GpuMesh] {
        &self.meshes
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    pub fn material_bindings(&self) -> &MaterialBindings {
        &self.material_bindings
    }

    pub fn renderer_kind(&self) -> RendererKind {
        self.renderer.kind()
    }
}

/// Root with one child per mesh, rotated from Z-up to Y-up when `z_up` is set
pub fn build_graph(mesh_count: usize, z_up: bool) -> Node {
    let mut root = (0..mesh_count).fold(Node::default(), |root, mesh| {
        root.with_child(Node::default().with_meshes([mesh]))
    });
    if z_up {
        root.apply_transform(Matrix4::from_angle_x(Deg(-90.0)));
    }
    root
}

/// Texture file named for each slot; displacement maps feed the height slot
pub fn texture_files(material: &tobj::Material) -> [(TextureSlot, Option<&str>); 4] {
    [
        (TextureSlot::Diffuse, material.diffuse_texture.as_deref()),
        (TextureSlot::Specular, material.specular_texture.as_deref()),
        (TextureSlot::Normals, material.normal_texture.as_deref()),
        (TextureSlot::Height, material.unknown_param.get("disp").map(String::as_str)),
    ]
}

pub fn material_params(material: &tobj::Material) -> MaterialParams {
    let defaults = MaterialParams::default();
    MaterialParams {
        diffuse: material.diffuse.unwrap_or(defaults.diffuse),
        shininess: material.shininess.unwrap_or(defaults.shininess).max(1.0),
        shininess_strength: material
            .specular
            .map_or(defaults.shininess_strength, |ks| ks.iter().copied().fold(0.0, f32::max)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Point3, Transform};

    #[test]
    fn test_one_child_per_mesh() {
        let root = build_graph(3, false);
        assert_eq!(root.node_count(), 4);
        assert_eq!(root.mesh_reference_count(), 3);

        let visited: Vec<usize> = root.walk().map(|(mesh, _)| mesh).collect();
        assert_eq!(visited, vec![0, 1, 2]);
    }

    #[test]
    fn test_z_up_correction() {
        let root = build_graph(1, true);
        let (_, world) = root.walk().next().unwrap();
        let up = world.transform_point(Point3::new(0.0, 0.0, 1.0));
        assert!((up.y - 1.0).abs() < 1e-6 && up.z.abs() < 1e-6, "{up:?}");
    }

    #[test]
    fn test_texture_files_by_slot() {
        let mut material = tobj::Material {
            diffuse_texture: Some("brick.png".to_string()),
            normal_texture: Some("brick_n.png".to_string()),
            ..Default::default()
        };
        material
            .unknown_param
            .insert("disp".to_string(), "brick_h.png".to_string());

        let files = texture_files(&material);
        assert_eq!(files[0], (TextureSlot::Diffuse, Some("brick.png")));
        assert_eq!(files[1], (TextureSlot::Specular, None));
        assert_eq!(files[2], (TextureSlot::Normals, Some("brick_n.png")));
        assert_eq!(files[3], (TextureSlot::Height, Some("brick_h.png")));
    }

    #[test]
    fn test_material_params_from_mtl() {
        let material = tobj::Material {
            diffuse: Some([0.5, 0.25, 1.0]),
            specular: Some([0.2, 0.6, 0.4]),
            shininess: Some(64.0),
            ..Default::default()
        };
        let params = material_params(&material);
        assert_eq!(params.diffuse, [0.5, 0.25, 1.0]);
        assert_eq!(params.shininess, 64.0);
        assert_eq!(params.shininess_strength, 0.6);

        assert_eq!(material_params(&tobj::Material::default()), MaterialParams::default());
    }
}
