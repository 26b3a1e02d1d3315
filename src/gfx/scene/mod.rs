//! # Scene Module
//!
//! Imported meshes, their materials and the scene graph that places them.
//!
//! ## Key Components
//!
//! - [`Scene`] - Owns meshes, the node tree, the texture cache and the renderer
//! - [`Node`] - Scene graph node; traversal yields `(mesh, world)` pairs in pre-order
//! - [`GpuMesh`] - Vertex and index buffers with their [`Material`]
//! - [`MeshVertex`] - Position, normal, UV and tangent frame
//!
//! ## Usage
//!
//! ```no_run
//! use ssao_renderer::{config::RendererConfig, gfx::scene::Scene};
//!
//! # fn load(device: &wgpu::Device, queue: &wgpu::Queue) -> ssao_renderer::error::Result<()> {
//! let config = RendererConfig::default();
//! let scene = Scene::load(
//!     device,
//!     queue,
//!     std::path::Path::new("assets/sponza.obj"),
//!     &config,
//!     wgpu::TextureFormat::Bgra8UnormSrgb,
//! )?;
//! assert_eq!(scene.meshes().len(), scene.root().mesh_reference_count());
//! # Ok(())
//! # }
//! ```

pub mod material;
pub mod mesh;
pub mod node;
pub mod scene;
pub mod vertex;

// Re-export main types
pub use material::{Material, MaterialBindings, MaterialParams, TextureCache, TextureKey, TextureSlot};
pub use mesh::{GpuMesh, MeshData};
pub use node::{MeshVisitor, Node};
pub use scene::Scene;
pub use vertex::MeshVertex;
