// src/gfx/resources/mod.rs
//! GPU resource management
//!
//! Textures loaded from disk or generated, and the shader sources pipelines
//! are built from.

pub mod shader_library;
pub mod texture_resource;

// Re-export main types
pub use shader_library::ShaderLibrary;
pub use texture_resource::TextureResource;
