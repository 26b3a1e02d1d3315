// src/lib.rs
//! Deferred SSAO Renderer
//!
//! A wgpu renderer for imported models: shadow mapping, a G-buffer, screen-space
//! ambient occlusion with a blur, stencil-masked lighting and an HDR skybox,
//! plus a forward Blinn-Phong baseline to compare against.

pub mod app;
pub mod config;
pub mod error;
pub mod gfx;
pub mod wgpu_utils;

// Re-export main types for convenience
pub use app::ViewerApp;
pub use config::{RendererConfig, RendererKind};
pub use error::{RenderError, Result};
