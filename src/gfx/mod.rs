//! # Graphics Module
//!
//! Everything between a loaded model and a presented frame.
//!
//! ## Architecture Overview
//!
//! - **Camera System** ([`camera`]) - Fly camera, projection and keyboard/mouse controller
//! - **Rendering Pipeline** ([`rendering`]) - Forward baseline and deferred SSAO renderers
//! - **Scene Management** ([`scene`]) - Meshes, materials and the scene graph
//! - **Resource Management** ([`resources`]) - Textures and shader sources
//!
//! ## Deferred frame
//!
//! The SSAO renderer records, in order: skybox, shadow map, geometry into the
//! G-buffer, SSAO, blur, stencil marking of covered pixels, and lighting over
//! the marked pixels only.
//!
//! ## Usage
//!
//! The graphics system is primarily used through the [`RenderEngine`] and [`Scene`] types:
//!
//! ```no_run
//! use ssao_renderer::gfx::{RenderEngine, Scene};
//!
//! // let engine = pollster::block_on(RenderEngine::new(window, width, height))?;
//! // let scene = Scene::load(engine.device(), engine.queue(), path, &config, engine.surface_format())?;
//! ```

pub mod camera;
pub mod rendering;
pub mod resources;
pub mod scene;

// Re-export commonly used types
pub use camera::{Camera, CameraController, Projection};
pub use rendering::render_engine::RenderEngine;
pub use scene::Scene;
