// src/gfx/rendering/mod.rs
//! Core rendering functionality
//!
//! Render targets, pipelines, per-frame bindings and the two renderer
//! variants behind the [`Renderer`] trait.

pub mod baseline_renderer;
pub mod frame_bindings;
pub mod frame_plan;
pub mod light;
pub mod pipeline_manager;
pub mod render_engine;
pub mod render_pass_ext;
pub mod renderer;
pub mod skybox;
pub mod ssao_kernel;
pub mod ssao_renderer;
pub mod targets;

// Re-export main types
pub use baseline_renderer::BaselineRenderer;
pub use frame_plan::{FramePlan, PassKind};
pub use pipeline_manager::{PipelineConfig, PipelineManager, PipelineStats};
pub use render_engine::{request_headless, RenderEngine};
pub use renderer::{create_renderer, FrameContext, Renderer};
pub use ssao_renderer::SsaoRenderer;
