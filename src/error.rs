// src/error.rs
//! Error types for renderer setup
//!
//! Every variant here is fatal for the renderer: there is no degraded mode.
//! Constructors return [`Result`] so the caller decides where the process
//! stops; [`fatal`] is the single place that logs and exits.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read shader source {path}: {source}")]
    ShaderSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("shader `{label}` failed to compile:\n{log}")]
    ShaderCompile { label: String, log: String },

    #[error("pipeline `{label}` failed to link:\n{log}")]
    PipelineLink { label: String, log: String },

    #[error("framebuffer `{label}` is incomplete: {reason}")]
    FramebufferIncomplete { label: String, reason: String },

    #[error("failed to load environment map {path}: {source}")]
    EnvironmentMap {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to import model {path}: {source}")]
    ModelImport {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("no suitable graphics adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("failed to acquire a graphics device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("failed to create a window surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("window surface is not presentable with adapter {adapter}: no {missing} reported")]
    SurfaceUnsupported { adapter: String, missing: &'static str },

    #[error("GPU validation error in {context}: {log}")]
    Validation { context: String, log: String },
}

pub type Result<T> = std::result::Result<T, RenderError>;

/// Logs `error` and terminates the process.
///
/// Goes through the `log` facade when a logger is installed and straight to
/// standard error otherwise, so the diagnostic is never swallowed.
pub fn fatal(error: &RenderError) -> ! {
    if log::log_enabled!(log::Level::Error) {
        log::error!("{error}");
    } else {
        eprintln!("{error}");
    }
    std::process::exit(1);
}

/// Unwraps a setup result, terminating the process on failure.
pub fn or_fatal<T>(result: Result<T>) -> T {
    result.unwrap_or_else(|error| fatal(&error))
}
