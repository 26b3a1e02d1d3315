// src/wgpu_utils/error_scope.rs
//! GPU error scopes
//!
//! [`capture_errors`] is always active and is used where a failure must be
//! reported in every build (shader compilation, pipeline creation, render
//! target allocation). [`checked`] validates ordinary state-changing calls in
//! debug builds only and compiles down to a plain call in release.

#[cfg(debug_assertions)]
use crate::error::{fatal, RenderError};

/// Runs `f` inside a validation error scope and returns its value together
/// with the first error the device reported, if any.
pub fn capture_errors<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let error = pollster::block_on(device.pop_error_scope());
    (value, error)
}

/// Runs `f` and terminates the process if it produced a GPU validation error.
#[cfg(debug_assertions)]
pub fn checked<T>(device: &wgpu::Device, context: &str, f: impl FnOnce() -> T) -> T {
    let (value, error) = capture_errors(device, f);
    if let Some(error) = error {
        fatal(&RenderError::Validation {
            context: context.to_owned(),
            log: error.to_string(),
        });
    }
    value
}

#[cfg(not(debug_assertions))]
#[inline(always)]
pub fn checked<T>(_device: &wgpu::Device, _context: &str, f: impl FnOnce() -> T) -> T {
    f()
}
