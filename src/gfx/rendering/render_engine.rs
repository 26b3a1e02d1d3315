//! WGPU device and surface management
//!
//! Owns the instance, the window surface, the device and the queue. Frames are
//! recorded through [`RenderEngine::render_frame`], which acquires the surface
//! texture, hands a [`FrameContext`] to the caller and submits the result.

use std::sync::Arc;

use crate::{
    error::{RenderError, Result},
    gfx::rendering::renderer::FrameContext,
    wgpu_utils::checked,
};

/// Adapter request shared by the windowed and the headless path
async fn request_device(adapter: &wgpu::Adapter) -> Result<(wgpu::Device, wgpu::Queue)> {
    let info = adapter.get_info();
    log::info!("Using adapter {} ({:?})", info.name, info.backend);

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some("WGPU Device"),
            required_features: wgpu::Features::default(),
            // The shadow map and environment panoramas need more than the
            // downlevel texture size where the adapter allows it.
            required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::default(),
            trace: wgpu::Trace::Off,
        })
        .await?;
    Ok((device, queue))
}

/// Creates a device without a surface, for off-screen rendering and tests
pub async fn request_headless() -> Result<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await?;
    request_device(&adapter).await
}

/// Picks the surface format and alpha mode, preferring an sRGB format
///
/// Shaders write linear color; an sRGB surface encodes it on store.
///
/// # Returns
/// The name of the capability list that came back empty, on failure
pub fn choose_surface_format(
    capabilities: &wgpu::SurfaceCapabilities,
) -> std::result::Result<(wgpu::TextureFormat, wgpu::CompositeAlphaMode), &'static str> {
    let format = capabilities
        .formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| capabilities.formats.first().copied())
        .ok_or("surface formats")?;
    let alpha_mode = capabilities
        .alpha_modes
        .first()
        .copied()
        .ok_or("alpha modes")?;
    Ok((format, alpha_mode))
}

/// Core rendering engine managing the surface, device and queue
pub struct RenderEngine {
    surface: wgpu::Surface<'static>,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: wgpu::SurfaceConfiguration,
}

impl RenderEngine {
    /// Creates a new render engine for the given window
    ///
    /// # Arguments
    /// * `window` - Window surface target for rendering
    /// * `width` - Initial surface width in pixels
    /// * `height` - Initial surface height in pixels
    ///
    /// # Returns
    /// The engine, or the adapter, device or surface error that prevented it
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        width: u32,
        height: u32,
    ) -> Result<RenderEngine> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = request_device(&adapter).await?;

        let (format, alpha_mode) = choose_surface_format(&surface.get_capabilities(&adapter))
            .map_err(|missing| RenderError::SurfaceUnsupported {
                adapter: adapter.get_info().name,
                missing,
            })?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!("Configured {format:?} surface at {}x{}", config.width, config.height);

        Ok(RenderEngine {
            surface,
            device: Arc::new(device),
            queue: Arc::new(queue),
            config,
        })
    }

    /// Records and presents one frame
    ///
    /// `record` receives the frame's encoder and surface view. A lost or
    /// outdated surface is reconfigured and the frame skipped, returning `None`.
    pub fn render_frame<T>(&mut self, record: impl FnOnce(&mut FrameContext<'_>) -> T) -> Option<T> {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                log::debug!("Surface lost; reconfiguring");
                self.surface.configure(&self.device, &self.config);
                return None;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring the surface texture");
                return None;
            }
            Err(err) => {
                log::error!("Failed to acquire the surface texture: {err}");
                return None;
            }
        };

        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        let output = record(&mut FrameContext {
            device: &self.device,
            queue: &self.queue,
            encoder: &mut encoder,
            target: &surface_view,
        });

        checked(&self.device, "frame submission", || {
            self.queue.submit(std::iter::once(encoder.finish()));
        });
        surface_texture.present();

        Some(output)
    }

    /// Handles window resize events
    ///
    /// Zero sizes (minimized windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    /// Returns current surface dimensions
    pub fn get_surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Returns the surface texture format
    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    /// Set VSync (vertical synchronization) state
    ///
    /// # Arguments
    /// * `enable` - Whether to enable VSync
    pub fn set_vsync(&mut self, enable: bool) {
        self.config.present_mode = if enable {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };
        self.surface.configure(&self.device, &self.config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_format_prefers_srgb() {
        let capabilities = wgpu::SurfaceCapabilities {
            formats: vec![wgpu::TextureFormat::Bgra8Unorm, wgpu::TextureFormat::Bgra8UnormSrgb],
            alpha_modes: vec![wgpu::CompositeAlphaMode::Opaque],
            ..Default::default()
        };
        assert_eq!(
            choose_surface_format(&capabilities),
            Ok((wgpu::TextureFormat::Bgra8UnormSrgb, wgpu::CompositeAlphaMode::Opaque))
        );
    }

    #[test]
    fn test_empty_capabilities_are_an_error() {
        assert_eq!(
            choose_surface_format(&wgpu::SurfaceCapabilities::default()),
            Err("surface formats")
        );

        let no_alpha = wgpu::SurfaceCapabilities {
            formats: vec![wgpu::TextureFormat::Rgba8Unorm],
            ..Default::default()
        };
        assert_eq!(choose_surface_format(&no_alpha), Err("alpha modes"));
    }
}
