//! Renderer interface shared by the forward and deferred variants

use cgmath::Vector3;

use crate::{
    config::{RendererConfig, RendererKind},
    error::Result,
    gfx::{
        camera::{Camera, Projection},
        rendering::{baseline_renderer::BaselineRenderer, frame_plan::FramePlan, ssao_renderer::SsaoRenderer},
        scene::{mesh::GpuMesh, node::Node},
    },
};

/// GPU state one frame is recorded with
pub struct FrameContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub encoder: &'a mut wgpu::CommandEncoder,
    /// Color target the frame ends up in, usually the surface texture
    pub target: &'a wgpu::TextureView,
}

pub trait Renderer {
    fn kind(&self) -> RendererKind;

    /// Uploads this frame's uniforms and records its passes into `frame.encoder`
    ///
    /// # Returns
    /// The plan that was encoded
    fn render(
        &mut self,
        frame: &mut FrameContext<'_>,
        root: &Node,
        meshes: &[GpuMesh],
        projection: &Projection,
        camera: &Camera,
    ) -> FramePlan;

    /// Moves the light; the new light-space transform is used from the next frame on
    fn set_light(&mut self, position: Vector3<f32>, direction: Vector3<f32>);

    /// Rebuilds every viewport-sized target
    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<()>;
}

/// Builds the renderer `config.renderer` names
///
/// # Arguments
/// * `material_layout` - Bind group layout every mesh material uses
/// * `surface_format` - Format of the frame's final color target
pub fn create_renderer(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    config: &RendererConfig,
    material_layout: &wgpu::BindGroupLayout,
    surface_format: wgpu::TextureFormat,
) -> Result<Box<dyn Renderer>> {
    log::info!("Creating {:?} renderer at {}x{}", config.renderer, config.width, config.height);
    Ok(match config.renderer {
        RendererKind::Baseline => Box::new(BaselineRenderer::new(
            device,
            config,
            material_layout,
            surface_format,
        )?),
        RendererKind::Ssao => Box::new(SsaoRenderer::new(
            device,
            queue,
            config,
            material_layout,
            surface_format,
        )?),
    })
}
