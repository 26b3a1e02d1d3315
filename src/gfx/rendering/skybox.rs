//! HDR environment skybox
//!
//! The equirectangular panorama is projected onto a cube map once, at
//! construction, by rendering the unit cube six times with 90° cameras. Each
//! frame then draws the cube around the eye at the far plane.

use std::path::Path;

use cgmath::{perspective, Deg, EuclideanSpace, Matrix4, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    error::{RenderError, Result},
    gfx::{
        camera::{camera_utils::convert_matrix4_to_array, OPENGL_TO_WGPU_MATRIX},
        rendering::{
            pipeline_manager::{PipelineConfig, PipelineManager},
            targets::allocate_cube_target,
        },
        resources::TextureResource,
        scene::vertex::SkyboxVertex,
    },
    wgpu_utils::{binding_types, BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc, UniformBuffer},
};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CaptureUniform {
    view_proj: [[f32; 4]; 4],
}

/// Look-at matrices for the cube faces in layer order +X, -X, +Y, -Y, +Z, -Z
pub fn capture_views() -> [Matrix4<f32>; 6] {
    let eye = Point3::origin();
    [
        (Vector3::unit_x(), -Vector3::unit_y()),
        (-Vector3::unit_x(), -Vector3::unit_y()),
        (Vector3::unit_y(), Vector3::unit_z()),
        (-Vector3::unit_y(), -Vector3::unit_z()),
        (Vector3::unit_z(), -Vector3::unit_y()),
        (-Vector3::unit_z(), -Vector3::unit_y()),
    ]
    .map(|(forward, up)| Matrix4::look_at_rh(eye, eye + forward, up))
}

/// 90° square projection used for every face
///
/// wgpu rasterizes clip-space +Y into the first texel row while cube faces
/// expect -Y there, hence the flip.
pub fn capture_projection() -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX * Matrix4::from_nonuniform_scale(1.0, -1.0, 1.0) * perspective(Deg(90.0), 1.0, 0.1, 10.0)
}

pub struct Skybox {
    cube: wgpu::Texture,
    vertex_buffer: wgpu::Buffer,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
}

impl Skybox {
    pub const FACE_SIZE: u32 = 512;
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

    /// Loads an equirectangular HDR image and captures it into the cube map
    ///
    /// # Arguments
    /// * `pipelines` - Compiles the capture and skybox programs
    /// * `frame_layout` - Group 0 layout of the pass the skybox is drawn in
    /// * `color_format`, `depth_format` - Attachments of that pass
    ///
    /// # Returns
    /// [`RenderError::EnvironmentMap`] if the image cannot be read or decoded
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &mut PipelineManager,
        path: &Path,
        frame_layout: &wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let panorama = image::open(path)
            .map_err(|source| RenderError::EnvironmentMap {
                path: path.to_owned(),
                source,
            })?
            .into_rgba32f();
        let (width, height) = panorama.dimensions();
        log::info!("Loaded environment map {} ({width}x{height})", path.display());

        Self::from_pixels(
            device,
            queue,
            pipelines,
            panorama.as_raw(),
            width,
            height,
            frame_layout,
            color_format,
            depth_format,
        )
    }

    /// Captures a panorama given as `width * height` linear RGBA texels
    #[allow(clippy::too_many_arguments)]
    pub fn from_pixels(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pipelines: &mut PipelineManager,
        pixels: &[f32],
        width: u32,
        height: u32,
        frame_layout: &wgpu::BindGroupLayout,
        color_format: wgpu::TextureFormat,
        depth_format: wgpu::TextureFormat,
    ) -> Result<Self> {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Skybox Vertex Buffer"),
            contents: bytemuck::cast_slice(&SkyboxVertex::unit_cube()),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let cube = capture(device, queue, pipelines, &vertex_buffer, pixels, width, height)?;
        let cube_view = cube.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Environment Cube View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Environment Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let layout = environment_layout(device);
        let bind_group = BindGroupBuilder::new(&layout)
            .texture(&cube_view)
            .sampler(&sampler)
            .create(device, "Environment Bind Group");

        // Drawn at depth 1 behind everything, never writing depth
        let pipeline = pipelines.create_pipeline(
            &PipelineConfig::default_with_shader("skybox")
                .with_label("Skybox Pipeline")
                .with_bind_group_layouts(&[frame_layout, &layout.layout])
                .with_vertex_buffer(SkyboxVertex::desc())
                .with_depth(depth_format, wgpu::CompareFunction::LessEqual, false)
                .with_color_target(color_format),
        )?;

        Ok(Self {
            cube,
            vertex_buffer,
            pipeline,
            bind_group,
        })
    }

    /// The captured environment, for reflection lookups
    pub fn cube_map(&self) -> &wgpu::Texture {
        &self.cube
    }

    /// Draws the cube; `frame_group` must hold the frame's view and projection
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, frame_group: &wgpu::BindGroup) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, frame_group, &[]);
        pass.set_bind_group(1, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.draw(0..36, 0..1);
    }
}

fn environment_layout(device: &wgpu::Device) -> BindGroupLayoutWithDesc {
    BindGroupLayoutBuilder::new()
        .next_binding_fragment(binding_types::texture_cube())
        .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::Filtering))
        .create(device, "Environment Bind Group Layout")
}

/// Renders the six faces of the cube map from the panorama.
fn capture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipelines: &mut PipelineManager,
    vertex_buffer: &wgpu::Buffer,
    pixels: &[f32],
    width: u32,
    height: u32,
) -> Result<wgpu::Texture> {
    let cube = allocate_cube_target(device, Skybox::FACE_SIZE, Skybox::FORMAT, || {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Environment Cube"),
            size: wgpu::Extent3d {
                width: Skybox::FACE_SIZE,
                height: Skybox::FACE_SIZE,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Skybox::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    })?;

    let panorama = TextureResource::create_float_texture(
        device,
        queue,
        pixels,
        width,
        height,
        "Environment Panorama",
        wgpu::AddressMode::Repeat,
    );

    let capture_layout = BindGroupLayoutBuilder::new()
        .next_binding_vertex(binding_types::uniform())
        .create(device, "Capture Bind Group Layout");
    let panorama_layout = BindGroupLayoutBuilder::new()
        .next_binding_fragment(binding_types::texture_2d_unfilterable())
        .next_binding_fragment(binding_types::sampler(wgpu::SamplerBindingType::NonFiltering))
        .create(device, "Panorama Bind Group Layout");

    // The faces are seen from inside with a flipped projection, so no culling.
    let pipeline = pipelines.create_pipeline(
        &PipelineConfig::default_with_shader("capture")
            .with_label("Skybox Capture Pipeline")
            .with_bind_group_layouts(&[&capture_layout.layout, &panorama_layout.layout])
            .with_vertex_buffer(SkyboxVertex::desc())
            .with_cull_mode(None)
            .with_color_target(Skybox::FORMAT),
    )?;

    let panorama_group = BindGroupBuilder::new(&panorama_layout)
        .texture(&panorama.view)
        .sampler(&panorama.sampler)
        .create(device, "Panorama Bind Group");

    let projection = capture_projection();
    let faces: Vec<(UniformBuffer<CaptureUniform>, wgpu::BindGroup, wgpu::TextureView)> = capture_views()
        .iter()
        .enumerate()
        .map(|(face, view)| {
            let uniform = UniformBuffer::new_with_data(
                device,
                &CaptureUniform {
                    view_proj: convert_matrix4_to_array(projection * view),
                },
            );
            let group = BindGroupBuilder::new(&capture_layout)
                .resource(uniform.binding_resource())
                .create(device, &format!("Capture Face {face}"));
            let target = cube.create_view(&wgpu::TextureViewDescriptor {
                label: Some(&format!("Environment Cube Face {face}")),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_array_layer: face as u32,
                array_layer_count: Some(1),
                ..Default::default()
            });
            (uniform, group, target)
        })
        .collect();

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Skybox Capture Encoder"),
    });
    for (face, (_, group, target)) in faces.iter().enumerate() {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(&format!("Skybox Capture Face {face}")),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, group, &[]);
        pass.set_bind_group(1, &panorama_group, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        pass.draw(0..36, 0..1);
    }
    queue.submit(std::iter::once(encoder.finish()));
    log::debug!("Captured environment cube at {0}x{0}", Skybox::FACE_SIZE);

    Ok(cube)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Transform;

    fn project(face: usize, direction: Vector3<f32>) -> Point3<f32> {
        let m = capture_projection() * capture_views()[face];
        m.transform_point(Point3::from_vec(direction))
    }

    #[test]
    fn test_each_face_centers_its_axis() {
        let axes = [
            Vector3::unit_x(),
            -Vector3::unit_x(),
            Vector3::unit_y(),
            -Vector3::unit_y(),
            Vector3::unit_z(),
            -Vector3::unit_z(),
        ];
        for (face, axis) in axes.into_iter().enumerate() {
            let p = project(face, axis);
            assert!(p.x.abs() < 1e-5 && p.y.abs() < 1e-5, "face {face}: {p:?}");
            assert!((0.0..=1.0).contains(&p.z), "face {face}: {p:?}");
        }
    }

    #[test]
    fn test_positive_x_face_orientation() {
        // On the +X face, +Y lands in the upper rows and -Z on the right.
        let up = project(0, Vector3::new(1.0, 0.5, 0.0));
        assert!(up.y > 0.0, "{up:?}");
        let right = project(0, Vector3::new(1.0, 0.0, -0.5));
        assert!(right.x > 0.0, "{right:?}");
    }
}
