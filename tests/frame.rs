//! Whole frames recorded off-screen with both renderers
#![cfg(feature = "integration-tests")]

use std::path::Path;

use cgmath::Deg;
use ssao_renderer::{
    config::{RendererConfig, RendererKind},
    gfx::{
        camera::{Camera, Projection},
        rendering::{request_headless, FrameContext, PassKind},
        scene::{MeshData, Scene},
    },
    wgpu_utils::capture_errors,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 180;
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Unit quad facing -Z, five units in front of a camera at the origin
fn quad() -> MeshData {
    let positions = [
        -1.0, -1.0, 5.0, //
        1.0, -1.0, 5.0, //
        1.0, 1.0, 5.0, //
        -1.0, 1.0, 5.0,
    ];
    let normals = [0.0, 0.0, -1.0].repeat(4);
    let uvs = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    MeshData::from_arrays("quad", &positions, &normals, &uvs, &[0, 2, 1, 0, 3, 2])
}

fn config(kind: RendererKind) -> RendererConfig {
    let mut config = RendererConfig::default()
        .with_size(WIDTH, HEIGHT)
        .with_renderer(kind)
        .with_seed(42);
    config.shadow.map_size = 1024;
    config
}

fn render_one_frame(kind: RendererKind) -> Vec<(PassKind, usize)> {
    let (device, queue) = pollster::block_on(request_headless()).unwrap();
    let mut scene = Scene::from_mesh_data(
        &device,
        &queue,
        &[quad()],
        &[],
        Path::new("."),
        &config(kind),
        FORMAT,
    )
    .unwrap();
    assert_eq!(scene.renderer_kind(), kind);

    let target = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width: WIDTH,
            height: HEIGHT,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());
    let projection = Projection::new(WIDTH, HEIGHT, Deg(45.0), 0.1, 100.0);
    let camera = Camera::default();

    let (plan, error) = capture_errors(&device, || {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Test Encoder"),
        });
        let plan = scene.render(
            &mut FrameContext {
                device: &device,
                queue: &queue,
                encoder: &mut encoder,
                target: &view,
            },
            &projection,
            &camera,
        );
        queue.submit(std::iter::once(encoder.finish()));
        plan
    });
    let _ = device.poll(wgpu::PollType::Wait);
    assert!(error.is_none(), "{error:?}");

    plan.draw_counts()
}

#[test]
fn test_ssao_frame_single_mesh() {
    assert_eq!(
        render_one_frame(RendererKind::Ssao),
        vec![
            (PassKind::Skybox, 1),
            (PassKind::Shadow, 1),
            (PassKind::Geometry, 1),
            (PassKind::Ssao, 1),
            (PassKind::Blur, 1),
            (PassKind::Stencil, 1),
            (PassKind::Lighting, 1),
        ]
    );
}

#[test]
fn test_baseline_frame_single_mesh() {
    assert_eq!(render_one_frame(RendererKind::Baseline), vec![(PassKind::Forward, 1)]);
}

#[test]
fn test_resize_then_render() {
    let (device, queue) = pollster::block_on(request_headless()).unwrap();
    let mut scene = Scene::from_mesh_data(
        &device,
        &queue,
        &[quad()],
        &[],
        Path::new("."),
        &config(RendererKind::Ssao),
        FORMAT,
    )
    .unwrap();

    let (result, error) = capture_errors(&device, || scene.resize(&device, WIDTH * 2, HEIGHT * 2));
    assert!(result.is_ok());
    assert!(error.is_none(), "{error:?}");
}
