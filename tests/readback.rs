//! Pixel checks on frames rendered off-screen and copied back to the CPU
#![cfg(feature = "integration-tests")]

use std::path::Path;

use cgmath::{Deg, Vector3};
use ssao_renderer::{
    config::{RendererConfig, RendererKind},
    gfx::{
        camera::{Camera, Projection},
        rendering::{request_headless, FrameContext},
        scene::{MeshData, Scene},
    },
    wgpu_utils::capture_errors,
};

const WIDTH: u32 = 320;
const HEIGHT: u32 = 180;
// Linear target, so stored bytes are the shader output scaled to 0..255.
const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Two triangles over `corners`, listed counter-clockwise as seen from the lit side
fn quad(name: &str, corners: [[f32; 3]; 4], normal: [f32; 3]) -> MeshData {
    let positions: Vec<f32> = corners.iter().flatten().copied().collect();
    let normals = normal.repeat(4);
    let uvs = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0];
    MeshData::from_arrays(name, &positions, &normals, &uvs, &[0, 1, 2, 0, 2, 3])
}

/// Upward-facing ground at y = -1 reaching far past the light volume along +Z
fn ground() -> MeshData {
    quad(
        "ground",
        [
            [-50.0, -1.0, 0.0],
            [-50.0, -1.0, 400.0],
            [50.0, -1.0, 400.0],
            [50.0, -1.0, 0.0],
        ],
        [0.0, 1.0, 0.0],
    )
}

/// Downward-facing slab straddling the +Z edge of the light volume
fn occluder() -> MeshData {
    quad(
        "occluder",
        [
            [-10.0, 5.0, 70.0],
            [10.0, 5.0, 70.0],
            [10.0, 5.0, 81.0],
            [-10.0, 5.0, 81.0],
        ],
        [0.0, -1.0, 0.0],
    )
}

struct Offscreen {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: wgpu::Texture,
    readback: wgpu::Buffer,
}

impl Offscreen {
    fn new() -> Self {
        let (device, queue) = pollster::block_on(request_headless()).unwrap();
        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Readback Target"),
            size: wgpu::Extent3d {
                width: WIDTH,
                height: HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: u64::from(WIDTH * HEIGHT * 4),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            device,
            queue,
            target,
            readback,
        }
    }

    fn scene(&self, meshes: &[MeshData], config: &RendererConfig) -> Scene {
        Scene::from_mesh_data(&self.device, &self.queue, meshes, &[], Path::new("."), config, FORMAT).unwrap()
    }

    /// Renders one frame and returns the target's RGBA8 rows
    fn render(&self, scene: &mut Scene, camera: &Camera) -> Vec<u8> {
        let view = self.target.create_view(&wgpu::TextureViewDescriptor::default());
        let projection = Projection::new(WIDTH, HEIGHT, Deg(45.0), 0.1, 1000.0);

        let ((), error) = capture_errors(&self.device, || {
            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Readback Encoder"),
                });
            scene.render(
                &mut FrameContext {
                    device: &self.device,
                    queue: &self.queue,
                    encoder: &mut encoder,
                    target: &view,
                },
                &projection,
                camera,
            );
            // WIDTH * 4 is a multiple of the 256-byte row alignment.
            encoder.copy_texture_to_buffer(
                wgpu::TexelCopyTextureInfo {
                    texture: &self.target,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyBufferInfo {
                    buffer: &self.readback,
                    layout: wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(WIDTH * 4),
                        rows_per_image: Some(HEIGHT),
                    },
                },
                self.target.size(),
            );
            self.queue.submit(std::iter::once(encoder.finish()));
        });
        assert!(error.is_none(), "{error:?}");

        let slice = self.readback.slice(..);
        slice.map_async(wgpu::MapMode::Read, |result| result.unwrap());
        self.device.poll(wgpu::PollType::Wait).unwrap();
        let pixels = slice.get_mapped_range().to_vec();
        self.readback.unmap();
        pixels
    }
}

fn pixel(pixels: &[u8], x: u32, y: u32) -> [u8; 4] {
    let i = ((y * WIDTH + x) * 4) as usize;
    [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
}

fn center(pixels: &[u8]) -> [u8; 4] {
    pixel(pixels, WIDTH / 2, HEIGHT / 2)
}

fn assert_near(actual: [u8; 4], expected: [u8; 3], tolerance: u8) {
    for (a, e) in actual.iter().zip(expected) {
        assert!(a.abs_diff(e) <= tolerance, "{actual:?} != {expected:?} (±{tolerance})");
    }
}

fn config() -> RendererConfig {
    let mut config = RendererConfig::default()
        .with_size(WIDTH, HEIGHT)
        .with_renderer(RendererKind::Ssao)
        .with_seed(42);
    config.shadow.map_size = 1024;
    config
}

/// Light straight down from above the origin; the light volume spans ±80 in X and Z
fn overhead_light() -> RendererConfig {
    config().with_light(Vector3::new(0.0, 60.0, 0.0), Vector3::new(0.0, -1.0, 0.0))
}

#[test]
fn test_background_keeps_sky_and_geometry_is_lit() {
    let offscreen = Offscreen::new();
    let facing_camera = quad(
        "facing",
        [
            [-1.0, -1.0, 5.0],
            [-1.0, 1.0, 5.0],
            [1.0, 1.0, 5.0],
            [1.0, -1.0, 5.0],
        ],
        [0.0, 0.0, -1.0],
    );
    let mut scene = offscreen.scene(&[facing_camera], &config());
    let pixels = offscreen.render(&mut scene, &Camera::default());

    // Flat sky (0.45, 0.55, 0.7) after Reinhard mapping
    let corner = pixel(&pixels, 2, 2);
    assert_near(corner, [79, 90, 105], 2);
    assert_eq!(corner[3], 255);

    // The default light is behind the quad, so it shows ambient only: neutral gray.
    let covered = center(&pixels);
    assert_near(covered, [77, 77, 77], 4);
    assert_ne!(covered[..3], corner[..3]);
}

#[test]
fn test_occluder_shadows_ground_inside_light_volume() {
    let offscreen = Offscreen::new();
    let camera = Camera::looking_at(Vector3::new(0.0, 2.0, 60.0), Vector3::new(0.0, -1.0, 75.0));

    let mut open = offscreen.scene(&[ground()], &overhead_light());
    let lit = center(&offscreen.render(&mut open, &camera));

    let mut covered = offscreen.scene(&[ground(), occluder()], &overhead_light());
    let shadowed = center(&offscreen.render(&mut covered, &camera));

    for channel in 0..3 {
        assert!(shadowed[channel] + 15 < lit[channel], "lit {lit:?}, shadowed {shadowed:?}");
    }
}

#[test]
fn test_ground_outside_light_volume_is_fully_lit() {
    let offscreen = Offscreen::new();
    // Center pixel lands on the ground at z = 150, past the volume's +Z edge at 80.
    let camera = Camera::looking_at(Vector3::new(0.0, 4.0, 110.0), Vector3::new(0.0, -1.0, 150.0));

    let mut open = offscreen.scene(&[ground()], &overhead_light());
    let without = center(&offscreen.render(&mut open, &camera));

    let mut covered = offscreen.scene(&[ground(), occluder()], &overhead_light());
    let with = center(&offscreen.render(&mut covered, &camera));

    assert_near(with, [without[0], without[1], without[2]], 2);

    // Shadowed ground under the occluder for scale
    let inside = Camera::looking_at(Vector3::new(0.0, 2.0, 60.0), Vector3::new(0.0, -1.0, 75.0));
    let shadowed = center(&offscreen.render(&mut covered, &inside));
    assert!(shadowed[0] + 15 < with[0], "outside {with:?}, shadowed {shadowed:?}");
}
