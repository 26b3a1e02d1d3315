//! Forward Blinn-Phong renderer
//!
//! One pass, one draw per mesh reference. No shadows, occlusion or skybox;
//! kept as the reference the deferred renderer is compared against.

use cgmath::Vector3;
use wgpu::*;

use crate::{
    config::{RendererConfig, RendererKind, ShadowConfig, TextureMaps},
    error::Result,
    gfx::{
        camera::{Camera, Projection},
        rendering::{
            frame_bindings::FrameBindings,
            frame_plan::{FramePlan, FrameUniform, PassKind},
            light::LightState,
            pipeline_manager::{PipelineConfig, PipelineManager},
            render_pass_ext::RenderPassExt,
            renderer::{FrameContext, Renderer},
            targets::DepthBuffer,
        },
        resources::{ShaderLibrary, TextureResource},
        scene::{mesh::GpuMesh, node::Node, vertex::MeshVertex},
    },
    wgpu_utils::checked,
};

const CLEAR_COLOR: Color = Color {
    r: 0.1,
    g: 0.1,
    b: 0.1,
    a: 1.0,
};

pub struct BaselineRenderer {
    maps: TextureMaps,
    shadow_config: ShadowConfig,
    light: LightState,
    bindings: FrameBindings,
    pipeline: RenderPipeline,
    depth: DepthBuffer,
}

impl BaselineRenderer {
    pub fn new(
        device: &Device,
        config: &RendererConfig,
        material_layout: &BindGroupLayout,
        surface_format: TextureFormat,
    ) -> Result<Self> {
        let library = config
            .shader_dir
            .as_ref()
            .map_or_else(ShaderLibrary::builtin, |dir| ShaderLibrary::from_dir(dir));
        let mut pipeline_manager = PipelineManager::new(device, library);

        let bindings = FrameBindings::new(device, 64);
        let pipeline = pipeline_manager.create_pipeline(
            &PipelineConfig::default_with_shader("baseline")
                .with_label("Forward Pipeline")
                .with_bind_group_layouts(&[bindings.frame_layout(), bindings.instance_layout(), material_layout])
                .with_vertex_buffer(MeshVertex::desc())
                .with_depth(TextureResource::DEPTH_FORMAT, CompareFunction::Less, true)
                .with_color_target(surface_format),
        )?;
        let depth = DepthBuffer::new(device, config.width, config.height)?;

        Ok(Self {
            maps: config.maps,
            shadow_config: config.shadow,
            light: LightState::new(config.light.position, config.light.direction, &config.shadow),
            bindings,
            pipeline,
            depth,
        })
    }
}

impl Renderer for BaselineRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Baseline
    }

    fn render(
        &mut self,
        frame: &mut FrameContext<'_>,
        root: &Node,
        meshes: &[GpuMesh],
        projection: &Projection,
        camera: &Camera,
    ) -> FramePlan {
        let view = camera.view_matrix();
        let projection = projection.matrix();
        let plan = FramePlan::forward(root, view, projection);

        let uniform = FrameUniform::new(
            view,
            projection,
            &self.light,
            (self.depth.width, self.depth.height),
            self.maps.bits(),
        );
        checked(frame.device, "forward frame upload", || {
            self.bindings
                .upload(frame.device, frame.queue, uniform, &plan.instances)
        });

        let mut pass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(PassKind::Forward.label()),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: frame.target,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(CLEAR_COLOR),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                view: &self.depth.depth.view,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, self.bindings.frame_bind_group(), &[]);
        for planned in &plan.passes {
            pass.draw_planned_meshes(&planned.draws, meshes, &self.bindings, Some(2));
        }
        drop(pass);

        plan
    }

    fn set_light(&mut self, position: Vector3<f32>, direction: Vector3<f32>) {
        self.light.set(position, direction, &self.shadow_config);
    }

    fn resize(&mut self, device: &Device, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || (width, height) == (self.depth.width, self.depth.height) {
            return Ok(());
        }
        self.depth = DepthBuffer::new(device, width, height)?;
        Ok(())
    }
}
