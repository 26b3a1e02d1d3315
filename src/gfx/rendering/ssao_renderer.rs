//! Deferred renderer with shadow mapping, SSAO and an HDR skybox
//!
//! Every frame runs seven passes in a fixed order:
//!
//! 1. **Skybox** into the color target, at the far plane
//! 2. **Shadow**: scene depth from the light
//! 3. **Geometry**: G-buffer fill, with the shadowed light term
//! 4. **SSAO**: occlusion estimate from G-buffer position and normal
//! 5. **Blur**: 4×4 box filter of the occlusion term
//! 6. **Stencil**: marks the pixels covered by geometry
//! 7. **Lighting**: Blinn-Phong composition on the marked pixels only

use cgmath::Vector3;
use wgpu::*;

use crate::{
    config::{RendererConfig, RendererKind, ShadowConfig, SsaoConfig, TextureMaps},
    error::Result,
    gfx::{
        camera::{Camera, Projection},
        rendering::{
            frame_bindings::FrameBindings,
            frame_plan::{FramePlan, FrameUniform, PassKind, PassPlan},
            light::LightState,
            pipeline_manager::{PipelineConfig, PipelineManager},
            render_pass_ext::RenderPassExt,
            renderer::{FrameContext, Renderer},
            skybox::Skybox,
            ssao_kernel::{SsaoKernel, MAX_KERNEL_SIZE, NOISE_DIM},
            targets::{GBuffer, OcclusionBuffer, ShadowBuffer},
        },
        resources::{ShaderLibrary, TextureResource},
        scene::{mesh::GpuMesh, node::Node, vertex::MeshVertex},
    },
    wgpu_utils::{binding_types, checked, BindGroupBuilder, BindGroupLayoutBuilder, BindGroupLayoutWithDesc, UniformBuffer},
};

/// Initial number of instance slots
const INITIAL_INSTANCES: usize = 64;

/// Kernel samples and sampling parameters for the SSAO pass
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct KernelUniform {
    pub samples: [[f32; 4]; MAX_KERNEL_SIZE],
    /// radius, bias, sample count, unused
    pub params: [f32; 4],
}

impl KernelUniform {
    pub fn new(kernel: &SsaoKernel, config: &SsaoConfig) -> Self {
        Self {
            samples: kernel.padded_samples(),
            params: [config.radius, config.bias, kernel.samples.len() as f32, 0.0],
        }
    }
}

fn stencil_face(compare: CompareFunction, pass_op: StencilOperation) -> StencilFaceState {
    StencilFaceState {
        compare,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op,
    }
}

/// Writes the reference value wherever a triangle rasterizes
fn stencil_mark() -> StencilState {
    let face = stencil_face(CompareFunction::Always, StencilOperation::Replace);
    StencilState {
        front: face,
        back: face,
        read_mask: 0xff,
        write_mask: 0xff,
    }
}

/// Passes only where the stencil equals the reference; never writes.
/// The full-screen triangle is a back face, so both faces test.
fn stencil_equal() -> StencilState {
    let face = stencil_face(CompareFunction::Equal, StencilOperation::Keep);
    StencilState {
        front: face,
        back: face,
        read_mask: 0xff,
        write_mask: 0x00,
    }
}

fn cleared(view: &TextureView) -> Option<RenderPassColorAttachment<'_>> {
    Some(RenderPassColorAttachment {
        view,
        resolve_target: None,
        ops: Operations {
            load: LoadOp::Clear(Color::TRANSPARENT),
            store: StoreOp::Store,
        },
    })
}

/// Layouts of the pass-local input groups
struct InputLayouts {
    shadow: BindGroupLayoutWithDesc,
    ssao: BindGroupLayoutWithDesc,
    blur: BindGroupLayoutWithDesc,
    lighting: BindGroupLayoutWithDesc,
}

impl InputLayouts {
    fn new(device: &Device) -> Self {
        let shadow = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::texture_depth_2d())
            .next_binding_fragment(binding_types::sampler(SamplerBindingType::Comparison))
            .create(device, "Shadow Input Layout");

        let ssao = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::texture_2d_unfilterable()) // position
            .next_binding_fragment(binding_types::texture_2d_unfilterable()) // normal
            .next_binding_fragment(binding_types::texture_2d_unfilterable()) // noise
            .next_binding_fragment(binding_types::sampler(SamplerBindingType::NonFiltering))
            .next_binding_fragment(binding_types::uniform()) // kernel
            .create(device, "SSAO Input Layout");

        let blur = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::texture_2d_unfilterable())
            .create(device, "Blur Input Layout");

        let lighting = BindGroupLayoutBuilder::new()
            .next_binding_fragment(binding_types::texture_2d_unfilterable()) // position
            .next_binding_fragment(binding_types::texture_2d_unfilterable()) // normal
            .next_binding_fragment(binding_types::texture_2d_unfilterable()) // albedo
            .next_binding_fragment(binding_types::texture_2d_unfilterable()) // light
            .next_binding_fragment(binding_types::texture_2d_unfilterable()) // blurred occlusion
            .create(device, "Lighting Input Layout");

        Self {
            shadow,
            ssao,
            blur,
            lighting,
        }
    }
}

struct PassPipelines {
    shadow: RenderPipeline,
    geometry: RenderPipeline,
    ssao: RenderPipeline,
    blur: RenderPipeline,
    stencil: RenderPipeline,
    lighting: RenderPipeline,
}

impl PassPipelines {
    fn new(
        pipelines: &mut PipelineManager,
        bindings: &FrameBindings,
        layouts: &InputLayouts,
        material_layout: &BindGroupLayout,
        surface_format: TextureFormat,
    ) -> Result<Self> {
        let frame = bindings.frame_layout();
        let instance = bindings.instance_layout();

        // Front-face culling keeps lit faces from shadowing themselves.
        let shadow = pipelines.create_pipeline(
            &PipelineConfig::default_with_shader("shadow")
                .with_label("Shadow Pipeline")
                .with_bind_group_layouts(&[frame, instance])
                .with_vertex_buffer(MeshVertex::position_only_desc())
                .with_cull_mode(Some(Face::Front))
                .with_depth(TextureResource::DEPTH_FORMAT, CompareFunction::Less, true)
                .with_vertex_only(),
        )?;

        let geometry = pipelines.create_pipeline(
            &PipelineConfig::default_with_shader("geometry")
                .with_label("Geometry Pipeline")
                .with_bind_group_layouts(&[frame, instance, material_layout, &layouts.shadow.layout])
                .with_vertex_buffer(MeshVertex::desc())
                .with_depth(GBuffer::DEPTH_FORMAT, CompareFunction::Less, true)
                .with_color_targets(
                    GBuffer::COLOR_FORMATS
                        .iter()
                        .map(|&format| {
                            Some(ColorTargetState {
                                format,
                                blend: None,
                                write_mask: ColorWrites::ALL,
                            })
                        })
                        .collect(),
                ),
        )?;

        let ssao = pipelines.create_pipeline(
            &PipelineConfig::default_with_shader("ssao")
                .with_label("SSAO Pipeline")
                .with_bind_group_layouts(&[frame, &layouts.ssao.layout])
                .with_cull_mode(None)
                .with_color_target(OcclusionBuffer::FORMAT),
        )?;

        let blur = pipelines.create_pipeline(
            &PipelineConfig::default_with_shader("blur")
                .with_label("Blur Pipeline")
                .with_bind_group_layouts(&[&layouts.blur.layout])
                .with_cull_mode(None)
                .with_color_target(OcclusionBuffer::FORMAT),
        )?;

        let stencil = pipelines.create_pipeline(
            &PipelineConfig::default_with_shader("stencil")
                .with_label("Stencil Pipeline")
                .with_bind_group_layouts(&[frame, instance])
                .with_vertex_buffer(MeshVertex::position_only_desc())
                .with_depth(GBuffer::DEPTH_FORMAT, CompareFunction::Always, false)
                .with_stencil(stencil_mark())
                .with_vertex_only(),
        )?;

        let lighting = pipelines.create_pipeline(
            &PipelineConfig::default_with_shader("lighting")
                .with_label("Lighting Pipeline")
                .with_bind_group_layouts(&[frame, &layouts.lighting.layout])
                .with_cull_mode(None)
                .with_depth(GBuffer::DEPTH_FORMAT, CompareFunction::Always, false)
                .with_stencil(stencil_equal())
                .with_color_target(surface_format),
        )?;

        Ok(Self {
            shadow,
            geometry,
            ssao,
            blur,
            stencil,
            lighting,
        })
    }
}

/// Viewport-sized targets and the bind groups that read them
struct ViewportTargets {
    gbuffer: GBuffer,
    ssao: OcclusionBuffer,
    blur: OcclusionBuffer,
    ssao_inputs: BindGroup,
    blur_inputs: BindGroup,
    lighting_inputs: BindGroup,
}

impl ViewportTargets {
    fn new(
        device: &Device,
        layouts: &InputLayouts,
        noise: &TextureResource,
        kernel: &UniformBuffer<KernelUniform>,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let gbuffer = GBuffer::new(device, width, height)?;
        let ssao = OcclusionBuffer::new(device, "SSAO Buffer", width, height)?;
        let blur = OcclusionBuffer::new(device, "Blur Buffer", width, height)?;

        let ssao_inputs = BindGroupBuilder::new(&layouts.ssao)
            .texture(&gbuffer.position.view)
            .texture(&gbuffer.normal.view)
            .texture(&noise.view)
            .sampler(&noise.sampler)
            .resource(kernel.binding_resource())
            .create(device, "SSAO Inputs");

        let blur_inputs = BindGroupBuilder::new(&layouts.blur)
            .texture(&ssao.target.view)
            .create(device, "Blur Inputs");

        let lighting_inputs = BindGroupBuilder::new(&layouts.lighting)
            .texture(&gbuffer.position.view)
            .texture(&gbuffer.normal.view)
            .texture(&gbuffer.albedo.view)
            .texture(&gbuffer.light.view)
            .texture(&blur.target.view)
            .create(device, "Lighting Inputs");

        Ok(Self {
            gbuffer,
            ssao,
            blur,
            ssao_inputs,
            blur_inputs,
            lighting_inputs,
        })
    }
}

pub struct SsaoRenderer {
    maps: TextureMaps,
    shadow_config: ShadowConfig,
    light: LightState,
    width: u32,
    height: u32,
    bindings: FrameBindings,
    layouts: InputLayouts,
    pipelines: PassPipelines,
    skybox: Skybox,
    shadow: ShadowBuffer,
    shadow_inputs: BindGroup,
    kernel: SsaoKernel,
    kernel_ubo: UniformBuffer<KernelUniform>,
    noise: TextureResource,
    targets: ViewportTargets,
}

impl SsaoRenderer {
    /// Compiles every pass, allocates the render targets, generates the
    /// occlusion kernel and captures the skybox
    ///
    /// # Arguments
    /// * `material_layout` - Layout of the mesh material bind groups (group 2 of the geometry pass)
    /// * `surface_format` - Format of the final color target
    pub fn new(
        device: &Device,
        queue: &Queue,
        config: &RendererConfig,
        material_layout: &BindGroupLayout,
        surface_format: TextureFormat,
    ) -> Result<Self> {
        let library = config
            .shader_dir
            .as_ref()
            .map_or_else(ShaderLibrary::builtin, |dir| ShaderLibrary::from_dir(dir));
        let mut pipeline_manager = PipelineManager::new(device, library);

        let bindings = FrameBindings::new(device, INITIAL_INSTANCES);
        let layouts = InputLayouts::new(device);
        let pipelines = PassPipelines::new(
            &mut pipeline_manager,
            &bindings,
            &layouts,
            material_layout,
            surface_format,
        )?;

        let skybox = match &config.skybox {
            Some(path) => Skybox::new(
                device,
                queue,
                &mut pipeline_manager,
                path,
                bindings.frame_layout(),
                surface_format,
                GBuffer::DEPTH_FORMAT,
            )?,
            None => {
                log::info!("No environment map configured; using a flat sky");
                Skybox::from_pixels(
                    device,
                    queue,
                    &mut pipeline_manager,
                    &[0.45, 0.55, 0.7, 1.0],
                    1,
                    1,
                    bindings.frame_layout(),
                    surface_format,
                    GBuffer::DEPTH_FORMAT,
                )?
            }
        };

        let shadow = ShadowBuffer::new(device, config.shadow.map_size)?;
        let shadow_inputs = BindGroupBuilder::new(&layouts.shadow)
            .texture(&shadow.map.view)
            .sampler(&shadow.map.sampler)
            .create(device, "Shadow Inputs");

        let kernel = SsaoKernel::generate(&config.ssao);
        let kernel_ubo = UniformBuffer::new_with_data(device, &KernelUniform::new(&kernel, &config.ssao));
        let noise = TextureResource::create_float_texture(
            device,
            queue,
            &kernel.noise_texels(),
            NOISE_DIM,
            NOISE_DIM,
            "SSAO Noise",
            AddressMode::Repeat,
        );
        log::debug!(
            "Generated SSAO kernel: {} samples, {}x{} noise",
            kernel.samples.len(),
            NOISE_DIM,
            NOISE_DIM
        );

        let targets = ViewportTargets::new(device, &layouts, &noise, &kernel_ubo, config.width, config.height)?;

        let stats = pipeline_manager.get_stats();
        log::info!(
            "SSAO renderer ready: {} pipelines from {} shaders",
            stats.total_pipelines,
            stats.loaded_shaders
        );

        Ok(Self {
            maps: config.maps,
            shadow_config: config.shadow,
            light: LightState::new(config.light.position, config.light.direction, &config.shadow),
            width: config.width,
            height: config.height,
            bindings,
            layouts,
            pipelines,
            skybox,
            shadow,
            shadow_inputs,
            kernel,
            kernel_ubo,
            noise,
            targets,
        })
    }

    pub fn skybox(&self) -> &Skybox {
        &self.skybox
    }

    pub fn kernel(&self) -> &SsaoKernel {
        &self.kernel
    }

    pub fn light(&self) -> &LightState {
        &self.light
    }

    fn encode_pass(&self, frame: &mut FrameContext<'_>, plan: &PassPlan, meshes: &[GpuMesh]) {
        let targets = &self.targets;
        let gbuffer = &targets.gbuffer;
        let frame_group = self.bindings.frame_bind_group();

        match plan.kind {
            PassKind::Skybox => {
                let mut pass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some(plan.kind.label()),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: frame.target,
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Clear(Color::BLACK),
                            store: StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                        view: &gbuffer.depth_stencil_view,
                        depth_ops: Some(Operations {
                            load: LoadOp::Clear(1.0),
                            store: StoreOp::Store,
                        }),
                        stencil_ops: Some(Operations {
                            load: LoadOp::Clear(0),
                            store: StoreOp::Store,
                        }),
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                self.skybox.draw(&mut pass, frame_group);
            }
            PassKind::Shadow => {
                let mut pass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some(plan.kind.label()),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                        view: &self.shadow.map.view,
                        depth_ops: Some(Operations {
                            load: LoadOp::Clear(1.0),
                            store: StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipelines.shadow);
                pass.set_bind_group(0, frame_group, &[]);
                pass.draw_planned_meshes(&plan.draws, meshes, &self.bindings, None);
            }
            PassKind::Geometry => {
                // Position w = 0 marks background for the SSAO pass.
                let color_attachments = [
                    cleared(&gbuffer.position.view),
                    cleared(&gbuffer.normal.view),
                    cleared(&gbuffer.albedo.view),
                    cleared(&gbuffer.light.view),
                ];

                let mut pass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some(plan.kind.label()),
                    color_attachments: &color_attachments,
                    depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                        view: &gbuffer.depth_stencil_view,
                        depth_ops: Some(Operations {
                            load: LoadOp::Clear(1.0),
                            store: StoreOp::Store,
                        }),
                        stencil_ops: Some(Operations {
                            load: LoadOp::Load,
                            store: StoreOp::Store,
                        }),
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipelines.geometry);
                pass.set_bind_group(0, frame_group, &[]);
                pass.set_bind_group(3, &self.shadow_inputs, &[]);
                pass.draw_planned_meshes(&plan.draws, meshes, &self.bindings, Some(2));
            }
            PassKind::Ssao | PassKind::Blur => {
                let (target, pipeline, inputs) = if plan.kind == PassKind::Ssao {
                    (&targets.ssao, &self.pipelines.ssao, &targets.ssao_inputs)
                } else {
                    (&targets.blur, &self.pipelines.blur, &targets.blur_inputs)
                };
                let mut pass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some(plan.kind.label()),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: &target.target.view,
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Clear(Color::WHITE),
                            store: StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                pass.set_pipeline(pipeline);
                if plan.kind == PassKind::Ssao {
                    pass.set_bind_group(0, frame_group, &[]);
                    pass.set_bind_group(1, inputs, &[]);
                } else {
                    pass.set_bind_group(0, inputs, &[]);
                }
                pass.draw_fullscreen();
            }
            PassKind::Stencil => {
                let mut pass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some(plan.kind.label()),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                        view: &gbuffer.depth_stencil_view,
                        depth_ops: Some(Operations {
                            load: LoadOp::Load,
                            store: StoreOp::Store,
                        }),
                        stencil_ops: Some(Operations {
                            load: LoadOp::Clear(0),
                            store: StoreOp::Store,
                        }),
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipelines.stencil);
                pass.set_stencil_reference(1);
                pass.set_bind_group(0, frame_group, &[]);
                pass.draw_planned_meshes(&plan.draws, meshes, &self.bindings, None);
            }
            PassKind::Lighting => {
                let mut pass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
                    label: Some(plan.kind.label()),
                    color_attachments: &[Some(RenderPassColorAttachment {
                        view: frame.target,
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Load,
                            store: StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                        view: &gbuffer.depth_stencil_view,
                        depth_ops: Some(Operations {
                            load: LoadOp::Load,
                            store: StoreOp::Store,
                        }),
                        stencil_ops: Some(Operations {
                            load: LoadOp::Load,
                            store: StoreOp::Store,
                        }),
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                pass.set_pipeline(&self.pipelines.lighting);
                pass.set_stencil_reference(1);
                pass.set_bind_group(0, frame_group, &[]);
                pass.set_bind_group(1, &targets.lighting_inputs, &[]);
                pass.draw_fullscreen();
            }
            PassKind::Forward => log::warn!("Deferred renderer was handed a forward pass"),
        }
    }
}

impl Renderer for SsaoRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Ssao
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
        let plan = FramePlan::deferred(root, view, projection);

        let uniform = FrameUniform::new(
            view,
            projection,
            &self.light,
            (self.width, self.height),
            self.maps.bits(),
        );
        checked(frame.device, "SSAO frame upload", || {
            self.bindings
                .upload(frame.device, frame.queue, uniform, &plan.instances)
        });

        for pass in &plan.passes {
            self.encode_pass(frame, pass, meshes);
        }
        plan
    }

    fn set_light(&mut self, position: Vector3<f32>, direction: Vector3<f32>) {
        self.light.set(position, direction, &self.shadow_config);
    }

    fn resize(&mut self, device: &Device, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 || (width, height) == (self.width, self.height) {
            return Ok(());
        }
        self.targets = ViewportTargets::new(device, &self.layouts, &self.noise, &self.kernel_ubo, width, height)?;
        self.width = width;
        self.height = height;
        log::debug!("Resized SSAO targets to {width}x{height}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_uniform_layout() {
        assert_eq!(std::mem::size_of::<KernelUniform>(), MAX_KERNEL_SIZE * 16 + 16);

        let config = SsaoConfig {
            seed: Some(7),
            kernel_size: 16,
            ..Default::default()
        };
        let kernel = SsaoKernel::generate(&config);
        let uniform = KernelUniform::new(&kernel, &config);
        assert_eq!(uniform.params, [0.5, 0.025, 16.0, 0.0]);
        assert_eq!(uniform.samples[16], [0.0; 4]);
    }

    #[test]
    fn test_lighting_stencil_tests_both_faces() {
        let state = stencil_equal();
        assert_eq!(state.front.compare, CompareFunction::Equal);
        assert_eq!(state.back, state.front);
        assert_eq!(state.write_mask, 0);

        let mark = stencil_mark();
        assert_eq!(mark.front.pass_op, StencilOperation::Replace);
        assert_eq!(mark.front.compare, CompareFunction::Always);
    }
}
