//! Render pipeline creation for wgpu
//!
//! Compiles shader modules from a [`ShaderLibrary`] once and builds render
//! pipelines from [`PipelineConfig`]s. Compilation and pipeline creation run
//! inside validation error scopes, so a bad shader or an inconsistent
//! pipeline surfaces as a [`RenderError`] in every build.

use std::collections::HashMap;
use wgpu::*;

use crate::{
    error::{RenderError, Result},
    gfx::resources::ShaderLibrary,
    wgpu_utils::capture_errors,
};

/// Configuration for creating a render pipeline
///
/// Defines all parameters needed to create a wgpu render pipeline,
/// including shaders, bind group layouts, and render state.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub label: String,
    pub shader: String,
    pub bind_group_layouts: Vec<BindGroupLayout>,
    pub vertex_buffers: Vec<VertexBufferLayout<'static>>,
    pub primitive_topology: PrimitiveTopology,
    pub cull_mode: Option<Face>,
    pub depth_stencil: Option<DepthStencilState>,
    pub color_targets: Vec<Option<ColorTargetState>>,
    pub vertex_only: bool, // shadow pass
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: "Default Pipeline".to_string(),
            shader: "shader".to_string(),
            bind_group_layouts: Vec::new(),
            vertex_buffers: Vec::new(),
            primitive_topology: PrimitiveTopology::TriangleList,
            cull_mode: Some(Face::Back),
            depth_stencil: None,
            color_targets: Vec::new(),
            vertex_only: false,
        }
    }
}

impl PipelineConfig {
    /// Creates a new config with a specific shader
    ///
    /// # Arguments
    /// * `shader` - Program name in the [`ShaderLibrary`]
    pub fn default_with_shader(shader: &str) -> Self {
        Self {
            label: format!("{shader} Pipeline"),
            shader: shader.to_string(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_owned();
        self
    }

    pub fn with_cull_mode(mut self, face: Option<Face>) -> Self {
        self.cull_mode = face;
        self
    }

    /// Pipeline without a fragment stage, writing depth only
    pub fn with_vertex_only(mut self) -> Self {
        self.vertex_only = true;
        self.color_targets.clear();
        self
    }

    /// Sets all bind group layouts at once (builder pattern)
    ///
    /// # Arguments
    /// * `layouts` - Layouts for groups 0, 1, ... in order
    pub fn with_bind_group_layouts(mut self, layouts: &[&BindGroupLayout]) -> Self {
        self.bind_group_layouts = layouts.iter().map(|layout| (*layout).clone()).collect();
        self
    }

    pub fn with_vertex_buffer(mut self, layout: VertexBufferLayout<'static>) -> Self {
        self.vertex_buffers.push(layout);
        self
    }

    /// Enables depth testing against a `format` attachment
    ///
    /// # Arguments
    /// * `format` - Depth (or depth-stencil) attachment format
    /// * `compare` - Depth comparison
    /// * `write` - Whether passing fragments update the depth buffer
    pub fn with_depth(mut self, format: TextureFormat, compare: CompareFunction, write: bool) -> Self {
        self.depth_stencil = Some(DepthStencilState {
            format,
            depth_write_enabled: write,
            depth_compare: compare,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        });
        self
    }

    /// Sets the stencil state of the depth attachment; call after [`Self::with_depth`].
    pub fn with_stencil(mut self, stencil: StencilState) -> Self {
        if let Some(depth_stencil) = &mut self.depth_stencil {
            depth_stencil.stencil = stencil;
        }
        self
    }

    /// Sets color targets for this pipeline (builder pattern)
    pub fn with_color_targets(mut self, targets: Vec<Option<ColorTargetState>>) -> Self {
        self.color_targets = targets;
        self
    }

    /// Single replace-blended color target of `format`
    pub fn with_color_target(self, format: TextureFormat) -> Self {
        self.with_color_targets(vec![Some(ColorTargetState {
            format,
            blend: Some(BlendState::REPLACE),
            write_mask: ColorWrites::ALL,
        })])
    }
}

/// Compiles shader modules and creates pipelines
///
/// Shader modules are compiled on first use and shared by every pipeline
/// that names the same program.
pub struct PipelineManager {
    device: Device,
    library: ShaderLibrary,
    shader_modules: HashMap<String, ShaderModule>,
    created_pipelines: usize,
}

impl PipelineManager {
    /// Creates a new pipeline manager
    ///
    /// # Arguments
    /// * `device` - wgpu device for creating resources
    /// * `library` - Where shader sources come from
    pub fn new(device: &Device, library: ShaderLibrary) -> Self {
        Self {
            device: device.clone(),
            library,
            shader_modules: HashMap::new(),
            created_pipelines: 0,
        }
    }

    /// Loads and compiles a shader module
    ///
    /// # Returns
    /// [`RenderError::ShaderCompile`] with the compiler diagnostic if the WGSL is invalid
    pub fn load_shader(&mut self, name: &str) -> Result<&ShaderModule> {
        if !self.shader_modules.contains_key(name) {
            let source = self.library.source(name)?;
            let (module, error) = capture_errors(&self.device, || {
                self.device.create_shader_module(ShaderModuleDescriptor {
                    label: Some(name),
                    source: ShaderSource::Wgsl(source),
                })
            });
            if let Some(error) = error {
                return Err(RenderError::ShaderCompile {
                    label: name.to_owned(),
                    log: error.to_string(),
                });
            }
            log::debug!("Compiled shader `{name}`");
            self.shader_modules.insert(name.to_owned(), module);
        }
        Ok(&self.shader_modules[name])
    }

    /// Creates a render pipeline from configuration
    ///
    /// # Returns
    /// [`RenderError::PipelineLink`] when the stages, layouts and targets do not fit together
    pub fn create_pipeline(&mut self, config: &PipelineConfig) -> Result<RenderPipeline> {
        self.load_shader(&config.shader)?;
        let shader = &self.shader_modules[&config.shader];
        let device = &self.device;

        let bind_group_layout_refs: Vec<&BindGroupLayout> = config.bind_group_layouts.iter().collect();

        let (pipeline, error) = capture_errors(device, || {
            let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(&format!("{} Layout", config.label)),
                bind_group_layouts: &bind_group_layout_refs,
                push_constant_ranges: &[],
            });

            let fragment_state = if config.vertex_only {
                None
            } else {
                Some(FragmentState {
                    module: shader,
                    entry_point: Some("fs_main"),
                    targets: &config.color_targets,
                    compilation_options: PipelineCompilationOptions::default(),
                })
            };

            device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(&config.label),
                layout: Some(&pipeline_layout),
                vertex: VertexState {
                    module: shader,
                    entry_point: Some("vs_main"),
                    buffers: &config.vertex_buffers,
                    compilation_options: PipelineCompilationOptions::default(),
                },
                fragment: fragment_state,
                primitive: PrimitiveState {
                    topology: config.primitive_topology,
                    strip_index_format: None,
                    front_face: FrontFace::Ccw,
                    cull_mode: config.cull_mode,
                    polygon_mode: PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: config.depth_stencil.clone(),
                multisample: MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        });

        if let Some(error) = error {
            return Err(RenderError::PipelineLink {
                label: config.label.clone(),
                log: error.to_string(),
            });
        }

        self.created_pipelines += 1;
        log::debug!("Created pipeline `{}`", config.label);
        Ok(pipeline)
    }

    /// Returns pipeline manager statistics
    pub fn get_stats(&self) -> PipelineStats {
        PipelineStats {
            total_pipelines: self.created_pipelines,
            loaded_shaders: self.shader_modules.len(),
        }
    }
}

/// Statistics about pipeline manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub total_pipelines: usize,
    pub loaded_shaders: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = PipelineConfig::default_with_shader("stencil")
            .with_depth(TextureFormat::Depth24PlusStencil8, CompareFunction::Always, false)
            .with_stencil(StencilState {
                front: StencilFaceState {
                    compare: CompareFunction::Always,
                    fail_op: StencilOperation::Keep,
                    depth_fail_op: StencilOperation::Keep,
                    pass_op: StencilOperation::Replace,
                },
                back: StencilFaceState::IGNORE,
                read_mask: 0xff,
                write_mask: 0xff,
            });

        let depth = config.depth_stencil.as_ref().unwrap();
        assert!(!depth.depth_write_enabled);
        assert_eq!(depth.stencil.front.pass_op, StencilOperation::Replace);
        assert_eq!(config.label, "stencil Pipeline");
        assert!(config.color_targets.is_empty());
    }

    #[test]
    fn test_vertex_only_drops_color_targets() {
        let config = PipelineConfig::default_with_shader("shadow")
            .with_color_target(TextureFormat::Rgba8Unorm)
            .with_vertex_only();
        assert!(config.vertex_only);
        assert!(config.color_targets.is_empty());
    }
}
