//! Per-frame command log
//!
//! A [`FramePlan`] lists the passes of one frame in execution order together
//! with their draws and the per-instance uniforms those draws index. Building
//! it is pure CPU work over the scene graph; the renderer then uploads
//! `instances` once and encodes one render pass per [`PassPlan`].

use cgmath::{InnerSpace, Matrix, Matrix4, SquareMatrix, Vector4};

use crate::gfx::{
    camera::camera_utils::convert_matrix4_to_array, rendering::light::LightState, scene::node::Node,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    Skybox,
    Shadow,
    Geometry,
    Ssao,
    Blur,
    Stencil,
    Lighting,
    Forward,
}

impl PassKind {
    /// Execution order of the deferred renderer
    pub const DEFERRED: [PassKind; 7] = [
        PassKind::Skybox,
        PassKind::Shadow,
        PassKind::Geometry,
        PassKind::Ssao,
        PassKind::Blur,
        PassKind::Stencil,
        PassKind::Lighting,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PassKind::Skybox => "Skybox Pass",
            PassKind::Shadow => "Shadow Pass",
            PassKind::Geometry => "Geometry Pass",
            PassKind::Ssao => "SSAO Pass",
            PassKind::Blur => "Blur Pass",
            PassKind::Stencil => "Stencil Pass",
            PassKind::Lighting => "Lighting Pass",
            PassKind::Forward => "Forward Pass",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCommand {
    /// Indexed draw of `mesh` using instance uniform slot `instance`
    Mesh { mesh: usize, instance: u32 },
    /// Three-vertex full-screen triangle
    FullscreenQuad,
    /// 36-vertex environment cube
    SkyboxCube,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassPlan {
    pub kind: PassKind,
    pub draws: Vec<DrawCommand>,
}

/// Transforms of one (node, mesh) pair; exactly 256 bytes, one dynamic-offset slot.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceUniform {
    pub model: [[f32; 4]; 4],
    pub world_view: [[f32; 4]; 4],
    pub world_view_proj: [[f32; 4]; 4],
    /// Inverse transpose of `world_view`, for normals
    pub normal_view: [[f32; 4]; 4],
}

impl InstanceUniform {
    pub fn new(model: Matrix4<f32>, view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        let world_view = view * model;
        let normal_view = world_view
            .invert()
            .map(|inverse| inverse.transpose())
            .unwrap_or(world_view);
        Self {
            model: convert_matrix4_to_array(model),
            world_view: convert_matrix4_to_array(world_view),
            world_view_proj: convert_matrix4_to_array(projection * world_view),
            normal_view: convert_matrix4_to_array(normal_view),
        }
    }
}

/// Values shared by every pass of a frame.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub light_space: [[f32; 4]; 4],
    /// View-space light position
    pub light_position: [f32; 4],
    /// View-space direction the light shines along
    pub light_direction: [f32; 4],
    /// Eye position in lighting space; lighting runs in view space, so the origin
    pub view_position: [f32; 4],
    pub viewport: [f32; 2],
    /// Enabled texture maps, see [`crate::config::TextureMaps::bits`]
    pub maps: u32,
    pub _padding: u32,
}

impl FrameUniform {
    pub fn new(
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
        light: &LightState,
        viewport: (u32, u32),
        maps: u32,
    ) -> Self {
        let light_position = view * light.position.extend(1.0);
        let light_direction = (view * light.direction.extend(0.0)).truncate().normalize();
        Self {
            view: convert_matrix4_to_array(view),
            projection: convert_matrix4_to_array(projection),
            light_space: convert_matrix4_to_array(light.view_proj_matrix),
            light_position: light_position.into(),
            light_direction: light_direction.extend(0.0).into(),
            view_position: Vector4::unit_w().into(),
            viewport: [viewport.0 as f32, viewport.1 as f32],
            maps,
            _padding: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FramePlan {
    pub passes: Vec<PassPlan>,
    pub instances: Vec<InstanceUniform>,
}

impl FramePlan {
    /// Deferred frame: skybox, shadow, geometry, SSAO, blur, stencil, lighting.
    ///
    /// The three mesh passes share instance slots, since they traverse the
    /// same graph in the same order.
    pub fn deferred(root: &Node, view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        let (instances, mesh_draws) = collect_instances(root, view, projection);

        let passes = PassKind::DEFERRED
            .iter()
            .map(|&kind| {
                let draws = match kind {
                    PassKind::Skybox => vec![DrawCommand::SkyboxCube],
                    PassKind::Shadow | PassKind::Geometry | PassKind::Stencil => mesh_draws.clone(),
                    _ => vec![DrawCommand::FullscreenQuad],
                };
                PassPlan { kind, draws }
            })
            .collect();

        Self { passes, instances }
    }

    /// Forward frame: a single pass drawing every mesh reference.
    pub fn forward(root: &Node, view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        let (instances, draws) = collect_instances(root, view, projection);
        Self {
            passes: vec![PassPlan {
                kind: PassKind::Forward,
                draws,
            }],
            instances,
        }
    }

    pub fn order(&self) -> Vec<PassKind> {
        self.passes.iter().map(|pass| pass.kind).collect()
    }

    pub fn pass(&self, kind: PassKind) -> Option<&PassPlan> {
        self.passes.iter().find(|pass| pass.kind == kind)
    }

    /// Number of draws per pass, in execution order.
    pub fn draw_counts(&self) -> Vec<(PassKind, usize)> {
        self.passes
            .iter()
            .map(|pass| (pass.kind, pass.draws.len()))
            .collect()
    }

    pub fn draws_in(&self, kind: PassKind) -> usize {
        self.pass(kind).map_or(0, |pass| pass.draws.len())
    }
}

fn collect_instances(
    root: &Node,
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
) -> (Vec<InstanceUniform>, Vec<DrawCommand>) {
    let mut instances = Vec::with_capacity(root.mesh_reference_count());
    let mut draws = Vec::with_capacity(instances.capacity());

    for (mesh, world) in root.walk() {
        draws.push(DrawCommand::Mesh {
            mesh,
            instance: instances.len() as u32,
        });
        instances.push(InstanceUniform::new(world, view, projection));
    }

    (instances, draws)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::camera::{Camera, Projection};
    use cgmath::{vec3, Deg, Vector3};

    fn single_mesh_root() -> Node {
        Node::default().with_meshes([0])
    }

    fn camera_matrices() -> (Matrix4<f32>, Matrix4<f32>) {
        let view = Camera::default().view_matrix();
        let projection = Projection::new(1600, 900, Deg(45.0), 0.1, 1000.0).matrix();
        (view, projection)
    }

    #[test]
    fn test_instance_uniform_is_one_slot() {
        assert_eq!(std::mem::size_of::<InstanceUniform>(), 256);
        assert_eq!(std::mem::size_of::<FrameUniform>(), 256);
    }

    #[test]
    fn test_deferred_pass_order() {
        let (view, projection) = camera_matrices();
        let plan = FramePlan::deferred(&single_mesh_root(), view, projection);
        assert_eq!(plan.order(), PassKind::DEFERRED.to_vec());
    }

    #[test]
    fn test_single_mesh_draw_counts() {
        let (view, projection) = camera_matrices();
        let plan = FramePlan::deferred(&single_mesh_root(), view, projection);

        assert_eq!(
            plan.draw_counts(),
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
        assert_eq!(plan.instances.len(), 1);
        assert_eq!(
            plan.pass(PassKind::Ssao).unwrap().draws,
            vec![DrawCommand::FullscreenQuad]
        );
    }

    #[test]
    fn test_mesh_passes_share_instances() {
        let root = Node::default()
            .with_meshes([2])
            .with_child(Node::new(Matrix4::from_translation(vec3(0.0, 1.0, 0.0))).with_meshes([0, 1]));
        let (view, projection) = camera_matrices();
        let plan = FramePlan::deferred(&root, view, projection);

        let geometry = &plan.pass(PassKind::Geometry).unwrap().draws;
        assert_eq!(geometry, &plan.pass(PassKind::Shadow).unwrap().draws);
        assert_eq!(geometry, &plan.pass(PassKind::Stencil).unwrap().draws);
        assert_eq!(
            geometry,
            &vec![
                DrawCommand::Mesh { mesh: 2, instance: 0 },
                DrawCommand::Mesh { mesh: 0, instance: 1 },
                DrawCommand::Mesh { mesh: 1, instance: 2 },
            ]
        );
        assert_eq!(plan.instances.len(), root.mesh_reference_count());
        assert_eq!(plan.instances[1].model[3], [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_forward_plan_is_single_pass() {
        let (view, projection) = camera_matrices();
        let plan = FramePlan::forward(&single_mesh_root(), view, projection);
        assert_eq!(plan.order(), vec![PassKind::Forward]);
        assert_eq!(plan.draws_in(PassKind::Forward), 1);
        assert_eq!(plan.draws_in(PassKind::Shadow), 0);
    }

    #[test]
    fn test_frame_uniform_lights_in_view_space() {
        let shadow = crate::config::ShadowConfig::default();
        let light = LightState::new(Vector3::new(0.0, 10.0, 0.0), Vector3::new(0.0, -2.0, 0.0), &shadow);
        let view = Matrix4::from_translation(vec3(0.0, -10.0, 0.0));
        let frame = FrameUniform::new(view, Matrix4::identity(), &light, (1600, 900), 0b101);

        assert_eq!(frame.light_position, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(frame.light_direction, [0.0, -1.0, 0.0, 0.0]);
        assert_eq!(frame.view_position, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(frame.viewport, [1600.0, 900.0]);
        assert_eq!(frame.maps, 0b101);
    }

    #[test]
    fn test_normal_matrix_undoes_nonuniform_scale() {
        let model = Matrix4::from_nonuniform_scale(2.0, 1.0, 1.0);
        let instance = InstanceUniform::new(model, Matrix4::identity(), Matrix4::identity());
        assert_eq!(instance.normal_view[0][0], 0.5);
        assert_eq!(instance.normal_view[1][1], 1.0);
    }
}
