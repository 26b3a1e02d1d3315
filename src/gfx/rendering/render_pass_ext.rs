//! Render Pass Extensions
//!
//! Draw helpers shared by the forward and deferred renderers.

use wgpu::*;

use crate::gfx::{
    rendering::{frame_bindings::FrameBindings, frame_plan::DrawCommand},
    scene::mesh::GpuMesh,
};

/// Extension trait for RenderPass covering the draw kinds of a frame plan
pub trait RenderPassExt<'a> {
    /// Binds `mesh`'s vertex and index buffers and draws all of its triangles
    fn draw_mesh(&mut self, mesh: &'a GpuMesh);

    /// Draws one triangle covering the viewport; positions come from the vertex index
    fn draw_fullscreen(&mut self);

    /// Encodes the mesh draws of a planned pass
    ///
    /// Each draw binds its instance slot at group 1. With `material_group`
    /// set, the mesh's material is bound at that group too. Non-mesh
    /// commands are ignored.
    fn draw_planned_meshes(
        &mut self,
        draws: &[DrawCommand],
        meshes: &'a [GpuMesh],
        bindings: &FrameBindings,
        material_group: Option<u32>,
    );
}

impl<'a> RenderPassExt<'a> for RenderPass<'a> {
    fn draw_mesh(&mut self, mesh: &'a GpuMesh) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
        self.draw_indexed(0..mesh.index_count, 0, 0..1);
    }

    fn draw_fullscreen(&mut self) {
        self.draw(0..3, 0..1);
    }

    fn draw_planned_meshes(
        &mut self,
        draws: &[DrawCommand],
        meshes: &'a [GpuMesh],
        bindings: &FrameBindings,
        material_group: Option<u32>,
    ) {
        for draw in draws {
            let DrawCommand::Mesh { mesh, instance } = *draw else {
                continue;
            };
            let Some(mesh) = meshes.get(mesh) else {
                log::warn!("Scene graph references missing mesh {mesh}");
                continue;
            };

            self.set_bind_group(1, bindings.instance_bind_group(), &[bindings.instance_offset(instance)]);
            if let Some(group) = material_group {
                self.set_bind_group(group, mesh.material.bind_group(), &[]);
            }
            self.draw_mesh(mesh);
        }
    }
}
