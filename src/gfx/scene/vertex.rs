//! # Vertex Data Structures
//!
//! GPU-compatible vertex formats: [`MeshVertex`] for imported meshes and
//! [`SkyboxVertex`] for the environment cube.

use std::mem;

/// A mesh vertex with a full tangent frame.
///
/// # Memory Layout
///
/// The `#[repr(C)]` attribute ensures the struct has a C-compatible memory
/// layout, which is required for GPU buffer operations.
///
/// # Fields
///
/// - `position`: object-space position [x, y, z]
/// - `normal`: object-space normal [nx, ny, nz]
/// - `uv`: texture coordinates, V pointing down
/// - `tangent`, `bitangent`: UV-aligned tangent frame for normal mapping
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
}

impl MeshVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
        3 => Float32x3,
        4 => Float32x3
    ];
    const POSITION_ATTRIBUTE: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

    /// Returns the vertex buffer layout for wgpu rendering.
    ///
    /// # Returns
    ///
    /// A [`wgpu::VertexBufferLayout`] that describes:
    /// - Attribute 0: Position (Float32x3)
    /// - Attribute 1: Normal (Float32x3)
    /// - Attribute 2: UV (Float32x2)
    /// - Attribute 3: Tangent (Float32x3)
    /// - Attribute 4: Bitangent (Float32x3)
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    /// Layout used by the shadow and stencil passes, which only read positions.
    pub fn position_only_desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::POSITION_ATTRIBUTE,
        }
    }
}

/// Position-only vertex of the unit skybox cube.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SkyboxVertex {
    pub position: [f32; 3],
}

impl SkyboxVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<SkyboxVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            }],
        }
    }

    /// The 36 vertices of a unit cube, wound counter-clockwise seen from inside.
    pub fn unit_cube() -> [SkyboxVertex; 36] {
        const CORNERS: [[f32; 3]; 8] = [
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ];
        // Two triangles per face, facing the cube's centre.
        const FACES: [[usize; 6]; 6] = [
            [0, 1, 2, 2, 3, 0], // -Z
            [4, 6, 5, 6, 4, 7], // +Z
            [0, 7, 4, 7, 0, 3], // -X
            [1, 6, 2, 6, 1, 5], // +X
            [0, 5, 1, 5, 0, 4], // -Y
            [3, 6, 7, 6, 3, 2], // +Y
        ];

        let mut vertices = [SkyboxVertex { position: [0.0; 3] }; 36];
        for (i, corner) in FACES.iter().flatten().enumerate() {
            vertices[i].position = CORNERS[*corner];
        }
        vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Vector3};

    #[test]
    fn test_mesh_vertex_layout_covers_struct() {
        let layout = MeshVertex::desc();
        assert_eq!(layout.array_stride, 56);
        let last = layout.attributes.last().unwrap();
        assert_eq!(last.offset + 12, layout.array_stride);
    }

    #[test]
    fn test_skybox_cube_faces_point_inward() {
        let cube = SkyboxVertex::unit_cube();
        for tri in cube.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|v| Vector3::from(v.position));
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) < 0.0, "triangle {tri:?} faces outward");
            assert!(normal.magnitude() > 0.0);
        }
    }
}
