//! Mesh data and GPU mesh buffers
//!
//! [`MeshData`] is the CPU side of an imported sub-mesh: interleaved vertices
//! with a tangent frame, and triangle indices. [`GpuMesh`] uploads it once and
//! pairs it with its [`Material`].

use cgmath::{InnerSpace, Vector2, Vector3, Zero};
use wgpu::util::DeviceExt;

use super::{material::Material, vertex::MeshVertex};

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    /// Index into the imported material list
    pub material: Option<usize>,
}

impl MeshData {
    /// Builds mesh data from a model imported with `single_index` and
    /// `triangulate` enabled.
    pub fn from_tobj(model: &tobj::Model) -> Self {
        let mesh = &model.mesh;
        let mut data = Self::from_arrays(
            &model.name,
            &mesh.positions,
            &mesh.normals,
            &mesh.texcoords,
            &mesh.indices,
        );
        data.material = mesh.material_id;
        data
    }

    /// Builds mesh data from flat attribute arrays.
    ///
    /// Missing normals are replaced by averaged face normals. Missing texture
    /// coordinates default to zero. V is flipped so that 0 is the image's top row.
    pub fn from_arrays(
        name: &str,
        positions: &[f32],
        normals: &[f32],
        texcoords: &[f32],
        indices: &[u32],
    ) -> Self {
        let generated;
        let normals = if normals.len() == positions.len() {
            normals
        } else {
            log::debug!("Mesh {name} has no normals, using face normals");
            generated = calculate_face_normals(positions, indices);
            generated.as_slice()
        };

        let mut vertices: Vec<MeshVertex> = (0..positions.len() / 3)
            .map(|i| MeshVertex {
                position: [positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]],
                normal: [normals[i * 3], normals[i * 3 + 1], normals[i * 3 + 2]],
                uv: [
                    texcoords.get(i * 2).map_or(0.0, |f| *f),
                    1.0 - texcoords.get(i * 2 + 1).map_or(0.0, |f| *f),
                ],
                tangent: [0.0; 3],
                bitangent: [0.0; 3],
            })
            .collect();

        compute_tangents(&mut vertices, indices);

        Self {
            name: name.to_owned(),
            vertices,
            indices: indices.to_vec(),
            material: None,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Calculates per-vertex normals by averaging the normals of adjacent faces.
pub fn calculate_face_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex_count = positions.len() / 3;
    let position = |i: usize| Vector3::new(positions[i * 3], positions[i * 3 + 1], positions[i * 3 + 2]);
    let mut sums = vec![Vector3::zero(); vertex_count];

    for triangle in indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let (v0, v1, v2) = (position(i0), position(i1), position(i2));

        // Area-weighted: the cross product's length is twice the triangle area.
        let face_normal = (v1 - v0).cross(v2 - v0);
        for vertex in [i0, i1, i2] {
            sums[vertex] += face_normal;
        }
    }

    sums.into_iter()
        .flat_map(|sum| {
            let n = if sum.magnitude2() > 0.0 {
                sum.normalize()
            } else {
                Vector3::unit_y()
            };
            [n.x, n.y, n.z]
        })
        .collect()
}

/// Accumulates per-triangle tangents and bitangents from UV derivatives and
/// normalizes them per vertex.
///
/// Triangles with degenerate UVs contribute nothing. Vertices left without a
/// tangent get an arbitrary frame perpendicular to their normal.
fn compute_tangents(vertices: &mut [MeshVertex], indices: &[u32]) {
    let mut tangents = vec![Vector3::<f32>::zero(); vertices.len()];
    let mut bitangents = vec![Vector3::<f32>::zero(); vertices.len()];

    for c in indices.chunks_exact(3) {
        let [i0, i1, i2] = [c[0], c[1], c[2]].map(|i| i as usize);
        let pos0: Vector3<f32> = vertices[i0].position.into();
        let pos1: Vector3<f32> = vertices[i1].position.into();
        let pos2: Vector3<f32> = vertices[i2].position.into();
        let uv0: Vector2<f32> = vertices[i0].uv.into();
        let uv1: Vector2<f32> = vertices[i1].uv.into();
        let uv2: Vector2<f32> = vertices[i2].uv.into();

        let delta_pos1 = pos1 - pos0;
        let delta_pos2 = pos2 - pos0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        let det = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if det.abs() <= f32::EPSILON {
            continue;
        }
        let r = 1.0 / det;
        let tangent = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        // Flipped to undo the V flip applied at import.
        let bitangent = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * -r;

        for i in [i0, i1, i2] {
            tangents[i] += tangent;
            bitangents[i] += bitangent;
        }
    }

    for ((vertex, tangent), bitangent) in vertices.iter_mut().zip(tangents).zip(bitangents) {
        let normal: Vector3<f32> = vertex.normal.into();
        let (tangent, bitangent) = if tangent.magnitude2() > 0.0 && bitangent.magnitude2() > 0.0 {
            (tangent.normalize(), bitangent.normalize())
        } else {
            fallback_frame(normal)
        };
        vertex.tangent = tangent.into();
        vertex.bitangent = bitangent.into();
    }
}

fn fallback_frame(normal: Vector3<f32>) -> (Vector3<f32>, Vector3<f32>) {
    let helper = if normal.x.abs() < 0.9 {
        Vector3::unit_x()
    } else {
        Vector3::unit_y()
    };
    let bitangent = normal.cross(helper).normalize();
    let tangent = bitangent.cross(normal).normalize();
    (tangent, bitangent)
}

/// A mesh uploaded to the GPU
///
/// Buffers are written once at creation and never modified.
pub struct GpuMesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub material: Material,
}

impl GpuMesh {
    pub fn new(device: &wgpu::Device, data: &MeshData, material: Material) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", data.name)),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", data.name)),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            name: data.name.clone(),
            vertex_buffer,
            index_buffer,
            index_count: data.indices.len() as u32,
            material,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD_POSITIONS: [f32; 12] = [
        0.0, 0.0, 0.0, //
        1.0, 0.0, 0.0, //
        1.0, 1.0, 0.0, //
        0.0, 1.0, 0.0,
    ];
    const QUAD_UVS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 3, 0];

    fn assert_close(actual: [f32; 3], expected: [f32; 3]) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn test_unit_uv_quad_tangent_frame() {
        let normals = [0.0, 0.0, 1.0].repeat(4);
        let mesh = MeshData::from_arrays("quad", &QUAD_POSITIONS, &normals, &QUAD_UVS, &QUAD_INDICES);

        for vertex in &mesh.vertices {
            assert_close(vertex.tangent, [1.0, 0.0, 0.0]);
            assert_close(vertex.bitangent, [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn test_missing_normals_use_face_normals() {
        let mesh = MeshData::from_arrays("quad", &QUAD_POSITIONS, &[], &QUAD_UVS, &QUAD_INDICES);
        for vertex in &mesh.vertices {
            assert_close(vertex.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_uv_v_is_flipped() {
        let normals = [0.0, 0.0, 1.0].repeat(4);
        let mesh = MeshData::from_arrays("quad", &QUAD_POSITIONS, &normals, &QUAD_UVS, &QUAD_INDICES);
        assert_eq!(mesh.vertices[0].uv, [0.0, 1.0]);
        assert_eq!(mesh.vertices[2].uv, [1.0, 0.0]);
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn test_missing_uvs_give_perpendicular_frame() {
        let mesh = MeshData::from_arrays("quad", &QUAD_POSITIONS, &[], &[], &QUAD_INDICES);
        for vertex in &mesh.vertices {
            let n = Vector3::from(vertex.normal);
            let t = Vector3::from(vertex.tangent);
            let b = Vector3::from(vertex.bitangent);
            assert!(n.dot(t).abs() < 1e-5);
            assert!(n.dot(b).abs() < 1e-5);
            assert!((t.magnitude() - 1.0).abs() < 1e-5);
        }
    }
}
