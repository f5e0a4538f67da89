// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CPU-side mesh data and the handle of its GPU upload.

use super::resource::MeshId;
use crate::math::{Aabb, Vec3};
use bytemuck::{Pod, Zeroable};

/// An interleaved vertex: position followed by normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
}

impl Vertex {
    /// Byte stride of one vertex.
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    /// Creates a vertex from glam vectors.
    pub fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }
}

/// Indexed triangle-list geometry waiting to be uploaded.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    /// Vertices.
    pub vertices: Vec<Vertex>,
    /// Triangle-list indices into `vertices`.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Number of triangles described by the index list.
    pub fn triangle_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    /// The local-space bounding box, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices.iter().map(|v| Vec3::from_array(v.position)))
    }

    /// A unit-normal quad in the XY plane facing +Z, centered at the origin.
    pub fn quad(width: f32, height: f32) -> Self {
        let (hw, hh) = (width * 0.5, height * 0.5);
        let n = Vec3::Z;
        Self {
            vertices: vec![
                Vertex::new(Vec3::new(-hw, -hh, 0.0), n),
                Vertex::new(Vec3::new(hw, -hh, 0.0), n),
                Vertex::new(Vec3::new(hw, hh, 0.0), n),
                Vertex::new(Vec3::new(-hw, hh, 0.0), n),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// An axis-aligned cube of edge `size` with flat per-face normals.
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        // (normal, tangent u, tangent v) per face, counter-clockwise from outside.
        let faces = [
            (Vec3::X, Vec3::NEG_Z, Vec3::Y),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::X, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        ];

        let mut mesh = MeshData::default();
        for (normal, u, v) in faces {
            let base = mesh.vertices.len() as u32;
            let center = normal * h;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                mesh.vertices
                    .push(Vertex::new(center + u * (su * h) + v * (sv * h), normal));
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// A square grid in the XZ plane facing +Y, `subdivisions` cells per side.
    ///
    /// Produces `2 * subdivisions^2` triangles, which makes it handy for
    /// building meshes of a known complexity.
    pub fn plane(size: f32, subdivisions: u32) -> Self {
        let cells = subdivisions.max(1);
        let step = size / cells as f32;
        let origin = -size * 0.5;
        let row = cells + 1;

        let mut mesh = MeshData::default();
        for z in 0..=cells {
            for x in 0..=cells {
                let p = Vec3::new(origin + x as f32 * step, 0.0, origin + z as f32 * step);
                mesh.vertices.push(Vertex::new(p, Vec3::Y));
            }
        }
        for z in 0..cells {
            for x in 0..cells {
                let i = z * row + x;
                mesh.indices
                    .extend_from_slice(&[i, i + row, i + 1, i + 1, i + row, i + row + 1]);
            }
        }
        mesh
    }
}

/// A mesh resident on the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuMesh {
    /// Handle to the vertex and index buffers.
    pub id: MeshId,
    /// Number of indices to draw.
    pub index_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_stride() {
        assert_eq!(Vertex::STRIDE, 24);
    }

    #[test]
    fn test_cube_counts_and_bounds() {
        let cube = MeshData::cube(2.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        let bounds = cube.bounds().unwrap();
        assert_eq!(bounds.min, Vec3::splat(-1.0));
        assert_eq!(bounds.max, Vec3::splat(1.0));
    }

    #[test]
    fn test_cube_winding_faces_outward() {
        let cube = MeshData::cube(1.0);
        for tri in cube.indices.chunks(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]]
                .map(|i| Vec3::from_array(cube.vertices[i as usize].position));
            let n = Vec3::from_array(cube.vertices[tri[0] as usize].normal);
            assert!((b - a).cross(c - a).dot(n) > 0.0);
        }
    }

    #[test]
    fn test_plane_triangle_count() {
        assert_eq!(MeshData::plane(10.0, 20).triangle_count(), 800);
        assert_eq!(MeshData::plane(1.0, 0).triangle_count(), 2);
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(MeshData::default().bounds().is_none());
        assert_eq!(MeshData::default().triangle_count(), 0);
    }
}
