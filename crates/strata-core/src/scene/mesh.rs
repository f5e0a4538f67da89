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

//! Drawable meshes as seen by the hybrid pipeline.

use crate::math::{Aabb, Mat4, Vec3};
use crate::renderer::{GpuMesh, GraphicsDevice, MeshData, ResourceError};

/// A mesh placed in the world, with the data the mode classifier looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneMesh {
    /// A debug name.
    pub name: String,
    /// The uploaded geometry.
    pub gpu: GpuMesh,
    /// Local-space bounds.
    pub bounds: Aabb,
    /// Center of `bounds`.
    pub center: Vec3,
    /// Number of triangles.
    pub triangle_count: u32,
    /// Index into the scene's material list.
    pub material_index: usize,
    /// Local-to-world transform.
    pub transform: Mat4,
    /// Which pass draws the mesh. Only the rendering-mode recompute writes it.
    pub use_forward: bool,
}

impl SceneMesh {
    /// Uploads `data` and records its bounds and triangle count.
    ///
    /// The mesh starts on the deferred path until the first mode recompute.
    pub fn upload(
        device: &mut dyn GraphicsDevice,
        name: impl Into<String>,
        data: &MeshData,
        material_index: usize,
        transform: Mat4,
    ) -> Result<Self, ResourceError> {
        let gpu = device.create_mesh(data)?;
        let bounds = data.bounds().unwrap_or(Aabb::from_min_max(Vec3::ZERO, Vec3::ZERO));
        Ok(Self {
            name: name.into(),
            gpu,
            bounds,
            center: bounds.center(),
            triangle_count: data.triangle_count(),
            material_index,
            transform,
            use_forward: false,
        })
    }

    /// The bounds center in world space.
    pub fn world_center(&self) -> Vec3 {
        self.transform.transform_point3(self.center)
    }
}
