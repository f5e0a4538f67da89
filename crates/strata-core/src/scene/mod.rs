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

//! Scene data consumed by the hybrid pipeline.
//!
//! A [`Scene`] is the flat result of loading: meshes with world transforms,
//! the materials they reference, and the point lights. The [`SceneGraph`] is
//! the hierarchy the flat list is produced from.

mod graph;
mod material;
mod mesh;
mod view;

pub use self::graph::{FlatInstance, NodeDesc, SceneGraph, SceneNode};
pub use self::material::Material;
pub use self::mesh::SceneMesh;
pub use self::view::ViewInfo;

use crate::renderer::{GraphicsDevice, LightList, MeshData, ResourceError};
use std::collections::HashSet;

/// A named piece of geometry in the mesh library, with its material.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshAsset {
    /// Debug name given to every instance.
    pub name: String,
    /// The geometry.
    pub data: MeshData,
    /// Index into the scene's material list.
    pub material_index: usize,
}

/// Everything the passes draw in one frame.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// The drawable meshes.
    pub meshes: Vec<SceneMesh>,
    /// Materials referenced by the meshes.
    pub materials: Vec<Material>,
    /// The point lights.
    pub lights: LightList,
}

impl Scene {
    /// Instantiates every mesh reference of `graph` on the device.
    ///
    /// Each library entry is uploaded once; further instances share its GPU
    /// buffers. References to missing library entries are skipped.
    pub fn instantiate(
        device: &mut dyn GraphicsDevice,
        graph: &SceneGraph,
        library: &[MeshAsset],
        materials: Vec<Material>,
        lights: LightList,
    ) -> Result<Self, ResourceError> {
        let mut uploaded: Vec<Option<SceneMesh>> = vec![None; library.len()];
        let mut meshes = Vec::new();

        for instance in graph.flatten() {
            let Some(asset) = library.get(instance.mesh) else {
                log::warn!(
                    "Scene graph references mesh {} but the library only has {}",
                    instance.mesh,
                    library.len()
                );
                continue;
            };

            let mut mesh = match &uploaded[instance.mesh] {
                Some(prototype) => prototype.clone(),
                None => {
                    let mesh = SceneMesh::upload(
                        device,
                        asset.name.clone(),
                        &asset.data,
                        asset.material_index,
                        instance.world,
                    )?;
                    uploaded[instance.mesh] = Some(mesh.clone());
                    mesh
                }
            };
            mesh.transform = instance.world;
            meshes.push(mesh);
        }

        log::info!(
            "Instantiated scene: {} meshes, {} materials, {} lights",
            meshes.len(),
            materials.len(),
            lights.len()
        );

        Ok(Self {
            meshes,
            materials,
            lights,
        })
    }

    /// Destroys the GPU buffers of every mesh and empties the mesh list.
    ///
    /// Instances sharing an upload are destroyed once. Failures are logged
    /// and the remaining meshes are still released.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        let mut released = HashSet::new();
        for mesh in self.meshes.drain(..) {
            if !released.insert(mesh.gpu.id) {
                continue;
            }
            if let Err(e) = device.destroy_mesh(mesh.gpu.id) {
                log::warn!("Failed to destroy mesh '{}': {e}", mesh.name);
            }
        }
        log::debug!("Released {} scene meshes", released.len());
    }

    /// The material of `mesh`, or [`Material::DEFAULT`] for a dangling index.
    pub fn material_of(&self, mesh: &SceneMesh) -> &Material {
        self.materials
            .get(mesh.material_index)
            .unwrap_or(&Material::DEFAULT)
    }

    /// Meshes currently routed through the G-buffer.
    pub fn deferred_meshes(&self) -> impl Iterator<Item = &SceneMesh> {
        self.meshes.iter().filter(|m| !m.use_forward)
    }

    /// Meshes currently routed through the forward pass.
    pub fn forward_meshes(&self) -> impl Iterator<Item = &SceneMesh> {
        self.meshes.iter().filter(|m| m.use_forward)
    }
}
