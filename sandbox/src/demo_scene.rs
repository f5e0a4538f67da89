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

//! The procedural scene rendered by the sandbox.
//!
//! A large floor, a grid of crates, a few low-poly signs and a pane of glass
//! give every rule of the classifier something to decide.

use strata_core::math::{Extent2D, Mat4, Vec3};
use strata_core::renderer::{
    Attenuation, GraphicsDevice, LightList, MeshData, PointLight, ResourceError,
};
use strata_core::scene::{Material, MeshAsset, NodeDesc, Scene, SceneGraph, ViewInfo};

const FLOOR: usize = 0;
const CRATE: usize = 1;
const SIGN: usize = 2;
const GLASS: usize = 3;

fn library() -> Vec<MeshAsset> {
    vec![
        MeshAsset {
            name: "floor".into(),
            data: MeshData::plane(24.0, 32),
            material_index: 0,
        },
        MeshAsset {
            name: "crate".into(),
            // Subdivided faces keep it above the small-mesh threshold.
            data: crate_mesh(1.5, 6),
            material_index: 1,
        },
        MeshAsset {
            name: "sign".into(),
            data: MeshData::quad(1.0, 0.6),
            material_index: 2,
        },
        MeshAsset {
            name: "glass".into(),
            data: MeshData::quad(4.0, 2.5),
            material_index: 3,
        },
    ]
}

/// A cube of edge `size` whose faces are `subdivisions`-cell grids.
fn crate_mesh(size: f32, subdivisions: u32) -> MeshData {
    let face = MeshData::plane(size, subdivisions);
    let h = size * 0.5;
    let rotations = [
        Mat4::IDENTITY,
        Mat4::from_rotation_x(std::f32::consts::PI),
        Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2),
        Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        Mat4::from_rotation_z(std::f32::consts::FRAC_PI_2),
        Mat4::from_rotation_z(-std::f32::consts::FRAC_PI_2),
    ];

    let mut mesh = MeshData::default();
    for rotation in rotations {
        let transform = rotation * Mat4::from_translation(Vec3::new(0.0, h, 0.0));
        let base = mesh.vertices.len() as u32;
        mesh.vertices.extend(face.vertices.iter().map(|v| {
            let position = transform.transform_point3(Vec3::from_array(v.position));
            let normal = transform.transform_vector3(Vec3::from_array(v.normal));
            strata_core::renderer::Vertex::new(position, normal)
        }));
        mesh.indices.extend(face.indices.iter().map(|i| base + i));
    }
    mesh
}

fn graph(grid: u32) -> SceneGraph {
    let spacing = 3.0;
    let offset = (grid.saturating_sub(1)) as f32 * spacing * 0.5;

    let mut crates = NodeDesc::new("crates", Mat4::from_translation(Vec3::new(0.0, 0.75, 0.0)));
    for z in 0..grid {
        for x in 0..grid {
            let position = Vec3::new(x as f32 * spacing - offset, 0.0, z as f32 * spacing - offset);
            let sign = NodeDesc::new(
                format!("sign_{x}_{z}"),
                Mat4::from_translation(Vec3::new(0.0, 1.2, 0.8)),
            )
            .with_meshes([SIGN]);
            crates = crates.with_child(
                NodeDesc::new(format!("crate_{x}_{z}"), Mat4::from_translation(position))
                    .with_meshes([CRATE])
                    .with_child(sign),
            );
        }
    }

    SceneGraph::from_root(
        NodeDesc::new("root", Mat4::IDENTITY)
            .with_meshes([FLOOR])
            .with_child(crates)
            .with_child(
                NodeDesc::new("glass", Mat4::from_translation(Vec3::new(0.0, 1.25, offset + 2.5)))
                    .with_meshes([GLASS]),
            ),
    )
}

fn lights(count: usize) -> LightList {
    let colors = [
        Vec3::new(1.0, 0.9, 0.8),
        Vec3::new(0.4, 0.6, 1.0),
        Vec3::new(1.0, 0.5, 0.3),
        Vec3::new(0.6, 1.0, 0.6),
    ];
    (0..count)
        .map(|i| {
            let angle = i as f32 / count.max(1) as f32 * std::f32::consts::TAU;
            PointLight::new(
                Vec3::new(angle.cos() * 6.0, 4.0, angle.sin() * 6.0),
                colors[i % colors.len()],
                Attenuation::default(),
            )
        })
        .collect()
}

/// Uploads the scene and returns it with the camera looking at it.
pub fn build(
    device: &mut dyn GraphicsDevice,
    extent: Extent2D,
    grid: u32,
    light_count: usize,
) -> Result<(Scene, ViewInfo), ResourceError> {
    let materials = vec![
        Material::opaque(Vec3::new(0.5, 0.5, 0.5)),
        Material::opaque(Vec3::new(0.7, 0.5, 0.3)),
        Material::opaque(Vec3::new(0.9, 0.9, 0.2)),
        Material::opaque(Vec3::new(0.6, 0.8, 0.9)).with_opacity(0.35),
    ];
    let scene = Scene::instantiate(device, &graph(grid), &library(), materials, lights(light_count))?;

    let aspect = extent.width as f32 / extent.height.max(1) as f32;
    let view = ViewInfo::look_at(Vec3::new(0.0, 7.0, 14.0), Vec3::ZERO, 50f32.to_radians(), aspect);
    Ok((scene, view))
}
