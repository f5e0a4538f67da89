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

//! Integration tests for scene instantiation on a mock device.

use strata_core::math::{Extent2D, Mat4, Vec3};
use strata_core::renderer::mock::MockGraphicsDevice;
use strata_core::renderer::{Attenuation, LightList, MeshData, PointLight};
use strata_core::scene::{Material, MeshAsset, NodeDesc, Scene, SceneGraph};

fn library() -> Vec<MeshAsset> {
    vec![
        MeshAsset {
            name: "floor".into(),
            data: MeshData::plane(10.0, 20),
            material_index: 0,
        },
        MeshAsset {
            name: "crate".into(),
            data: MeshData::cube(1.0),
            material_index: 1,
        },
    ]
}

fn graph() -> SceneGraph {
    SceneGraph::from_root(
        NodeDesc::new("root", Mat4::IDENTITY)
            .with_meshes([0])
            .with_child(
                NodeDesc::new("crates", Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)))
                    .with_meshes([1, 1, 7]),
            )
            .with_child(NodeDesc::new(
                "lamp",
                Mat4::from_translation(Vec3::new(2.0, 3.0, 0.0)),
            )),
    )
}

#[test]
fn test_instantiate_uploads_each_asset_once() {
    let mut device = MockGraphicsDevice::new(Extent2D::new(64, 64));
    let graph = graph();
    let lamp = graph.world_transform_of("lamp").unwrap();
    let lights: LightList = [PointLight::new(
        lamp.transform_point3(Vec3::ZERO),
        Vec3::ONE,
        Attenuation::default(),
    )]
    .into_iter()
    .collect();

    let scene = Scene::instantiate(
        &mut device,
        &graph,
        &library(),
        vec![Material::opaque(Vec3::splat(0.6))],
        lights,
    )
    .unwrap();

    // The dangling reference to mesh 7 is skipped.
    assert_eq!(scene.meshes.len(), 3);
    assert_eq!(scene.meshes[0].triangle_count, 800);
    assert_eq!(scene.meshes[1].gpu, scene.meshes[2].gpu);
    assert_ne!(scene.meshes[0].gpu, scene.meshes[1].gpu);
    assert_eq!(scene.lights.as_slice()[0].position, Vec3::new(2.0, 3.0, 0.0));

    let crate_center = scene.meshes[1].world_center();
    assert_eq!(crate_center, Vec3::new(0.0, 0.5, 0.0));
}

#[test]
fn test_meshes_start_deferred() {
    let mut device = MockGraphicsDevice::new(Extent2D::new(64, 64));
    let scene = Scene::instantiate(
        &mut device,
        &graph(),
        &library(),
        Vec::new(),
        LightList::new(),
    )
    .unwrap();

    assert!(scene.meshes.iter().all(|m| !m.use_forward));
    assert_eq!(scene.deferred_meshes().count(), 3);
    assert_eq!(scene.forward_meshes().count(), 0);
}

#[test]
fn test_dangling_material_falls_back_to_default() {
    let mut device = MockGraphicsDevice::new(Extent2D::new(64, 64));
    let scene = Scene::instantiate(
        &mut device,
        &graph(),
        &library(),
        vec![Material::opaque(Vec3::X)],
        LightList::new(),
    )
    .unwrap();

    assert_eq!(scene.material_of(&scene.meshes[0]).diffuse, Vec3::X);
    assert_eq!(*scene.material_of(&scene.meshes[1]), Material::DEFAULT);
}

#[test]
fn test_release_destroys_each_upload_once() {
    let mut device = MockGraphicsDevice::new(Extent2D::new(64, 64));
    let mut scene = Scene::instantiate(
        &mut device,
        &graph(),
        &library(),
        Vec::new(),
        LightList::new(),
    )
    .unwrap();
    assert_eq!(device.live_mesh_count(), 2);

    scene.release(&mut device);
    assert!(scene.meshes.is_empty());
    assert_eq!(device.live_mesh_count(), 0);

    // A second release has nothing left to destroy.
    scene.release(&mut device);
    assert_eq!(device.live_mesh_count(), 0);
}
