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

use strata_core::math::{Extent2D, Mat4, Vec3};
use strata_core::renderer::mock::{DeviceCall, MockGraphicsDevice};
use strata_core::renderer::{
    Attenuation, BlendState, GraphicsDevice, LightList, MeshData, PointLight, UniformValue,
};
use strata_core::scene::{Material, Scene, SceneMesh, ViewInfo};
use strata_lanes::render_lane::{
    ForwardPassLane, GBuffer, GBufferLayout, GeometryPassLane, LightingPassLane, PassContext,
    RenderLane,
};

const SIZE: Extent2D = Extent2D {
    width: 32,
    height: 32,
};

fn scene(device: &mut MockGraphicsDevice, forward: &[bool]) -> Scene {
    let meshes = forward
        .iter()
        .enumerate()
        .map(|(i, &use_forward)| {
            let mut mesh = SceneMesh::upload(
                device,
                format!("quad{i}"),
                &MeshData::quad(2.0, 2.0),
                i % 2,
                Mat4::from_translation(Vec3::new(0.0, 0.0, i as f32 * 0.1)),
            )
            .unwrap();
            mesh.use_forward = use_forward;
            mesh
        })
        .collect();
    Scene {
        meshes,
        materials: vec![
            Material::opaque(Vec3::new(1.0, 0.0, 0.0)),
            Material::opaque(Vec3::new(0.0, 1.0, 0.0)).with_opacity(0.5),
        ],
        lights: std::iter::once(PointLight::new(
            Vec3::new(0.0, 2.0, 2.0),
            Vec3::ONE,
            Attenuation::default(),
        ))
        .collect::<LightList>(),
    }
}

#[test]
fn test_geometry_pass_draws_deferred_meshes_into_gbuffer() {
    let mut device = MockGraphicsDevice::new(SIZE);
    let scene = scene(&mut device, &[false, true, false]);
    let gbuffer = GBuffer::allocate(&mut device, SIZE, GBufferLayout::standard());
    let mut lane = GeometryPassLane::default();
    lane.prepare(&mut device);
    device.clear_calls();

    let view = ViewInfo::default();
    let ctx = PassContext {
        scene: &scene,
        view: &view,
        gbuffer: &gbuffer,
    };
    assert_eq!(lane.render(&mut device, &ctx), 2);

    let draws: Vec<_> = device.draws().collect();
    assert_eq!(draws.len(), 2);
    assert!(draws.iter().all(|d| d.target == gbuffer.framebuffer()));
    assert!(draws.iter().all(|d| d.program == lane.program().id()));
    assert_eq!(draws[1].mesh, Some(scene.meshes[2].gpu.id));
    assert!(matches!(
        device.calls()[2],
        DeviceCall::Clear { target, .. } if target == gbuffer.framebuffer()
    ));

    // The last mesh drawn used material 0.
    let program = lane.program().id().unwrap();
    assert_eq!(
        device.uniform_value(program, "material.diffuse"),
        Some(UniformValue::Vec3(Vec3::new(1.0, 0.0, 0.0)))
    );
}

#[test]
fn test_lighting_pass_samples_every_attachment() {
    let mut device = MockGraphicsDevice::new(SIZE);
    let scene = scene(&mut device, &[false]);
    let gbuffer = GBuffer::allocate(&mut device, SIZE, GBufferLayout::standard());
    let mut lane = LightingPassLane::default();
    lane.prepare(&mut device);
    device.clear_calls();

    let view = ViewInfo::default();
    let ctx = PassContext {
        scene: &scene,
        view: &view,
        gbuffer: &gbuffer,
    };
    assert_eq!(lane.render(&mut device, &ctx), 1);

    let program = lane.program().id().unwrap();
    for (unit, (name, texture)) in ["gPosition", "gNormal", "gAlbedoSpec"]
        .iter()
        .zip(gbuffer.color_textures())
        .enumerate()
    {
        assert_eq!(device.texture_unit(unit as u32), Some(*texture));
        assert_eq!(device.uniform_value(program, name), Some(UniformValue::Int(unit as i32)));
    }
    assert_eq!(device.uniform_value(program, "numLights"), Some(UniformValue::Int(1)));

    let quad = device.draws().next().unwrap();
    assert_eq!(quad.mesh, None);
    assert!(!quad.state.depth.test_enabled);
    assert!(device.render_state().depth.test_enabled);
}

#[test]
fn test_forward_pass_blends_only_while_drawing() {
    let mut device = MockGraphicsDevice::new(SIZE);
    let scene = scene(&mut device, &[true, false, true, true]);
    let gbuffer = GBuffer::allocate(&mut device, SIZE, GBufferLayout::standard());
    let mut lane = ForwardPassLane::new();
    lane.prepare(&mut device);

    let view = ViewInfo::default();
    let ctx = PassContext {
        scene: &scene,
        view: &view,
        gbuffer: &gbuffer,
    };
    assert_eq!(lane.render(&mut device, &ctx), 3);

    assert!(device
        .draws()
        .all(|d| d.state.blend == Some(BlendState::ALPHA_BLENDING) && d.target.is_none()));
    assert_eq!(device.render_state().blend, None);

    let program = lane.program().id().unwrap();
    assert_eq!(
        device.uniform_value(program, "material.opacity"),
        Some(UniformValue::Float(0.5))
    );
}

#[test]
fn test_unlinked_program_draws_nothing() {
    let mut device = MockGraphicsDevice::new(SIZE).fail_program("forward_lit");
    let scene = scene(&mut device, &[true, true]);
    let gbuffer = GBuffer::allocate(&mut device, SIZE, GBufferLayout::standard());
    let mut lane = ForwardPassLane::new();
    lane.prepare(&mut device);

    let view = ViewInfo::default();
    let ctx = PassContext {
        scene: &scene,
        view: &view,
        gbuffer: &gbuffer,
    };
    lane.render(&mut device, &ctx);
    assert!(device.draws().all(|d| d.program.is_none() && d.samples_passed == 0));
}

#[test]
fn test_cost_follows_routing() {
    let mut device = MockGraphicsDevice::new(SIZE);
    let all_deferred = scene(&mut device, &[false, false]);
    let all_forward = scene(&mut device, &[true, true]);

    let geometry = GeometryPassLane::default();
    let lighting = LightingPassLane::default();
    let forward = ForwardPassLane::new();

    assert!(geometry.estimate_cost(&all_deferred) > 0.0);
    assert_eq!(geometry.estimate_cost(&all_forward), 0.0);
    assert_eq!(lighting.estimate_cost(&all_forward), 0.0);
    assert!(forward.estimate_cost(&all_forward) > geometry.estimate_cost(&all_deferred));
    assert_eq!(forward.strategy_name(), "ForwardLit");
}

#[test]
fn test_cost_units_per_triangle_draw_and_light() {
    let mut device = MockGraphicsDevice::new(SIZE);
    // Two quads of two triangles each, one light.
    let all_deferred = scene(&mut device, &[false, false]);
    let all_forward = scene(&mut device, &[true, true]);

    let geometry = GeometryPassLane::default();
    let lighting = LightingPassLane::default();
    let forward = ForwardPassLane::new();

    approx::assert_relative_eq!(geometry.estimate_cost(&all_deferred), 0.204, epsilon = 1e-6);
    approx::assert_relative_eq!(lighting.estimate_cost(&all_deferred), 0.105, epsilon = 1e-6);
    approx::assert_relative_eq!(forward.estimate_cost(&all_forward), 0.2142, epsilon = 1e-6);
}
