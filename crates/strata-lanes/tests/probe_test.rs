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

use approx::assert_relative_eq;
use strata_core::math::{Extent2D, Mat4, ScreenRect, Vec3};
use strata_core::renderer::mock::{DeviceCall, MockGraphicsDevice};
use strata_core::renderer::{
    CompareFunction, GraphicsDevice, MeshData, ProgramId, RenderState, StencilOperation, Viewport,
};
use strata_core::scene::{SceneMesh, ViewInfo};
use strata_core::SceneMetrics;
use strata_lanes::probe_lane::{OverdrawProbe, ProbeError};

const VIEWPORT: Extent2D = Extent2D {
    width: 64,
    height: 64,
};

fn quad(device: &mut MockGraphicsDevice, width: f32, transform: Mat4) -> SceneMesh {
    SceneMesh::upload(device, "quad", &MeshData::quad(width, 2.0), 0, transform).unwrap()
}

/// Leaves the device in a state the probe must not disturb.
fn dirty_state(device: &mut MockGraphicsDevice) {
    device.set_viewport(Viewport {
        x: 3,
        y: 5,
        width: 17,
        height: 11,
    });
    device.set_render_state(RenderState {
        blend: Some(strata_core::renderer::BlendState::ALPHA_BLENDING),
        ..RenderState::default()
    });
    device.use_program(Some(ProgramId(4242)));
}

#[test]
fn test_full_screen_quad_has_unit_overdraw_and_full_coverage() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    let meshes = vec![quad(&mut device, 2.0, Mat4::IDENTITY)];

    let metrics = probe.measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT);
    assert_relative_eq!(metrics.overdraw_ratio, 1.0);
    assert_relative_eq!(metrics.screen_coverage, 1.0);
}

#[test]
fn test_coplanar_quads_double_the_overdraw() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    let meshes = vec![
        quad(&mut device, 2.0, Mat4::IDENTITY),
        quad(&mut device, 2.0, Mat4::IDENTITY),
    ];

    let metrics = probe.measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT);
    assert_relative_eq!(metrics.overdraw_ratio, 2.0);
    assert_relative_eq!(metrics.screen_coverage, 1.0);
}

#[test]
fn test_coverage_follows_footprint() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    let meshes = vec![quad(&mut device, 1.0, Mat4::IDENTITY)];

    let metrics = probe.measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT);
    assert_relative_eq!(metrics.overdraw_ratio, 1.0);
    assert_relative_eq!(metrics.screen_coverage, 0.5);
}

#[test]
fn test_hidden_quad_counts_as_overdraw_only() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    // The second quad sits behind the first and covers half of the screen.
    let meshes = vec![
        quad(&mut device, 2.0, Mat4::IDENTITY),
        quad(&mut device, 1.0, Mat4::from_translation(Vec3::new(0.0, 0.0, 0.5))),
    ];

    let metrics = probe.measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT);
    assert_relative_eq!(metrics.overdraw_ratio, 1.0);
    assert_relative_eq!(metrics.screen_coverage, 1.0);

    // Drawn back to front, both quads reach the depth buffer.
    let reversed = vec![meshes[1].clone(), meshes[0].clone()];
    let metrics = probe.measure_scene(&mut device, &reversed, &ViewInfo::default(), VIEWPORT);
    assert_relative_eq!(metrics.overdraw_ratio, 1.5);
    assert_relative_eq!(metrics.screen_coverage, 1.0);
}

#[test]
fn test_probe_restores_state_and_frees_resources() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    let meshes = vec![quad(&mut device, 2.0, Mat4::IDENTITY)];
    dirty_state(&mut device);
    let before = device.snapshot();

    probe.measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT);
    probe.measure_mesh(&mut device, &meshes[0], &ViewInfo::default(), VIEWPORT);

    assert_eq!(device.snapshot(), before);
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn test_failed_queries_fall_back_to_defaults() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    let meshes = vec![quad(&mut device, 2.0, Mat4::IDENTITY)];
    dirty_state(&mut device);
    let before = device.snapshot();
    device.set_failing_queries(true);

    assert!(matches!(
        probe.try_measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT),
        Err(ProbeError::Resource(_))
    ));
    let metrics = probe.measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT);
    assert_eq!(metrics, SceneMetrics::default());
    assert_eq!(device.snapshot(), before);
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn test_unlinked_program_reports_unavailable() {
    let mut device = MockGraphicsDevice::new(VIEWPORT).fail_program("depth_only");
    let probe = OverdrawProbe::new(&mut device);
    assert!(!probe.is_ready());
    let meshes = vec![quad(&mut device, 2.0, Mat4::IDENTITY)];

    assert!(matches!(
        probe.try_measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT),
        Err(ProbeError::ProgramUnavailable)
    ));
    assert_eq!(
        probe.measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT),
        SceneMetrics::default()
    );
}

#[test]
fn test_empty_scene_touches_nothing() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    device.clear_calls();

    let metrics = probe.measure_scene(&mut device, &[], &ViewInfo::default(), VIEWPORT);
    assert_eq!(metrics, SceneMetrics::default());
    assert!(device.calls().is_empty());
}

#[test]
fn test_mesh_behind_camera_returns_unit_overdraw_without_work() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    let view = ViewInfo::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, 1.0, 1.0);
    let behind = quad(&mut device, 2.0, Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0)));
    device.clear_calls();

    assert_relative_eq!(probe.measure_mesh(&mut device, &behind, &view, VIEWPORT), 1.0);
    assert!(device.calls().is_empty());
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn test_per_mesh_probe_reads_back_the_footprint() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    let mesh = quad(&mut device, 1.0, Mat4::IDENTITY);
    device.clear_calls();

    let overdraw = probe.measure_mesh(&mut device, &mesh, &ViewInfo::default(), VIEWPORT);
    assert_relative_eq!(overdraw, 1.0);

    let read = device.calls().iter().find_map(|call| match call {
        DeviceCall::ReadStencil(rect) => Some(*rect),
        _ => None,
    });
    let rect = read.unwrap();
    assert_eq!((rect.x, rect.width, rect.height), (16, 32, 64));
}

/// Two full-screen quads in one mesh, one at depth 0.5 and one at depth 0.
fn layered_mesh(device: &mut MockGraphicsDevice, far_first: bool) -> SceneMesh {
    let layer = |depth: f32| {
        let mut mesh = MeshData::quad(2.0, 2.0);
        for vertex in &mut mesh.vertices {
            vertex.position[2] = depth;
        }
        mesh
    };
    let (first, second) = if far_first {
        (layer(0.5), layer(0.0))
    } else {
        (layer(0.0), layer(0.5))
    };
    let mut data = first;
    let base = data.vertices.len() as u32;
    data.vertices.extend(second.vertices);
    data.indices.extend(second.indices.iter().map(|i| i + base));
    SceneMesh::upload(device, "layered", &data, 0, Mat4::IDENTITY).unwrap()
}

#[test]
fn test_per_mesh_overdraw_counts_layers_drawn_back_to_front() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    let mesh = layered_mesh(&mut device, true);

    let overdraw = probe.measure_mesh(&mut device, &mesh, &ViewInfo::default(), VIEWPORT);
    assert_relative_eq!(overdraw, 2.0);
}

#[test]
fn test_per_mesh_overdraw_ignores_self_occluded_fragments() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    let probe = OverdrawProbe::new(&mut device);
    let mesh = layered_mesh(&mut device, false);
    device.clear_calls();

    let overdraw = probe.measure_mesh(&mut device, &mesh, &ViewInfo::default(), VIEWPORT);
    assert_relative_eq!(overdraw, 1.0);

    let state = device.draws().next().map(|d| d.state).unwrap();
    assert!(state.depth.test_enabled);
    assert_eq!(state.depth.compare, CompareFunction::Less);
    assert_eq!(state.stencil.depth_fail_op, StencilOperation::Keep);
    assert_eq!(state.stencil.pass_op, StencilOperation::IncrementClamp);
}

#[test]
fn test_inexact_queries_fall_back_to_stencil_counting() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    device.set_inexact_queries(true);
    let probe = OverdrawProbe::new(&mut device);
    let meshes = vec![
        quad(&mut device, 1.0, Mat4::from_translation(Vec3::new(0.0, 0.0, 0.5))),
        quad(&mut device, 2.0, Mat4::IDENTITY),
        quad(&mut device, 2.0, Mat4::IDENTITY),
    ];
    dirty_state(&mut device);
    let before = device.snapshot();
    device.clear_calls();

    let metrics = probe.measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT);
    assert_relative_eq!(metrics.overdraw_ratio, 2.5);
    assert_relative_eq!(metrics.screen_coverage, 1.0);

    assert!(!device
        .calls()
        .iter()
        .any(|c| matches!(c, DeviceCall::BeginQuery(_))));
    let reads: Vec<_> = device
        .calls()
        .iter()
        .filter_map(|c| match c {
            DeviceCall::ReadStencil(rect) => Some(*rect),
            _ => None,
        })
        .collect();
    assert_eq!(reads, vec![ScreenRect::full(VIEWPORT)]);
    assert_eq!(device.snapshot(), before);
    assert_eq!(device.live_resource_count(), 0);
}

#[test]
fn test_inexact_queries_measure_partial_coverage() {
    let mut device = MockGraphicsDevice::new(VIEWPORT);
    device.set_inexact_queries(true);
    let probe = OverdrawProbe::new(&mut device);
    let meshes = vec![quad(&mut device, 1.0, Mat4::IDENTITY)];

    let metrics = probe.measure_scene(&mut device, &meshes, &ViewInfo::default(), VIEWPORT);
    assert_relative_eq!(metrics.overdraw_ratio, 1.0);
    assert_relative_eq!(metrics.screen_coverage, 0.5);
}
