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

//! The overdraw/coverage probe.
//!
//! The probe renders the scene's depth into a private depth-stencil target
//! twice and compares occlusion-query counts:
//!
//! 1. Pass A (`LessEqual`, depth write on) counts every fragment that reaches
//!    the depth buffer in submission order: the total fragment work.
//! 2. Pass B (`LessEqual`, depth write off) re-renders against the finished
//!    depth buffer. A stencil test of `Equal 0` with increment-on-pass lets
//!    exactly one fragment per pixel through, so the count is the number of
//!    visible pixels even when surfaces are coplanar.
//!
//! Overdraw is A/B (at least 1.0) and coverage is B over the viewport area.
//!
//! On devices whose occlusion queries are not exact counts (see
//! [`GraphicsDevice::exact_occlusion_counts`]) the probe counts with the
//! stencil buffer instead: pass A increments the stencil of every pixel a
//! fragment reaches the depth buffer on, then the whole viewport is read back.
//! The sum of the stencil values is the fragment count and the number of
//! non-zero values is the visible pixel count. Per-pixel counts saturate at 255.
//!
//! Every excursion runs under a [`GpuStateGuard`], so the caller's target,
//! viewport, render state and program survive any outcome.

mod state_guard;

pub use state_guard::GpuStateGuard;

use crate::render_lane::{shaders, ShaderProgram};
use strata_core::math::{Extent2D, ScreenRect};
use strata_core::metrics::{overdraw_from_stencil, SceneMetrics};
use strata_core::renderer::{
    ClearRequest, ColorMask, CompareFunction, DepthState, DrawBuffers, FramebufferDescriptor,
    FramebufferId, FramebufferStatus, GraphicsDevice, RenderState, ResourceError,
    StencilOperation, StencilState, TextureDescriptor, TextureFormat, Viewport,
};
use strata_core::scene::{SceneMesh, ViewInfo};
use thiserror::Error;

/// Reasons a measurement could not be taken.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The depth-only program failed to link.
    #[error("depth-only program is not linked")]
    ProgramUnavailable,
    /// A transient resource could not be created or read back.
    #[error("probe resource error: {0}")]
    Resource(#[from] ResourceError),
    /// The temporary depth-stencil target is not renderable.
    #[error("probe target is incomplete: {0}")]
    IncompleteTarget(String),
}

/// Measures overdraw and screen coverage on the GPU.
#[derive(Debug)]
pub struct OverdrawProbe {
    program: ShaderProgram,
}

impl OverdrawProbe {
    /// Compiles the depth-only program.
    pub fn new(device: &mut dyn GraphicsDevice) -> Self {
        Self {
            program: ShaderProgram::compile(device, &shaders::depth_only_program()),
        }
    }

    /// Whether the probe can take measurements.
    pub fn is_ready(&self) -> bool {
        self.program.is_linked()
    }

    /// Measures the aggregate metrics of `meshes` seen through `view`.
    ///
    /// Falls back to [`SceneMetrics::default`] (overdraw 1.0, coverage 0.0)
    /// when there is nothing to measure or the measurement fails.
    pub fn measure_scene(
        &self,
        device: &mut dyn GraphicsDevice,
        meshes: &[SceneMesh],
        view: &ViewInfo,
        viewport: Extent2D,
    ) -> SceneMetrics {
        match self.try_measure_scene(device, meshes, view, viewport) {
            Ok(metrics) => {
                log::debug!(
                    "Probe: overdraw {:.3}, coverage {:.3}",
                    metrics.overdraw_ratio,
                    metrics.screen_coverage
                );
                metrics
            }
            Err(e) => {
                log::warn!("Overdraw probe failed, using default metrics: {e}");
                SceneMetrics::default()
            }
        }
    }

    /// Like [`measure_scene`](Self::measure_scene), but reports failures.
    pub fn try_measure_scene(
        &self,
        device: &mut dyn GraphicsDevice,
        meshes: &[SceneMesh],
        view: &ViewInfo,
        viewport: Extent2D,
    ) -> Result<SceneMetrics, ProbeError> {
        if meshes.is_empty() || viewport.is_empty() {
            return Ok(SceneMetrics::default());
        }
        self.program.id().ok_or(ProbeError::ProgramUnavailable)?;

        let mut guard = GpuStateGuard::new(device);
        let target = create_stencil_target(&mut guard, viewport)?;
        if !guard.exact_occlusion_counts() {
            return self.count_with_stencil(&mut guard, target, meshes, view, viewport);
        }
        let total_query = guard.create_occlusion_query()?;
        let visible_query = guard.create_occlusion_query()?;

        guard.bind_framebuffer(Some(target));
        guard.set_viewport(Viewport::from_extent(viewport));
        guard.clear(&ClearRequest::depth_and_stencil());
        self.program.bind(&mut *guard);
        self.program.set(&mut *guard, "view", view.view);
        self.program.set(&mut *guard, "projection", view.projection);

        guard.set_render_state(depth_only_state(
            DepthState {
                test_enabled: true,
                compare: CompareFunction::LessEqual,
                write_enabled: true,
            },
            StencilState::default(),
        ));
        guard.begin_occlusion_query(total_query);
        self.draw_all(&mut guard, meshes);
        guard.end_occlusion_query();

        guard.set_render_state(depth_only_state(
            DepthState {
                test_enabled: true,
                compare: CompareFunction::LessEqual,
                write_enabled: false,
            },
            StencilState {
                enabled: true,
                compare: CompareFunction::Equal,
                pass_op: StencilOperation::IncrementClamp,
                reference: 0,
                ..StencilState::default()
            },
        ));
        guard.begin_occlusion_query(visible_query);
        self.draw_all(&mut guard, meshes);
        guard.end_occlusion_query();

        let total = guard.query_result_blocking(total_query)?;
        let visible = guard.query_result_blocking(visible_query)?;
        log::trace!("Probe counts: {total} fragments, {visible} visible pixels");
        Ok(SceneMetrics::from_counts(total, visible, viewport.area()))
    }

    /// Measures the overdraw of a single mesh over its screen footprint.
    ///
    /// Each fragment that passes a `Less` depth test increments the stencil,
    /// so surfaces the mesh hides from itself are not counted. The result is
    /// the mean of the non-zero stencil values in the footprint. A mesh with
    /// no visible footprint returns 1.0 without touching the device.
    pub fn measure_mesh(
        &self,
        device: &mut dyn GraphicsDevice,
        mesh: &SceneMesh,
        view: &ViewInfo,
        viewport: Extent2D,
    ) -> f32 {
        match self.try_measure_mesh(device, mesh, view, viewport) {
            Ok(overdraw) => overdraw,
            Err(e) => {
                log::warn!("Per-mesh probe of '{}' failed: {e}", mesh.name);
                1.0
            }
        }
    }

    /// Like [`measure_mesh`](Self::measure_mesh), but reports failures.
    pub fn try_measure_mesh(
        &self,
        device: &mut dyn GraphicsDevice,
        mesh: &SceneMesh,
        view: &ViewInfo,
        viewport: Extent2D,
    ) -> Result<f32, ProbeError> {
        let clip_from_local = view.view_projection() * mesh.transform;
        let rect = match mesh.bounds.screen_rect(&clip_from_local, viewport) {
            Some(rect) if !rect.is_empty() => rect,
            _ => return Ok(1.0),
        };
        self.program.id().ok_or(ProbeError::ProgramUnavailable)?;

        let mut guard = GpuStateGuard::new(device);
        let target = create_stencil_target(&mut guard, viewport)?;
        guard.bind_framebuffer(Some(target));
        guard.set_viewport(Viewport::from_extent(viewport));
        guard.clear(&ClearRequest::depth_and_stencil());
        guard.set_render_state(depth_only_state(
            DepthState {
                test_enabled: true,
                compare: CompareFunction::Less,
                write_enabled: true,
            },
            counting_stencil(),
        ));

        self.program.bind(&mut *guard);
        self.program.set(&mut *guard, "view", view.view);
        self.program.set(&mut *guard, "projection", view.projection);
        self.program.set(&mut *guard, "model", mesh.transform);
        guard.draw_mesh(&mesh.gpu);

        let stencil = guard.read_stencil(rect)?;
        Ok(overdraw_from_stencil(&stencil))
    }

    /// Destroys the depth-only program.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.program.release(device);
    }

    // Pass A with a stencil count in place of the occlusion queries.
    fn count_with_stencil(
        &self,
        guard: &mut GpuStateGuard<'_>,
        target: FramebufferId,
        meshes: &[SceneMesh],
        view: &ViewInfo,
        viewport: Extent2D,
    ) -> Result<SceneMetrics, ProbeError> {
        guard.bind_framebuffer(Some(target));
        guard.set_viewport(Viewport::from_extent(viewport));
        guard.clear(&ClearRequest::depth_and_stencil());
        self.program.bind(&mut **guard);
        self.program.set(&mut **guard, "view", view.view);
        self.program.set(&mut **guard, "projection", view.projection);
        guard.set_render_state(depth_only_state(
            DepthState {
                test_enabled: true,
                compare: CompareFunction::LessEqual,
                write_enabled: true,
            },
            counting_stencil(),
        ));
        self.draw_all(guard, meshes);

        let stencil = guard.read_stencil(ScreenRect::full(viewport))?;
        let (total, visible) = stencil
            .iter()
            .filter(|&&v| v != 0)
            .fold((0u64, 0u64), |(total, visible), &v| (total + v as u64, visible + 1));
        log::trace!("Stencil counts: {total} fragments, {visible} visible pixels");
        Ok(SceneMetrics::from_counts(total, visible, viewport.area()))
    }

    fn draw_all(&self, guard: &mut GpuStateGuard<'_>, meshes: &[SceneMesh]) {
        for mesh in meshes {
            self.program.set(&mut **guard, "model", mesh.transform);
            guard.draw_mesh(&mesh.gpu);
        }
    }
}

fn depth_only_state(depth: DepthState, stencil: StencilState) -> RenderState {
    RenderState {
        depth,
        stencil,
        blend: None,
        color_mask: ColorMask::NONE,
        draw_buffers: DrawBuffers::None,
    }
}

// Increments on depth pass, keeps the value when the depth test fails.
fn counting_stencil() -> StencilState {
    StencilState {
        enabled: true,
        compare: CompareFunction::Always,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::IncrementClamp,
        ..StencilState::default()
    }
}

fn create_stencil_target(
    guard: &mut GpuStateGuard<'_>,
    size: Extent2D,
) -> Result<FramebufferId, ProbeError> {
    let depth = guard.create_texture(&TextureDescriptor {
        label: Some("probe_depth_stencil"),
        size,
        format: TextureFormat::Depth24PlusStencil8,
    })?;
    let framebuffer = guard.create_framebuffer(&FramebufferDescriptor {
        label: Some("probe"),
        color_attachments: &[],
        depth_attachment: Some(depth),
    })?;
    let status = guard.framebuffer_status(framebuffer);
    if let FramebufferStatus::Incomplete(reason) = status {
        return Err(ProbeError::IncompleteTarget(reason));
    }
    Ok(framebuffer)
}
