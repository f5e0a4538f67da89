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

//! Rendering lanes - the per-frame passes of the hybrid pipeline.
//!
//! A frame runs the lanes in a fixed order: the [`GeometryPassLane`] fills the
//! [`GBuffer`] with every deferred mesh, the [`LightingPassLane`] resolves it
//! onto the default target, and the [`ForwardPassLane`] draws the remaining
//! meshes on top with blending. Which mesh takes which path is decided
//! elsewhere and read from `SceneMesh::use_forward`.

mod forward_pass_lane;
mod gbuffer;
mod geometry_pass_lane;
mod lighting_pass_lane;
mod lights;
mod program;
pub mod shaders;

pub use forward_pass_lane::*;
pub use gbuffer::*;
pub use geometry_pass_lane::*;
pub use lighting_pass_lane::*;
pub use lights::*;
pub use program::*;

use strata_core::renderer::GraphicsDevice;
use strata_core::scene::{Scene, ViewInfo};

/// Cost of one rasterized triangle, in abstract units.
pub(crate) const TRIANGLE_COST: f32 = 0.001;
/// Cost of one draw call.
pub(crate) const DRAW_CALL_COST: f32 = 0.1;
/// Cost multiplier per shaded light.
pub(crate) const LIGHT_COST_FACTOR: f32 = 0.05;

/// Everything a pass reads during one frame.
#[derive(Debug, Clone, Copy)]
pub struct PassContext<'a> {
    /// The scene, with each mesh's current path.
    pub scene: &'a Scene,
    /// The camera.
    pub view: &'a ViewInfo,
    /// The G-buffer written by the geometry pass and read by the lighting pass.
    pub gbuffer: &'a GBuffer,
}

/// A trait defining the behavior of a rendering lane.
///
/// Lanes record their work through the immediate-mode [`GraphicsDevice`]; the
/// caller owns the order in which they run and the target bound in between.
pub trait RenderLane {
    /// Returns a human-readable identifier for this pass.
    fn strategy_name(&self) -> &'static str;

    /// Compiles the lane's programs. Link failures are logged, not returned:
    /// the lane then runs with a program that draws nothing.
    fn prepare(&mut self, device: &mut dyn GraphicsDevice);

    /// Issues the pass and returns the number of draw calls made.
    fn render(&self, device: &mut dyn GraphicsDevice, ctx: &PassContext<'_>) -> u32;

    /// Estimates the GPU cost of this pass for the scene's current routing.
    ///
    /// The cost is measured in abstract units representing GPU workload
    /// (triangles, draw calls, per-light shading).
    fn estimate_cost(&self, scene: &Scene) -> f32;

    /// Destroys the lane's programs.
    fn release(&mut self, device: &mut dyn GraphicsDevice);
}

/// Triangle and draw-call cost of a set of meshes.
pub(crate) fn geometry_cost<'a>(meshes: impl Iterator<Item = &'a strata_core::scene::SceneMesh>) -> f32 {
    let (triangles, draws) = meshes.fold((0u64, 0u32), |(t, d), m| (t + m.triangle_count as u64, d + 1));
    triangles as f32 * TRIANGLE_COST + draws as f32 * DRAW_CALL_COST
}
