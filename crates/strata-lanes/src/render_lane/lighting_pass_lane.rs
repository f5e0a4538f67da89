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

//! The deferred lighting resolve.

use super::{
    shaders, GBufferLayout, LightUploader, PassContext, RenderLane, ShaderProgram, DRAW_CALL_COST,
    LIGHT_COST_FACTOR,
};
use strata_core::renderer::{DepthState, GraphicsDevice, RenderState};
use strata_core::scene::Scene;

/// Shades the G-buffer onto the currently bound target with one full-screen
/// quad.
///
/// The depth test is off for the quad and back on afterwards. The lane does
/// not bind a target; the caller binds the default target and clears it.
#[derive(Debug)]
pub struct LightingPassLane {
    layout: GBufferLayout,
    program: ShaderProgram,
    lights: LightUploader,
}

impl LightingPassLane {
    /// Creates the lane for G-buffers of `layout`.
    pub fn new(layout: GBufferLayout) -> Self {
        Self {
            layout,
            program: ShaderProgram::unlinked("deferred_lighting"),
            lights: LightUploader::new(),
        }
    }

    /// The lighting program.
    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }
}

impl Default for LightingPassLane {
    fn default() -> Self {
        Self::new(GBufferLayout::standard())
    }
}

impl RenderLane for LightingPassLane {
    fn strategy_name(&self) -> &'static str {
        "DeferredLighting"
    }

    fn prepare(&mut self, device: &mut dyn GraphicsDevice) {
        self.program.release(device);
        self.program = ShaderProgram::compile(device, &shaders::deferred_lighting_program(&self.layout));
    }

    fn render(&self, device: &mut dyn GraphicsDevice, ctx: &PassContext<'_>) -> u32 {
        self.program.bind(device);
        ctx.gbuffer.bind_textures(device, &self.program);
        self.lights
            .upload(device, &self.program, ctx.view.position, &ctx.scene.lights);

        let mut state = device.render_state();
        state.depth = DepthState {
            test_enabled: false,
            ..state.depth
        };
        device.set_render_state(state);
        device.draw_fullscreen_quad();
        device.set_render_state(RenderState {
            depth: DepthState {
                test_enabled: true,
                ..state.depth
            },
            ..state
        });
        1
    }

    fn estimate_cost(&self, scene: &Scene) -> f32 {
        if scene.deferred_meshes().next().is_none() {
            return 0.0;
        }
        DRAW_CALL_COST * (1.0 + LIGHT_COST_FACTOR * scene.lights.len() as f32)
    }

    fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.program.release(device);
    }
}
