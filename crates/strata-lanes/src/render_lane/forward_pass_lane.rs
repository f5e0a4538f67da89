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

//! The forward pass for meshes routed around the G-buffer.

use super::{
    geometry_cost, shaders, LightUploader, PassContext, RenderLane, ShaderProgram,
    LIGHT_COST_FACTOR,
};
use strata_core::renderer::{BlendState, GraphicsDevice, RenderState};
use strata_core::scene::Scene;

/// Draws every forward mesh onto the bound target with per-fragment lighting.
///
/// Alpha blending is enabled for the duration of the pass so translucent
/// materials composite over the deferred result, then disabled again.
///
/// # Cost Estimation
///
/// Triangle and draw-call costs of the forward meshes, scaled by the number
/// of lights every fragment iterates over.
#[derive(Debug)]
pub struct ForwardPassLane {
    program: ShaderProgram,
    lights: LightUploader,
}

impl ForwardPassLane {
    /// Creates the lane. Call [`RenderLane::prepare`] before rendering.
    pub fn new() -> Self {
        Self {
            program: ShaderProgram::unlinked("forward_lit"),
            lights: LightUploader::new(),
        }
    }

    /// The forward program.
    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }
}

impl Default for ForwardPassLane {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderLane for ForwardPassLane {
    fn strategy_name(&self) -> &'static str {
        "ForwardLit"
    }

    fn prepare(&mut self, device: &mut dyn GraphicsDevice) {
        self.program.release(device);
        self.program = ShaderProgram::compile(device, &shaders::forward_lit_program());
    }

    fn render(&self, device: &mut dyn GraphicsDevice, ctx: &PassContext<'_>) -> u32 {
        let state = device.render_state();
        device.set_render_state(RenderState {
            blend: Some(BlendState::ALPHA_BLENDING),
            ..state
        });

        self.program.bind(device);
        self.program.set(device, "view", ctx.view.view);
        self.program.set(device, "projection", ctx.view.projection);
        self.lights
            .upload(device, &self.program, ctx.view.position, &ctx.scene.lights);

        let mut draws = 0;
        for mesh in ctx.scene.forward_meshes() {
            let material = ctx.scene.material_of(mesh);
            self.program.set(device, "model", mesh.transform);
            self.program.set(device, "material.diffuse", material.diffuse);
            self.program.set(device, "material.specular", material.specular);
            self.program.set(device, "material.shininess", material.shininess);
            self.program.set(device, "material.opacity", material.opacity);
            device.draw_mesh(&mesh.gpu);
            draws += 1;
        }

        device.set_render_state(RenderState {
            blend: None,
            ..state
        });
        draws
    }

    fn estimate_cost(&self, scene: &Scene) -> f32 {
        geometry_cost(scene.forward_meshes())
            * (1.0 + LIGHT_COST_FACTOR * scene.lights.len() as f32)
    }

    fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.program.release(device);
    }
}
