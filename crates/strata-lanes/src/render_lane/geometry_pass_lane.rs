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

//! The G-buffer fill pass.

use super::{geometry_cost, shaders, GBufferLayout, PassContext, RenderLane, ShaderProgram};
use strata_core::renderer::{ClearRequest, GraphicsDevice, RenderState};
use strata_core::scene::Scene;

/// Writes every deferred mesh's surface attributes into the G-buffer.
///
/// The G-buffer is cleared to zero first; the lighting pass relies on a zero
/// normal to tell empty texels apart.
#[derive(Debug)]
pub struct GeometryPassLane {
    layout: GBufferLayout,
    program: ShaderProgram,
}

impl GeometryPassLane {
    /// Creates the lane for G-buffers of `layout`. Call [`RenderLane::prepare`]
    /// before rendering.
    pub fn new(layout: GBufferLayout) -> Self {
        Self {
            layout,
            program: ShaderProgram::unlinked("gbuffer"),
        }
    }

    /// The geometry program.
    pub fn program(&self) -> &ShaderProgram {
        &self.program
    }
}

impl Default for GeometryPassLane {
    fn default() -> Self {
        Self::new(GBufferLayout::standard())
    }
}

impl RenderLane for GeometryPassLane {
    fn strategy_name(&self) -> &'static str {
        "GeometryPass"
    }

    fn prepare(&mut self, device: &mut dyn GraphicsDevice) {
        self.program.release(device);
        self.program = ShaderProgram::compile(device, &shaders::gbuffer_program(&self.layout));
    }

    fn render(&self, device: &mut dyn GraphicsDevice, ctx: &PassContext<'_>) -> u32 {
        if !ctx.gbuffer.bind_for_writing(device) {
            log::trace!("G-buffer unavailable, skipping the geometry pass");
            return 0;
        }
        device.clear(&ClearRequest::color_and_depth([0.0; 4]));
        device.set_render_state(RenderState::default());

        self.program.bind(device);
        self.program.set(device, "view", ctx.view.view);
        self.program.set(device, "projection", ctx.view.projection);

        let mut draws = 0;
        for mesh in ctx.scene.deferred_meshes() {
            let material = ctx.scene.material_of(mesh);
            self.program.set(device, "model", mesh.transform);
            self.program.set(device, "material.diffuse", material.diffuse);
            self.program.set(device, "material.specular", material.specular);
            self.program.set(device, "material.shininess", material.shininess);
            self.program.set(device, "material.opacity", material.opacity);
            device.draw_mesh(&mesh.gpu);
            draws += 1;
        }
        draws
    }

    fn estimate_cost(&self, scene: &Scene) -> f32 {
        geometry_cost(scene.deferred_meshes())
    }

    fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.program.release(device);
    }
}
