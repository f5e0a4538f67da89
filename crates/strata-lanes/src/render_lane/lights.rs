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

//! Upload of the scene's point lights into the lighting programs.

use crate::render_lane::program::ShaderProgram;
use crate::render_lane::shaders::MAX_LIGHTS;
use std::sync::atomic::{AtomicBool, Ordering};
use strata_core::math::Vec3;
use strata_core::renderer::{GraphicsDevice, LightList};

/// Writes `viewPos`, `numLights` and the `lights[i]` array of a program.
///
/// Lights past [`MAX_LIGHTS`] are dropped; the first time that happens a
/// warning is logged.
#[derive(Debug, Default)]
pub struct LightUploader {
    truncation_reported: AtomicBool,
}

impl LightUploader {
    /// Creates an uploader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads the camera position and the lights into `program`, which must
    /// be current. Returns the number of lights uploaded.
    pub fn upload(
        &self,
        device: &mut dyn GraphicsDevice,
        program: &ShaderProgram,
        view_position: Vec3,
        lights: &LightList,
    ) -> usize {
        if lights.len() > MAX_LIGHTS && !self.truncation_reported.swap(true, Ordering::Relaxed) {
            log::warn!(
                "Scene has {} lights, only the first {MAX_LIGHTS} are shaded",
                lights.len()
            );
        }

        let count = lights.len().min(MAX_LIGHTS);
        program.set(device, "viewPos", view_position);
        program.set(device, "numLights", count as i32);
        for (i, light) in lights.iter().take(count).enumerate() {
            program.set(device, &format!("lights[{i}].position"), light.position);
            program.set(device, &format!("lights[{i}].color"), light.color);
            program.set(device, &format!("lights[{i}].constant"), light.attenuation.constant);
            program.set(device, &format!("lights[{i}].linear"), light.attenuation.linear);
            program.set(device, &format!("lights[{i}].quadratic"), light.attenuation.quadratic);
            program.set(device, &format!("lights[{i}].radius"), light.radius);
        }
        count
    }
}
