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

//! A linked program together with by-name uniform assignment.

use strata_core::renderer::{GraphicsDevice, ProgramDescriptor, ProgramId, UniformValue};

/// A compiled shader program, or the record that compiling it failed.
///
/// A program that failed to link is kept around unlinked: binding it leaves
/// the device without a program, so draws issued with it produce nothing.
#[derive(Debug)]
pub struct ShaderProgram {
    label: String,
    id: Option<ProgramId>,
}

impl ShaderProgram {
    /// Compiles and links `descriptor`, logging the failure if there is one.
    pub fn compile(device: &mut dyn GraphicsDevice, descriptor: &ProgramDescriptor) -> Self {
        let id = match device.create_program(descriptor) {
            Ok(id) => {
                log::debug!("Linked program '{}' as {id:?}", descriptor.label);
                Some(id)
            }
            Err(e) => {
                log::error!("{e}");
                None
            }
        };
        Self {
            label: descriptor.label.to_string(),
            id,
        }
    }

    /// An empty, never-linked program.
    pub fn unlinked(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            id: None,
        }
    }

    /// The debug label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The program handle, if linking succeeded.
    pub fn id(&self) -> Option<ProgramId> {
        self.id
    }

    /// Whether linking succeeded.
    pub fn is_linked(&self) -> bool {
        self.id.is_some()
    }

    /// Makes this program current.
    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.use_program(self.id);
    }

    /// Assigns a uniform of this program, which must be current.
    ///
    /// Names the program does not declare are skipped.
    pub fn set(&self, device: &mut dyn GraphicsDevice, name: &str, value: impl Into<UniformValue>) {
        let Some(id) = self.id else {
            return;
        };
        match device.uniform_location(id, name) {
            Some(location) => device.set_uniform(location, value.into()),
            None => log::trace!("Program '{}' has no uniform '{name}'", self.label),
        }
    }

    /// Destroys the program.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(id) = self.id.take() {
            if let Err(e) = device.destroy_program(id) {
                log::warn!("Failed to destroy program '{}': {e}", self.label);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_lane::shaders;
    use strata_core::math::{Extent2D, Mat4, Vec3};
    use strata_core::renderer::mock::MockGraphicsDevice;

    #[test]
    fn test_set_resolves_by_name() {
        let mut device = MockGraphicsDevice::new(Extent2D::new(4, 4));
        let program = ShaderProgram::compile(&mut device, &shaders::forward_lit_program());
        program.bind(&mut device);
        program.set(&mut device, "lights[3].radius", 7.5f32);
        program.set(&mut device, "viewPos", Vec3::new(1.0, 2.0, 3.0));

        let id = program.id().unwrap();
        assert_eq!(device.uniform_value(id, "lights[3].radius"), Some(UniformValue::Float(7.5)));
        assert_eq!(
            device.uniform_value(id, "viewPos"),
            Some(UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)))
        );
    }

    #[test]
    fn test_missing_uniform_is_skipped() {
        let mut device = MockGraphicsDevice::new(Extent2D::new(4, 4));
        let program = ShaderProgram::compile(&mut device, &shaders::depth_only_program());
        program.bind(&mut device);
        program.set(&mut device, "material.diffuse", Vec3::ONE);
        program.set(&mut device, "model", Mat4::IDENTITY);
        assert_eq!(
            device.uniform_value(program.id().unwrap(), "model"),
            Some(UniformValue::Mat4(Mat4::IDENTITY))
        );
    }

    #[test]
    fn test_link_failure_keeps_unlinked_program() {
        let mut device = MockGraphicsDevice::new(Extent2D::new(4, 4)).fail_program("forward_lit");
        let mut program = ShaderProgram::compile(&mut device, &shaders::forward_lit_program());
        assert!(!program.is_linked());
        program.bind(&mut device);
        assert_eq!(device.current_program(), None);
        program.set(&mut device, "viewPos", Vec3::ONE);
        program.release(&mut device);
        assert_eq!(device.live_program_count(), 0);
    }
}
