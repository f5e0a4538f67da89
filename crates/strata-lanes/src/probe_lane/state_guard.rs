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

//! Scoped GPU state excursions.

use std::ops::{Deref, DerefMut};
use strata_core::renderer::{
    FramebufferDescriptor, FramebufferId, GpuStateSnapshot, GraphicsDevice, QueryId, ResourceError,
    TextureDescriptor, TextureId,
};

/// Captures the device's bound framebuffer, viewport, render state and
/// program on creation and puts them back when dropped.
///
/// Resources created through the guard are transient: they are destroyed on
/// drop, before the state is restored, on every exit path including early
/// returns with `?`. The guard dereferences to the device for everything else.
pub struct GpuStateGuard<'a> {
    device: &'a mut (dyn GraphicsDevice + 'a),
    snapshot: GpuStateSnapshot,
    framebuffers: Vec<FramebufferId>,
    textures: Vec<TextureId>,
    queries: Vec<QueryId>,
}

impl<'a> GpuStateGuard<'a> {
    /// Snapshots the device state.
    pub fn new(device: &'a mut (dyn GraphicsDevice + 'a)) -> Self {
        let snapshot = device.snapshot();
        Self {
            device,
            snapshot,
            framebuffers: Vec::new(),
            textures: Vec::new(),
            queries: Vec::new(),
        }
    }

    /// The state that will be restored.
    pub fn snapshot(&self) -> &GpuStateSnapshot {
        &self.snapshot
    }

    /// Creates a texture destroyed with the guard.
    pub fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let id = self.device.create_texture(descriptor)?;
        self.textures.push(id);
        Ok(id)
    }

    /// Creates a framebuffer destroyed with the guard.
    pub fn create_framebuffer(
        &mut self,
        descriptor: &FramebufferDescriptor,
    ) -> Result<FramebufferId, ResourceError> {
        let id = self.device.create_framebuffer(descriptor)?;
        self.framebuffers.push(id);
        Ok(id)
    }

    /// Creates an occlusion query destroyed with the guard.
    pub fn create_occlusion_query(&mut self) -> Result<QueryId, ResourceError> {
        let id = self.device.create_occlusion_query()?;
        self.queries.push(id);
        Ok(id)
    }
}

impl<'a> Deref for GpuStateGuard<'a> {
    type Target = dyn GraphicsDevice + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.device
    }
}

impl DerefMut for GpuStateGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.device
    }
}

impl Drop for GpuStateGuard<'_> {
    fn drop(&mut self) {
        for id in self.framebuffers.drain(..) {
            if let Err(e) = self.device.destroy_framebuffer(id) {
                log::warn!("Failed to destroy transient framebuffer {id:?}: {e}");
            }
        }
        for id in self.textures.drain(..) {
            if let Err(e) = self.device.destroy_texture(id) {
                log::warn!("Failed to destroy transient texture {id:?}: {e}");
            }
        }
        for id in self.queries.drain(..) {
            if let Err(e) = self.device.destroy_query(id) {
                log::warn!("Failed to destroy transient query {id:?}: {e}");
            }
        }
        self.device.restore(&self.snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::math::Extent2D;
    use strata_core::renderer::mock::MockGraphicsDevice;
    use strata_core::renderer::{RenderState, TextureFormat, Viewport};

    #[test]
    fn test_guard_restores_state_and_frees_resources() {
        let mut device = MockGraphicsDevice::new(Extent2D::new(32, 32));
        device.set_viewport(Viewport {
            x: 2,
            y: 2,
            width: 10,
            height: 10,
        });
        let before = device.snapshot();

        {
            let mut guard = GpuStateGuard::new(&mut device);
            let texture = guard
                .create_texture(&TextureDescriptor {
                    label: None,
                    size: Extent2D::new(8, 8),
                    format: TextureFormat::Depth24PlusStencil8,
                })
                .unwrap();
            let fb = guard
                .create_framebuffer(&FramebufferDescriptor {
                    label: None,
                    color_attachments: &[],
                    depth_attachment: Some(texture),
                })
                .unwrap();
            guard.create_occlusion_query().unwrap();
            guard.bind_framebuffer(Some(fb));
            guard.set_viewport(Viewport::from_extent(Extent2D::new(8, 8)));
            guard.set_render_state(RenderState {
                blend: None,
                ..RenderState::default()
            });
        }

        assert_eq!(device.snapshot(), before);
        assert_eq!(device.live_resource_count(), 0);
    }

    #[test]
    fn test_guard_restores_on_early_return() {
        fn excursion(device: &mut dyn GraphicsDevice) -> Result<(), ResourceError> {
            let mut guard = GpuStateGuard::new(device);
            guard.create_occlusion_query()?;
            guard.bind_framebuffer(Some(FramebufferId(999)));
            Err(ResourceError::InvalidHandle)
        }

        let mut device = MockGraphicsDevice::new(Extent2D::new(8, 8));
        let before = device.snapshot();
        assert!(excursion(&mut device).is_err());
        assert_eq!(device.snapshot(), before);
        assert_eq!(device.live_resource_count(), 0);
    }
}
