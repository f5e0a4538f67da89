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

//! The geometry buffer: the off-screen attachments the deferred path writes
//! surface attributes into and the lighting pass samples back.

use crate::render_lane::program::ShaderProgram;
use strata_core::math::Extent2D;
use strata_core::renderer::{
    FramebufferDescriptor, FramebufferId, FramebufferStatus, GraphicsDevice, TextureDescriptor,
    TextureFormat, TextureId, Viewport,
};

/// One color attachment of the G-buffer, named after the sampler that reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBufferAttachment {
    /// Sampler name in the lighting program.
    pub name: &'static str,
    /// Texel format.
    pub format: TextureFormat,
}

const POSITION: GBufferAttachment = GBufferAttachment {
    name: "gPosition",
    format: TextureFormat::Rgba16Float,
};
const NORMAL: GBufferAttachment = GBufferAttachment {
    name: "gNormal",
    format: TextureFormat::Rgba16Float,
};
const ALBEDO_SPEC: GBufferAttachment = GBufferAttachment {
    name: "gAlbedoSpec",
    format: TextureFormat::Rgba8Unorm,
};
const SPECULAR: GBufferAttachment = GBufferAttachment {
    name: "gSpecular",
    format: TextureFormat::Rgba8Unorm,
};

const STANDARD_ATTACHMENTS: [GBufferAttachment; 3] = [POSITION, NORMAL, ALBEDO_SPEC];
const SPECULAR_ATTACHMENTS: [GBufferAttachment; 4] = [POSITION, NORMAL, ALBEDO_SPEC, SPECULAR];
const STANDARD_SAMPLERS: [&str; 3] = names_of(STANDARD_ATTACHMENTS);
const SPECULAR_SAMPLERS: [&str; 4] = names_of(SPECULAR_ATTACHMENTS);

const fn names_of<const N: usize>(attachments: [GBufferAttachment; N]) -> [&'static str; N] {
    let mut names = [""; N];
    let mut i = 0;
    while i < N {
        names[i] = attachments[i].name;
        i += 1;
    }
    names
}

/// The set of attachments a G-buffer is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBufferLayout {
    specular: bool,
}

impl GBufferLayout {
    /// Position, normal and albedo/shininess, plus a 32-bit float depth buffer.
    pub const fn standard() -> Self {
        Self { specular: false }
    }

    /// The standard layout plus an RGBA8 specular-color attachment.
    pub const fn with_specular() -> Self {
        Self { specular: true }
    }

    /// Whether the layout carries the `gSpecular` attachment.
    pub const fn has_specular(&self) -> bool {
        self.specular
    }

    /// The color attachments, in location order.
    pub fn attachments(&self) -> &'static [GBufferAttachment] {
        if self.specular {
            &SPECULAR_ATTACHMENTS
        } else {
            &STANDARD_ATTACHMENTS
        }
    }

    /// The sampler names of the attachments, in location order.
    pub fn sampler_names(&self) -> &'static [&'static str] {
        if self.specular {
            &SPECULAR_SAMPLERS
        } else {
            &STANDARD_SAMPLERS
        }
    }

    /// The depth attachment format.
    pub const fn depth_format(&self) -> TextureFormat {
        TextureFormat::Depth32Float
    }

    /// Bytes of attachment storage per pixel, depth included.
    pub fn bytes_per_pixel(&self) -> u32 {
        self.attachments()
            .iter()
            .map(|a| a.format.bytes_per_texel())
            .sum::<u32>()
            + self.depth_format().bytes_per_texel()
    }
}

impl Default for GBufferLayout {
    fn default() -> Self {
        Self::standard()
    }
}

/// The G-buffer render target.
///
/// Allocation never fails outright: a missing attachment or an incomplete
/// framebuffer is logged and the buffer keeps going in a broken state, which
/// shows up as missing deferred geometry rather than a crash.
#[derive(Debug)]
pub struct GBuffer {
    layout: GBufferLayout,
    size: Extent2D,
    framebuffer: Option<FramebufferId>,
    color_textures: Vec<TextureId>,
    depth_texture: Option<TextureId>,
    status: FramebufferStatus,
}

impl GBuffer {
    /// Creates the attachments and the framebuffer binding them together.
    pub fn allocate(device: &mut dyn GraphicsDevice, size: Extent2D, layout: GBufferLayout) -> Self {
        log::info!(
            "Allocating G-buffer {}x{} with {} color attachments",
            size.width,
            size.height,
            layout.attachments().len()
        );

        let mut color_textures = Vec::with_capacity(layout.attachments().len());
        let mut missing = 0;
        for attachment in layout.attachments() {
            match device.create_texture(&TextureDescriptor {
                label: Some(attachment.name),
                size,
                format: attachment.format,
            }) {
                Ok(id) => color_textures.push(id),
                Err(e) => {
                    log::error!("G-buffer attachment '{}' could not be created: {e}", attachment.name);
                    missing += 1;
                }
            }
        }

        let depth_texture = match device.create_texture(&TextureDescriptor {
            label: Some("gDepth"),
            size,
            format: layout.depth_format(),
        }) {
            Ok(id) => Some(id),
            Err(e) => {
                log::error!("G-buffer depth attachment could not be created: {e}");
                missing += 1;
                None
            }
        };

        let mut gbuffer = Self {
            layout,
            size,
            framebuffer: None,
            color_textures,
            depth_texture,
            status: FramebufferStatus::Incomplete(format!("{missing} attachment(s) missing")),
        };
        if missing > 0 {
            log::error!("G-buffer is incomplete: {missing} attachment(s) missing");
            return gbuffer;
        }

        let created = device.create_framebuffer(&FramebufferDescriptor {
            label: Some("gbuffer"),
            color_attachments: &gbuffer.color_textures,
            depth_attachment: gbuffer.depth_texture,
        });
        match created {
            Ok(id) => {
                gbuffer.status = device.framebuffer_status(id);
                if let FramebufferStatus::Incomplete(reason) = &gbuffer.status {
                    log::error!("G-buffer framebuffer is incomplete: {reason}");
                }
                gbuffer.framebuffer = Some(id);
            }
            Err(e) => {
                log::error!("G-buffer framebuffer could not be created: {e}");
                gbuffer.status = FramebufferStatus::Incomplete(e.to_string());
            }
        }
        gbuffer
    }

    /// The attachment layout.
    pub fn layout(&self) -> GBufferLayout {
        self.layout
    }

    /// The size of every attachment.
    pub fn size(&self) -> Extent2D {
        self.size
    }

    /// The framebuffer, if it could be created.
    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    /// The color attachments, in location order.
    pub fn color_textures(&self) -> &[TextureId] {
        &self.color_textures
    }

    /// The completeness reported when the buffer was allocated.
    pub fn status(&self) -> &FramebufferStatus {
        &self.status
    }

    /// Whether the buffer can be rendered into.
    pub fn is_complete(&self) -> bool {
        self.framebuffer.is_some() && self.status.is_complete()
    }

    /// Binds the G-buffer as the render target and sets a matching viewport.
    ///
    /// Returns `false`, leaving the device untouched, if there is no framebuffer.
    pub fn bind_for_writing(&self, device: &mut dyn GraphicsDevice) -> bool {
        let Some(framebuffer) = self.framebuffer else {
            return false;
        };
        device.bind_framebuffer(Some(framebuffer));
        device.set_viewport(Viewport::from_extent(self.size));
        true
    }

    /// Binds attachment `i` to texture unit `i` and points the sampler of the
    /// same name in `program` at it.
    ///
    /// `program` must be the current program. Samplers it does not declare are
    /// skipped.
    pub fn bind_textures(&self, device: &mut dyn GraphicsDevice, program: &ShaderProgram) {
        for (unit, (attachment, texture)) in self
            .layout
            .attachments()
            .iter()
            .zip(&self.color_textures)
            .enumerate()
        {
            device.bind_texture(unit as u32, Some(*texture));
            program.set(device, attachment.name, unit as i32);
        }
    }

    /// Attachment storage in MiB. Depends only on the layout and the size.
    pub fn memory_usage_mb(&self) -> f64 {
        self.layout.bytes_per_pixel() as f64 * self.size.area() as f64 / (1024.0 * 1024.0)
    }

    /// Releases the attachments and reallocates them at `size`.
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, size: Extent2D) {
        if size == self.size {
            return;
        }
        self.release(device);
        *self = Self::allocate(device, size, self.layout);
    }

    /// Destroys the framebuffer and its attachments.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(framebuffer) = self.framebuffer.take() {
            if let Err(e) = device.destroy_framebuffer(framebuffer) {
                log::warn!("Failed to destroy G-buffer framebuffer: {e}");
            }
        }
        for texture in self.color_textures.drain(..).chain(self.depth_texture.take()) {
            if let Err(e) = device.destroy_texture(texture) {
                log::warn!("Failed to destroy G-buffer attachment {texture:?}: {e}");
            }
        }
        self.status = FramebufferStatus::Incomplete("released".into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strata_core::renderer::mock::MockGraphicsDevice;

    #[test]
    fn test_allocate_standard_layout() {
        let mut device = MockGraphicsDevice::new(Extent2D::new(64, 32));
        let gbuffer = GBuffer::allocate(&mut device, Extent2D::new(64, 32), GBufferLayout::standard());
        assert!(gbuffer.is_complete());
        assert_eq!(gbuffer.color_textures().len(), 3);
        // Three color attachments, one depth texture and the framebuffer.
        assert_eq!(device.live_resource_count(), 5);
    }

    #[test]
    fn test_memory_usage_is_linear_in_area() {
        let mut device = MockGraphicsDevice::new(Extent2D::new(800, 600));
        let small = GBuffer::allocate(&mut device, Extent2D::new(800, 600), GBufferLayout::standard());
        let large = GBuffer::allocate(&mut device, Extent2D::new(1600, 1200), GBufferLayout::standard());
        assert_relative_eq!(large.memory_usage_mb(), small.memory_usage_mb() * 4.0, epsilon = 1e-9);
        // 8 + 8 + 4 bytes of color and 4 of depth per pixel.
        assert_relative_eq!(small.memory_usage_mb(), 24.0 * 480_000.0 / 1_048_576.0, epsilon = 1e-9);
    }

    #[test]
    fn test_specular_layout_adds_attachment() {
        assert_eq!(GBufferLayout::with_specular().bytes_per_pixel(), 28);
        assert_eq!(GBufferLayout::with_specular().attachments().len(), 4);
        assert_eq!(GBufferLayout::standard().sampler_names()[2], "gAlbedoSpec");
    }

    #[test]
    fn test_sampler_names_follow_attachments() {
        for layout in [GBufferLayout::standard(), GBufferLayout::with_specular()] {
            let names: Vec<&str> = layout.attachments().iter().map(|a| a.name).collect();
            assert_eq!(layout.sampler_names(), names.as_slice());
        }
        assert_eq!(GBufferLayout::with_specular().sampler_names()[3], "gSpecular");
    }

    #[test]
    fn test_incomplete_framebuffer_keeps_going() {
        let mut device = MockGraphicsDevice::new(Extent2D::new(16, 16));
        device.set_incomplete_framebuffers(true);
        let gbuffer = GBuffer::allocate(&mut device, Extent2D::new(16, 16), GBufferLayout::standard());
        assert!(!gbuffer.is_complete());
        assert!(gbuffer.framebuffer().is_some());
    }

    #[test]
    fn test_failed_attachment_leaves_no_framebuffer() {
        let mut device = MockGraphicsDevice::new(Extent2D::new(16, 16));
        device.set_failing_textures(true);
        let gbuffer = GBuffer::allocate(&mut device, Extent2D::new(16, 16), GBufferLayout::standard());
        assert!(gbuffer.framebuffer().is_none());
        assert!(!gbuffer.bind_for_writing(&mut device));
        assert!(device.calls().is_empty());
    }

    #[test]
    fn test_resize_and_release_free_everything() {
        let mut device = MockGraphicsDevice::new(Extent2D::new(16, 16));
        let mut gbuffer = GBuffer::allocate(&mut device, Extent2D::new(16, 16), GBufferLayout::standard());
        gbuffer.resize(&mut device, Extent2D::new(32, 8));
        assert_eq!(gbuffer.size(), Extent2D::new(32, 8));
        assert_eq!(device.live_resource_count(), 5);
        gbuffer.release(&mut device);
        assert_eq!(device.live_resource_count(), 0);
    }

    #[test]
    fn test_bind_for_writing_sets_viewport() {
        let mut device = MockGraphicsDevice::new(Extent2D::new(64, 64));
        let gbuffer = GBuffer::allocate(&mut device, Extent2D::new(40, 20), GBufferLayout::standard());
        assert!(gbuffer.bind_for_writing(&mut device));
        assert_eq!(device.bound_framebuffer(), gbuffer.framebuffer());
        assert_eq!(device.viewport(), Viewport::from_extent(Extent2D::new(40, 20)));
    }
}
