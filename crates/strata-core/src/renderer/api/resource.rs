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

//! Handles and descriptors for GPU resources.
//!
//! Every resource created through a [`GraphicsDevice`](crate::renderer::GraphicsDevice)
//! is identified by an opaque, copyable handle. Handles carry no lifetime; the
//! owner is responsible for destroying what it created.

use crate::math::Extent2D;

macro_rules! resource_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);
    };
}

resource_id!(
    /// An opaque handle to a GPU texture.
    TextureId
);
resource_id!(
    /// An opaque handle to a framebuffer (a set of attachments rendered to together).
    FramebufferId
);
resource_id!(
    /// An opaque handle to a linked shader program.
    ProgramId
);
resource_id!(
    /// An opaque handle to the vertex and index buffers of an uploaded mesh.
    MeshId
);
resource_id!(
    /// An opaque handle to an occlusion query object.
    QueryId
);

/// Texel formats used by the hybrid pipeline's render targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// Four 16-bit float channels. Used for G-buffer positions and normals.
    Rgba16Float,
    /// Four 8-bit normalized channels. Used for albedo and specular.
    Rgba8Unorm,
    /// 24-bit depth with an 8-bit stencil. Used by the overdraw probe.
    Depth24PlusStencil8,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// Size of one texel in bytes, used for memory estimates.
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba8Unorm => 4,
            TextureFormat::Depth24PlusStencil8 => 4,
            TextureFormat::Depth32Float => 4,
        }
    }

    /// Returns `true` for depth (or depth-stencil) formats.
    pub const fn is_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth24PlusStencil8 | TextureFormat::Depth32Float
        )
    }

    /// Returns `true` if the format carries a stencil aspect.
    pub const fn has_stencil(self) -> bool {
        matches!(self, TextureFormat::Depth24PlusStencil8)
    }
}

/// Describes a 2D texture used as a render attachment and sampled afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor<'a> {
    /// A debug label for the texture.
    pub label: Option<&'a str>,
    /// Size in pixels.
    pub size: Extent2D,
    /// Texel format.
    pub format: TextureFormat,
}

/// Describes a framebuffer: an ordered list of color attachments plus an optional depth attachment.
///
/// Color attachment `i` is written by fragment output location `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferDescriptor<'a> {
    /// A debug label for the framebuffer.
    pub label: Option<&'a str>,
    /// Color attachments, in output-location order.
    pub color_attachments: &'a [TextureId],
    /// Depth (or depth-stencil) attachment.
    pub depth_attachment: Option<TextureId>,
}

/// Result of a framebuffer completeness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramebufferStatus {
    /// All attachments are present and compatible.
    Complete,
    /// The framebuffer cannot be rendered to. Carries a backend diagnostic.
    Incomplete(String),
}

impl FramebufferStatus {
    /// Returns `true` if the framebuffer is complete.
    pub fn is_complete(&self) -> bool {
        matches!(self, FramebufferStatus::Complete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_texel_sizes() {
        assert_eq!(TextureFormat::Rgba16Float.bytes_per_texel(), 8);
        assert_eq!(TextureFormat::Rgba8Unorm.bytes_per_texel(), 4);
        assert_eq!(TextureFormat::Depth32Float.bytes_per_texel(), 4);
    }

    #[test]
    fn test_depth_and_stencil_aspects() {
        assert!(TextureFormat::Depth24PlusStencil8.has_stencil());
        assert!(TextureFormat::Depth32Float.is_depth());
        assert!(!TextureFormat::Depth32Float.has_stencil());
        assert!(!TextureFormat::Rgba8Unorm.is_depth());
    }
}
