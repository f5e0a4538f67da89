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

//! The render pass being recorded for the bound target.

use strata_core::math::Extent2D;
use strata_core::renderer::{
    ClearRequest, FramebufferId, MeshId, ProgramId, QueryId, RenderState, TextureFormat,
    TextureId, Viewport,
};

/// What a draw rasterizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Geometry {
    /// An uploaded mesh, drawn indexed.
    Mesh(MeshId),
    /// Three generated vertices covering the viewport.
    FullscreenTriangle,
}

/// A draw with every piece of global state it was issued with.
#[derive(Debug, Clone)]
pub(crate) struct DrawCommand {
    pub program: ProgramId,
    pub state: RenderState,
    pub viewport: Viewport,
    pub uniforms: Vec<u8>,
    /// Texture bound to each texture slot of the program.
    pub textures: Vec<Option<TextureId>>,
    pub geometry: Geometry,
}

#[derive(Debug, Clone)]
pub(crate) enum PassCommand {
    Draw(DrawCommand),
    BeginQuery(u32),
    EndQuery,
}

/// Commands waiting to be encoded into one render pass.
#[derive(Debug)]
pub(crate) struct PendingPass {
    pub target: Option<FramebufferId>,
    /// Folded into the pass load operations.
    pub clear: ClearRequest,
    pub commands: Vec<PassCommand>,
    /// The query whose set the pass writes into.
    pub query: Option<QueryId>,
    /// `true` while a query slot is begun but not ended.
    pub query_open: bool,
}

impl PendingPass {
    pub fn new(target: Option<FramebufferId>) -> Self {
        Self {
            target,
            clear: ClearRequest::default(),
            commands: Vec::new(),
            query: None,
            query_open: false,
        }
    }

    /// Returns `true` once a draw has been recorded.
    pub fn has_draws(&self) -> bool {
        self.commands
            .iter()
            .any(|c| matches!(c, PassCommand::Draw(_)))
    }

    /// Merges a clear into the load operations. Only valid before any draw.
    pub fn merge_clear(&mut self, request: &ClearRequest) {
        if request.color.is_some() {
            self.clear.color = request.color;
        }
        if request.depth.is_some() {
            self.clear.depth = request.depth;
        }
        if request.stencil.is_some() {
            self.clear.stencil = request.stencil;
        }
    }
}

/// One attachment of a resolved render target.
#[derive(Debug, Clone)]
pub(crate) struct Attachment {
    pub view: wgpu::TextureView,
    pub format: TextureFormat,
}

/// The attachments a pass renders into.
#[derive(Debug, Clone)]
pub(crate) struct TargetAttachments {
    pub colors: Vec<Attachment>,
    pub depth: Option<Attachment>,
    pub extent: Extent2D,
}

impl TargetAttachments {
    pub fn color_formats(&self) -> Vec<TextureFormat> {
        self.colors.iter().map(|a| a.format).collect()
    }

    pub fn depth_format(&self) -> Option<TextureFormat> {
        self.depth.as_ref().map(|a| a.format)
    }
}

/// Clips a viewport to the target, or returns `None` if nothing is left.
pub(crate) fn clamp_viewport(viewport: Viewport, extent: Extent2D) -> Option<Viewport> {
    if viewport.x >= extent.width || viewport.y >= extent.height {
        return None;
    }
    let width = viewport.width.min(extent.width - viewport.x);
    let height = viewport.height.min(extent.height - viewport.y);
    (width > 0 && height > 0).then_some(Viewport {
        x: viewport.x,
        y: viewport.y,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_merges_per_aspect() {
        let mut pass = PendingPass::new(None);
        pass.merge_clear(&ClearRequest::color_and_depth([0.0, 0.0, 0.0, 1.0]));
        pass.merge_clear(&ClearRequest {
            stencil: Some(0),
            ..ClearRequest::default()
        });
        assert_eq!(pass.clear.color, Some([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(pass.clear.depth, Some(1.0));
        assert_eq!(pass.clear.stencil, Some(0));
        assert!(!pass.has_draws());
    }

    #[test]
    fn test_viewport_is_clipped_to_target() {
        let extent = Extent2D::new(64, 32);
        let clipped = clamp_viewport(
            Viewport {
                x: 48,
                y: 0,
                width: 64,
                height: 64,
            },
            extent,
        );
        assert_eq!(
            clipped,
            Some(Viewport {
                x: 48,
                y: 0,
                width: 16,
                height: 32,
            })
        );
        assert_eq!(
            clamp_viewport(
                Viewport {
                    x: 64,
                    y: 0,
                    width: 8,
                    height: 8,
                },
                extent
            ),
            None
        );
    }
}
