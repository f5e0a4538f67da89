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

//! Fixed-function state of the immediate-mode device.
//!
//! The device owns one current [`RenderState`], one viewport and one bound
//! framebuffer at a time, the same way a GL context does. Passes mutate that
//! global state; code that makes temporary excursions captures it first as a
//! [`GpuStateSnapshot`] and puts it back afterwards.

use super::resource::{FramebufferId, ProgramId};
use crate::math::Extent2D;

/// A comparison function used for depth and stencil tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompareFunction {
    /// The test never passes.
    Never,
    /// Passes if the new value is less than the existing value.
    #[default]
    Less,
    /// Passes if the new value is equal to the existing value.
    Equal,
    /// Passes if the new value is less than or equal to the existing value.
    LessEqual,
    /// Passes if the new value is greater than the existing value.
    Greater,
    /// Passes if the new value is not equal to the existing value.
    NotEqual,
    /// Passes if the new value is greater than or equal to the existing value.
    GreaterEqual,
    /// The test always passes.
    Always,
}

impl CompareFunction {
    /// Evaluates `incoming <op> existing`.
    pub fn passes<T: PartialOrd>(self, incoming: T, existing: T) -> bool {
        match self {
            CompareFunction::Never => false,
            CompareFunction::Less => incoming < existing,
            CompareFunction::Equal => incoming == existing,
            CompareFunction::LessEqual => incoming <= existing,
            CompareFunction::Greater => incoming > existing,
            CompareFunction::NotEqual => incoming != existing,
            CompareFunction::GreaterEqual => incoming >= existing,
            CompareFunction::Always => true,
        }
    }
}

/// Depth test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthState {
    /// If `false`, every fragment passes and depth is left untouched.
    pub test_enabled: bool,
    /// The comparison used when the test is enabled.
    pub compare: CompareFunction,
    /// If `true`, passing fragments write their depth.
    pub write_enabled: bool,
}

impl Default for DepthState {
    fn default() -> Self {
        Self {
            test_enabled: true,
            compare: CompareFunction::Less,
            write_enabled: true,
        }
    }
}

/// An operation performed on a stencil value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StencilOperation {
    /// Keep the current value.
    #[default]
    Keep,
    /// Set the value to zero.
    Zero,
    /// Replace the value with the reference value.
    Replace,
    /// Increment the value, clamping at the maximum.
    IncrementClamp,
    /// Decrement the value, clamping at zero.
    DecrementClamp,
    /// Bitwise-invert the value.
    Invert,
}

impl StencilOperation {
    /// Applies the operation to an 8-bit stencil value.
    pub fn apply(self, value: u8, reference: u32) -> u8 {
        match self {
            StencilOperation::Keep => value,
            StencilOperation::Zero => 0,
            StencilOperation::Replace => reference as u8,
            StencilOperation::IncrementClamp => value.saturating_add(1),
            StencilOperation::DecrementClamp => value.saturating_sub(1),
            StencilOperation::Invert => !value,
        }
    }
}

/// Stencil test configuration, applied identically to front and back faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilState {
    /// If `false`, the stencil buffer is neither tested nor written.
    pub enabled: bool,
    /// Compares `reference & read_mask` against `stored & read_mask`.
    pub compare: CompareFunction,
    /// Operation when the stencil test fails.
    pub fail_op: StencilOperation,
    /// Operation when the stencil test passes but the depth test fails.
    pub depth_fail_op: StencilOperation,
    /// Operation when both tests pass.
    pub pass_op: StencilOperation,
    /// The stencil reference value.
    pub reference: u32,
    /// Mask applied to both sides of the comparison.
    pub read_mask: u32,
    /// Mask applied to written values.
    pub write_mask: u32,
}

impl Default for StencilState {
    fn default() -> Self {
        Self {
            enabled: false,
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::Keep,
            pass_op: StencilOperation::Keep,
            reference: 0,
            read_mask: 0xff,
            write_mask: 0xff,
        }
    }
}

/// A blend factor for the source or destination color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    /// `0.0`
    Zero,
    /// `1.0`
    One,
    /// The source alpha.
    SrcAlpha,
    /// `1.0 - source alpha`
    OneMinusSrcAlpha,
}

/// An additive blend equation `src * src_factor + dst * dst_factor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Factor applied to the fragment color.
    pub src: BlendFactor,
    /// Factor applied to the color already in the target.
    pub dst: BlendFactor,
}

impl BlendState {
    /// Classic "over" compositing used for translucent geometry.
    pub const ALPHA_BLENDING: Self = Self {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    };
}

/// Per-channel color write mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorMask {
    /// Write the red channel.
    pub red: bool,
    /// Write the green channel.
    pub green: bool,
    /// Write the blue channel.
    pub blue: bool,
    /// Write the alpha channel.
    pub alpha: bool,
}

impl ColorMask {
    /// All channels written.
    pub const ALL: Self = Self {
        red: true,
        green: true,
        blue: true,
        alpha: true,
    };
    /// No channel written.
    pub const NONE: Self = Self {
        red: false,
        green: false,
        blue: false,
        alpha: false,
    };
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Which color attachments of the bound framebuffer receive fragment output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DrawBuffers {
    /// No color output at all (depth/stencil-only rendering).
    None,
    /// Every color attachment, in location order.
    #[default]
    All,
}

/// The complete fixed-function state applied to subsequent draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderState {
    /// Depth test configuration.
    pub depth: DepthState,
    /// Stencil test configuration.
    pub stencil: StencilState,
    /// Blending, or `None` to overwrite.
    pub blend: Option<BlendState>,
    /// Color write mask.
    pub color_mask: ColorMask,
    /// Draw-buffer selection.
    pub draw_buffers: DrawBuffers,
}

/// The rectangle of the bound target that draws map onto, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Viewport {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// A viewport covering a whole target of the given size.
    pub fn from_extent(extent: Extent2D) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }

    /// The size of the viewport.
    pub fn extent(&self) -> Extent2D {
        Extent2D::new(self.width, self.height)
    }
}

/// Everything a temporary render excursion may disturb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuStateSnapshot {
    /// The bound framebuffer (`None` is the default target).
    pub framebuffer: Option<FramebufferId>,
    /// The viewport.
    pub viewport: Viewport,
    /// The fixed-function state.
    pub render_state: RenderState,
    /// The program in use.
    pub program: Option<ProgramId>,
}

/// Which aspects of the bound target a clear touches, and the values written.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClearRequest {
    /// Clear every color attachment to this value.
    pub color: Option<[f32; 4]>,
    /// Clear depth to this value.
    pub depth: Option<f32>,
    /// Clear stencil to this value.
    pub stencil: Option<u32>,
}

impl ClearRequest {
    /// Clears color and depth (to the far plane).
    pub fn color_and_depth(color: [f32; 4]) -> Self {
        Self {
            color: Some(color),
            depth: Some(1.0),
            stencil: None,
        }
    }

    /// Clears depth to the far plane and stencil to zero.
    pub fn depth_and_stencil() -> Self {
        Self {
            color: None,
            depth: Some(1.0),
            stencil: Some(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_functions() {
        assert!(CompareFunction::LessEqual.passes(0.5, 0.5));
        assert!(!CompareFunction::Less.passes(0.5, 0.5));
        assert!(CompareFunction::Equal.passes(0u8, 0u8));
        assert!(!CompareFunction::Never.passes(0, 1));
        assert!(CompareFunction::Always.passes(3, 1));
    }

    #[test]
    fn test_stencil_increment_clamps() {
        assert_eq!(StencilOperation::IncrementClamp.apply(254, 0), 255);
        assert_eq!(StencilOperation::IncrementClamp.apply(255, 0), 255);
        assert_eq!(StencilOperation::DecrementClamp.apply(0, 0), 0);
        assert_eq!(StencilOperation::Replace.apply(9, 3), 3);
    }

    #[test]
    fn test_default_state_is_opaque_depth_tested() {
        let state = RenderState::default();
        assert!(state.depth.test_enabled);
        assert!(state.depth.write_enabled);
        assert!(!state.stencil.enabled);
        assert!(state.blend.is_none());
        assert_eq!(state.color_mask, ColorMask::ALL);
        assert_eq!(state.draw_buffers, DrawBuffers::All);
    }
}
