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

use strata_core::math::Extent2D;
use strata_core::renderer::{
    BlendFactor, BlendState, ColorMask, CompareFunction, RenderState, StencilOperation,
    TextureFormat,
};

/// A local extension trait to convert our engine's types into WGPU-compatible types.
/// This avoids Rust's orphan rules while keeping an idiomatic `.into_wgpu()` syntax.
pub trait IntoWgpu<T> {
    /// Consumes self and converts it into a WGPU-compatible type.
    fn into_wgpu(self) -> T;
}

impl IntoWgpu<wgpu::Extent3d> for Extent2D {
    fn into_wgpu(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl IntoWgpu<wgpu::TextureFormat> for TextureFormat {
    fn into_wgpu(self) -> wgpu::TextureFormat {
        match self {
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Depth24PlusStencil8 => wgpu::TextureFormat::Depth24PlusStencil8,
            TextureFormat::Depth32Float => wgpu::TextureFormat::Depth32Float,
        }
    }
}

impl IntoWgpu<wgpu::CompareFunction> for CompareFunction {
    fn into_wgpu(self) -> wgpu::CompareFunction {
        match self {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }
}

impl IntoWgpu<wgpu::StencilOperation> for StencilOperation {
    fn into_wgpu(self) -> wgpu::StencilOperation {
        match self {
            StencilOperation::Keep => wgpu::StencilOperation::Keep,
            StencilOperation::Zero => wgpu::StencilOperation::Zero,
            StencilOperation::Replace => wgpu::StencilOperation::Replace,
            StencilOperation::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
            StencilOperation::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
            StencilOperation::Invert => wgpu::StencilOperation::Invert,
        }
    }
}

impl IntoWgpu<wgpu::BlendFactor> for BlendFactor {
    fn into_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        }
    }
}

impl IntoWgpu<wgpu::BlendState> for BlendState {
    fn into_wgpu(self) -> wgpu::BlendState {
        let component = wgpu::BlendComponent {
            src_factor: self.src.into_wgpu(),
            dst_factor: self.dst.into_wgpu(),
            operation: wgpu::BlendOperation::Add,
        };
        wgpu::BlendState {
            color: component,
            alpha: component,
        }
    }
}

impl IntoWgpu<wgpu::ColorWrites> for ColorMask {
    fn into_wgpu(self) -> wgpu::ColorWrites {
        let mut writes = wgpu::ColorWrites::empty();
        if self.red {
            writes |= wgpu::ColorWrites::RED;
        }
        if self.green {
            writes |= wgpu::ColorWrites::GREEN;
        }
        if self.blue {
            writes |= wgpu::ColorWrites::BLUE;
        }
        if self.alpha {
            writes |= wgpu::ColorWrites::ALPHA;
        }
        writes
    }
}

/// Converts a clear color.
pub fn color(rgba: [f32; 4]) -> wgpu::Color {
    wgpu::Color {
        r: rgba[0] as f64,
        g: rgba[1] as f64,
        b: rgba[2] as f64,
        a: rgba[3] as f64,
    }
}

/// Builds the depth-stencil state of a pipeline drawing into a `format` attachment.
///
/// A disabled depth test compares with `Always` and never writes. The stencil
/// state is only applied to formats that carry a stencil aspect.
pub fn depth_stencil_state(format: TextureFormat, state: &RenderState) -> wgpu::DepthStencilState {
    let depth = &state.depth;
    let stencil = if state.stencil.enabled && format.has_stencil() {
        let face = wgpu::StencilFaceState {
            compare: state.stencil.compare.into_wgpu(),
            fail_op: state.stencil.fail_op.into_wgpu(),
            depth_fail_op: state.stencil.depth_fail_op.into_wgpu(),
            pass_op: state.stencil.pass_op.into_wgpu(),
        };
        wgpu::StencilState {
            front: face,
            back: face,
            read_mask: state.stencil.read_mask,
            write_mask: state.stencil.write_mask,
        }
    } else {
        wgpu::StencilState::default()
    };

    wgpu::DepthStencilState {
        format: format.into_wgpu(),
        depth_write_enabled: depth.test_enabled && depth.write_enabled,
        depth_compare: if depth.test_enabled {
            depth.compare.into_wgpu()
        } else {
            wgpu::CompareFunction::Always
        },
        stencil,
        bias: wgpu::DepthBiasState::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::renderer::{DepthState, StencilState};

    #[test]
    fn test_compare_function_conversion() {
        assert_eq!(
            wgpu::CompareFunction::LessEqual,
            CompareFunction::LessEqual.into_wgpu()
        );
        assert_eq!(
            wgpu::CompareFunction::Never,
            CompareFunction::Never.into_wgpu()
        );
    }

    #[test]
    fn test_alpha_blending_conversion() {
        let blend: wgpu::BlendState = BlendState::ALPHA_BLENDING.into_wgpu();
        assert_eq!(blend.color, wgpu::BlendState::ALPHA_BLENDING.color);
        assert_eq!(blend.alpha.src_factor, wgpu::BlendFactor::SrcAlpha);
    }

    #[test]
    fn test_color_mask_conversion() {
        assert_eq!(
            IntoWgpu::<wgpu::ColorWrites>::into_wgpu(ColorMask::ALL),
            wgpu::ColorWrites::ALL
        );
        assert!(IntoWgpu::<wgpu::ColorWrites>::into_wgpu(ColorMask::NONE).is_empty());
    }

    #[test]
    fn test_disabled_depth_test_never_writes() {
        let state = RenderState {
            depth: DepthState {
                test_enabled: false,
                compare: CompareFunction::Less,
                write_enabled: true,
            },
            ..RenderState::default()
        };
        let ds = depth_stencil_state(TextureFormat::Depth32Float, &state);
        assert!(!ds.depth_write_enabled);
        assert_eq!(ds.depth_compare, wgpu::CompareFunction::Always);
    }

    #[test]
    fn test_stencil_ignored_without_stencil_aspect() {
        let state = RenderState {
            stencil: StencilState {
                enabled: true,
                compare: CompareFunction::Equal,
                pass_op: StencilOperation::IncrementClamp,
                ..StencilState::default()
            },
            ..RenderState::default()
        };
        let with_stencil = depth_stencil_state(TextureFormat::Depth24PlusStencil8, &state);
        assert_eq!(
            with_stencil.stencil.front.pass_op,
            wgpu::StencilOperation::IncrementClamp
        );
        assert_eq!(with_stencil.stencil.front, with_stencil.stencil.back);

        let depth_only = depth_stencil_state(TextureFormat::Depth32Float, &state);
        assert_eq!(depth_only.stencil, wgpu::StencilState::default());
    }
}
