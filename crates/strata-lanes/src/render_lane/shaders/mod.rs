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

//! Built-in WGSL programs of the hybrid pipeline.
//!
//! Shader sources are embedded at compile time using `include_str!` so the
//! renderer ships without runtime file access. Each source has a matching
//! descriptor builder whose [`UniformLayout`] mirrors the WGSL `Uniforms`
//! struct member for member; the backend writes uniform values at the offsets
//! the layout computes, so the two must stay in sync.

use crate::render_lane::gbuffer::GBufferLayout;
use strata_core::renderer::{ProgramDescriptor, UniformKind, UniformLayout, UniformLayoutBuilder, VertexInput};

/// Geometry pass writing the G-buffer attachments.
///
/// Entry points `vs_main`, `fs_main` (three attachments) and
/// `fs_main_specular` (four attachments).
pub const GBUFFER_WGSL: &str = include_str!("gbuffer.wgsl");

/// Deferred lighting over a three-attachment G-buffer.
///
/// Draws a single full-screen triangle; the specular strength is read from the
/// alpha channel of `gNormal`.
pub const DEFERRED_LIGHTING_WGSL: &str = include_str!("deferred_lighting.wgsl");

/// Deferred lighting over a G-buffer with a `gSpecular` attachment.
pub const DEFERRED_LIGHTING_SPECULAR_WGSL: &str = include_str!("deferred_lighting_specular.wgsl");

/// Forward Blinn-Phong with alpha output, used for meshes routed around the G-buffer.
pub const FORWARD_LIT_WGSL: &str = include_str!("forward_lit.wgsl");

/// Transform-only program used by the overdraw probe.
pub const DEPTH_ONLY_WGSL: &str = include_str!("depth_only.wgsl");

/// Capacity of the light array in the lighting programs.
pub const MAX_LIGHTS: usize = 16;

const MATERIAL_MEMBERS: [(&str, UniformKind); 4] = [
    ("diffuse", UniformKind::Vec3),
    ("shininess", UniformKind::Float),
    ("specular", UniformKind::Vec3),
    ("opacity", UniformKind::Float),
];

const LIGHT_MEMBERS: [(&str, UniformKind); 6] = [
    ("position", UniformKind::Vec3),
    ("radius", UniformKind::Float),
    ("color", UniformKind::Vec3),
    ("constant", UniformKind::Float),
    ("linear", UniformKind::Float),
    ("quadratic", UniformKind::Float),
];

fn transforms() -> UniformLayoutBuilder {
    UniformLayout::builder()
        .field("model", UniformKind::Mat4)
        .field("view", UniformKind::Mat4)
        .field("projection", UniformKind::Mat4)
}

fn with_lights(builder: UniformLayoutBuilder) -> UniformLayoutBuilder {
    builder
        .field("viewPos", UniformKind::Vec3)
        .field("numLights", UniformKind::Int)
        .array_of_structs("lights", MAX_LIGHTS, &LIGHT_MEMBERS)
}

/// The geometry-pass program for a G-buffer layout.
pub fn gbuffer_program(layout: &GBufferLayout) -> ProgramDescriptor<'static> {
    ProgramDescriptor {
        label: "gbuffer",
        source: GBUFFER_WGSL,
        vertex_entry: "vs_main",
        fragment_entry: Some(if layout.has_specular() {
            "fs_main_specular"
        } else {
            "fs_main"
        }),
        vertex_input: VertexInput::Mesh,
        uniforms: transforms().structure("material", &MATERIAL_MEMBERS).build(),
        texture_slots: &[],
    }
}

/// The deferred lighting program sampling the attachments of `layout`.
pub fn deferred_lighting_program(layout: &GBufferLayout) -> ProgramDescriptor<'static> {
    ProgramDescriptor {
        label: "deferred_lighting",
        source: if layout.has_specular() {
            DEFERRED_LIGHTING_SPECULAR_WGSL
        } else {
            DEFERRED_LIGHTING_WGSL
        },
        vertex_entry: "vs_main",
        fragment_entry: Some("fs_main"),
        vertex_input: VertexInput::Generated,
        uniforms: with_lights(UniformLayout::builder()).build(),
        texture_slots: layout.sampler_names(),
    }
}

/// The forward lighting program.
pub fn forward_lit_program() -> ProgramDescriptor<'static> {
    ProgramDescriptor {
        label: "forward_lit",
        source: FORWARD_LIT_WGSL,
        vertex_entry: "vs_main",
        fragment_entry: Some("fs_main"),
        vertex_input: VertexInput::Mesh,
        uniforms: with_lights(transforms().structure("material", &MATERIAL_MEMBERS)).build(),
        texture_slots: &[],
    }
}

/// The depth-only program of the overdraw probe.
pub fn depth_only_program() -> ProgramDescriptor<'static> {
    ProgramDescriptor {
        label: "depth_only",
        source: DEPTH_ONLY_WGSL,
        vertex_entry: "vs_main",
        fragment_entry: None,
        vertex_input: VertexInput::Mesh,
        uniforms: transforms().build(),
        texture_slots: &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset(layout: &UniformLayout, name: &str) -> u32 {
        let index = layout.index_of(name).unwrap();
        layout.fields()[index].offset
    }

    #[test]
    fn test_gbuffer_layout_matches_wgsl_struct() {
        let program = gbuffer_program(&GBufferLayout::standard());
        let u = &program.uniforms;
        assert_eq!(offset(u, "projection"), 128);
        assert_eq!(offset(u, "material.diffuse"), 192);
        assert_eq!(offset(u, "material.shininess"), 204);
        assert_eq!(offset(u, "material.specular"), 208);
        assert_eq!(offset(u, "material.opacity"), 220);
        assert_eq!(u.size(), 224);
        assert_eq!(program.fragment_entry, Some("fs_main"));
    }

    #[test]
    fn test_forward_layout_matches_wgsl_struct() {
        let u = forward_lit_program().uniforms;
        assert_eq!(offset(&u, "viewPos"), 224);
        assert_eq!(offset(&u, "numLights"), 236);
        assert_eq!(offset(&u, "lights[0].position"), 240);
        assert_eq!(offset(&u, "lights[1].position"), 288);
        assert_eq!(offset(&u, "lights[15].quadratic"), 240 + 15 * 48 + 36);
        assert_eq!(u.size(), 240 + 16 * 48);
    }

    #[test]
    fn test_lighting_program_follows_gbuffer_layout() {
        let standard = deferred_lighting_program(&GBufferLayout::standard());
        assert_eq!(standard.texture_slots, &["gPosition", "gNormal", "gAlbedoSpec"]);
        assert_eq!(standard.vertex_input, VertexInput::Generated);

        let specular = deferred_lighting_program(&GBufferLayout::with_specular());
        assert_eq!(specular.texture_slots.len(), 4);
        assert!(specular.source.contains("gSpecular"));
        assert_eq!(
            gbuffer_program(&GBufferLayout::with_specular()).fragment_entry,
            Some("fs_main_specular")
        );
    }

    #[test]
    fn test_sources_declare_entry_points() {
        for source in [GBUFFER_WGSL, DEFERRED_LIGHTING_WGSL, FORWARD_LIT_WGSL, DEPTH_ONLY_WGSL] {
            assert!(source.contains("fn vs_main"));
        }
        assert!(!DEPTH_ONLY_WGSL.contains("@fragment"));
    }
}
