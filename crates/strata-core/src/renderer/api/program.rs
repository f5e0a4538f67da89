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

//! Shader program descriptions and the uniform interface they expose.
//!
//! Programs are written in WGSL. Besides the source, a program declares the
//! layout of its single uniform block and the names of its texture slots; the
//! device resolves uniform names against that declaration, which gives every
//! backend the same "look up by name, skip when absent" behaviour.

use crate::math::{Mat4, Vec3, Vec4};

/// The type of a single uniform value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// `i32`
    Int,
    /// `f32`
    Float,
    /// `vec3<f32>`
    Vec3,
    /// `vec4<f32>`
    Vec4,
    /// `mat4x4<f32>`
    Mat4,
}

impl UniformKind {
    /// Byte size of the value inside a uniform block.
    pub const fn size(self) -> u32 {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
        }
    }

    /// Required alignment inside a uniform block.
    pub const fn align(self) -> u32 {
        match self {
            UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec3 | UniformKind::Vec4 | UniformKind::Mat4 => 16,
        }
    }
}

/// A single named value inside a uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformField {
    /// Fully qualified name, e.g. `lights[2].radius`.
    pub name: String,
    /// Value type.
    pub kind: UniformKind,
    /// Byte offset from the start of the block.
    pub offset: u32,
}

/// The byte layout of a program's uniform block.
///
/// Offsets follow the WGSL uniform address-space rules: scalars align to 4,
/// vectors and matrices to 16, structs and array elements to 16 with their
/// stride rounded up to 16.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UniformLayout {
    fields: Vec<UniformField>,
    size: u32,
}

impl UniformLayout {
    /// Starts a new layout.
    pub fn builder() -> UniformLayoutBuilder {
        UniformLayoutBuilder::default()
    }

    /// Total size of the block in bytes (a multiple of 16).
    pub fn size(&self) -> u32 {
        self.size
    }

    /// All fields, in declaration order.
    pub fn fields(&self) -> &[UniformField] {
        &self.fields
    }

    /// Looks a field up by its fully qualified name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

const fn align_up(value: u32, align: u32) -> u32 {
    value.div_ceil(align) * align
}

const STRUCT_ALIGN: u32 = 16;

/// Incrementally declares the fields of a [`UniformLayout`].
#[derive(Debug, Default)]
pub struct UniformLayoutBuilder {
    fields: Vec<UniformField>,
    cursor: u32,
}

impl UniformLayoutBuilder {
    /// Appends a plain field.
    pub fn field(mut self, name: impl Into<String>, kind: UniformKind) -> Self {
        let offset = align_up(self.cursor, kind.align());
        self.fields.push(UniformField {
            name: name.into(),
            kind,
            offset,
        });
        self.cursor = offset + kind.size();
        self
    }

    /// Appends a struct member; its fields are named `prefix.member`.
    pub fn structure(mut self, prefix: &str, members: &[(&str, UniformKind)]) -> Self {
        let base = align_up(self.cursor, STRUCT_ALIGN);
        let size = self.push_members(base, |member| format!("{prefix}.{member}"), members);
        self.cursor = base + size;
        self
    }

    /// Appends a fixed-size array of structs; fields are named `prefix[i].member`.
    pub fn array_of_structs(
        mut self,
        prefix: &str,
        count: usize,
        members: &[(&str, UniformKind)],
    ) -> Self {
        let base = align_up(self.cursor, STRUCT_ALIGN);
        let mut stride = 0;
        for i in 0..count {
            stride = self.push_members(
                base + stride * i as u32,
                |member| format!("{prefix}[{i}].{member}"),
                members,
            );
        }
        self.cursor = base + stride * count as u32;
        self
    }

    /// Finalizes the layout.
    pub fn build(self) -> UniformLayout {
        UniformLayout {
            size: align_up(self.cursor, STRUCT_ALIGN),
            fields: self.fields,
        }
    }

    // Lays out one struct instance at `base` and returns its padded size.
    fn push_members(
        &mut self,
        base: u32,
        name: impl Fn(&str) -> String,
        members: &[(&str, UniformKind)],
    ) -> u32 {
        let mut local = 0;
        for &(member, kind) in members {
            let offset = align_up(local, kind.align());
            self.fields.push(UniformField {
                name: name(member),
                kind,
                offset: base + offset,
            });
            local = offset + kind.size();
        }
        align_up(local, STRUCT_ALIGN)
    }
}

/// A value written to a uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// An integer, also used to assign a texture unit to a sampler slot.
    Int(i32),
    /// A float.
    Float(f32),
    /// A 3-component vector.
    Vec3(Vec3),
    /// A 4-component vector.
    Vec4(Vec4),
    /// A 4x4 matrix, column-major.
    Mat4(Mat4),
}

impl UniformValue {
    /// The type of the value.
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    /// The little-endian bytes of the value as laid out in a uniform block.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::Int(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Float(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec3(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec4(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Mat4(v) => bytemuck::bytes_of(v).to_vec(),
        }
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

/// A resolved uniform inside a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformLocation {
    /// Index of a field in the program's [`UniformLayout`].
    Field(u32),
    /// Index of a texture slot; the value assigned is the texture unit to sample.
    Sampler(u32),
}

/// How a program receives its vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexInput {
    /// Interleaved [`Vertex`](super::Vertex) buffers from a mesh.
    #[default]
    Mesh,
    /// No vertex buffer; the vertex stage derives positions from the vertex index.
    Generated,
}

/// The uniform names a linked program answers to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramInterface {
    /// The uniform block layout.
    pub uniforms: UniformLayout,
    /// Texture slot names, in binding order.
    pub texture_slots: Vec<String>,
}

impl ProgramInterface {
    /// Resolves a uniform or sampler name, or `None` if the program does not declare it.
    pub fn location(&self, name: &str) -> Option<UniformLocation> {
        if let Some(index) = self.uniforms.index_of(name) {
            return Some(UniformLocation::Field(index as u32));
        }
        self.texture_slots
            .iter()
            .position(|slot| slot == name)
            .map(|index| UniformLocation::Sampler(index as u32))
    }
}

/// Describes a WGSL program to compile and link.
#[derive(Debug, Clone)]
pub struct ProgramDescriptor<'a> {
    /// A debug label, reported in link errors.
    pub label: &'a str,
    /// The WGSL source.
    pub source: &'a str,
    /// Vertex entry point.
    pub vertex_entry: &'a str,
    /// Fragment entry point, or `None` for depth-only programs.
    pub fragment_entry: Option<&'a str>,
    /// Where vertices come from.
    pub vertex_input: VertexInput,
    /// The uniform block (bind group 0, binding 0).
    pub uniforms: UniformLayout,
    /// Texture slot names (bind group 1, binding `i`).
    pub texture_slots: &'a [&'a str],
}

impl ProgramDescriptor<'_> {
    /// The owned name interface of the program.
    pub fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            uniforms: self.uniforms.clone(),
            texture_slots: self.texture_slots.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn light_members() -> [(&'static str, UniformKind); 6] {
        [
            ("position", UniformKind::Vec3),
            ("radius", UniformKind::Float),
            ("color", UniformKind::Vec3),
            ("constant", UniformKind::Float),
            ("linear", UniformKind::Float),
            ("quadratic", UniformKind::Float),
        ]
    }

    #[test]
    fn test_scalar_packs_after_vec3() {
        let layout = UniformLayout::builder()
            .field("viewPos", UniformKind::Vec3)
            .field("numLights", UniformKind::Int)
            .build();
        assert_eq!(layout.fields()[1].offset, 12);
        assert_eq!(layout.size(), 16);
    }

    #[test]
    fn test_array_of_structs_stride() {
        let layout = UniformLayout::builder()
            .field("viewPos", UniformKind::Vec3)
            .field("numLights", UniformKind::Int)
            .array_of_structs("lights", 2, &light_members())
            .build();

        let offset = |name: &str| layout.fields()[layout.index_of(name).unwrap()].offset;
        assert_eq!(offset("lights[0].position"), 16);
        assert_eq!(offset("lights[0].radius"), 28);
        assert_eq!(offset("lights[0].color"), 32);
        assert_eq!(offset("lights[0].quadratic"), 52);
        // 40 bytes of members padded to a 48-byte stride.
        assert_eq!(offset("lights[1].position"), 64);
        assert_eq!(layout.size(), 16 + 2 * 48);
    }

    #[test]
    fn test_matrices_align_to_16() {
        let layout = UniformLayout::builder()
            .field("opacity", UniformKind::Float)
            .field("model", UniformKind::Mat4)
            .structure(
                "material",
                &[
                    ("diffuse", UniformKind::Vec3),
                    ("shininess", UniformKind::Float),
                ],
            )
            .build();
        assert_eq!(layout.fields()[1].offset, 16);
        assert_eq!(layout.fields()[2].name, "material.diffuse");
        assert_eq!(layout.fields()[2].offset, 80);
        assert_eq!(layout.fields()[3].offset, 92);
        assert_eq!(layout.size(), 96);
    }

    #[test]
    fn test_interface_resolves_fields_then_samplers() {
        let desc = ProgramDescriptor {
            label: "lighting",
            source: "",
            vertex_entry: "vs_main",
            fragment_entry: Some("fs_main"),
            vertex_input: VertexInput::Generated,
            uniforms: UniformLayout::builder()
                .field("viewPos", UniformKind::Vec3)
                .build(),
            texture_slots: &["gPosition", "gNormal"],
        };
        let interface = desc.interface();
        assert_eq!(
            interface.location("viewPos"),
            Some(UniformLocation::Field(0))
        );
        assert_eq!(
            interface.location("gNormal"),
            Some(UniformLocation::Sampler(1))
        );
        assert_eq!(interface.location("gSpecular"), None);
    }

    #[test]
    fn test_value_bytes() {
        assert_eq!(UniformValue::from(2i32).to_bytes(), 2i32.to_le_bytes());
        assert_eq!(UniformValue::from(Vec3::ONE).to_bytes().len(), 12);
        assert_eq!(UniformValue::from(Mat4::IDENTITY).to_bytes().len(), 64);
    }
}
