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

//! Programs and the render pipelines derived from them.
//!
//! A program owns its shader module, the bind group layouts of its uniform
//! block (group 0) and texture slots (group 1), and a CPU copy of its uniform
//! values. Pipelines are built lazily per [`PipelineKey`], since wgpu bakes
//! the fixed-function state and attachment formats into the pipeline object.

use super::conversions::{self, IntoWgpu};
use strata_core::renderer::{
    DrawBuffers, ProgramDescriptor, ProgramId, ProgramInterface, RenderState, ShaderError,
    TextureFormat, UniformLocation, UniformValue, Vertex, VertexInput,
};

/// Smallest uniform block handed to wgpu.
const MIN_UNIFORM_SIZE: u32 = 16;

const MESH_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

/// Everything wgpu bakes into a render pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub program: ProgramId,
    pub state: RenderState,
    pub colors: Vec<TextureFormat>,
    pub depth: Option<TextureFormat>,
}

/// A linked program.
#[derive(Debug)]
pub(crate) struct ProgramEntry {
    pub label: String,
    pub module: wgpu::ShaderModule,
    pub vertex_entry: String,
    pub fragment_entry: Option<String>,
    pub vertex_input: VertexInput,
    pub interface: ProgramInterface,
    pub uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: Option<wgpu::BindGroupLayout>,
    pub pipeline_layout: wgpu::PipelineLayout,
    /// Current uniform values, laid out as the shader's uniform block.
    pub uniform_data: Vec<u8>,
    /// Texture unit read by each texture slot.
    pub sampler_units: Vec<u32>,
}

impl ProgramEntry {
    /// Compiles a program, collecting wgpu validation errors into a [`ShaderError`].
    pub fn compile(
        device: &wgpu::Device,
        descriptor: &ProgramDescriptor<'_>,
    ) -> Result<Self, ShaderError> {
        let entries = std::iter::once(descriptor.vertex_entry).chain(descriptor.fragment_entry);
        for entry in entries {
            if !declares_entry_point(descriptor.source, entry) {
                return Err(ShaderError::InvalidEntryPoint {
                    label: descriptor.label.to_string(),
                    entry_point: entry.to_string(),
                });
            }
        }

        let interface = descriptor.interface();
        let uniform_size = interface.uniforms.size().max(MIN_UNIFORM_SIZE);

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(descriptor.label),
            source: wgpu::ShaderSource::Wgsl(descriptor.source.into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{}_uniforms", descriptor.label)),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(uniform_size as u64),
                },
                count: None,
            }],
        });

        let texture_layout = (!interface.texture_slots.is_empty()).then(|| {
            let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..interface.texture_slots.len())
                .map(|binding| wgpu::BindGroupLayoutEntry {
                    binding: binding as u32,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                })
                .collect();
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{}_textures", descriptor.label)),
                entries: &entries,
            })
        });

        let mut bind_group_layouts = vec![&uniform_layout];
        if let Some(layout) = texture_layout.as_ref() {
            bind_group_layouts.push(layout);
        }
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{}_layout", descriptor.label)),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::LinkFailed {
                label: descriptor.label.to_string(),
                log: error.to_string(),
            });
        }

        let slot_count = interface.texture_slots.len();
        Ok(Self {
            label: descriptor.label.to_string(),
            module,
            vertex_entry: descriptor.vertex_entry.to_string(),
            fragment_entry: descriptor.fragment_entry.map(str::to_string),
            vertex_input: descriptor.vertex_input,
            interface,
            uniform_layout,
            texture_layout,
            pipeline_layout,
            uniform_data: vec![0; uniform_size as usize],
            sampler_units: (0..slot_count as u32).collect(),
        })
    }

    /// Writes a uniform into the CPU copy of the uniform block.
    pub fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        match location {
            UniformLocation::Field(index) => {
                let Some(field) = self.interface.uniforms.fields().get(index as usize) else {
                    log::warn!("Program '{}' has no uniform #{index}", self.label);
                    return;
                };
                if field.kind != value.kind() {
                    log::warn!(
                        "Uniform '{}' of program '{}' is {:?}, got {:?}",
                        field.name,
                        self.label,
                        field.kind,
                        value.kind()
                    );
                    return;
                }
                let bytes = value.to_bytes();
                let start = field.offset as usize;
                if let Some(slot) = self.uniform_data.get_mut(start..start + bytes.len()) {
                    slot.copy_from_slice(&bytes);
                }
            }
            UniformLocation::Sampler(slot) => match (value, self.sampler_units.get_mut(slot as usize)) {
                (UniformValue::Int(unit), Some(target)) if unit >= 0 => *target = unit as u32,
                _ => log::warn!(
                    "Ignoring sampler value {value:?} for slot {slot} of program '{}'",
                    self.label
                ),
            },
        }
    }

    /// Builds the pipeline for `key`, or returns `None` after logging why it failed.
    pub fn create_pipeline(
        &self,
        device: &wgpu::Device,
        key: &PipelineKey,
    ) -> Option<wgpu::RenderPipeline> {
        let vertex_buffers = match self.vertex_input {
            VertexInput::Mesh => vec![wgpu::VertexBufferLayout {
                array_stride: Vertex::STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &MESH_ATTRIBUTES,
            }],
            VertexInput::Generated => Vec::new(),
        };

        let targets: Vec<Option<wgpu::ColorTargetState>> = key
            .colors
            .iter()
            .map(|&format| match key.state.draw_buffers {
                DrawBuffers::None => None,
                DrawBuffers::All => Some(wgpu::ColorTargetState {
                    format: format.into_wgpu(),
                    blend: key.state.blend.map(IntoWgpu::into_wgpu),
                    write_mask: key.state.color_mask.into_wgpu(),
                }),
            })
            .collect();

        let fragment = self
            .fragment_entry
            .as_deref()
            .map(|entry| wgpu::FragmentState {
                module: &self.module,
                entry_point: Some(entry),
                targets: &targets,
                compilation_options: Default::default(),
            });
        if fragment.is_none() && targets.iter().any(Option::is_some) {
            log::warn!(
                "Program '{}' has no fragment stage but the target has color attachments",
                self.label
            );
        }

        let label = format!("{}_pipeline", self.label);
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.module,
                entry_point: Some(&self.vertex_entry),
                buffers: &vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment,
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: key
                .depth
                .map(|format| conversions::depth_stencil_state(format, &key.state)),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        match pollster::block_on(device.pop_error_scope()) {
            Some(error) => {
                log::error!("Failed to create pipeline '{label}': {error}");
                None
            }
            None => {
                log::debug!("Created pipeline '{label}'");
                Some(pipeline)
            }
        }
    }
}

/// Returns `true` if `source` declares a function named `entry`.
fn declares_entry_point(source: &str, entry: &str) -> bool {
    source.match_indices("fn ").any(|(index, _)| {
        let rest = source[index + 3..].trim_start();
        rest.strip_prefix(entry)
            .is_some_and(|after| after.trim_start().starts_with('('))
    })
}
