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

use super::context::WgpuGraphicsContext;
use super::conversions::{self, IntoWgpu};
use super::pass::{
    clamp_viewport, Attachment, DrawCommand, Geometry, PassCommand, PendingPass,
    TargetAttachments,
};
use super::pipeline::{PipelineKey, ProgramEntry};
use super::readback;
use std::collections::HashMap;
use strata_core::math::{Extent2D, ScreenRect};
use strata_core::renderer::{
    ClearRequest, FramebufferDescriptor, FramebufferId, FramebufferStatus, GpuMesh,
    GraphicsDevice, MeshData, MeshId, ProgramDescriptor, ProgramId, QueryId, RenderState,
    ResourceError, ShaderError, TextureDescriptor, TextureFormat, TextureId, UniformLocation,
    UniformValue, Viewport,
};
use wgpu::util::DeviceExt;

/// Occlusion query slots per query object. A query spanning several render
/// passes uses one slot per pass.
const QUERY_SLOTS: u32 = 32;

const DEFAULT_COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
const DEFAULT_DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

const TEXTURE_USAGE: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

#[derive(Debug)]
struct MeshEntry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
}

#[derive(Debug)]
struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: TextureFormat,
    size: Extent2D,
}

impl TextureEntry {
    fn allocate(device: &wgpu::Device, label: &str, size: Extent2D, format: TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: size.into_wgpu(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: format.into_wgpu(),
            usage: TEXTURE_USAGE,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            format,
            size,
        }
    }

    fn attachment(&self) -> Attachment {
        Attachment {
            view: self.view.clone(),
            format: self.format,
        }
    }
}

#[derive(Debug)]
struct FramebufferEntry {
    label: String,
    colors: Vec<TextureId>,
    depth: Option<TextureId>,
}

#[derive(Debug)]
struct QueryEntry {
    set: wgpu::QuerySet,
    resolve: wgpu::Buffer,
    readback: wgpu::Buffer,
    /// Slots written since the last `begin_occlusion_query`.
    slots_used: u32,
}

/// A [`GraphicsDevice`] backed by wgpu.
///
/// The default target (`bind_framebuffer(None)`) is an offscreen RGBA8 color
/// texture with a 32-bit depth buffer, readable with
/// [`read_default_color`](Self::read_default_color).
///
/// Draws are recorded together with the global state current at the time of
/// the call, then encoded into one render pass per run of commands on the
/// same target. Clears issued before the first draw of a pass become its load
/// operations.
#[derive(Debug)]
pub struct WgpuDevice {
    context: WgpuGraphicsContext,
    default_color: TextureEntry,
    default_depth: TextureEntry,
    next_id: u64,

    meshes: HashMap<MeshId, MeshEntry>,
    textures: HashMap<TextureId, TextureEntry>,
    framebuffers: HashMap<FramebufferId, FramebufferEntry>,
    programs: HashMap<ProgramId, ProgramEntry>,
    queries: HashMap<QueryId, QueryEntry>,
    pipelines: HashMap<PipelineKey, Option<wgpu::RenderPipeline>>,

    bound: Option<FramebufferId>,
    viewport: Viewport,
    state: RenderState,
    program: Option<ProgramId>,
    texture_units: HashMap<u32, TextureId>,
    active_query: Option<QueryId>,
    pending: Option<PendingPass>,
    frames: u64,
}

impl WgpuDevice {
    /// Creates a device whose default target has the given size.
    pub fn new(context: WgpuGraphicsContext, extent: Extent2D) -> Self {
        let extent = Extent2D::new(extent.width.max(1), extent.height.max(1));
        let default_color =
            TextureEntry::allocate(&context.device, "default_color", extent, DEFAULT_COLOR_FORMAT);
        let default_depth =
            TextureEntry::allocate(&context.device, "default_depth", extent, DEFAULT_DEPTH_FORMAT);
        log::info!(
            "WgpuDevice ready on \"{}\" ({:?}), default target {}x{}",
            context.adapter_name,
            context.adapter_backend,
            extent.width,
            extent.height
        );

        Self {
            context,
            default_color,
            default_depth,
            next_id: 0,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            queries: HashMap::new(),
            pipelines: HashMap::new(),
            bound: None,
            viewport: Viewport::from_extent(extent),
            state: RenderState::default(),
            program: None,
            texture_units: HashMap::new(),
            active_query: None,
            pending: None,
            frames: 0,
        }
    }

    /// Creates a headless context and a device on top of it.
    pub fn headless(extent: Extent2D) -> anyhow::Result<Self> {
        let context = WgpuGraphicsContext::new_headless_blocking()?;
        Ok(Self::new(context, extent))
    }

    /// The underlying wgpu context.
    pub fn context(&self) -> &WgpuGraphicsContext {
        &self.context
    }

    /// Number of frames finished so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Re-allocates the default target. Its previous contents are lost.
    pub fn resize_default_target(&mut self, extent: Extent2D) {
        self.flush();
        let extent = Extent2D::new(extent.width.max(1), extent.height.max(1));
        let device = &self.context.device;
        self.default_color =
            TextureEntry::allocate(device, "default_color", extent, DEFAULT_COLOR_FORMAT);
        self.default_depth =
            TextureEntry::allocate(device, "default_depth", extent, DEFAULT_DEPTH_FORMAT);
        log::info!("Default target resized to {}x{}", extent.width, extent.height);
    }

    /// Reads the default color target back as tightly packed RGBA8 rows.
    pub fn read_default_color(&mut self) -> Result<Vec<u8>, ResourceError> {
        self.flush();
        let size = self.default_color.size;
        let row_len = size.width * DEFAULT_COLOR_FORMAT.bytes_per_texel();
        let padded = readback::padded_bytes_per_row(row_len);
        let buffer_size = padded as u64 * size.height as u64;

        let device = &self.context.device;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("default_color_readback"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("default_color_readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.default_color.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(size.height),
                },
            },
            size.into_wgpu(),
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let bytes = readback::map_read_blocking(device, &staging, buffer_size)?;
        Ok(readback::strip_row_padding(
            &bytes,
            row_len as usize,
            padded as usize,
        ))
    }

    fn alloc_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Resolves the attachments of a framebuffer, or of the default target.
    fn target_attachments(
        &self,
        target: Option<FramebufferId>,
    ) -> Result<TargetAttachments, ResourceError> {
        let Some(id) = target else {
            return Ok(TargetAttachments {
                colors: vec![self.default_color.attachment()],
                depth: Some(self.default_depth.attachment()),
                extent: self.default_color.size,
            });
        };

        let framebuffer = self.framebuffers.get(&id).ok_or(ResourceError::InvalidHandle)?;
        if let FramebufferStatus::Incomplete(reason) = self.framebuffer_status(id) {
            return Err(ResourceError::BackendError(format!(
                "framebuffer '{}' is incomplete: {reason}",
                framebuffer.label
            )));
        }

        let texture = |id: &TextureId| self.textures.get(id).ok_or(ResourceError::InvalidHandle);
        let colors = framebuffer
            .colors
            .iter()
            .map(|id| texture(id).map(TextureEntry::attachment))
            .collect::<Result<Vec<_>, _>>()?;
        let depth = framebuffer
            .depth
            .as_ref()
            .map(|id| texture(id).map(TextureEntry::attachment))
            .transpose()?;
        let extent = framebuffer
            .colors
            .first()
            .or(framebuffer.depth.as_ref())
            .map(texture)
            .transpose()?
            .map_or(Extent2D::default(), |entry| entry.size);

        Ok(TargetAttachments {
            colors,
            depth,
            extent,
        })
    }

    /// The depth texture of a framebuffer, or of the default target.
    fn depth_texture(&self, target: Option<FramebufferId>) -> Result<&TextureEntry, ResourceError> {
        let Some(id) = target else {
            return Ok(&self.default_depth);
        };
        let framebuffer = self.framebuffers.get(&id).ok_or(ResourceError::InvalidHandle)?;
        let depth = framebuffer.depth.ok_or_else(|| {
            ResourceError::BackendError(format!(
                "framebuffer '{}' has no depth attachment",
                framebuffer.label
            ))
        })?;
        self.textures.get(&depth).ok_or(ResourceError::InvalidHandle)
    }

    /// The pass commands go to, opening a query slot when a query is active.
    fn pending_pass(&mut self) -> &mut PendingPass {
        let pending = self
            .pending
            .get_or_insert_with(|| PendingPass::new(self.bound));

        if let Some(query) = self.active_query {
            if !pending.query_open {
                match self.queries.get_mut(&query) {
                    Some(entry) if entry.slots_used < QUERY_SLOTS => {
                        pending.commands.push(PassCommand::BeginQuery(entry.slots_used));
                        entry.slots_used += 1;
                        pending.query = Some(query);
                        pending.query_open = true;
                    }
                    Some(_) => {
                        log::warn!("Occlusion query {query:?} ran out of slots, samples are lost")
                    }
                    None => log::warn!("Active occlusion query {query:?} no longer exists"),
                }
            }
        }
        pending
    }

    fn record_draw(&mut self, geometry: Geometry) {
        let Some(program_id) = self.program else {
            log::trace!("Draw issued without a program, nothing rasterized");
            return;
        };
        let Some(program) = self.programs.get(&program_id) else {
            log::warn!("Draw issued with destroyed program {program_id:?}");
            return;
        };

        let draw = DrawCommand {
            program: program_id,
            state: self.state,
            viewport: self.viewport,
            uniforms: program.uniform_data.clone(),
            textures: program
                .sampler_units
                .iter()
                .map(|unit| self.texture_units.get(unit).copied())
                .collect(),
            geometry,
        };
        self.pending_pass().commands.push(PassCommand::Draw(draw));
    }

    /// Encodes and submits the pending pass, if any.
    fn flush(&mut self) {
        let Some(mut pass) = self.pending.take() else {
            return;
        };
        if pass.query_open {
            pass.commands.push(PassCommand::EndQuery);
            pass.query_open = false;
        }
        if let Err(e) = self.encode_pass(&pass) {
            log::error!("Dropping render pass for target {:?}: {e}", pass.target);
        }
    }

    fn pipeline(&mut self, key: PipelineKey) -> Option<wgpu::RenderPipeline> {
        if let Some(cached) = self.pipelines.get(&key) {
            return cached.clone();
        }
        let program = self.programs.get(&key.program)?;
        let pipeline = program.create_pipeline(&self.context.device, &key);
        self.pipelines.insert(key, pipeline.clone());
        pipeline
    }

    /// Creates the group-1 bind group of a draw, or `Ok(None)` for programs without textures.
    fn texture_bind_group(&self, draw: &DrawCommand) -> Result<Option<wgpu::BindGroup>, String> {
        let program = self
            .programs
            .get(&draw.program)
            .ok_or_else(|| format!("program {:?} was destroyed", draw.program))?;
        let Some(layout) = program.texture_layout.as_ref() else {
            return Ok(None);
        };

        let mut entries = Vec::with_capacity(draw.textures.len());
        for (slot, texture) in draw.textures.iter().enumerate() {
            let entry = texture.and_then(|id| self.textures.get(&id)).ok_or_else(|| {
                let name = program
                    .interface
                    .texture_slots
                    .get(slot)
                    .map_or("?", String::as_str);
                format!("texture slot '{name}' of '{}' has nothing bound", program.label)
            })?;
            entries.push(wgpu::BindGroupEntry {
                binding: slot as u32,
                resource: wgpu::BindingResource::TextureView(&entry.view),
            });
        }

        Ok(Some(self.context.device.create_bind_group(
            &wgpu::BindGroupDescriptor {
                label: Some(&format!("{}_textures", program.label)),
                layout,
                entries: &entries,
            },
        )))
    }

    fn encode_pass(&mut self, pass: &PendingPass) -> Result<(), ResourceError> {
        let target = self.target_attachments(pass.target)?;
        let colors = target.color_formats();
        let depth = target.depth_format();

        // Pipelines first: building them needs `&mut self`.
        let mut pipelines = Vec::with_capacity(pass.commands.len());
        for command in &pass.commands {
            let pipeline = match command {
                PassCommand::Draw(draw) => {
                    let mut state = draw.state;
                    state.stencil.reference = 0;
                    self.pipeline(PipelineKey {
                        program: draw.program,
                        state,
                        colors: colors.clone(),
                        depth,
                    })
                }
                _ => None,
            };
            pipelines.push(pipeline);
        }

        // One uniform buffer per pass; each draw reads its block at a dynamic offset.
        let alignment = self.context.uniform_alignment().max(1) as usize;
        let mut arena = Vec::new();
        let mut offsets = Vec::with_capacity(pass.commands.len());
        for command in &pass.commands {
            let offset = match command {
                PassCommand::Draw(draw) => {
                    let offset = arena.len().div_ceil(alignment) * alignment;
                    arena.resize(offset, 0);
                    arena.extend_from_slice(&draw.uniforms);
                    offset as u32
                }
                _ => 0,
            };
            offsets.push(offset);
        }
        if arena.is_empty() {
            arena.resize(16, 0);
        }

        let device = &self.context.device;
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pass_uniforms"),
            contents: &arena,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut uniform_groups: HashMap<ProgramId, wgpu::BindGroup> = HashMap::new();
        let mut texture_groups = Vec::with_capacity(pass.commands.len());
        for command in &pass.commands {
            let PassCommand::Draw(draw) = command else {
                texture_groups.push(None);
                continue;
            };
            if let Some(program) = self.programs.get(&draw.program) {
                uniform_groups.entry(draw.program).or_insert_with(|| {
                    device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(&format!("{}_uniforms", program.label)),
                        layout: &program.uniform_layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                                buffer: &uniform_buffer,
                                offset: 0,
                                size: wgpu::BufferSize::new(program.uniform_data.len() as u64),
                            }),
                        }],
                    })
                });
            }
            match self.texture_bind_group(draw) {
                Ok(group) => texture_groups.push(Some(group)),
                Err(reason) => {
                    log::warn!("Skipping draw: {reason}");
                    texture_groups.push(None);
                }
            }
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("strata_pass_encoder"),
        });
        {
            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = target
                .colors
                .iter()
                .map(|attachment| {
                    Some(wgpu::RenderPassColorAttachment {
                        view: &attachment.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: pass
                                .clear
                                .color
                                .map_or(wgpu::LoadOp::Load, |c| {
                                    wgpu::LoadOp::Clear(conversions::color(c))
                                }),
                            store: wgpu::StoreOp::Store,
                        },
                    })
                })
                .collect();
            let depth_stencil_attachment =
                target
                    .depth
                    .as_ref()
                    .map(|attachment| wgpu::RenderPassDepthStencilAttachment {
                        view: &attachment.view,
                        depth_ops: Some(wgpu::Operations {
                            load: pass.clear.depth.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: attachment.format.has_stencil().then(|| wgpu::Operations {
                            load: pass
                                .clear
                                .stencil
                                .map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                            store: wgpu::StoreOp::Store,
                        }),
                    });
            let query_set = pass
                .query
                .and_then(|query| self.queries.get(&query))
                .map(|entry| &entry.set);

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("strata_pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: query_set,
            });

            for (index, command) in pass.commands.iter().enumerate() {
                let draw = match command {
                    PassCommand::BeginQuery(slot) => {
                        render_pass.begin_occlusion_query(*slot);
                        continue;
                    }
                    PassCommand::EndQuery => {
                        render_pass.end_occlusion_query();
                        continue;
                    }
                    PassCommand::Draw(draw) => draw,
                };

                let (Some(pipeline), Some(uniforms), Some(textures)) = (
                    pipelines[index].as_ref(),
                    uniform_groups.get(&draw.program),
                    texture_groups[index].as_ref(),
                ) else {
                    continue;
                };
                let Some(viewport) = clamp_viewport(draw.viewport, target.extent) else {
                    continue;
                };

                render_pass.set_pipeline(pipeline);
                render_pass.set_viewport(
                    viewport.x as f32,
                    viewport.y as f32,
                    viewport.width as f32,
                    viewport.height as f32,
                    0.0,
                    1.0,
                );
                render_pass.set_stencil_reference(draw.state.stencil.reference);
                render_pass.set_bind_group(0, uniforms, &[offsets[index]]);
                if let Some(group) = textures {
                    render_pass.set_bind_group(1, group, &[]);
                }

                match draw.geometry {
                    Geometry::Mesh(id) => {
                        let Some(mesh) = self.meshes.get(&id) else {
                            log::warn!("Draw of destroyed mesh {id:?} skipped");
                            continue;
                        };
                        if mesh.index_count == 0 {
                            continue;
                        }
                        render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                        render_pass
                            .set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                        render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                    }
                    Geometry::FullscreenTriangle => render_pass.draw(0..3, 0..1),
                }
            }
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl GraphicsDevice for WgpuDevice {
    fn default_extent(&self) -> Extent2D {
        self.default_color.size
    }

    fn create_mesh(&mut self, data: &MeshData) -> Result<GpuMesh, ResourceError> {
        let device = &self.context.device;
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_vertices"),
            contents: bytemuck::cast_slice(&data.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("mesh_indices"),
            contents: bytemuck::cast_slice(&data.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let index_count = data.indices.len() as u32;
        let id = MeshId(self.alloc_id());
        self.meshes.insert(
            id,
            MeshEntry {
                vertex_buffer,
                index_buffer,
                index_count,
            },
        );
        log::debug!(
            "WgpuDevice: Created mesh {id:?} ({} vertices, {} triangles)",
            data.vertices.len(),
            data.triangle_count()
        );
        Ok(GpuMesh { id, index_count })
    }

    fn destroy_mesh(&mut self, id: MeshId) -> Result<(), ResourceError> {
        self.flush();
        self.meshes
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        let label = descriptor.label.unwrap_or("texture");
        let max = self.context.device_limits.max_texture_dimension_2d;
        if descriptor.size.is_empty() || descriptor.size.width > max || descriptor.size.height > max
        {
            return Err(ResourceError::CreationFailed {
                what: format!("texture '{label}'"),
                reason: format!(
                    "size {}x{} outside 1..={max}",
                    descriptor.size.width, descriptor.size.height
                ),
            });
        }

        let device = &self.context.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let entry = TextureEntry::allocate(device, label, descriptor.size, descriptor.format);
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ResourceError::CreationFailed {
                what: format!("texture '{label}'"),
                reason: error.to_string(),
            });
        }

        let id = TextureId(self.alloc_id());
        log::debug!(
            "WgpuDevice: Created texture '{label}' with ID: {id:?}, {:?} {}x{}",
            descriptor.format,
            descriptor.size.width,
            descriptor.size.height
        );
        self.textures.insert(id, entry);
        Ok(id)
    }

    fn destroy_texture(&mut self, id: TextureId) -> Result<(), ResourceError> {
        self.flush();
        let entry = self.textures.remove(&id).ok_or(ResourceError::InvalidHandle)?;
        entry.texture.destroy();
        self.texture_units.retain(|_, bound| *bound != id);
        log::debug!("WgpuDevice: Destroyed texture with ID: {id:?}");
        Ok(())
    }

    fn create_framebuffer(
        &mut self,
        descriptor: &FramebufferDescriptor,
    ) -> Result<FramebufferId, ResourceError> {
        let attachments = descriptor
            .color_attachments
            .iter()
            .chain(descriptor.depth_attachment.as_ref());
        for texture in attachments {
            if !self.textures.contains_key(texture) {
                return Err(ResourceError::InvalidHandle);
            }
        }

        let id = FramebufferId(self.alloc_id());
        self.framebuffers.insert(
            id,
            FramebufferEntry {
                label: descriptor.label.unwrap_or("framebuffer").to_string(),
                colors: descriptor.color_attachments.to_vec(),
                depth: descriptor.depth_attachment,
            },
        );
        Ok(id)
    }

    fn framebuffer_status(&self, id: FramebufferId) -> FramebufferStatus {
        let Some(framebuffer) = self.framebuffers.get(&id) else {
            return FramebufferStatus::Incomplete(format!("unknown framebuffer {id:?}"));
        };
        if framebuffer.colors.is_empty() && framebuffer.depth.is_none() {
            return FramebufferStatus::Incomplete("no attachments".into());
        }
        let max_colors = self.context.device_limits.max_color_attachments as usize;
        if framebuffer.colors.len() > max_colors {
            return FramebufferStatus::Incomplete(format!(
                "{} color attachments, the device supports {max_colors}",
                framebuffer.colors.len()
            ));
        }

        let mut size = None;
        for (index, texture) in framebuffer.colors.iter().enumerate() {
            let Some(entry) = self.textures.get(texture) else {
                return FramebufferStatus::Incomplete(format!("color attachment {index} was destroyed"));
            };
            if entry.format.is_depth() {
                return FramebufferStatus::Incomplete(format!(
                    "color attachment {index} has depth format {:?}",
                    entry.format
                ));
            }
            if *size.get_or_insert(entry.size) != entry.size {
                return FramebufferStatus::Incomplete("attachment sizes differ".into());
            }
        }
        if let Some(texture) = framebuffer.depth {
            let Some(entry) = self.textures.get(&texture) else {
                return FramebufferStatus::Incomplete("depth attachment was destroyed".into());
            };
            if !entry.format.is_depth() {
                return FramebufferStatus::Incomplete(format!(
                    "depth attachment has color format {:?}",
                    entry.format
                ));
            }
            if *size.get_or_insert(entry.size) != entry.size {
                return FramebufferStatus::Incomplete("attachment sizes differ".into());
            }
        }
        FramebufferStatus::Complete
    }

    fn destroy_framebuffer(&mut self, id: FramebufferId) -> Result<(), ResourceError> {
        self.flush();
        self.framebuffers
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        if self.bound == Some(id) {
            self.bound = None;
        }
        Ok(())
    }

    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ShaderError> {
        let entry = ProgramEntry::compile(&self.context.device, descriptor)?;
        let id = ProgramId(self.alloc_id());
        log::info!(
            "WgpuDevice: Linked program '{}' with ID: {id:?}",
            descriptor.label
        );
        self.programs.insert(id, entry);
        Ok(id)
    }

    fn destroy_program(&mut self, id: ProgramId) -> Result<(), ResourceError> {
        self.flush();
        self.programs
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        self.pipelines.retain(|key, _| key.program != id);
        if self.program == Some(id) {
            self.program = None;
        }
        Ok(())
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.interface.location(name)
    }

    fn exact_occlusion_counts(&self) -> bool {
        // wgpu only guarantees zero versus non-zero for occlusion results.
        false
    }

    fn create_occlusion_query(&mut self) -> Result<QueryId, ResourceError> {
        let device = &self.context.device;
        let size = QUERY_SLOTS as u64 * std::mem::size_of::<u64>() as u64;
        let set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("occlusion_query"),
            ty: wgpu::QueryType::Occlusion,
            count: QUERY_SLOTS,
        });
        let resolve = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("occlusion_resolve"),
            size,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("occlusion_readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let id = QueryId(self.alloc_id());
        self.queries.insert(
            id,
            QueryEntry {
                set,
                resolve,
                readback,
                slots_used: 0,
            },
        );
        Ok(id)
    }

    fn destroy_query(&mut self, id: QueryId) -> Result<(), ResourceError> {
        if self.active_query == Some(id) {
            self.end_occlusion_query();
        }
        self.flush();
        self.queries
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.bound
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        if framebuffer != self.bound {
            self.flush();
            self.bound = framebuffer;
        }
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn set_render_state(&mut self, state: RenderState) {
        self.state = state;
    }

    fn current_program(&self) -> Option<ProgramId> {
        self.program
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
    }

    fn clear(&mut self, request: &ClearRequest) {
        if self.pending.as_ref().is_some_and(PendingPass::has_draws) {
            self.flush();
        }
        self.pending_pass().merge_clear(request);
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        if let Some(program) = self.program.and_then(|id| self.programs.get_mut(&id)) {
            program.set_uniform(location, value);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(texture) => {
                self.texture_units.insert(unit, texture);
            }
            None => {
                self.texture_units.remove(&unit);
            }
        }
    }

    fn draw_mesh(&mut self, mesh: &GpuMesh) {
        self.record_draw(Geometry::Mesh(mesh.id));
    }

    fn draw_fullscreen_quad(&mut self) {
        self.record_draw(Geometry::FullscreenTriangle);
    }

    fn begin_occlusion_query(&mut self, query: QueryId) {
        if let Some(active) = self.active_query {
            log::warn!("Occlusion query {query:?} begun while {active:?} is active, ignored");
            return;
        }
        if !self.queries.contains_key(&query) {
            log::warn!("Occlusion query {query:?} does not exist");
            return;
        }
        // Slots restart at zero, so the pass must not have used this set yet.
        if self.pending.as_ref().is_some_and(|p| p.query.is_some()) {
            self.flush();
        }
        if let Some(entry) = self.queries.get_mut(&query) {
            entry.slots_used = 0;
        }
        self.active_query = Some(query);
        self.pending_pass();
    }

    fn end_occlusion_query(&mut self) {
        if self.active_query.take().is_none() {
            log::warn!("end_occlusion_query called without an active query");
            return;
        }
        if let Some(pending) = self.pending.as_mut() {
            if pending.query_open {
                pending.commands.push(PassCommand::EndQuery);
                pending.query_open = false;
            }
        }
    }

    fn query_result_blocking(&mut self, query: QueryId) -> Result<u64, ResourceError> {
        if self.active_query == Some(query) {
            return Err(ResourceError::ReadbackFailed(
                "query is still active".into(),
            ));
        }
        self.flush();

        let entry = self.queries.get(&query).ok_or(ResourceError::InvalidHandle)?;
        if entry.slots_used == 0 {
            return Err(ResourceError::ReadbackFailed("query was never run".into()));
        }
        let size = entry.slots_used as u64 * std::mem::size_of::<u64>() as u64;

        let device = &self.context.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("occlusion_resolve"),
        });
        encoder.resolve_query_set(&entry.set, 0..entry.slots_used, &entry.resolve, 0);
        encoder.copy_buffer_to_buffer(&entry.resolve, 0, &entry.readback, 0, size);
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let bytes = readback::map_read_blocking(device, &entry.readback, size)?;
        Ok(bytes
            .chunks_exact(std::mem::size_of::<u64>())
            .map(bytemuck::pod_read_unaligned::<u64>)
            .sum())
    }

    fn read_stencil(&mut self, rect: ScreenRect) -> Result<Vec<u8>, ResourceError> {
        self.flush();
        if rect.is_empty() {
            return Ok(Vec::new());
        }

        let entry = self.depth_texture(self.bound)?;
        if !entry.format.has_stencil() {
            return Err(ResourceError::ReadbackFailed(format!(
                "bound target depth format {:?} has no stencil aspect",
                entry.format
            )));
        }
        if rect.x + rect.width > entry.size.width || rect.y + rect.height > entry.size.height {
            return Err(ResourceError::ReadbackFailed(format!(
                "rect {rect:?} exceeds the {}x{} target",
                entry.size.width, entry.size.height
            )));
        }

        let padded = readback::padded_bytes_per_row(rect.width);
        let size = padded as u64 * rect.height as u64;
        let device = &self.context.device;
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("stencil_readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("stencil_readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: rect.x,
                    y: rect.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::StencilOnly,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(rect.height),
                },
            },
            wgpu::Extent3d {
                width: rect.width,
                height: rect.height,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));

        let bytes = readback::map_read_blocking(device, &staging, size)?;
        Ok(readback::strip_row_padding(
            &bytes,
            rect.width as usize,
            padded as usize,
        ))
    }

    fn copy_depth(
        &mut self,
        source: FramebufferId,
        destination: Option<FramebufferId>,
    ) -> Result<(), ResourceError> {
        self.flush();
        let src = self.depth_texture(Some(source))?;
        let dst = self.depth_texture(destination)?;
        if src.size != dst.size || src.format != dst.format {
            return Err(ResourceError::BackendError(format!(
                "cannot copy {:?} {}x{} depth into {:?} {}x{}",
                src.format,
                src.size.width,
                src.size.height,
                dst.format,
                dst.size.width,
                dst.size.height
            )));
        }

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("copy_depth"),
                });
        encoder.copy_texture_to_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &src.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyTextureInfo {
                texture: &dst.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            src.size.into_wgpu(),
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn finish_frame(&mut self) {
        self.flush();
        self.frames += 1;
        if let Err(e) = self.context.device.poll(wgpu::PollType::Poll) {
            log::warn!("Device poll after frame {} failed: {e}", self.frames);
        }
    }
}
