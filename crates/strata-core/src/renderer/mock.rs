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

//! A software [`GraphicsDevice`] for tests.
//!
//! The mock keeps the full GL-style state machine of the trait and records
//! every call. Draws are rasterized coarsely. A mesh is split into layers,
//! the connected pieces of its geometry (triangles sharing a vertex position
//! belong to the same layer). Each layer covers the pixel rectangle its
//! bounding box projects to, at the nearest depth of that box, and layers are
//! rasterized in the order their first triangle appears. That is enough to
//! exercise depth and stencil tests, occlusion queries and read-backs with
//! exact, predictable counts.

use crate::math::{Aabb, Extent2D, Mat4, ScreenRect, Vec3, Vec4};
use crate::renderer::api::*;
use crate::renderer::error::{ResourceError, ShaderError};
use crate::renderer::traits::GraphicsDevice;
use std::collections::{HashMap, HashSet};

/// A call made on the mock device, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// `bind_framebuffer`
    BindFramebuffer(Option<FramebufferId>),
    /// `set_viewport`
    SetViewport(Viewport),
    /// `set_render_state`
    SetRenderState(RenderState),
    /// `use_program`
    UseProgram(Option<ProgramId>),
    /// `clear`, with the target it applied to.
    Clear {
        /// The bound framebuffer.
        target: Option<FramebufferId>,
        /// What was cleared.
        request: ClearRequest,
    },
    /// `bind_texture`
    BindTexture {
        /// Texture unit.
        unit: u32,
        /// Texture bound, or `None` when cleared.
        texture: Option<TextureId>,
    },
    /// `draw_mesh` or `draw_fullscreen_quad`.
    Draw(DrawRecord),
    /// `begin_occlusion_query`
    BeginQuery(QueryId),
    /// `end_occlusion_query`
    EndQuery,
    /// `read_stencil`
    ReadStencil(ScreenRect),
    /// `copy_depth`
    CopyDepth {
        /// Source framebuffer.
        source: FramebufferId,
        /// Destination, `None` for the default target.
        destination: Option<FramebufferId>,
    },
    /// `finish_frame`
    FinishFrame,
}

/// The state a draw was issued with.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// The mesh drawn, or `None` for a full-screen quad.
    pub mesh: Option<MeshId>,
    /// The bound framebuffer.
    pub target: Option<FramebufferId>,
    /// The current program.
    pub program: Option<ProgramId>,
    /// The fixed-function state.
    pub state: RenderState,
    /// Samples that passed the depth and stencil tests.
    pub samples_passed: u64,
}

#[derive(Debug)]
struct MockMesh {
    layers: Vec<Aabb>,
}

// Splits the mesh into connected pieces, in submission order.
fn mesh_layers(data: &MeshData) -> Vec<Aabb> {
    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }
    fn union(parent: &mut [usize], a: usize, b: usize) {
        let (ra, rb) = (find(parent, a), find(parent, b));
        if ra != rb {
            parent[rb] = ra;
        }
    }

    let count = data.vertices.len();
    let mut parent: Vec<usize> = (0..count).collect();
    let mut by_position: HashMap<[i64; 3], usize> = HashMap::new();
    for (i, vertex) in data.vertices.iter().enumerate() {
        let key = vertex.position.map(|c| (c * 1.0e4).round() as i64);
        match by_position.get(&key) {
            Some(&first) => union(&mut parent, first, i),
            None => {
                by_position.insert(key, i);
            }
        }
    }

    let triangles: Vec<[usize; 3]> = data
        .indices
        .chunks_exact(3)
        .map(|t| [t[0] as usize, t[1] as usize, t[2] as usize])
        .filter(|t| t.iter().all(|&i| i < count))
        .collect();
    for t in &triangles {
        union(&mut parent, t[0], t[1]);
        union(&mut parent, t[0], t[2]);
    }

    let mut order: Vec<usize> = Vec::new();
    let mut points: Vec<Vec<Vec3>> = Vec::new();
    for t in &triangles {
        let root = find(&mut parent, t[0]);
        let layer = match order.iter().position(|&r| r == root) {
            Some(layer) => layer,
            None => {
                order.push(root);
                points.push(Vec::new());
                order.len() - 1
            }
        };
        points[layer].extend(t.iter().map(|&i| Vec3::from_array(data.vertices[i].position)));
    }

    let layers: Vec<Aabb> = points
        .into_iter()
        .filter_map(Aabb::from_points)
        .collect();
    if layers.is_empty() {
        vec![data.bounds().unwrap_or_default()]
    } else {
        layers
    }
}

#[derive(Debug)]
struct MockTexture {
    size: Extent2D,
    format: TextureFormat,
    depth: Vec<f32>,
    stencil: Vec<u8>,
}

impl MockTexture {
    fn new(size: Extent2D, format: TextureFormat) -> Self {
        let texels = size.area() as usize;
        Self {
            size,
            format,
            depth: if format.is_depth() {
                vec![1.0; texels]
            } else {
                Vec::new()
            },
            stencil: if format.has_stencil() {
                vec![0; texels]
            } else {
                Vec::new()
            },
        }
    }
}

#[derive(Debug, Clone)]
struct MockFramebuffer {
    colors: Vec<TextureId>,
    depth: Option<TextureId>,
}

#[derive(Debug)]
struct MockProgram {
    label: String,
    interface: ProgramInterface,
    values: Vec<Option<UniformValue>>,
    sampler_units: Vec<u32>,
}

/// A software stand-in for the GPU. See the module documentation.
#[derive(Debug)]
pub struct MockGraphicsDevice {
    next_id: u64,
    meshes: HashMap<MeshId, MockMesh>,
    textures: HashMap<TextureId, MockTexture>,
    framebuffers: HashMap<FramebufferId, MockFramebuffer>,
    programs: HashMap<ProgramId, MockProgram>,
    queries: HashMap<QueryId, Option<u64>>,
    active_query: Option<(QueryId, u64)>,
    default_target: MockFramebuffer,
    bound_framebuffer: Option<FramebufferId>,
    viewport: Viewport,
    render_state: RenderState,
    program: Option<ProgramId>,
    texture_units: HashMap<u32, TextureId>,
    calls: Vec<DeviceCall>,
    failing_programs: HashSet<String>,
    incomplete_framebuffers: bool,
    failing_textures: bool,
    failing_queries: bool,
    inexact_queries: bool,
}

impl MockGraphicsDevice {
    /// Creates a device whose default target has the given size.
    pub fn new(default_extent: Extent2D) -> Self {
        let mut device = Self {
            next_id: 1,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            programs: HashMap::new(),
            queries: HashMap::new(),
            active_query: None,
            default_target: MockFramebuffer {
                colors: Vec::new(),
                depth: None,
            },
            bound_framebuffer: None,
            viewport: Viewport::from_extent(default_extent),
            render_state: RenderState::default(),
            program: None,
            texture_units: HashMap::new(),
            calls: Vec::new(),
            failing_programs: HashSet::new(),
            incomplete_framebuffers: false,
            failing_textures: false,
            failing_queries: false,
            inexact_queries: false,
        };
        let color = device.insert_texture(default_extent, TextureFormat::Rgba8Unorm);
        let depth = device.insert_texture(default_extent, TextureFormat::Depth32Float);
        device.default_target = MockFramebuffer {
            colors: vec![color],
            depth: Some(depth),
        };
        device
    }

    /// Makes `create_program` fail for programs with this label.
    pub fn fail_program(mut self, label: impl Into<String>) -> Self {
        self.failing_programs.insert(label.into());
        self
    }

    /// Makes every framebuffer created from now on report itself incomplete.
    pub fn set_incomplete_framebuffers(&mut self, incomplete: bool) {
        self.incomplete_framebuffers = incomplete;
    }

    /// Makes texture creation fail.
    pub fn set_failing_textures(&mut self, failing: bool) {
        self.failing_textures = failing;
    }

    /// Makes query creation and read-back fail.
    pub fn set_failing_queries(&mut self, failing: bool) {
        self.failing_queries = failing;
    }

    /// Makes the device report occlusion queries as inexact, the way
    /// backends with boolean occlusion results do. Query results then only
    /// say whether any sample passed.
    pub fn set_inexact_queries(&mut self, inexact: bool) {
        self.inexact_queries = inexact;
    }

    /// Every call made so far.
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Every draw made so far.
    pub fn draws(&self) -> impl Iterator<Item = &DrawRecord> {
        self.calls.iter().filter_map(|call| match call {
            DeviceCall::Draw(record) => Some(record),
            _ => None,
        })
    }

    /// Number of live textures, framebuffers and queries created by callers.
    pub fn live_resource_count(&self) -> usize {
        // The default target's two textures are internal.
        self.textures.len() - 2 + self.framebuffers.len() + self.queries.len()
    }

    /// Number of live meshes.
    pub fn live_mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Number of live programs.
    pub fn live_program_count(&self) -> usize {
        self.programs.len()
    }

    /// The label a program was created with.
    pub fn program_label(&self, program: ProgramId) -> Option<&str> {
        self.programs.get(&program).map(|p| p.label.as_str())
    }

    /// The last value assigned to a uniform of `program`.
    pub fn uniform_value(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let p = self.programs.get(&program)?;
        match p.interface.location(name)? {
            UniformLocation::Field(index) => p.values[index as usize],
            UniformLocation::Sampler(index) => {
                Some(UniformValue::Int(p.sampler_units[index as usize] as i32))
            }
        }
    }

    /// The texture bound to a unit.
    pub fn texture_unit(&self, unit: u32) -> Option<TextureId> {
        self.texture_units.get(&unit).copied()
    }

    /// The stored depth at a pixel of a framebuffer's depth attachment.
    pub fn depth_at(&self, target: Option<FramebufferId>, x: u32, y: u32) -> Option<f32> {
        let texture = self.textures.get(&self.target(target)?.depth?)?;
        texture
            .depth
            .get((y * texture.size.width + x) as usize)
            .copied()
    }

    fn insert_texture(&mut self, size: Extent2D, format: TextureFormat) -> TextureId {
        let id = TextureId(self.next());
        self.textures.insert(id, MockTexture::new(size, format));
        id
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn target(&self, framebuffer: Option<FramebufferId>) -> Option<&MockFramebuffer> {
        match framebuffer {
            None => Some(&self.default_target),
            Some(id) => self.framebuffers.get(&id),
        }
    }

    fn target_size(&self, framebuffer: &MockFramebuffer) -> Option<Extent2D> {
        framebuffer
            .colors
            .iter()
            .chain(framebuffer.depth.iter())
            .find_map(|id| self.textures.get(id))
            .map(|t| t.size)
    }

    fn current_matrix(&self, name: &str) -> Mat4 {
        let value = self
            .program
            .and_then(|p| self.uniform_value(p, name));
        match value {
            Some(UniformValue::Mat4(m)) => m,
            _ => Mat4::IDENTITY,
        }
    }

    // Footprint and depth of a mesh under the current program's transforms.
    fn mesh_coverage(&self, bounds: &Aabb) -> Option<(ScreenRect, f32)> {
        let clip_from_local = self.current_matrix("projection")
            * self.current_matrix("view")
            * self.current_matrix("model");
        let rect = bounds.screen_rect(&clip_from_local, self.viewport.extent())?;

        let depth = bounds
            .corners()
            .iter()
            .map(|c| clip_from_local * Vec4::new(c.x, c.y, c.z, 1.0))
            .filter(|clip| clip.w > 0.0)
            .map(|clip| (clip.z / clip.w).clamp(0.0, 1.0))
            .fold(1.0f32, f32::min);

        Some((
            ScreenRect {
                x: rect.x + self.viewport.x,
                y: rect.y + self.viewport.y,
                ..rect
            },
            depth,
        ))
    }

    fn rasterize(&mut self, rect: ScreenRect, depth: f32) -> u64 {
        let Some(target) = self.target(self.bound_framebuffer).cloned() else {
            return 0;
        };
        let Some(size) = self.target_size(&target) else {
            return 0;
        };
        let state = self.render_state;
        let depth_texture = target.depth.and_then(|id| self.textures.get_mut(&id));
        let Some(texture) = depth_texture else {
            // No depth attachment: every covered pixel passes.
            return rect_within(rect, size).area();
        };

        let mut passed = 0;
        let rect = rect_within(rect, size);
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                let i = (y * size.width + x) as usize;
                let stencil = &state.stencil;
                let has_stencil = stencil.enabled && !texture.stencil.is_empty();

                if has_stencil {
                    let stored = texture.stencil[i] as u32 & stencil.read_mask;
                    let reference = stencil.reference & stencil.read_mask;
                    if !stencil.compare.passes(reference, stored) {
                        write_stencil(texture, i, stencil.fail_op, stencil);
                        continue;
                    }
                }

                if state.depth.test_enabled {
                    if !state.depth.compare.passes(depth, texture.depth[i]) {
                        if has_stencil {
                            write_stencil(texture, i, stencil.depth_fail_op, stencil);
                        }
                        continue;
                    }
                    if state.depth.write_enabled {
                        texture.depth[i] = depth;
                    }
                }

                if has_stencil {
                    write_stencil(texture, i, stencil.pass_op, stencil);
                }
                passed += 1;
            }
        }
        passed
    }

    fn record_draw(&mut self, mesh: Option<MeshId>, samples_passed: u64) {
        if let Some((_, count)) = self.active_query.as_mut() {
            *count += samples_passed;
        }
        self.calls.push(DeviceCall::Draw(DrawRecord {
            mesh,
            target: self.bound_framebuffer,
            program: self.program,
            state: self.render_state,
            samples_passed,
        }));
    }
}

fn rect_within(rect: ScreenRect, size: Extent2D) -> ScreenRect {
    let x = rect.x.min(size.width);
    let y = rect.y.min(size.height);
    ScreenRect {
        x,
        y,
        width: rect.width.min(size.width - x),
        height: rect.height.min(size.height - y),
    }
}

fn write_stencil(texture: &mut MockTexture, index: usize, op: StencilOperation, state: &StencilState) {
    let old = texture.stencil[index];
    let new = op.apply(old, state.reference);
    let mask = state.write_mask as u8;
    texture.stencil[index] = (old & !mask) | (new & mask);
}

impl GraphicsDevice for MockGraphicsDevice {
    fn default_extent(&self) -> Extent2D {
        self.target_size(&self.default_target).unwrap_or_default()
    }

    fn create_mesh(&mut self, data: &MeshData) -> Result<GpuMesh, ResourceError> {
        let id = MeshId(self.next());
        self.meshes.insert(
            id,
            MockMesh {
                layers: mesh_layers(data),
            },
        );
        Ok(GpuMesh {
            id,
            index_count: data.indices.len() as u32,
        })
    }

    fn destroy_mesh(&mut self, id: MeshId) -> Result<(), ResourceError> {
        self.meshes
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if self.failing_textures {
            return Err(ResourceError::CreationFailed {
                what: format!("texture '{}'", descriptor.label.unwrap_or("unnamed")),
                reason: "mock allocation failure".into(),
            });
        }
        Ok(self.insert_texture(descriptor.size, descriptor.format))
    }

    fn destroy_texture(&mut self, id: TextureId) -> Result<(), ResourceError> {
        self.textures
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_framebuffer(
        &mut self,
        descriptor: &FramebufferDescriptor,
    ) -> Result<FramebufferId, ResourceError> {
        let all_known = descriptor
            .color_attachments
            .iter()
            .chain(descriptor.depth_attachment.iter())
            .all(|id| self.textures.contains_key(id));
        if !all_known {
            return Err(ResourceError::InvalidHandle);
        }
        let id = FramebufferId(self.next());
        self.framebuffers.insert(
            id,
            MockFramebuffer {
                colors: descriptor.color_attachments.to_vec(),
                depth: descriptor.depth_attachment,
            },
        );
        if self.incomplete_framebuffers {
            // Stripping the attachments makes the status check fail.
            if let Some(fb) = self.framebuffers.get_mut(&id) {
                fb.colors.clear();
                fb.depth = None;
            }
        }
        Ok(id)
    }

    fn framebuffer_status(&self, id: FramebufferId) -> FramebufferStatus {
        let Some(fb) = self.framebuffers.get(&id) else {
            return FramebufferStatus::Incomplete("unknown framebuffer".into());
        };
        let Some(size) = self.target_size(fb) else {
            return FramebufferStatus::Incomplete("missing attachments".into());
        };
        for id in &fb.colors {
            match self.textures.get(id) {
                Some(t) if t.size == size && !t.format.is_depth() => {}
                _ => return FramebufferStatus::Incomplete("bad color attachment".into()),
            }
        }
        if let Some(id) = fb.depth {
            match self.textures.get(&id) {
                Some(t) if t.size == size && t.format.is_depth() => {}
                _ => return FramebufferStatus::Incomplete("bad depth attachment".into()),
            }
        }
        FramebufferStatus::Complete
    }

    fn destroy_framebuffer(&mut self, id: FramebufferId) -> Result<(), ResourceError> {
        if self.bound_framebuffer == Some(id) {
            self.bound_framebuffer = None;
        }
        self.framebuffers
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ShaderError> {
        if self.failing_programs.contains(descriptor.label) {
            return Err(ShaderError::LinkFailed {
                label: descriptor.label.to_string(),
                log: "mock link failure".into(),
            });
        }
        let interface = descriptor.interface();
        let id = ProgramId(self.next());
        self.programs.insert(
            id,
            MockProgram {
                label: descriptor.label.to_string(),
                values: vec![None; interface.uniforms.fields().len()],
                sampler_units: (0..interface.texture_slots.len() as u32).collect(),
                interface,
            },
        );
        Ok(id)
    }

    fn destroy_program(&mut self, id: ProgramId) -> Result<(), ResourceError> {
        if self.program == Some(id) {
            self.program = None;
        }
        self.programs
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.interface.location(name)
    }

    fn exact_occlusion_counts(&self) -> bool {
        !self.inexact_queries
    }

    fn create_occlusion_query(&mut self) -> Result<QueryId, ResourceError> {
        if self.failing_queries {
            return Err(ResourceError::CreationFailed {
                what: "occlusion query".into(),
                reason: "mock query failure".into(),
            });
        }
        let id = QueryId(self.next());
        self.queries.insert(id, None);
        Ok(id)
    }

    fn destroy_query(&mut self, id: QueryId) -> Result<(), ResourceError> {
        self.queries
            .remove(&id)
            .map(|_| ())
            .ok_or(ResourceError::InvalidHandle)
    }

    fn bound_framebuffer(&self) -> Option<FramebufferId> {
        self.bound_framebuffer
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>) {
        self.bound_framebuffer = framebuffer;
        self.calls.push(DeviceCall::BindFramebuffer(framebuffer));
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.calls.push(DeviceCall::SetViewport(viewport));
    }

    fn render_state(&self) -> RenderState {
        self.render_state
    }

    fn set_render_state(&mut self, state: RenderState) {
        self.render_state = state;
        self.calls.push(DeviceCall::SetRenderState(state));
    }

    fn current_program(&self) -> Option<ProgramId> {
        self.program
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
        self.calls.push(DeviceCall::UseProgram(program));
    }

    fn clear(&mut self, request: &ClearRequest) {
        self.calls.push(DeviceCall::Clear {
            target: self.bound_framebuffer,
            request: *request,
        });
        let Some(depth_id) = self.target(self.bound_framebuffer).and_then(|t| t.depth) else {
            return;
        };
        if let Some(texture) = self.textures.get_mut(&depth_id) {
            if let Some(depth) = request.depth {
                texture.depth.fill(depth);
            }
            if let Some(stencil) = request.stencil {
                texture.stencil.fill(stencil as u8);
            }
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program) = self.program.and_then(|p| self.programs.get_mut(&p)) else {
            return;
        };
        match location {
            UniformLocation::Field(index) => {
                let Some(field) = program.interface.uniforms.fields().get(index as usize) else {
                    return;
                };
                if field.kind != value.kind() {
                    log::warn!(
                        "Uniform '{}' of '{}' is {:?}, ignoring a {:?} value",
                        field.name,
                        program.label,
                        field.kind,
                        value.kind()
                    );
                    return;
                }
                program.values[index as usize] = Some(value);
            }
            UniformLocation::Sampler(index) => {
                if let (UniformValue::Int(unit), Some(slot)) =
                    (value, program.sampler_units.get_mut(index as usize))
                {
                    *slot = unit.max(0) as u32;
                }
            }
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>) {
        match texture {
            Some(id) => self.texture_units.insert(unit, id),
            None => self.texture_units.remove(&unit),
        };
        self.calls.push(DeviceCall::BindTexture { unit, texture });
    }

    fn draw_mesh(&mut self, mesh: &GpuMesh) {
        let layers: Vec<(ScreenRect, f32)> = match (self.program, self.meshes.get(&mesh.id)) {
            (Some(_), Some(m)) => m
                .layers
                .iter()
                .filter_map(|bounds| self.mesh_coverage(bounds))
                .collect(),
            _ => Vec::new(),
        };
        let passed: u64 = layers
            .into_iter()
            .map(|(rect, depth)| self.rasterize(rect, depth))
            .sum();
        self.record_draw(Some(mesh.id), passed);
    }

    fn draw_fullscreen_quad(&mut self) {
        let rect = ScreenRect {
            x: self.viewport.x,
            y: self.viewport.y,
            width: self.viewport.width,
            height: self.viewport.height,
        };
        let passed = match self.program {
            Some(_) => self.rasterize(rect, 0.0),
            None => 0,
        };
        self.record_draw(None, passed);
    }

    fn begin_occlusion_query(&mut self, query: QueryId) {
        self.calls.push(DeviceCall::BeginQuery(query));
        self.active_query = Some((query, 0));
    }

    fn end_occlusion_query(&mut self) {
        self.calls.push(DeviceCall::EndQuery);
        if let Some((query, count)) = self.active_query.take() {
            if let Some(slot) = self.queries.get_mut(&query) {
                *slot = Some(count);
            }
        }
    }

    fn query_result_blocking(&mut self, query: QueryId) -> Result<u64, ResourceError> {
        if self.failing_queries {
            return Err(ResourceError::ReadbackFailed("mock query failure".into()));
        }
        match self.queries.get(&query) {
            Some(Some(count)) if self.inexact_queries => Ok(u64::from(*count > 0)),
            Some(Some(count)) => Ok(*count),
            Some(None) => Err(ResourceError::ReadbackFailed(format!(
                "query {query:?} has no result"
            ))),
            None => Err(ResourceError::InvalidHandle),
        }
    }

    fn read_stencil(&mut self, rect: ScreenRect) -> Result<Vec<u8>, ResourceError> {
        self.calls.push(DeviceCall::ReadStencil(rect));
        let texture = self
            .target(self.bound_framebuffer)
            .and_then(|t| t.depth)
            .and_then(|id| self.textures.get(&id))
            .filter(|t| t.format.has_stencil())
            .ok_or_else(|| ResourceError::ReadbackFailed("target has no stencil".into()))?;
        if rect_within(rect, texture.size) != rect {
            return Err(ResourceError::ReadbackFailed(
                "rectangle outside the target".into(),
            ));
        }
        let mut out = Vec::with_capacity(rect.area() as usize);
        for y in rect.y..rect.y + rect.height {
            let row = (y * texture.size.width + rect.x) as usize;
            out.extend_from_slice(&texture.stencil[row..row + rect.width as usize]);
        }
        Ok(out)
    }

    fn copy_depth(
        &mut self,
        source: FramebufferId,
        destination: Option<FramebufferId>,
    ) -> Result<(), ResourceError> {
        self.calls.push(DeviceCall::CopyDepth {
            source,
            destination,
        });
        let src = self
            .target(Some(source))
            .and_then(|t| t.depth)
            .ok_or(ResourceError::InvalidHandle)?;
        let dst = self
            .target(destination)
            .and_then(|t| t.depth)
            .ok_or(ResourceError::InvalidHandle)?;
        let values = {
            let texture = self.textures.get(&src).ok_or(ResourceError::InvalidHandle)?;
            (texture.size, texture.depth.clone())
        };
        let target = self.textures.get_mut(&dst).ok_or(ResourceError::InvalidHandle)?;
        if target.size != values.0 {
            return Err(ResourceError::BackendError(
                "depth copy between targets of different sizes".into(),
            ));
        }
        target.depth = values.1;
        Ok(())
    }

    fn finish_frame(&mut self) {
        self.calls.push(DeviceCall::FinishFrame);
    }
}
