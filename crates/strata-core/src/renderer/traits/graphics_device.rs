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

use crate::math::{Extent2D, ScreenRect};
use crate::renderer::api::*;
use crate::renderer::error::{ResourceError, ShaderError};

/// An immediate-mode graphics device with global, GL-style state.
///
/// The device holds exactly one bound framebuffer, one viewport, one
/// [`RenderState`] and one current program at a time. Every draw uses whatever
/// is current when it is issued. Passes change that state freely; code making a
/// temporary excursion restores it with [`snapshot`](Self::snapshot) and
/// [`restore`](Self::restore).
///
/// All methods take `&mut self`: the frame loop is single-threaded and the
/// device is driven by one caller at a time.
pub trait GraphicsDevice {
    /// Size of the default render target (`bind_framebuffer(None)`).
    fn default_extent(&self) -> Extent2D;

    // --- Resources ---

    /// Uploads a mesh's vertex and index buffers.
    /// ## Errors
    /// * `ResourceError` - If the buffers cannot be created.
    fn create_mesh(&mut self, data: &MeshData) -> Result<GpuMesh, ResourceError>;

    /// Releases a mesh's buffers.
    fn destroy_mesh(&mut self, id: MeshId) -> Result<(), ResourceError>;

    /// Creates a 2D texture usable as a render attachment and as a shader input.
    /// ## Errors
    /// * `ResourceError` - If the texture cannot be allocated.
    fn create_texture(&mut self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Releases a texture.
    fn destroy_texture(&mut self, id: TextureId) -> Result<(), ResourceError>;

    /// Groups textures into a framebuffer.
    ///
    /// Creation succeeds even when the attachments are incompatible; use
    /// [`framebuffer_status`](Self::framebuffer_status) to find out.
    /// ## Errors
    /// * `ResourceError` - If an attachment handle is invalid.
    fn create_framebuffer(
        &mut self,
        descriptor: &FramebufferDescriptor,
    ) -> Result<FramebufferId, ResourceError>;

    /// Checks whether a framebuffer can be rendered to.
    fn framebuffer_status(&self, id: FramebufferId) -> FramebufferStatus;

    /// Releases a framebuffer. Its attachments are not destroyed.
    fn destroy_framebuffer(&mut self, id: FramebufferId) -> Result<(), ResourceError>;

    /// Compiles and links a program.
    /// ## Errors
    /// * `ShaderError` - With the backend's diagnostic text if compilation or linking fails.
    fn create_program(&mut self, descriptor: &ProgramDescriptor) -> Result<ProgramId, ShaderError>;

    /// Releases a program.
    fn destroy_program(&mut self, id: ProgramId) -> Result<(), ResourceError>;

    /// Resolves a uniform or sampler name in a program.
    ///
    /// Returns `None` when the program does not declare the name; callers treat
    /// that as "nothing to set".
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Whether occlusion queries report exact sample counts.
    ///
    /// Backends whose queries only tell "some samples passed" from "none"
    /// return `false`; callers then have to count with the stencil buffer.
    fn exact_occlusion_counts(&self) -> bool {
        true
    }

    /// Creates an occlusion query that counts samples passing the depth and stencil tests.
    fn create_occlusion_query(&mut self) -> Result<QueryId, ResourceError>;

    /// Releases a query.
    fn destroy_query(&mut self, id: QueryId) -> Result<(), ResourceError>;

    // --- Global state ---

    /// The bound framebuffer; `None` is the default target.
    fn bound_framebuffer(&self) -> Option<FramebufferId>;

    /// Binds a framebuffer for subsequent clears and draws.
    fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferId>);

    /// The current viewport.
    fn viewport(&self) -> Viewport;

    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport);

    /// The current fixed-function state.
    fn render_state(&self) -> RenderState;

    /// Replaces the fixed-function state.
    fn set_render_state(&mut self, state: RenderState);

    /// The program in use, if any.
    fn current_program(&self) -> Option<ProgramId>;

    /// Makes a program current for uniform updates and draws.
    fn use_program(&mut self, program: Option<ProgramId>);

    /// Captures every piece of state a render excursion may touch.
    fn snapshot(&self) -> GpuStateSnapshot {
        GpuStateSnapshot {
            framebuffer: self.bound_framebuffer(),
            viewport: self.viewport(),
            render_state: self.render_state(),
            program: self.current_program(),
        }
    }

    /// Puts back state captured by [`snapshot`](Self::snapshot).
    fn restore(&mut self, snapshot: &GpuStateSnapshot) {
        self.bind_framebuffer(snapshot.framebuffer);
        self.set_viewport(snapshot.viewport);
        self.set_render_state(snapshot.render_state);
        self.use_program(snapshot.program);
    }

    // --- Commands ---

    /// Clears aspects of the bound target, ignoring the viewport and masks.
    fn clear(&mut self, request: &ClearRequest);

    /// Sets a uniform of the current program. No-op without a current program.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    /// Binds a texture to a texture unit, or clears the unit.
    fn bind_texture(&mut self, unit: u32, texture: Option<TextureId>);

    /// Draws a mesh with the current program and state.
    fn draw_mesh(&mut self, mesh: &GpuMesh);

    /// Draws a quad covering the whole viewport with the current program and state.
    fn draw_fullscreen_quad(&mut self);

    /// Starts counting passing samples into `query`. Only one query may be active.
    fn begin_occlusion_query(&mut self, query: QueryId);

    /// Stops the active query.
    fn end_occlusion_query(&mut self);

    /// Waits for and returns the number of samples counted by `query`.
    /// ## Errors
    /// * `ResourceError` - If the query is invalid or was never run.
    fn query_result_blocking(&mut self, query: QueryId) -> Result<u64, ResourceError>;

    /// Reads the stencil values of the bound framebuffer in `rect`, row by row.
    /// ## Errors
    /// * `ResourceError` - If the bound target has no stencil aspect or the read-back fails.
    fn read_stencil(&mut self, rect: ScreenRect) -> Result<Vec<u8>, ResourceError>;

    /// Copies the depth contents of `source` into `destination`'s depth attachment.
    /// ## Errors
    /// * `ResourceError` - If either target lacks depth or their sizes differ.
    fn copy_depth(
        &mut self,
        source: FramebufferId,
        destination: Option<FramebufferId>,
    ) -> Result<(), ResourceError>;

    /// Submits all pending work for the frame.
    fn finish_frame(&mut self);
}
