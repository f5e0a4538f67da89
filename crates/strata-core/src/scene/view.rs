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

//! Camera data consumed by the passes.

use crate::math::{Mat4, Vec3};

/// The camera matrices and position for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewInfo {
    /// World-to-view transform.
    pub view: Mat4,
    /// View-to-clip transform.
    pub projection: Mat4,
    /// World-space camera position.
    pub position: Vec3,
}

impl ViewInfo {
    /// Builds a view looking from `eye` toward `target` with a right-handed perspective.
    pub fn look_at(eye: Vec3, target: Vec3, fov_y_radians: f32, aspect: f32) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh(fov_y_radians, aspect, 0.1, 100.0),
            position: eye,
        }
    }

    /// The combined `projection * view` matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for ViewInfo {
    /// An identity camera at the origin: world space is clip space.
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}
