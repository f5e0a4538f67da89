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

//! Mathematics primitives used by the renderer.
//!
//! Linear algebra comes from [`glam`]; this module re-exports the types the
//! engine uses and adds the geometric helpers the hybrid pipeline needs
//! (bounding boxes, their screen-space footprint, and 2D extents).

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

pub mod dimension;
pub mod geometry;

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

pub use self::dimension::Extent2D;
pub use self::geometry::{Aabb, ScreenRect};
