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

//! Backend-agnostic rendering contracts of the hybrid pipeline.
//!
//! [`GraphicsDevice`] is an immediate-mode device with global state: the lanes
//! bind a target, set state and draw, and read results back synchronously.
//! Around it live the resource descriptors and ids, the render-state values,
//! the program and uniform descriptions, the error types and the point lights.
//!
//! `strata-infra` provides the wgpu implementation; tests use the
//! `MockGraphicsDevice` behind the `mock-device` feature.

pub mod api;
pub mod error;
pub mod light;
#[cfg(any(test, feature = "mock-device"))]
pub mod mock;
pub mod traits;

pub use self::api::*;
pub use self::error::{ResourceError, ShaderError};
pub use self::light::{Attenuation, LightList, PointLight, UNBOUNDED_LIGHT_RADIUS};
pub use self::traits::GraphicsDevice;
