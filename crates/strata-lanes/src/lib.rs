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

//! # Strata Lanes
//!
//! Hot-path execution pipelines of the hybrid renderer.
//!
//! - [`render_lane`]: the G-buffer and the three per-frame passes (geometry,
//!   deferred lighting, forward).
//! - [`probe_lane`]: the overdraw/coverage probe and the scoped GPU state guard
//!   it measures under.
//!
//! Lanes only issue work through the `GraphicsDevice` contract of
//! `strata-core`; deciding which mesh goes where is the agents' job.

pub mod probe_lane;
pub mod render_lane;
