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

//! # Strata Core
//!
//! Foundational crate containing the backend-agnostic renderer contracts,
//! the scene data consumed by the hybrid pipeline, and its settings.
//!
//! Following the CLAD layering, this crate defines the 'what': `strata-lanes`
//! executes GPU work through these contracts, `strata-agents` makes the
//! rendering-mode decisions, and `strata-infra` provides the wgpu backend.

#![warn(missing_docs)]

pub mod math;
pub mod metrics;
pub mod renderer;
pub mod scene;
pub mod settings;

pub use metrics::SceneMetrics;
pub use settings::{
    ClassifierPreset, ClassifierThresholds, HybridSettings, MeasurementScope, RenderMode,
    SettingsError,
};
