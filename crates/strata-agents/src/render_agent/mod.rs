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

//! Acts as the **[A]gent** for the rendering subsystem.
//!
//! The [`RenderAgent`] decides, per mesh, whether shading happens through the
//! G-buffer or in a forward pass, and delegates the GPU work to the lanes of
//! `strata-lanes`. Decisions are taken by a [`ModeClassifier`] from GPU-measured
//! scene metrics and are re-evaluated only when asked to, not every frame.

mod agent;
mod classifier;
mod stats;

pub use agent::RenderAgent;
pub use classifier::*;
pub use stats::*;
