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

//! Per-frame and per-recompute telemetry of the render agent.

use super::Rule;
use std::time::Duration;
use strata_core::{RenderMode, SceneMetrics};

/// What one call to `render_frame` did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameStats {
    /// Meshes drawn into the G-buffer.
    pub deferred_draws: u32,
    /// Meshes drawn by the forward pass.
    pub forward_draws: u32,
    /// Whether the deferred lighting pass ran.
    pub lighting_pass: bool,
    /// CPU time spent recording the frame.
    pub frame_time: Duration,
}

impl FrameStats {
    /// Total mesh draw calls.
    pub fn total_draws(&self) -> u32 {
        self.deferred_draws + self.forward_draws
    }
}

/// The outcome of a rendering-mode recompute.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeSummary {
    /// The mode that was applied.
    pub mode: RenderMode,
    /// The classifier that decided, or `None` when the mode forced the path.
    pub strategy: Option<&'static str>,
    /// Meshes now on the deferred path.
    pub deferred_meshes: usize,
    /// Meshes now on the forward path.
    pub forward_meshes: usize,
    /// The aggregate metrics measured, in hybrid mode.
    pub metrics: Option<SceneMetrics>,
    /// How many meshes each rule decided, in rule order, rules with no hit omitted.
    pub rule_hits: Vec<(Rule, usize)>,
    /// Time spent measuring and classifying.
    pub duration: Duration,
}

impl ModeSummary {
    /// How many meshes `rule` decided.
    pub fn hits(&self, rule: Rule) -> usize {
        self.rule_hits
            .iter()
            .find(|(r, _)| *r == rule)
            .map_or(0, |(_, n)| *n)
    }
}

/// A snapshot of the agent for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderAgentStatus {
    /// The configured mode.
    pub mode: RenderMode,
    /// Frames rendered since creation.
    pub frame_count: u64,
    /// The last frame.
    pub last_frame: FrameStats,
    /// Estimated GPU cost of the last frame, summed over the lanes.
    pub estimated_cost: f32,
    /// Current G-buffer size in MiB.
    pub gbuffer_memory_mb: f64,
    /// The last mode recompute, if any.
    pub last_recompute: Option<ModeSummary>,
    /// A one-line human-readable summary.
    pub message: String,
}
