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

//! Defines the RenderAgent, the orchestrator of the hybrid pipeline.

use super::{
    ClassifierInput, Decision, FrameStats, ModeClassifier, ModeSummary, RenderAgentStatus, Rule,
    RuleTableClassifier,
};
use std::time::Instant;
use strata_core::math::Extent2D;
use strata_core::renderer::{ClearRequest, GraphicsDevice, Viewport};
use strata_core::scene::{Scene, ViewInfo};
use strata_core::{HybridSettings, MeasurementScope, RenderMode, SceneMetrics};
use strata_lanes::probe_lane::OverdrawProbe;
use strata_lanes::render_lane::{
    ForwardPassLane, GBuffer, GBufferLayout, GeometryPassLane, LightingPassLane, PassContext,
    RenderLane,
};

/// The agent responsible for routing meshes between the deferred and the
/// forward path and for running the passes every frame.
///
/// Routing decisions are only taken by [`update_rendering_mode`](Self::update_rendering_mode);
/// [`render_frame`](Self::render_frame) reads the per-mesh flags it left behind.
pub struct RenderAgent {
    settings: HybridSettings,
    classifier: Box<dyn ModeClassifier>,
    geometry_lane: GeometryPassLane,
    lighting_lane: LightingPassLane,
    forward_lane: ForwardPassLane,
    // Created by `initialize`.
    probe: Option<OverdrawProbe>,
    gbuffer: Option<GBuffer>,
    viewport: Extent2D,
    // --- Telemetry ---
    frame_count: u64,
    last_frame: FrameStats,
    last_cost: f32,
    last_recompute: Option<ModeSummary>,
}

impl RenderAgent {
    /// Creates an agent classifying with a [`RuleTableClassifier`] over the
    /// settings' thresholds.
    pub fn new(settings: HybridSettings) -> Self {
        let classifier = Box::new(RuleTableClassifier::new(settings.thresholds));
        Self::with_classifier(settings, classifier)
    }

    /// Creates an agent with a custom classification strategy.
    pub fn with_classifier(settings: HybridSettings, classifier: Box<dyn ModeClassifier>) -> Self {
        let layout = gbuffer_layout(&settings);
        Self {
            settings,
            classifier,
            geometry_lane: GeometryPassLane::new(layout),
            lighting_lane: LightingPassLane::new(layout),
            forward_lane: ForwardPassLane::new(),
            probe: None,
            gbuffer: None,
            viewport: Extent2D::default(),
            frame_count: 0,
            last_frame: FrameStats::default(),
            last_cost: 0.0,
            last_recompute: None,
        }
    }

    /// Compiles the programs and allocates the G-buffer for `viewport`.
    ///
    /// Calling it again rebuilds everything.
    pub fn initialize(&mut self, device: &mut dyn GraphicsDevice, viewport: Extent2D) {
        log::info!(
            "Initializing render agent: mode {}, {}x{}, classifier {}",
            self.settings.mode,
            viewport.width,
            viewport.height,
            self.classifier.strategy_id()
        );
        for lane in self.lanes_mut() {
            lane.prepare(device);
        }
        if let Some(mut probe) = self.probe.take() {
            probe.release(device);
        }
        self.probe = Some(OverdrawProbe::new(device));
        if let Some(mut gbuffer) = self.gbuffer.take() {
            gbuffer.release(device);
        }
        self.gbuffer = Some(GBuffer::allocate(device, viewport, gbuffer_layout(&self.settings)));
        self.viewport = viewport;
    }

    /// Adopts a new viewport size, re-creating the G-buffer.
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, viewport: Extent2D) {
        if viewport == self.viewport {
            return;
        }
        log::info!("Render agent resized to {}x{}", viewport.width, viewport.height);
        self.viewport = viewport;
        if let Some(gbuffer) = self.gbuffer.as_mut() {
            gbuffer.resize(device, viewport);
        }
    }

    /// Measures the scene and re-routes every mesh.
    ///
    /// Runs in two phases. The measure phase only reads the scene and restores
    /// all GPU state it touches. The classify-and-apply phase computes every
    /// decision first and then writes the `use_forward` flags in a single loop.
    /// The forced modes skip measuring and classifying altogether.
    pub fn update_rendering_mode(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        view: &ViewInfo,
    ) -> ModeSummary {
        let start = Instant::now();
        let mode = self.settings.mode;

        let (decisions, metrics) = match mode {
            RenderMode::Deferred | RenderMode::Forward => {
                let use_forward = mode == RenderMode::Forward;
                (vec![(use_forward, None); scene.meshes.len()], None)
            }
            RenderMode::Hybrid => {
                let (aggregate, per_mesh) = self.measure(device, scene, view);
                let decisions = self.classify(scene, view, aggregate, per_mesh.as_deref());
                let decisions = decisions
                    .into_iter()
                    .map(|d| (d.use_forward, Some(d.rule)))
                    .collect();
                (decisions, Some(aggregate))
            }
        };

        for (mesh, (use_forward, _)) in scene.meshes.iter_mut().zip(&decisions) {
            mesh.use_forward = *use_forward;
        }

        let forward_meshes = decisions.iter().filter(|(forward, _)| *forward).count();
        let rule_hits = Rule::ALL
            .iter()
            .map(|&rule| {
                let n = decisions.iter().filter(|(_, r)| *r == Some(rule)).count();
                (rule, n)
            })
            .filter(|(_, n)| *n > 0)
            .collect();
        let summary = ModeSummary {
            mode,
            strategy: (mode == RenderMode::Hybrid).then(|| self.classifier.strategy_id()),
            deferred_meshes: decisions.len() - forward_meshes,
            forward_meshes,
            metrics,
            rule_hits,
            duration: start.elapsed(),
        };
        log::info!(
            "Rendering mode {}: {} deferred, {} forward",
            mode,
            summary.deferred_meshes,
            summary.forward_meshes
        );
        self.last_recompute = Some(summary.clone());
        summary
    }

    /// Renders one frame: geometry pass, lighting resolve, forward pass.
    ///
    /// Each mesh is drawn exactly once, by the pass its flag selects. The
    /// lighting pass is skipped when nothing was drawn into the G-buffer.
    pub fn render_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &Scene,
        view: &ViewInfo,
    ) -> FrameStats {
        let start = Instant::now();
        let Some(gbuffer) = self.gbuffer.as_ref() else {
            log::warn!("render_frame called before initialize, nothing drawn");
            return FrameStats::default();
        };
        let ctx = PassContext {
            scene,
            view,
            gbuffer,
        };

        let deferred_draws = self.geometry_lane.render(device, &ctx);

        device.bind_framebuffer(None);
        device.set_viewport(Viewport::from_extent(self.viewport));
        device.clear(&ClearRequest::color_and_depth(self.settings.clear_color));

        let lighting_pass = deferred_draws > 0;
        if lighting_pass {
            self.lighting_lane.render(device, &ctx);
            if let Some(framebuffer) = gbuffer.framebuffer() {
                if let Err(e) = device.copy_depth(framebuffer, None) {
                    log::warn!("Failed to copy G-buffer depth to the default target: {e}");
                }
            }
        }

        let forward_draws = self.forward_lane.render(device, &ctx);
        device.finish_frame();

        let cost = self.geometry_lane.estimate_cost(scene)
            + self.lighting_lane.estimate_cost(scene)
            + self.forward_lane.estimate_cost(scene);
        let stats = FrameStats {
            deferred_draws,
            forward_draws,
            lighting_pass,
            frame_time: start.elapsed(),
        };
        log::debug!(
            "Frame {}: {} deferred, {} forward, lighting {}",
            self.frame_count,
            deferred_draws,
            forward_draws,
            lighting_pass
        );

        self.last_cost = cost;
        self.last_frame = stats;
        self.frame_count += 1;
        stats
    }

    /// G-buffer attachment storage in MiB, or 0 before initialization.
    pub fn gbuffer_memory_mb(&self) -> f64 {
        self.gbuffer.as_ref().map_or(0.0, GBuffer::memory_usage_mb)
    }

    /// The G-buffer, once initialized.
    pub fn gbuffer(&self) -> Option<&GBuffer> {
        self.gbuffer.as_ref()
    }

    /// The current viewport size.
    pub fn viewport(&self) -> Extent2D {
        self.viewport
    }

    /// The settings the agent was created with.
    pub fn settings(&self) -> &HybridSettings {
        &self.settings
    }

    /// The classification strategy.
    pub fn classifier(&self) -> &dyn ModeClassifier {
        self.classifier.as_ref()
    }

    /// A telemetry snapshot.
    pub fn status(&self) -> RenderAgentStatus {
        RenderAgentStatus {
            mode: self.settings.mode,
            frame_count: self.frame_count,
            last_frame: self.last_frame,
            estimated_cost: self.last_cost,
            gbuffer_memory_mb: self.gbuffer_memory_mb(),
            last_recompute: self.last_recompute.clone(),
            message: format!(
                "frame_time={:.2}ms deferred={} forward={} lighting={} gbuffer={:.1}MiB",
                self.last_frame.frame_time.as_secs_f32() * 1000.0,
                self.last_frame.deferred_draws,
                self.last_frame.forward_draws,
                self.last_frame.lighting_pass,
                self.gbuffer_memory_mb(),
            ),
        }
    }

    /// Destroys every GPU object the agent owns.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        for lane in self.lanes_mut() {
            lane.release(device);
        }
        if let Some(mut probe) = self.probe.take() {
            probe.release(device);
        }
        if let Some(mut gbuffer) = self.gbuffer.take() {
            gbuffer.release(device);
        }
    }

    fn lanes_mut(&mut self) -> [&mut dyn RenderLane; 3] {
        [
            &mut self.geometry_lane,
            &mut self.lighting_lane,
            &mut self.forward_lane,
        ]
    }

    // Measure phase: reads the scene, never writes it.
    fn measure(
        &self,
        device: &mut dyn GraphicsDevice,
        scene: &Scene,
        view: &ViewInfo,
    ) -> (SceneMetrics, Option<Vec<f32>>) {
        let Some(probe) = self.probe.as_ref() else {
            log::warn!("Render agent not initialized, classifying with default metrics");
            return (SceneMetrics::default(), None);
        };
        let aggregate = probe.measure_scene(device, &scene.meshes, view, self.viewport);
        let per_mesh = (self.settings.measurement == MeasurementScope::PerMesh).then(|| {
            scene
                .meshes
                .iter()
                .map(|mesh| probe.measure_mesh(device, mesh, view, self.viewport))
                .collect()
        });
        (aggregate, per_mesh)
    }

    // Classify phase: pure decisions, one per mesh, in mesh order.
    fn classify(
        &self,
        scene: &Scene,
        view: &ViewInfo,
        aggregate: SceneMetrics,
        per_mesh: Option<&[f32]>,
    ) -> Vec<Decision> {
        scene
            .meshes
            .iter()
            .enumerate()
            .map(|(i, mesh)| {
                let input = ClassifierInput {
                    opacity: scene.material_of(mesh).opacity,
                    triangle_count: mesh.triangle_count,
                    light_count: scene.lights.len(),
                    overdraw_ratio: per_mesh
                        .and_then(|ratios| ratios.get(i).copied())
                        .unwrap_or(aggregate.overdraw_ratio),
                    screen_coverage: aggregate.screen_coverage,
                    view_distance: mesh.world_center().distance(view.position),
                };
                let decision = self.classifier.classify(&input);
                log::debug!(
                    "Mesh '{}': {} via rule {}",
                    mesh.name,
                    if decision.use_forward { "forward" } else { "deferred" },
                    decision.rule.name()
                );
                decision
            })
            .collect()
    }
}

fn gbuffer_layout(settings: &HybridSettings) -> GBufferLayout {
    if settings.gbuffer_specular {
        GBufferLayout::with_specular()
    } else {
        GBufferLayout::standard()
    }
}
