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

//! Renders a procedural scene headless with the hybrid pipeline and prints
//! where each mesh ended up.

mod demo_scene;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use strata_agents::render_agent::RenderAgent;
use strata_core::math::Extent2D;
use strata_core::{ClassifierPreset, HybridSettings, MeasurementScope, RenderMode};
use strata_infra::WgpuDevice;

#[derive(Parser)]
#[command(name = "sandbox")]
#[command(about = "Headless demo of the hybrid forward/deferred renderer")]
struct Cli {
    /// Routing mode: deferred, forward or hybrid. Overrides the settings file.
    #[arg(long)]
    mode: Option<String>,

    /// RON file with `HybridSettings`; missing fields keep their defaults.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Threshold preset: baseline, light-heavy, coverage-aware or distance-aware.
    #[arg(long)]
    preset: Option<String>,

    /// Measure overdraw per mesh instead of once for the whole scene.
    #[arg(long)]
    per_mesh: bool,

    /// Frames to render after the mode recompute.
    #[arg(long, default_value_t = 3)]
    frames: u32,

    /// Viewport width.
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Viewport height.
    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Number of point lights.
    #[arg(long, default_value_t = 4)]
    lights: usize,

    /// Crates per side of the crate grid.
    #[arg(long, default_value_t = 3)]
    grid: u32,
}

impl Cli {
    fn hybrid_settings(&self) -> Result<HybridSettings> {
        let mut settings = match &self.settings {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                HybridSettings::from_ron_str(&text)
                    .with_context(|| format!("Invalid settings in {}", path.display()))?
            }
            None => HybridSettings::default(),
        };
        if let Some(preset) = &self.preset {
            settings = settings.with_preset(preset.parse::<ClassifierPreset>()?);
        }
        if let Some(mode) = &self.mode {
            settings.mode = mode.parse::<RenderMode>()?;
        }
        if self.per_mesh {
            settings.measurement = MeasurementScope::PerMesh;
        }
        Ok(settings)
    }
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("wgpu_hal", log::LevelFilter::Error)
        .filter_module("wgpu_core", log::LevelFilter::Warn)
        .filter_module("naga", log::LevelFilter::Warn)
        .init();

    let cli = Cli::parse();
    let settings = cli.hybrid_settings()?;
    let extent = Extent2D::new(cli.width.max(1), cli.height.max(1));

    let mut device =
        WgpuDevice::headless(extent).context("Failed to create a headless wgpu device")?;
    let (mut scene, view) = demo_scene::build(&mut device, extent, cli.grid, cli.lights)
        .context("Failed to upload the demo scene")?;

    let mut agent = RenderAgent::new(settings);
    agent.initialize(&mut device, extent);

    let summary = agent.update_rendering_mode(&mut device, &mut scene, &view);
    println!(
        "mode {}: {} deferred, {} forward ({:.2} ms)",
        summary.mode,
        summary.deferred_meshes,
        summary.forward_meshes,
        summary.duration.as_secs_f64() * 1000.0
    );
    if let Some(strategy) = summary.strategy {
        println!("classifier {strategy}");
    }
    if let Some(metrics) = summary.metrics {
        println!(
            "overdraw {:.3}, coverage {:.3}",
            metrics.overdraw_ratio, metrics.screen_coverage
        );
    }
    for (rule, hits) in &summary.rule_hits {
        println!("  {:<28} {hits}", rule.name());
    }
    for mesh in &scene.meshes {
        let path = if mesh.use_forward { "forward" } else { "deferred" };
        log::debug!("{:<12} {:>6} tris -> {path}", mesh.name, mesh.triangle_count);
    }

    for _ in 0..cli.frames {
        agent.render_frame(&mut device, &scene, &view);
    }

    let status = agent.status();
    println!(
        "{} frames, G-buffer {:.1} MiB, {}",
        status.frame_count, status.gbuffer_memory_mb, status.message
    );

    agent.release(&mut device);
    scene.release(&mut device);
    Ok(())
}
