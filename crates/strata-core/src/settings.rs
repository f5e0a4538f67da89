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

//! Configuration of the hybrid pipeline.
//!
//! Everything tunable lives in [`HybridSettings`], an immutable value handed to
//! the render agent at construction. The classifier thresholds in particular
//! are never global: tests and presets build their own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How meshes are routed between the deferred and forward passes for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Every mesh goes through the G-buffer.
    Deferred,
    /// Every mesh is shaded in the forward pass.
    Forward,
    /// Each mesh is routed by the classifier from measured scene metrics.
    #[default]
    Hybrid,
}

impl RenderMode {
    /// The token accepted by [`FromStr`].
    pub fn token(self) -> &'static str {
        match self {
            RenderMode::Deferred => "deferred",
            RenderMode::Forward => "forward",
            RenderMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for RenderMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deferred" => Ok(RenderMode::Deferred),
            "forward" => Ok(RenderMode::Forward),
            "hybrid" => Ok(RenderMode::Hybrid),
            _ => Err(SettingsError::UnknownMode(s.to_string())),
        }
    }
}

/// Thresholds of the forward/deferred rule table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierThresholds {
    /// Meshes with fewer triangles go forward.
    pub small_mesh_triangles: u32,
    /// Meshes whose world-space center lies farther than this from the camera
    /// go forward. `None` disables the rule.
    pub far_distance: Option<f32>,
    /// Scenes covering less of the screen go forward. `None` disables the rule.
    pub low_coverage: Option<f32>,
    /// Below this overdraw, with few lights, meshes go forward.
    pub low_overdraw: f32,
    /// Light count considered "few".
    pub few_lights: usize,
    /// At or above this overdraw, with many lights, meshes go deferred.
    pub high_overdraw: f32,
    /// Light count considered "many".
    pub many_lights: usize,
}

impl Default for ClassifierThresholds {
    fn default() -> Self {
        ClassifierPreset::CoverageAware.thresholds()
    }
}

impl ClassifierThresholds {
    /// Checks that the thresholds describe a usable rule table.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.low_overdraw.is_nan() || self.low_overdraw < 1.0 {
            return Err(SettingsError::InvalidThreshold(format!(
                "low_overdraw must be >= 1.0, got {}",
                self.low_overdraw
            )));
        }
        if self.high_overdraw.is_nan() || self.high_overdraw < self.low_overdraw {
            return Err(SettingsError::InvalidThreshold(format!(
                "high_overdraw ({}) must not be below low_overdraw ({})",
                self.high_overdraw, self.low_overdraw
            )));
        }
        if let Some(distance) = self.far_distance {
            if distance.is_nan() || distance <= 0.0 {
                return Err(SettingsError::InvalidThreshold(format!(
                    "far_distance must be positive, got {distance}"
                )));
            }
        }
        if let Some(coverage) = self.low_coverage {
            if !(0.0..=1.0).contains(&coverage) {
                return Err(SettingsError::InvalidThreshold(format!(
                    "low_coverage must lie in [0, 1], got {coverage}"
                )));
            }
        }
        Ok(())
    }
}

/// Named threshold sets kept from earlier tunings of the rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassifierPreset {
    /// No coverage rule, "few lights" meaning two or fewer.
    Baseline,
    /// No coverage rule, "few lights" stretched to eight.
    LightHeavy,
    /// Baseline plus the sparse-scene coverage rule (0.3).
    CoverageAware,
    /// Baseline plus the far-mesh rule: meshes more than 100 units away go
    /// forward.
    DistanceAware,
}

impl ClassifierPreset {
    /// The thresholds of the preset.
    pub fn thresholds(self) -> ClassifierThresholds {
        let baseline = ClassifierThresholds {
            small_mesh_triangles: 50,
            far_distance: None,
            low_coverage: None,
            low_overdraw: 1.2,
            few_lights: 2,
            high_overdraw: 2.0,
            many_lights: 3,
        };
        match self {
            ClassifierPreset::Baseline => baseline,
            ClassifierPreset::LightHeavy => ClassifierThresholds {
                few_lights: 8,
                ..baseline
            },
            ClassifierPreset::CoverageAware => ClassifierThresholds {
                low_coverage: Some(0.3),
                ..baseline
            },
            ClassifierPreset::DistanceAware => ClassifierThresholds {
                far_distance: Some(100.0),
                ..baseline
            },
        }
    }
}

impl FromStr for ClassifierPreset {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" => Ok(ClassifierPreset::Baseline),
            "light-heavy" | "lightheavy" => Ok(ClassifierPreset::LightHeavy),
            "coverage-aware" | "coverageaware" => Ok(ClassifierPreset::CoverageAware),
            "distance-aware" | "distanceaware" => Ok(ClassifierPreset::DistanceAware),
            _ => Err(SettingsError::UnknownPreset(s.to_string())),
        }
    }
}

/// Which overdraw figure the classifier sees for each mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MeasurementScope {
    /// One scene-wide measurement shared by every mesh.
    #[default]
    Aggregate,
    /// The scene-wide measurement plus a per-mesh overdraw measured over each
    /// mesh's screen rectangle. Coverage stays scene-wide.
    PerMesh,
}

/// All settings of the hybrid renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSettings {
    /// Routing mode.
    pub mode: RenderMode,
    /// Classifier thresholds (used in [`RenderMode::Hybrid`] only).
    pub thresholds: ClassifierThresholds,
    /// How overdraw is measured.
    pub measurement: MeasurementScope,
    /// Allocate a separate specular attachment in the G-buffer.
    pub gbuffer_specular: bool,
    /// Clear color of the final image.
    pub clear_color: [f32; 4],
}

impl Default for HybridSettings {
    fn default() -> Self {
        Self {
            mode: RenderMode::Hybrid,
            thresholds: ClassifierThresholds::default(),
            measurement: MeasurementScope::Aggregate,
            gbuffer_specular: false,
            clear_color: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

impl HybridSettings {
    /// Parses settings from RON; missing fields keep their defaults.
    pub fn from_ron_str(text: &str) -> Result<Self, SettingsError> {
        let settings: HybridSettings =
            ron::from_str(text).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.thresholds.validate()?;
        Ok(settings)
    }

    /// Returns a copy using the thresholds of `preset`.
    pub fn with_preset(self, preset: ClassifierPreset) -> Self {
        Self {
            thresholds: preset.thresholds(),
            ..self
        }
    }
}

/// An error raised while reading settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    /// The mode token is not one of `deferred`, `forward` or `hybrid`.
    UnknownMode(String),
    /// The preset name is not recognized.
    UnknownPreset(String),
    /// The settings text is not valid RON for [`HybridSettings`].
    Parse(String),
    /// A threshold is out of range.
    InvalidThreshold(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::UnknownMode(token) => write!(
                f,
                "Unknown render mode '{token}', expected 'deferred', 'forward' or 'hybrid'"
            ),
            SettingsError::UnknownPreset(name) => {
                write!(f, "Unknown classifier preset '{name}'")
            }
            SettingsError::Parse(msg) => write!(f, "Failed to parse settings: {msg}"),
            SettingsError::InvalidThreshold(msg) => write!(f, "Invalid threshold: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_tokens() {
        assert_eq!("deferred".parse::<RenderMode>(), Ok(RenderMode::Deferred));
        assert_eq!("FORWARD".parse::<RenderMode>(), Ok(RenderMode::Forward));
        assert_eq!(" hybrid ".parse::<RenderMode>(), Ok(RenderMode::Hybrid));
        assert!(matches!(
            "tiled".parse::<RenderMode>(),
            Err(SettingsError::UnknownMode(_))
        ));
        assert_eq!(RenderMode::Forward.to_string(), "forward");
    }

    #[test]
    fn test_presets_differ_only_where_expected() {
        let base = ClassifierPreset::Baseline.thresholds();
        let heavy = ClassifierPreset::LightHeavy.thresholds();
        let coverage = ClassifierPreset::CoverageAware.thresholds();

        assert_eq!(base.few_lights, 2);
        assert_eq!(heavy.few_lights, 8);
        assert_eq!(base.low_coverage, None);
        assert_eq!(coverage.low_coverage, Some(0.3));
        assert_eq!(base.small_mesh_triangles, 50);
        assert_eq!(heavy.low_overdraw, base.low_overdraw);
        assert_eq!(ClassifierThresholds::default(), coverage);
        assert_eq!(coverage.far_distance, None);
    }

    #[test]
    fn test_distance_aware_preset() {
        let distance = ClassifierPreset::DistanceAware.thresholds();
        assert_eq!(distance.far_distance, Some(100.0));
        assert_eq!(distance.low_coverage, None);
        assert_eq!(distance.few_lights, 2);
        assert_eq!(
            "distance-aware".parse::<ClassifierPreset>(),
            Ok(ClassifierPreset::DistanceAware)
        );

        let settings = HybridSettings::from_ron_str("(thresholds: (far_distance: Some(40.0)))")
            .unwrap();
        assert_eq!(settings.thresholds.far_distance, Some(40.0));

        let err = HybridSettings::from_ron_str("(thresholds: (far_distance: Some(-1.0)))")
            .unwrap_err();
        assert!(matches!(err, SettingsError::InvalidThreshold(_)));
    }

    #[test]
    fn test_settings_from_partial_ron() {
        let settings = HybridSettings::from_ron_str(
            "(mode: forward, thresholds: (few_lights: 4), measurement: PerMesh)",
        )
        .unwrap();
        assert_eq!(settings.mode, RenderMode::Forward);
        assert_eq!(settings.measurement, MeasurementScope::PerMesh);
        assert_eq!(settings.thresholds.few_lights, 4);
        assert_eq!(settings.thresholds.small_mesh_triangles, 50);
        assert!(!settings.gbuffer_specular);
    }

    #[test]
    fn test_settings_reject_bad_thresholds() {
        let err = HybridSettings::from_ron_str("(thresholds: (low_overdraw: 3.0))").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidThreshold(_)));

        let err = HybridSettings::from_ron_str("(mode: tiled)").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn test_preset_names() {
        assert_eq!(
            "light-heavy".parse::<ClassifierPreset>(),
            Ok(ClassifierPreset::LightHeavy)
        );
        assert!("aggressive".parse::<ClassifierPreset>().is_err());
    }
}
