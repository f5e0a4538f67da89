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

//! Scene measurements produced by the overdraw/coverage probe.

/// What the probe measured for a set of meshes.
///
/// Metrics only live for the duration of one rendering-mode recompute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneMetrics {
    /// Rasterized fragments per visible pixel, at least `1.0`.
    pub overdraw_ratio: f32,
    /// Fraction of the viewport covered, in `[0, 1]`.
    pub screen_coverage: f32,
}

impl Default for SceneMetrics {
    /// The metrics of a scene with nothing visible.
    fn default() -> Self {
        Self {
            overdraw_ratio: 1.0,
            screen_coverage: 0.0,
        }
    }
}

impl SceneMetrics {
    /// Derives metrics from raw occlusion-query counts.
    pub fn from_counts(total_fragments: u64, visible_pixels: u64, viewport_area: u64) -> Self {
        if visible_pixels == 0 {
            return Self::default();
        }
        let overdraw_ratio = (total_fragments as f64 / visible_pixels as f64).max(1.0) as f32;
        let screen_coverage = if viewport_area == 0 {
            0.0
        } else {
            (visible_pixels as f64 / viewport_area as f64).min(1.0) as f32
        };
        Self {
            overdraw_ratio,
            screen_coverage,
        }
    }
}

/// Overdraw ratio of a stencil read-back: sum of counts over touched pixels.
///
/// Returns `1.0` when no pixel was touched.
pub fn overdraw_from_stencil(stencil: &[u8]) -> f32 {
    let (sum, touched) = stencil
        .iter()
        .filter(|&&v| v != 0)
        .fold((0u64, 0u64), |(sum, n), &v| (sum + v as u64, n + 1));
    if touched == 0 {
        1.0
    } else {
        sum as f32 / touched as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_counts_to_metrics() {
        let m = SceneMetrics::from_counts(200, 100, 400);
        assert_relative_eq!(m.overdraw_ratio, 2.0);
        assert_relative_eq!(m.screen_coverage, 0.25);
    }

    #[test]
    fn test_nothing_visible_is_default() {
        assert_eq!(SceneMetrics::from_counts(0, 0, 400), SceneMetrics::default());
        assert_eq!(SceneMetrics::from_counts(50, 0, 400).overdraw_ratio, 1.0);
    }

    #[test]
    fn test_ratio_never_below_one() {
        assert_relative_eq!(SceneMetrics::from_counts(10, 20, 100).overdraw_ratio, 1.0);
    }

    #[test]
    fn test_stencil_overdraw() {
        assert_relative_eq!(overdraw_from_stencil(&[0, 1, 3, 0, 2]), 2.0);
        assert_eq!(overdraw_from_stencil(&[0, 0, 0]), 1.0);
        assert_eq!(overdraw_from_stencil(&[]), 1.0);
    }
}
