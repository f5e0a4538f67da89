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

//! Per-mesh rendering-mode classification.

use strata_core::settings::ClassifierThresholds;

/// What the classifier knows about one mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifierInput {
    /// Opacity of the mesh's material.
    pub opacity: f32,
    /// Triangle count of the mesh.
    pub triangle_count: u32,
    /// Number of lights in the scene.
    pub light_count: usize,
    /// Scene-wide or per-mesh overdraw ratio, depending on the measurement scope.
    pub overdraw_ratio: f32,
    /// Scene-wide screen coverage.
    pub screen_coverage: f32,
    /// Distance from the camera to the mesh's world-space bounds center.
    pub view_distance: f32,
}

/// A rule of the classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Rule {
    /// Translucent materials cannot be resolved from a G-buffer.
    Translucent,
    /// Too few triangles to amortize the G-buffer write.
    SmallMesh,
    /// Far from the camera, where few lights reach and detail is low.
    FarAway,
    /// The scene covers too little of the screen.
    LowCoverage,
    /// Little overdraw and few lights: forward shading is cheap.
    LowOverdrawFewLights,
    /// Heavy overdraw with many lights: deferred shading pays off.
    HighOverdrawManyLights,
    /// Nothing else matched.
    Default,
}

impl Rule {
    /// Every rule, in evaluation order.
    pub const ALL: [Rule; 7] = [
        Rule::Translucent,
        Rule::SmallMesh,
        Rule::FarAway,
        Rule::LowCoverage,
        Rule::LowOverdrawFewLights,
        Rule::HighOverdrawManyLights,
        Rule::Default,
    ];

    /// A short stable name for logs and telemetry.
    pub fn name(self) -> &'static str {
        match self {
            Rule::Translucent => "translucent",
            Rule::SmallMesh => "small-mesh",
            Rule::FarAway => "far-away",
            Rule::LowCoverage => "low-coverage",
            Rule::LowOverdrawFewLights => "low-overdraw-few-lights",
            Rule::HighOverdrawManyLights => "high-overdraw-many-lights",
            Rule::Default => "default",
        }
    }
}

/// The path chosen for a mesh and the rule that chose it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// `true` for the forward pass, `false` for the G-buffer.
    pub use_forward: bool,
    /// The first rule that matched.
    pub rule: Rule,
}

/// A versioned classification strategy.
///
/// Implementations must be pure: the same input always yields the same
/// decision.
pub trait ModeClassifier {
    /// Identifies the strategy and its revision in logs and telemetry.
    fn strategy_id(&self) -> &'static str;

    /// Chooses the path of one mesh.
    fn classify(&self, input: &ClassifierInput) -> Decision;
}

/// Rules and the path each one selects, in evaluation order.
const RULE_TABLE: [(Rule, bool); 7] = [
    (Rule::Translucent, true),
    (Rule::SmallMesh, true),
    (Rule::FarAway, true),
    (Rule::LowCoverage, true),
    (Rule::LowOverdrawFewLights, true),
    (Rule::HighOverdrawManyLights, false),
    (Rule::Default, false),
];

/// The first-match rule table over [`ClassifierThresholds`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RuleTableClassifier {
    thresholds: ClassifierThresholds,
}

impl RuleTableClassifier {
    /// Creates a classifier with fixed thresholds.
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    /// The thresholds in use.
    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    fn matches(&self, rule: Rule, input: &ClassifierInput) -> bool {
        let t = &self.thresholds;
        match rule {
            Rule::Translucent => input.opacity < 1.0,
            Rule::SmallMesh => input.triangle_count < t.small_mesh_triangles,
            Rule::FarAway => t
                .far_distance
                .is_some_and(|threshold| input.view_distance > threshold),
            Rule::LowCoverage => t
                .low_coverage
                .is_some_and(|threshold| input.screen_coverage < threshold),
            Rule::LowOverdrawFewLights => {
                input.overdraw_ratio < t.low_overdraw && input.light_count <= t.few_lights
            }
            Rule::HighOverdrawManyLights => {
                input.overdraw_ratio >= t.high_overdraw && input.light_count >= t.many_lights
            }
            Rule::Default => true,
        }
    }
}

impl ModeClassifier for RuleTableClassifier {
    fn strategy_id(&self) -> &'static str {
        "HYBRID_RULES_V3"
    }

    fn classify(&self, input: &ClassifierInput) -> Decision {
        RULE_TABLE
            .iter()
            .find(|(rule, _)| self.matches(*rule, input))
            .map(|&(rule, use_forward)| Decision { use_forward, rule })
            .unwrap_or(Decision {
                use_forward: false,
                rule: Rule::Default,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::settings::ClassifierPreset;

    fn opaque_cube() -> ClassifierInput {
        ClassifierInput {
            opacity: 1.0,
            triangle_count: 800,
            light_count: 1,
            overdraw_ratio: 1.0,
            screen_coverage: 0.8,
            view_distance: 5.0,
        }
    }

    fn classify(input: ClassifierInput) -> Decision {
        RuleTableClassifier::default().classify(&input)
    }

    #[test]
    fn test_opaque_cube_with_one_light_goes_forward() {
        let decision = classify(opaque_cube());
        assert!(decision.use_forward);
        assert_eq!(decision.rule, Rule::LowOverdrawFewLights);
    }

    #[test]
    fn test_translucency_wins_over_everything() {
        let decision = classify(ClassifierInput {
            opacity: 0.5,
            overdraw_ratio: 5.0,
            light_count: 10,
            ..opaque_cube()
        });
        assert!(decision.use_forward);
        assert_eq!(decision.rule, Rule::Translucent);
    }

    #[test]
    fn test_small_mesh_goes_forward() {
        let decision = classify(ClassifierInput {
            triangle_count: 12,
            overdraw_ratio: 3.0,
            light_count: 8,
            ..opaque_cube()
        });
        assert_eq!(decision.rule, Rule::SmallMesh);
        assert!(decision.use_forward);
    }

    #[test]
    fn test_low_coverage_rule_depends_on_preset() {
        let sparse = ClassifierInput {
            screen_coverage: 0.1,
            overdraw_ratio: 3.0,
            light_count: 4,
            ..opaque_cube()
        };
        assert_eq!(classify(sparse).rule, Rule::LowCoverage);

        let baseline = RuleTableClassifier::new(ClassifierPreset::Baseline.thresholds());
        let decision = baseline.classify(&sparse);
        assert_eq!(decision.rule, Rule::HighOverdrawManyLights);
        assert!(!decision.use_forward);
    }

    #[test]
    fn test_far_mesh_goes_forward_only_with_distance_preset() {
        let distant = ClassifierInput {
            view_distance: 150.0,
            overdraw_ratio: 3.0,
            light_count: 6,
            ..opaque_cube()
        };
        assert_eq!(classify(distant).rule, Rule::HighOverdrawManyLights);

        let distance = RuleTableClassifier::new(ClassifierPreset::DistanceAware.thresholds());
        let decision = distance.classify(&distant);
        assert_eq!(decision.rule, Rule::FarAway);
        assert!(decision.use_forward);

        let at_threshold = ClassifierInput {
            view_distance: 100.0,
            ..distant
        };
        assert_eq!(
            distance.classify(&at_threshold).rule,
            Rule::HighOverdrawManyLights
        );

        let small_and_far = ClassifierInput {
            triangle_count: 10,
            ..distant
        };
        assert_eq!(distance.classify(&small_and_far).rule, Rule::SmallMesh);
    }

    #[test]
    fn test_heavy_overdraw_with_many_lights_stays_deferred() {
        let decision = classify(ClassifierInput {
            overdraw_ratio: 2.0,
            light_count: 3,
            ..opaque_cube()
        });
        assert_eq!(decision.rule, Rule::HighOverdrawManyLights);
        assert!(!decision.use_forward);
    }

    #[test]
    fn test_default_is_deferred() {
        let decision = classify(ClassifierInput {
            overdraw_ratio: 1.5,
            light_count: 1,
            ..opaque_cube()
        });
        assert_eq!(
            decision,
            Decision {
                use_forward: false,
                rule: Rule::Default
            }
        );
    }

    #[test]
    fn test_light_heavy_preset_tolerates_more_lights() {
        let input = ClassifierInput {
            light_count: 6,
            ..opaque_cube()
        };
        assert_eq!(classify(input).rule, Rule::Default);
        let light_heavy = RuleTableClassifier::new(ClassifierPreset::LightHeavy.thresholds());
        assert_eq!(light_heavy.classify(&input).rule, Rule::LowOverdrawFewLights);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = RuleTableClassifier::default();
        let input = opaque_cube();
        let first = classifier.classify(&input);
        assert!((0..100).all(|_| classifier.classify(&input) == first));
    }

    #[test]
    fn test_rule_table_covers_every_rule_in_order() {
        let table_rules: Vec<Rule> = RULE_TABLE.iter().map(|(rule, _)| *rule).collect();
        assert_eq!(table_rules, Rule::ALL);
    }
}
