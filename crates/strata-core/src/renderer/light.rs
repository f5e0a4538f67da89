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

//! Defines light types for the rendering system.
//!
//! Only point lights take part in the hybrid pipeline. Their radius of
//! influence is derived once, at construction, from the attenuation curve.

use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// Radius reported for a light whose attenuation never drops below the cut-off.
pub const UNBOUNDED_LIGHT_RADIUS: f32 = 1.0e6;

/// Intensity below which a light is considered to contribute nothing (5/256).
pub const LIGHT_CUTOFF: f32 = 5.0 / 256.0;

/// Coefficients of the `1 / (constant + linear * d + quadratic * d^2)` falloff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attenuation {
    /// The constant term.
    pub constant: f32,
    /// The linear term.
    pub linear: f32,
    /// The quadratic term.
    pub quadratic: f32,
}

impl Default for Attenuation {
    /// A falloff reaching the cut-off around 50 world units.
    fn default() -> Self {
        Self {
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

impl Attenuation {
    /// The attenuation factor at distance `d`.
    pub fn factor(&self, d: f32) -> f32 {
        1.0 / (self.constant + self.linear * d + self.quadratic * d * d)
    }

    /// Distance at which a light of brightest channel `max_channel` falls below [`LIGHT_CUTOFF`].
    ///
    /// Solves `quadratic * d^2 + linear * d + (constant - max_channel / cutoff) = 0`
    /// for its positive root. Returns [`UNBOUNDED_LIGHT_RADIUS`] when the
    /// quadratic term is zero or the equation has no real root, and `0.0` when
    /// the light is already below the cut-off at its own position.
    pub fn radius(&self, max_channel: f32) -> f32 {
        let a = self.quadratic;
        let b = self.linear;
        let c = self.constant - max_channel / LIGHT_CUTOFF;

        if a == 0.0 {
            return UNBOUNDED_LIGHT_RADIUS;
        }
        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return UNBOUNDED_LIGHT_RADIUS;
        }
        ((-b + discriminant.sqrt()) / (2.0 * a)).max(0.0)
    }
}

/// A point light source that emits light in all directions from a single point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    /// World-space position.
    pub position: Vec3,
    /// Linear color, each channel in `[0, 1]`.
    pub color: Vec3,
    /// The falloff curve.
    pub attenuation: Attenuation,
    /// Distance beyond which the light contributes less than [`LIGHT_CUTOFF`].
    pub radius: f32,
}

impl PointLight {
    /// Creates a light, normalizing its color and deriving its radius.
    ///
    /// A color whose brightest channel exceeds 1.0 is divided by that channel,
    /// which keeps the ratio between channels.
    pub fn new(position: Vec3, color: Vec3, attenuation: Attenuation) -> Self {
        let color = normalize_color(color);
        Self {
            position,
            color,
            attenuation,
            radius: attenuation.radius(color.max_element()),
        }
    }
}

impl Default for PointLight {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ONE, Attenuation::default())
    }
}

fn normalize_color(color: Vec3) -> Vec3 {
    let color = color.max(Vec3::ZERO);
    let brightest = color.max_element();
    if brightest > 1.0 {
        color / brightest
    } else {
        color
    }
}

/// The lights of a scene, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightList {
    lights: Vec<PointLight>,
}

impl LightList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a light.
    pub fn push(&mut self, light: PointLight) {
        self.lights.push(light);
    }

    /// Number of lights.
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Returns `true` if the list holds no light.
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Iterates over the lights.
    pub fn iter(&self) -> std::slice::Iter<'_, PointLight> {
        self.lights.iter()
    }

    /// The lights as a slice.
    pub fn as_slice(&self) -> &[PointLight] {
        &self.lights
    }
}

impl FromIterator<PointLight> for LightList {
    fn from_iter<I: IntoIterator<Item = PointLight>>(iter: I) -> Self {
        Self {
            lights: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a LightList {
    type Item = &'a PointLight;
    type IntoIter = std::slice::Iter<'a, PointLight>;

    fn into_iter(self) -> Self::IntoIter {
        self.lights.iter()
    }
}
