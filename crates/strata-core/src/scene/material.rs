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

//! Surface parameters shared by many meshes.

use crate::math::Vec3;
use serde::{Deserialize, Serialize};

/// A Blinn-Phong material.
///
/// Materials are referenced by index from meshes and never change after the
/// scene is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Diffuse reflectance.
    pub diffuse: Vec3,
    /// Specular reflectance.
    pub specular: Vec3,
    /// Specular exponent.
    pub shininess: f32,
    /// Coverage, `1.0` being fully opaque.
    pub opacity: f32,
}

impl Material {
    /// The material used when a mesh references one that does not exist.
    pub const DEFAULT: Self = Self {
        diffuse: Vec3::new(0.8, 0.8, 0.8),
        specular: Vec3::new(0.5, 0.5, 0.5),
        shininess: 32.0,
        opacity: 1.0,
    };

    /// An opaque material of the given diffuse color.
    pub fn opaque(diffuse: Vec3) -> Self {
        Self {
            diffuse,
            ..Self::DEFAULT
        }
    }

    /// Returns a copy with a different opacity.
    pub fn with_opacity(self, opacity: f32) -> Self {
        Self { opacity, ..self }
    }

    /// Returns `true` if the surface lets light through and must be blended.
    pub fn is_translucent(&self) -> bool {
        self.opacity < 1.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_opaque() {
        assert!(!Material::default().is_translucent());
    }

    #[test]
    fn test_translucency_threshold() {
        let m = Material::opaque(Vec3::ONE);
        assert!(m.with_opacity(0.999).is_translucent());
        assert!(!m.with_opacity(1.0).is_translucent());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let m: Material = ron::from_str("(opacity: 0.5)").unwrap();
        assert_eq!(m.opacity, 0.5);
        assert_eq!(m.shininess, Material::DEFAULT.shininess);
    }
}
