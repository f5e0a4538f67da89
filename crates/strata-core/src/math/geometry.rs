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

//! Provides geometric primitive shapes for spatial calculations.
//!
//! The hybrid pipeline needs two things from geometry: the local-space bounds
//! of a mesh (and their center), and the pixel rectangle those bounds cover
//! once projected, which bounds the per-mesh stencil read-back.

use super::{Extent2D, Mat4, Vec3, EPSILON};
use serde::{Deserialize, Serialize};

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// An AABB is a rectangular prism aligned with the coordinate axes, defined by its
/// minimum and maximum corner points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An invalid `Aabb` where `min` components are positive infinity and `max` are negative infinity.
    ///
    /// Merging any valid point or box into `INVALID` yields that point or box.
    pub const INVALID: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Creates a new `Aabb` from two corner points, in any order.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates an `Aabb` that tightly encloses a given set of points.
    ///
    /// # Returns
    ///
    /// Returns `Some(Aabb)` if the input is not empty, otherwise `None`.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let bounds = points
            .into_iter()
            .fold(Self::INVALID, |acc, p| acc.expanded_to(p));
        bounds.is_valid().then_some(bounds)
    }

    /// Returns a copy of the box grown to include `point`.
    #[inline]
    pub fn expanded_to(&self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Calculates the center point of the `Aabb`.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Calculates the full size (width, height, depth) of the `Aabb`.
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Checks if the `Aabb` is valid (i.e., `min` <= `max` on all axes).
    /// Degenerate boxes where `min == max` are considered valid.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    /// Returns the eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Projects the box into framebuffer space and returns the pixel rectangle it covers.
    ///
    /// `clip_from_local` is the full `projection * view * model` matrix. Only
    /// corners in front of the camera (clip-space `w > 0`) contribute; when no
    /// corner is, the box is not visible and `None` is returned. A box with
    /// corners on both sides of the camera plane can reach any pixel, so it
    /// gets the whole viewport. The rectangle uses a top-left origin and is clamped to `viewport`, so it may be empty
    /// for a box that lies entirely off-screen.
    pub fn screen_rect(&self, clip_from_local: &Mat4, viewport: Extent2D) -> Option<ScreenRect> {
        let mut ndc_min = glam::Vec2::splat(f32::INFINITY);
        let mut ndc_max = glam::Vec2::splat(f32::NEG_INFINITY);
        let mut any_visible = false;
        let mut any_behind = false;

        for corner in self.corners() {
            let clip = *clip_from_local * corner.extend(1.0);
            if clip.w <= EPSILON {
                any_behind = true;
                continue;
            }
            let ndc = clip.truncate().truncate() / clip.w;
            ndc_min = ndc_min.min(ndc);
            ndc_max = ndc_max.max(ndc);
            any_visible = true;
        }

        if !any_visible {
            return None;
        }
        if any_behind {
            return Some(ScreenRect::full(viewport));
        }

        let w = viewport.width as f32;
        let h = viewport.height as f32;
        let to_px = |v: f32, extent: f32| v.clamp(0.0, extent);

        let left = to_px(((ndc_min.x + 1.0) * 0.5 * w).floor(), w);
        let right = to_px(((ndc_max.x + 1.0) * 0.5 * w).ceil(), w);
        // NDC +y is up, framebuffer rows grow downwards.
        let top = to_px(((1.0 - ndc_max.y) * 0.5 * h).floor(), h);
        let bottom = to_px(((1.0 - ndc_min.y) * 0.5 * h).ceil(), h);

        Some(ScreenRect {
            x: left as u32,
            y: top as u32,
            width: (right - left).max(0.0) as u32,
            height: (bottom - top).max(0.0) as u32,
        })
    }
}

impl Default for Aabb {
    /// Returns the default `Aabb`, which is `Aabb::INVALID`.
    #[inline]
    fn default() -> Self {
        Self::INVALID
    }
}

/// A pixel rectangle in framebuffer space, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScreenRect {
    /// Left edge, in pixels.
    pub x: u32,
    /// Top edge, in pixels.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ScreenRect {
    /// Creates a rectangle covering a whole extent.
    pub fn full(extent: Extent2D) -> Self {
        Self {
            x: 0,
            y: 0,
            width: extent.width,
            height: extent.height,
        }
    }

    /// Number of pixels in the rectangle.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns `true` if the rectangle covers no pixel.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Checks whether the pixel whose top-left corner is `(px, py)` lies inside.
    #[inline]
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && py >= self.y && px < self.x + self.width && py < self.y + self.height
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::from_min_max(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn test_aabb_from_min_max_orders_corners() {
        let aabb = Aabb::from_min_max(Vec3::new(4.0, 5.0, 6.0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.min, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.max, Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_aabb_from_points() {
        assert!(Aabb::from_points(std::iter::empty()).is_none());

        let points = [
            Vec3::new(1.0, 5.0, -1.0),
            Vec3::new(0.0, 2.0, 3.0),
            Vec3::new(4.0, 8.0, 0.0),
        ];
        let aabb = Aabb::from_points(points).unwrap();

        assert_eq!(aabb.min, Vec3::new(0.0, 2.0, -1.0));
        assert_eq!(aabb.max, Vec3::new(4.0, 8.0, 3.0));
        assert_eq!(aabb.center(), Vec3::new(2.0, 5.0, 1.0));
        assert_eq!(aabb.size(), Vec3::new(4.0, 6.0, 4.0));
    }

    #[test]
    fn test_default_is_invalid() {
        assert!(!Aabb::default().is_valid());
        assert!(Aabb::default().expanded_to(Vec3::ONE).is_valid());
    }

    #[test]
    fn test_screen_rect_full_viewport_under_identity() {
        // Under an identity clip matrix the unit box spans the whole NDC square.
        let rect = unit_box()
            .screen_rect(&Mat4::IDENTITY, Extent2D::new(64, 32))
            .unwrap();
        assert_eq!(rect, ScreenRect::full(Extent2D::new(64, 32)));
    }

    #[test]
    fn test_screen_rect_is_y_down() {
        // Upper half of NDC space maps to the top rows of the framebuffer.
        let upper = Aabb::from_min_max(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 1.0, 0.0));
        let rect = upper
            .screen_rect(&Mat4::IDENTITY, Extent2D::new(10, 10))
            .unwrap();
        assert_eq!(rect.y, 0);
        assert_eq!(rect.height, 5);
        assert_eq!(rect.width, 10);
    }

    #[test]
    fn test_screen_rect_clamps_to_viewport() {
        let wide = Aabb::from_min_max(Vec3::new(-3.0, -0.5, 0.0), Vec3::new(0.0, 0.5, 0.0));
        let rect = wide
            .screen_rect(&Mat4::IDENTITY, Extent2D::new(100, 100))
            .unwrap();
        assert_eq!(rect.x, 0);
        assert_eq!(rect.width, 50);
        assert_eq!(rect.y, 25);
        assert_eq!(rect.height, 50);
    }

    #[test]
    fn test_screen_rect_behind_camera_is_none() {
        let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        let behind = Aabb::from_min_max(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 6.0));
        assert!(behind
            .screen_rect(&projection, Extent2D::new(100, 100))
            .is_none());
    }

    #[test]
    fn test_screen_rect_straddling_camera_covers_viewport() {
        let projection = Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0);
        // A thin slab from behind the camera to well in front of it, off to the side.
        let slab = Aabb::from_min_max(Vec3::new(0.5, -0.1, -20.0), Vec3::new(0.6, 0.1, 2.0));
        let rect = slab
            .screen_rect(&projection, Extent2D::new(100, 80))
            .unwrap();
        assert_eq!(rect, ScreenRect::full(Extent2D::new(100, 80)));
    }

    #[test]
    fn test_screen_rect_offscreen_is_empty() {
        let off = Aabb::from_min_max(Vec3::new(2.0, 2.0, 0.0), Vec3::new(3.0, 3.0, 0.0));
        let rect = off
            .screen_rect(&Mat4::IDENTITY, Extent2D::new(100, 100))
            .unwrap();
        assert!(rect.is_empty());
    }

    #[test]
    fn test_rect_contains() {
        let rect = ScreenRect {
            x: 2,
            y: 3,
            width: 4,
            height: 1,
        };
        assert!(rect.contains(2, 3));
        assert!(rect.contains(5, 3));
        assert!(!rect.contains(6, 3));
        assert!(!rect.contains(2, 4));
        assert_eq!(rect.area(), 4);
    }
}
