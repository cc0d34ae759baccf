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

//! Provides the axis-aligned bounding box used by the bounding-hull tree,
//! behavior scheduling bounds, and sensor regions.

use super::Vec3;
use serde::{Deserialize, Serialize};

/// Represents an Axis-Aligned Bounding Box (AABB).
///
/// An AABB is a rectangular prism aligned with the coordinate axes, defined by its
/// minimum and maximum corner points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[repr(C)]
pub struct Aabb {
    /// The corner of the box with the smallest coordinates on all axes.
    pub min: Vec3,
    /// The corner of the box with the largest coordinates on all axes.
    pub max: Vec3,
}

impl Aabb {
    /// An invalid `Aabb` where `min` components are positive infinity and `max` are negative infinity.
    ///
    /// Merging any valid `Aabb` with `INVALID` will result in that valid `Aabb`.
    pub const INVALID: Self = Self {
        min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    /// Creates a new `Aabb` from two corner points, in any order.
    #[inline]
    pub fn from_min_max(min_pt: Vec3, max_pt: Vec3) -> Self {
        Self {
            min: min_pt.min(max_pt),
            max: min_pt.max(max_pt),
        }
    }

    /// Creates a new `Aabb` from a center point and its half-extents.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let half = half_extents.abs();
        Self {
            min: center - half,
            max: center + half,
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

    /// Returns the index (0 = x, 1 = y, 2 = z) of the longest axis.
    pub fn longest_axis(&self) -> usize {
        let size = self.size();
        if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        }
    }

    /// Checks if the `Aabb` is valid (i.e., `min` <= `max` on all axes).
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Checks if a point is contained within or on the boundary of the `Aabb`.
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Checks if `other` lies entirely inside (or on the boundary of) this box.
    #[inline]
    pub fn contains_aabb(&self, other: &Aabb) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Checks if this `Aabb` intersects with another `Aabb`.
    ///
    /// Boxes that only touch at the boundary are considered to be intersecting.
    #[inline]
    pub fn intersects_aabb(&self, other: &Aabb) -> bool {
        (self.min.x <= other.max.x && self.max.x >= other.min.x)
            && (self.min.y <= other.max.y && self.max.y >= other.min.y)
            && (self.min.z <= other.max.z && self.max.z >= other.min.z)
    }

    /// Creates a new `Aabb` that encompasses both this `Aabb` and another one.
    #[inline]
    pub fn merge(&self, other: &Aabb) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl Default for Aabb {
    /// Returns the default `Aabb`, which is `Aabb::INVALID`.
    #[inline]
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_min_max_orders_corners() {
        let aabb = Aabb::from_min_max(Vec3::new(4.0, 5.0, 6.0), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.min, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.max, Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn merge_with_invalid_is_identity() {
        let aabb = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        assert_eq!(Aabb::INVALID.merge(&aabb), aabb);
        assert!(!Aabb::INVALID.is_valid());
    }

    #[test]
    fn containment_and_intersection() {
        let outer = Aabb::from_min_max(Vec3::ZERO, Vec3::splat(10.0));
        let inner = Aabb::from_min_max(Vec3::ONE, Vec3::splat(2.0));
        let straddling = Aabb::from_min_max(Vec3::splat(9.0), Vec3::splat(11.0));

        assert!(outer.contains_aabb(&inner));
        assert!(!outer.contains_aabb(&straddling));
        assert!(outer.intersects_aabb(&straddling));
        assert!(!inner.intersects_aabb(&straddling));
    }

    #[test]
    fn longest_axis_picks_widest_extent() {
        let aabb = Aabb::from_min_max(Vec3::ZERO, Vec3::new(1.0, 7.0, 3.0));
        assert_eq!(aabb.longest_axis(), 1);
        assert_eq!(aabb.center(), Vec3::new(0.5, 3.5, 1.5));
    }
}
