//! 2-D vector and bounding-box primitives shared across the simulation.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// A 2-D floating point vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn magnitude(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn magnitude_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalized(self) -> Self {
        let mag = self.magnitude();
        if mag < 1e-4 {
            Self::ZERO
        } else {
            Self::new(self.x / mag, self.y / mag)
        }
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance_to(self, other: Vec2) -> f32 {
        (self - other).magnitude()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Axis-aligned bounding box stored as `(min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vec2,
    pub max: Vec2,
}

impl BoundingBox {
    /// Sentinel used as the merge identity: merging anything with this
    /// yields the other operand unchanged.
    pub fn maximized() -> Self {
        Self {
            min: Vec2::new(f32::INFINITY, f32::INFINITY),
            max: Vec2::new(f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            min: Vec2::new(a.x.min(b.x), a.y.min(b.y)),
            max: Vec2::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    /// Sweep a point `from -> from + vel * dt` into a bounding box, enforcing
    /// a minimum 0.1 extent in each axis to avoid degenerate rectangles.
    pub fn swept(from: Vec2, vel: Vec2, dt: f32) -> Self {
        let next = from + vel * dt;
        let mut bb = Self::from_points(from, next);
        if bb.max.x - bb.min.x < 0.1 {
            let mid = (bb.min.x + bb.max.x) * 0.5;
            bb.min.x = mid - 0.05;
            bb.max.x = mid + 0.05;
        }
        if bb.max.y - bb.min.y < 0.1 {
            let mid = (bb.min.y + bb.max.y) * 0.5;
            bb.min.y = mid - 0.05;
            bb.max.y = mid + 0.05;
        }
        bb
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains_point(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Merge two bounding boxes. Merging with `maximized()` returns the
    /// other box unchanged, matching its role as the identity element.
    pub fn merge(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: Vec2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Vec2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swept_bb_contains_both_endpoints() {
        let from = Vec2::new(0.0, 0.0);
        let vel = Vec2::new(1000.0, 0.0);
        let dt = 0.1;
        let bb = BoundingBox::swept(from, vel, dt);
        assert!(bb.contains_point(from));
        assert!(bb.contains_point(from + vel * dt));
    }

    #[test]
    fn degenerate_axis_gets_minimum_extent() {
        let bb = BoundingBox::swept(Vec2::ZERO, Vec2::ZERO, 0.1);
        assert!(bb.max.x - bb.min.x >= 0.1 - 1e-6);
        assert!(bb.max.y - bb.min.y >= 0.1 - 1e-6);
    }

    #[test]
    fn maximized_is_merge_identity() {
        let a = BoundingBox::from_points(Vec2::new(1.0, 2.0), Vec2::new(3.0, 4.0));
        let merged = BoundingBox::maximized().merge(&a);
        assert_eq!(merged, a);
    }
}
