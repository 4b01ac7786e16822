use super::{CollideAllower, PrimitiveAttrs};
use crate::geometry::{BoundingBox, Vec2};

/// A line segment from `position` to `position + displacement`. Exposes a
/// parameterised line equation used by the continuous narrowphase (§4.2.3).
pub struct Line {
    pub attrs: PrimitiveAttrs,
    pub displacement: Vec2,
    pub collide_allower: Option<CollideAllower>,
}

impl Line {
    pub fn new(attrs: PrimitiveAttrs, displacement: Vec2) -> Self {
        Self {
            attrs,
            displacement,
            collide_allower: None,
        }
    }

    pub fn second_endpoint(&self) -> Vec2 {
        self.attrs.position + self.displacement
    }

    pub fn update_bb(&mut self, dt: f32) {
        let vel = self.attrs.velocity();
        let a0 = BoundingBox::swept(self.attrs.position, vel, dt);
        let a1 = BoundingBox::swept(self.second_endpoint(), vel, dt);
        self.attrs.bb = a0.merge(&a1);
    }

    /// `true` for a degenerate zero-displacement line: it never triggers a
    /// collision (§4.2 Failure model).
    pub fn is_degenerate(&self) -> bool {
        self.displacement.magnitude_sq() < 1e-10
    }

    /// Coefficients `(a, b, c)` of the line `a*x + b*y + c = 0` supporting
    /// this segment at sub-step `f` of a move of duration `dt`, where the
    /// segment has translated by `velocity * dt * f`.
    pub fn equation(&self, dt: f32, f: f32) -> (f32, f32, f32) {
        let offset = self.attrs.velocity() * dt * f;
        let p0 = self.attrs.position + offset;
        let dir = self.displacement.normalized();
        // Normal is the direction rotated by 90 degrees.
        let normal = Vec2::new(-dir.y, dir.x);
        let c = -(normal.x * p0.x + normal.y * p0.y);
        (normal.x, normal.y, c)
    }

    /// Signed distance from `point` to the line equation `(a, b, c)`.
    pub fn distance((a, b, c): (f32, f32, f32), point: Vec2) -> f32 {
        a * point.x + b * point.y + c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_line_never_collides() {
        let attrs = PrimitiveAttrs::new(Vec2::ZERO, Vec2::new(1.0, 0.0), 0.0, 1.0, 0.5);
        let line = Line::new(attrs, Vec2::ZERO);
        assert!(line.is_degenerate());
    }
}
