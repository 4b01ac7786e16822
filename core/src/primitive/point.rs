use super::{CollideAllower, PrimitiveAttrs};
use crate::geometry::BoundingBox;

/// A zero-extent body. Bounding box is the swept AABB over the next step.
pub struct Point {
    pub attrs: PrimitiveAttrs,
    pub collide_allower: Option<CollideAllower>,
}

impl Point {
    pub fn new(attrs: PrimitiveAttrs) -> Self {
        Self {
            attrs,
            collide_allower: None,
        }
    }

    pub fn update_bb(&mut self, dt: f32) {
        self.attrs.bb = BoundingBox::swept(self.attrs.position, self.attrs.velocity(), dt);
    }
}
