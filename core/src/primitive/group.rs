use super::{PrimitiveAttrs, PrimitiveId};
use crate::geometry::Vec2;

/// A composite primitive holding children at fixed local offsets (§3).
/// Setting position/velocity/mass/elasticity on a group propagates to its
/// children; a group's bounding box is the merge of its children's boxes.
pub struct Group {
    pub attrs: PrimitiveAttrs,
    pub children: Vec<(PrimitiveId, Vec2)>,
}

impl Group {
    pub fn new(attrs: PrimitiveAttrs) -> Self {
        Self {
            attrs,
            children: Vec::new(),
        }
    }

    pub fn append(&mut self, child: PrimitiveId, local_offset: Vec2) {
        self.children.push((child, local_offset));
    }
}
