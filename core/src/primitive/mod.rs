//! Primitive store: ownership and lifecycle of simulation primitives.
//!
//! Primitives are kept in a [`slotmap`] arena rather than behind
//! reference-counted cyclic pointers: groups hold [`PrimitiveId`] children
//! and the store resolves ids to data on every access. This makes the
//! world trivially `Clone`-free to snapshot (callers copy out the data they
//! need instead of cloning a pointer graph) and sidesteps the parent/weak
//! reference dance entirely.

mod group;
mod line;
mod point;

pub use group::Group;
pub use line::Line;
pub use point::Point;

use crate::geometry::{BoundingBox, Vec2};
use slotmap::{new_key_type, SlotMap};
use std::sync::Arc;

new_key_type! {
    /// Stable index into the [`PrimitiveStore`] arena.
    pub struct PrimitiveId;
}

/// Opaque discriminator carried by every primitive; the simulator never
/// interprets it, callback dispatch does.
pub type UserTag = u32;

pub const TAG_PLAYER: UserTag = 0xdead_f00d;
pub const TAG_BULLET: UserTag = 0xdead_beef;
pub const TAG_ADJUSTMENT_BOX: UserTag = 0xdead_dead;

/// Index into an application-owned entity table (player/bullet handle).
pub type UserRef = u32;

/// Predicate deciding whether two primitives are allowed to collide.
pub type CollideAllower = Arc<dyn Fn(&PrimitiveAttrs) -> bool + Send + Sync>;

/// Flags shared by every primitive.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveFlags {
    pub fixed: bool,
    pub gravity_enabled: bool,
    pub y_locked: bool,
    pub allow_platform: bool,
    pub delete_later: bool,
}

/// Attributes common to every primitive variant (invariant #1, #3, #4).
#[derive(Debug, Clone, Default)]
pub struct PrimitiveAttrs {
    pub position: Vec2,
    pub direction: Vec2,
    pub scalar_velocity: f32,
    pub mass: f32,
    pub elasticity: f32,
    pub bb: BoundingBox,
    pub prev_direction: Vec2,
    pub prev_scalar_velocity: f32,
    pub flags: PrimitiveFlags,
    pub user_tag: UserTag,
    pub user_ref: UserRef,
    pub distance_travelled: f32,
    /// Friendly-fire discriminator; `-1` means "no group" (§3 Player).
    pub group: i32,
}

impl PrimitiveAttrs {
    pub fn new(position: Vec2, direction: Vec2, scalar_velocity: f32, mass: f32, elasticity: f32) -> Self {
        Self {
            position,
            direction: direction.normalized(),
            scalar_velocity,
            mass,
            elasticity,
            bb: BoundingBox::from_points(position, position),
            prev_direction: direction.normalized(),
            prev_scalar_velocity: scalar_velocity,
            flags: PrimitiveFlags::default(),
            user_tag: 0,
            user_ref: 0,
            distance_travelled: 0.0,
            group: -1,
        }
    }

    pub fn velocity(&self) -> Vec2 {
        self.direction * self.scalar_velocity
    }

    pub fn set_velocity(&mut self, v: Vec2) {
        self.scalar_velocity = v.magnitude();
        if self.scalar_velocity > 1e-6 {
            self.direction = v / self.scalar_velocity;
        }
    }

    pub fn record_prev(&mut self) {
        self.prev_direction = self.direction;
        self.prev_scalar_velocity = self.scalar_velocity;
    }

    /// Position interpolated `f` of the way through a step of duration `dt`,
    /// using the *previous* frame's direction/speed (matches the original
    /// source's render-interpolation contract).
    pub fn interpolated_pos(&self, dt: f32, f: f32) -> Vec2 {
        self.position + self.prev_direction * self.prev_scalar_velocity * dt * f
    }
}

/// A simulation body: one of Point, Line, or Group (invariant #1).
pub enum Primitive {
    Point(Point),
    Line(Line),
    Group(Group),
}

impl Primitive {
    pub fn attrs(&self) -> &PrimitiveAttrs {
        match self {
            Primitive::Point(p) => &p.attrs,
            Primitive::Line(l) => &l.attrs,
            Primitive::Group(g) => &g.attrs,
        }
    }

    pub fn attrs_mut(&mut self) -> &mut PrimitiveAttrs {
        match self {
            Primitive::Point(p) => &mut p.attrs,
            Primitive::Line(l) => &mut l.attrs,
            Primitive::Group(g) => &mut g.attrs,
        }
    }

    /// `true` for Point and Group: the shapes that move like a point and are
    /// tested as the "P" side of broadphase (a Group is a composite point —
    /// see [`Group`]).
    pub fn is_point_like(&self) -> bool {
        !matches!(self, Primitive::Line(_))
    }

    /// `true` only for a root-level Line (a static wall): the "L" side of
    /// broadphase. A Group's child lines are reached through
    /// [`PrimitiveStore::leaves`], never registered as roots themselves.
    pub fn is_line_like(&self) -> bool {
        matches!(self, Primitive::Line(_))
    }
}

/// Owns every primitive; partitions bookkeeping into point-like and
/// line-like sets because the narrowphase only ever tests point-vs-line
/// pairs (§4.1).
#[derive(Default)]
pub struct PrimitiveStore {
    arena: SlotMap<PrimitiveId, Primitive>,
    point_like: Vec<PrimitiveId>,
    line_like: Vec<PrimitiveId>,
}

impl PrimitiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a root-level primitive: one the simulator integrates and
    /// tests directly in broadphase (a free point/line, or a group such as
    /// a player's collision box).
    pub fn insert(&mut self, primitive: Primitive) -> PrimitiveId {
        let point_like = primitive.is_point_like();
        let line_like = primitive.is_line_like();
        let id = self.arena.insert(primitive);
        if point_like {
            self.point_like.push(id);
        }
        if line_like {
            self.line_like.push(id);
        }
        id
    }

    /// Inserts a primitive purely into the arena, without registering it as
    /// a root. Used for a group's children: they move and integrate through
    /// their parent group, never independently.
    pub fn insert_child(&mut self, primitive: Primitive) -> PrimitiveId {
        self.arena.insert(primitive)
    }

    /// Attaches `child` to `group` at `local_offset`, copying the group's
    /// kinematic attributes onto the child and placing it at the group's
    /// current world position (§4.3, `Group::append` contract).
    pub fn attach_child(&mut self, group: PrimitiveId, child: Primitive, local_offset: Vec2) -> Option<PrimitiveId> {
        let group_attrs = match self.arena.get(group) {
            Some(Primitive::Group(g)) => g.attrs.clone(),
            _ => return None,
        };
        let mut child = child;
        {
            let a = child.attrs_mut();
            a.position = group_attrs.position + local_offset;
            a.direction = group_attrs.direction;
            a.scalar_velocity = group_attrs.scalar_velocity;
            a.mass = group_attrs.mass;
            a.elasticity = group_attrs.elasticity;
            a.user_tag = group_attrs.user_tag;
            a.user_ref = group_attrs.user_ref;
            a.group = group_attrs.group;
        }
        let child_id = self.insert_child(child);
        if let Some(Primitive::Group(g)) = self.arena.get_mut(group) {
            g.append(child_id, local_offset);
        }
        Some(child_id)
    }

    /// Propagates a group's position/direction/velocity/mass/elasticity to
    /// every child (recursively, for nested groups), matching the
    /// `physic_group::position/velocity/mass/...` setters that cascade to
    /// `_elements` in the original source.
    pub fn propagate_group_motion(&mut self, group_id: PrimitiveId) {
        let (group_attrs, children) = match self.arena.get(group_id) {
            Some(Primitive::Group(g)) => (g.attrs.clone(), g.children.clone()),
            _ => return,
        };
        for (child_id, offset) in children {
            if let Some(child) = self.arena.get_mut(child_id) {
                let a = child.attrs_mut();
                a.position = group_attrs.position + offset;
                a.direction = group_attrs.direction;
                a.scalar_velocity = group_attrs.scalar_velocity;
                a.mass = group_attrs.mass;
                a.elasticity = group_attrs.elasticity;
                a.flags.gravity_enabled = group_attrs.flags.gravity_enabled;
            }
            self.propagate_group_motion(child_id);
        }
    }

    /// Recomputes a group's bounding box as the merge of its leaves' boxes
    /// (§3 Group contract).
    pub fn recompute_group_bb(&mut self, group_id: PrimitiveId) {
        let leaves = self.leaves(group_id);
        let mut bb = BoundingBox::maximized();
        for leaf in leaves {
            if let Some(p) = self.get(leaf) {
                bb = bb.merge(&p.attrs().bb);
            }
        }
        if let Some(Primitive::Group(g)) = self.arena.get_mut(group_id) {
            g.attrs.bb = bb;
        }
    }

    /// Marks a primitive for removal; actual removal happens at the start
    /// of the next simulation step (two-phase delete, §4.1).
    pub fn mark_delete_later(&mut self, id: PrimitiveId) {
        if let Some(prim) = self.arena.get_mut(id) {
            prim.attrs_mut().flags.delete_later = true;
        }
    }

    pub fn get(&self, id: PrimitiveId) -> Option<&Primitive> {
        self.arena.get(id)
    }

    /// Same as [`PrimitiveStore::get`], reported as a [`crate::error::SimError`]
    /// rather than silently swallowed, for call sites where a missing
    /// primitive is a bug rather than a routine race against `reap`.
    pub fn try_get(&self, id: PrimitiveId) -> Result<&Primitive, crate::error::SimError> {
        self.arena.get(id).ok_or(crate::error::SimError::MissingPrimitive(id))
    }

    pub fn get_mut(&mut self, id: PrimitiveId) -> Option<&mut Primitive> {
        self.arena.get_mut(id)
    }

    pub fn point_like_ids(&self) -> &[PrimitiveId] {
        &self.point_like
    }

    pub fn line_like_ids(&self) -> &[PrimitiveId] {
        &self.line_like
    }

    /// Removes every primitive marked `delete_later`. Called at the start
    /// of a step, after the previous step's callbacks ran.
    pub fn reap(&mut self) {
        self.point_like.retain(|&id| {
            self.arena
                .get(id)
                .map(|p| !p.attrs().flags.delete_later)
                .unwrap_or(false)
        });
        self.line_like.retain(|&id| {
            self.arena
                .get(id)
                .map(|p| !p.attrs().flags.delete_later)
                .unwrap_or(false)
        });
        self.arena.retain(|_, p| !p.attrs().flags.delete_later);
    }

    /// Depth-first iterator over the leaf (Point/Line) primitives owned by
    /// `root`, without materialising a flat list (§4.1 group tree view).
    /// If `root` is itself a Point or Line, yields just that id.
    pub fn leaves(&self, root: PrimitiveId) -> Vec<PrimitiveId> {
        let mut out = Vec::new();
        self.collect_leaves(root, &mut out);
        out
    }

    fn collect_leaves(&self, id: PrimitiveId, out: &mut Vec<PrimitiveId>) {
        match self.arena.get(id) {
            Some(Primitive::Group(g)) => {
                for &(child, _offset) in &g.children {
                    self.collect_leaves(child, out);
                }
            }
            Some(_) => out.push(id),
            None => {}
        }
    }

    /// Root shape that owns `leaf`, used by the collision dispatcher to pass
    /// the *root* primitive (Point, Line, or Group) to callbacks (§4.2.4).
    pub fn root_of(&self, leaf: PrimitiveId) -> PrimitiveId {
        for (id, prim) in self.arena.iter() {
            if let Primitive::Group(g) = prim {
                if g.children.iter().any(|&(c, _)| c == leaf || self.is_descendant(c, leaf)) {
                    return id;
                }
            }
        }
        leaf
    }

    fn is_descendant(&self, root: PrimitiveId, target: PrimitiveId) -> bool {
        if root == target {
            return true;
        }
        if let Some(Primitive::Group(g)) = self.arena.get(root) {
            return g.children.iter().any(|&(c, _)| self.is_descendant(c, target));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_of_a_point_is_itself() {
        let mut store = PrimitiveStore::new();
        let id = store.insert(Primitive::Point(Point::new(PrimitiveAttrs::default())));
        assert_eq!(store.leaves(id), vec![id]);
    }

    #[test]
    fn reap_removes_marked_primitives() {
        let mut store = PrimitiveStore::new();
        let id = store.insert(Primitive::Point(Point::new(PrimitiveAttrs::default())));
        store.mark_delete_later(id);
        store.reap();
        assert!(store.get(id).is_none());
        assert!(store.point_like_ids().is_empty());
    }
}
