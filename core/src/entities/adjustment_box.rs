//! Adjustment Box Manager (§3 Adjustment Box, §4.3 Adjustment Box Manager).
//! Grounded in `adjustment_box.hpp`: a temporary group that re-materialises
//! a remote player's historical collision shape so a shooter's local hit
//! registration agrees with what their screen showed, and expires after a
//! single step of non-zero displacement.

use crate::geometry::Vec2;
use crate::primitive::{Group, Line, Primitive, PrimitiveAttrs, PrimitiveId, PrimitiveStore, TAG_ADJUSTMENT_BOX};
use crate::simulation::PhysicSimulation;

struct AdjustmentBoxRecord {
    id: PrimitiveId,
    /// The live player collision group this box stands in for; read at hit
    /// time (not copied at spawn) so friendly-fire checks use the player's
    /// *current* group per the resolved open question.
    target_collision_box: PrimitiveId,
    callback_name: String,
}

/// Owns every in-flight adjustment box. At most one exists per
/// (shooter, other-player) pair at a time in practice, but nothing enforces
/// that here — the manager just tracks whichever boxes are live.
pub struct AdjustmentBoxManager {
    next_callback_id: u32,
    boxes: Vec<AdjustmentBoxRecord>,
}

impl AdjustmentBoxManager {
    pub fn new() -> Self {
        Self {
            next_callback_id: 0,
            boxes: Vec::new(),
        }
    }

    /// Spawns a box with `target_player`'s shape at `historical_position`
    /// and wires a dedicated bullet-hit callback that routes a hit back to
    /// the player through `on_player_hit` (§4.3 Adjustment Box Manager).
    pub fn spawn<F>(
        &mut self,
        store: &mut PrimitiveStore,
        sim: &mut PhysicSimulation,
        target_collision_box: PrimitiveId,
        historical_position: Vec2,
        size: Vec2,
        mut on_player_hit: F,
    ) where
        F: FnMut(&mut PrimitiveStore, PrimitiveId, Vec2, bool) + Send + 'static,
    {
        let mut attrs = PrimitiveAttrs::new(historical_position, Vec2::new(1.0, 0.0), 0.0, 1.0, 0.0);
        attrs.user_tag = TAG_ADJUSTMENT_BOX;
        // Gravity enabled purely so `distance_travelled` becomes non-zero
        // after one step, which is how `expired()` detects "this box has
        // already lived its one step" (§3 Adjustment Box).
        attrs.flags.gravity_enabled = true;

        let box_id = store.insert(Primitive::Group(Group::new(attrs)));
        let corners = [
            (Vec2::new(0.0, 0.0), Vec2::new(0.0, -size.y)),
            (Vec2::new(0.0, -size.y), Vec2::new(size.x, 0.0)),
            (Vec2::new(size.x, -size.y), Vec2::new(0.0, size.y)),
            (Vec2::new(size.x, 0.0), Vec2::new(-size.x, 0.0)),
        ];
        for (offset, displacement) in corners {
            let line_attrs = PrimitiveAttrs::new(Vec2::ZERO, Vec2::new(1.0, 0.0), 0.0, 1.0, 0.0);
            store.attach_child(box_id, Primitive::Line(Line::new(line_attrs, displacement)), offset);
        }

        let callback_name = format!("adjbox{}", self.next_callback_id);
        self.next_callback_id += 1;

        sim.on_collision(
            &callback_name,
            Box::new(move |store, event| {
                let (bullet_leaf, box_leaf) = (event.point_leaf, event.line_leaf);
                let bullet_attrs = match store.get(bullet_leaf) {
                    Some(p) if p.attrs().user_tag == crate::primitive::TAG_BULLET && !p.attrs().flags.delete_later => {
                        p.attrs().clone()
                    }
                    _ => return,
                };
                let box_root = store.root_of(box_leaf);
                if store.get(box_root).map(|p| p.attrs().user_tag) != Some(TAG_ADJUSTMENT_BOX) {
                    return;
                }

                let target_group = store.get(target_collision_box).map(|p| p.attrs().group).unwrap_or(-1);
                if target_group != -1 && target_group == bullet_attrs.group {
                    return;
                }

                store.mark_delete_later(bullet_leaf);
                store.mark_delete_later(box_root);

                let impulse = bullet_attrs.velocity() * bullet_attrs.mass;
                if let Some(prim) = store.get_mut(target_collision_box) {
                    let a = prim.attrs_mut();
                    let mass = a.mass.max(1e-4);
                    let v = a.velocity() + impulse / mass;
                    a.set_velocity(v);
                }
                store.propagate_group_motion(target_collision_box);

                let pushed_from_left = bullet_attrs.direction.x < 0.0;
                on_player_hit(store, target_collision_box, impulse, pushed_from_left);
            }),
        );

        self.boxes.push(AdjustmentBoxRecord {
            id: box_id,
            target_collision_box,
            callback_name,
        });
    }

    /// Removes expired boxes (distance travelled > 0, i.e. one step has
    /// elapsed) or boxes already reaped by the store, unregistering their
    /// collision callback (§4.3 Adjustment Box Manager).
    pub fn update(&mut self, store: &mut PrimitiveStore, sim: &mut PhysicSimulation) {
        self.boxes.retain(|rec| {
            let expired = match store.get(rec.id) {
                Some(p) => p.attrs().distance_travelled > 1e-4 || p.attrs().flags.delete_later,
                None => true,
            };
            if expired {
                store.mark_delete_later(rec.id);
                sim.remove_collision_callback(&rec.callback_name);
                false
            } else {
                true
            }
        });
    }

    pub fn active_count(&self) -> usize {
        self.boxes.len()
    }
}

impl Default for AdjustmentBoxManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_target(store: &mut PrimitiveStore) -> PrimitiveId {
        let attrs = PrimitiveAttrs::new(Vec2::ZERO, Vec2::new(1.0, 0.0), 0.0, 1.0, 0.0);
        store.insert(Primitive::Group(Group::new(attrs)))
    }

    #[test]
    fn spawning_a_box_registers_it_as_active() {
        let mut store = PrimitiveStore::new();
        let mut sim = PhysicSimulation::new();
        let target = spawn_target(&mut store);
        let mut mgr = AdjustmentBoxManager::new();

        mgr.spawn(&mut store, &mut sim, target, Vec2::new(10.0, 20.0), Vec2::new(40.0, 80.0), |_, _, _, _| {});
        assert_eq!(mgr.active_count(), 1);
    }

    #[test]
    fn a_box_survives_a_zero_distance_update_but_expires_once_it_has_moved() {
        let mut store = PrimitiveStore::new();
        let mut sim = PhysicSimulation::new();
        let target = spawn_target(&mut store);
        let mut mgr = AdjustmentBoxManager::new();
        mgr.spawn(&mut store, &mut sim, target, Vec2::new(10.0, 20.0), Vec2::new(40.0, 80.0), |_, _, _, _| {});

        mgr.update(&mut store, &mut sim);
        assert_eq!(mgr.active_count(), 1, "no step has run yet, so distance_travelled is still zero");

        sim.step_now(&mut store, 1.0 / 60.0);
        mgr.update(&mut store, &mut sim);
        assert_eq!(mgr.active_count(), 0, "gravity moved the box during the step, so it's past its one-step lifetime");
    }

    #[test]
    fn a_bullet_colliding_with_the_box_invokes_the_hit_callback_and_marks_it_deleted() {
        let mut store = PrimitiveStore::new();
        let mut sim = PhysicSimulation::new();
        sim.gravity = Vec2::ZERO;
        let target = spawn_target(&mut store);
        let mut mgr = AdjustmentBoxManager::new();
        mgr.spawn(&mut store, &mut sim, target, Vec2::new(0.0, 0.0), Vec2::new(40.0, 80.0), |_, _, _, _| {});

        let mut bullet_attrs = PrimitiveAttrs::new(Vec2::new(-1.0, -40.0), Vec2::new(1.0, 0.0), 200.0, 1.0, 0.0);
        bullet_attrs.user_tag = TAG_BULLET;
        bullet_attrs.group = -1;
        bullet_attrs.flags.gravity_enabled = false;
        store.insert(Primitive::Point(crate::primitive::Point::new(bullet_attrs)));

        sim.step_now(&mut store, 1.0 / 60.0);
        assert!(store.get(target).unwrap().attrs().velocity().x > 0.0, "the hit impulse should push the target along +x");
    }
}
