//! Bullet Manager: owns the free-list of live bullet primitives and the
//! bullet-vs-player collision callback (§4.3 Bullet Manager & Instant-Kick
//! Manager). Grounded in `bullet.hpp`'s `bullet_mgr`, stripped of sprite
//! drawing.

use crate::color::Color;
use crate::geometry::Vec2;
use crate::primitive::{Primitive, PrimitiveAttrs, PrimitiveId, PrimitiveStore, TAG_BULLET};
use crate::simulation::PhysicSimulation;

struct BulletRecord {
    id: PrimitiveId,
    max_distance: f32,
}

/// Owns every live bullet fired this session. A bullet is a zero-extent
/// [`Primitive::Point`] tagged `BULLET`; the manager drops its record once
/// the primitive is reaped by the store, and proactively marks it for
/// deletion once it has travelled past `max_distance` (§3 Bullet).
pub struct BulletManager {
    callback_name: String,
    records: Vec<BulletRecord>,
}

impl BulletManager {
    pub fn new(name: &str) -> Self {
        Self {
            callback_name: format!("bm_{name}"),
            records: Vec::new(),
        }
    }

    pub fn callback_name(&self) -> &str {
        &self.callback_name
    }

    /// Spawns a bullet at `origin` with the given `velocity`/`mass`, tagged
    /// with the shooter's `group` and `tracer_colour` carried for replication
    /// only (the core never renders).
    pub fn fire(
        &mut self,
        store: &mut PrimitiveStore,
        origin: Vec2,
        velocity: Vec2,
        mass: f32,
        group: i32,
        max_distance: f32,
        _tracer_colour: Color,
    ) -> PrimitiveId {
        let mut attrs = PrimitiveAttrs::new(origin, velocity.normalized(), velocity.magnitude(), mass, 0.0);
        attrs.user_tag = TAG_BULLET;
        attrs.group = group;
        attrs.flags.gravity_enabled = false;

        let point = crate::primitive::Point::new(attrs);
        let id = store.insert(Primitive::Point(point));
        self.records.push(BulletRecord { id, max_distance });
        id
    }

    /// Runs once per tick after the simulator step: marks bullets that have
    /// exceeded their travel budget for deletion and drops bookkeeping for
    /// bullets the store has already reaped.
    pub fn update(&mut self, store: &mut PrimitiveStore) {
        self.records.retain(|rec| {
            let Some(prim) = store.get(rec.id) else {
                return false;
            };
            if prim.attrs().distance_travelled > rec.max_distance {
                store.mark_delete_later(rec.id);
            }
            true
        });
        self.records.retain(|rec| store.get(rec.id).is_some());
    }

    pub fn active_count(&self) -> usize {
        self.records.len()
    }

    /// Installs the bullet-vs-player collision callback on `sim`: applies
    /// the bullet's momentum as an impulse to the player group, marks the
    /// bullet for deletion, and resets the hit player's acceleration ramp
    /// while flagging its on-hit event (§4.3 Bullet Manager, `player_hit_callback`).
    pub fn register_player_hit_callback<F>(&self, sim: &mut PhysicSimulation, mut on_player_hit: F)
    where
        F: FnMut(&mut PrimitiveStore, PrimitiveId, Vec2) + Send + 'static,
    {
        let name = self.callback_name.clone();
        sim.on_collision(
            &name,
            Box::new(move |store, event| {
                let (bullet_leaf, player_leaf) = (event.point_leaf, event.line_leaf);
                let bullet_tag = store.get(bullet_leaf).map(|p| p.attrs().user_tag);
                if bullet_tag != Some(TAG_BULLET) {
                    return;
                }
                let Some(bullet_attrs) = store.get(bullet_leaf).map(|p| p.attrs().clone()) else {
                    return;
                };
                if bullet_attrs.flags.delete_later {
                    return;
                }
                let impulse = bullet_attrs.velocity() * bullet_attrs.mass;
                let player_root = store.root_of(player_leaf);
                store.mark_delete_later(bullet_leaf);
                on_player_hit(store, player_root, impulse);
            }),
        );
    }
}
