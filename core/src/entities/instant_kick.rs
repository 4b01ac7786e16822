//! Instant Kick Manager: a high-velocity synthetic bullet used for
//! hit-scan weapons (§3 Instant Kick, §4.3). Shares the bullet-vs-player
//! collision callback with [`super::bullet::BulletManager`] by tagging its
//! primitives identically; grounded in `instant_kick.hpp`.

use crate::color::Color;
use crate::geometry::Vec2;
use crate::primitive::PrimitiveId;

use super::bullet::BulletManager;

/// Velocity high enough that a single step crosses the entire level width;
/// the simulator's continuous narrowphase still resolves it correctly
/// because collision detection is speed-independent.
const KICK_SPEED: f32 = 40_000.0;

/// Thin wrapper over [`BulletManager`]: an instant kick is a bullet with an
/// enormous muzzle speed and a generous travel budget, so it shares the
/// manager's free-list and callback wiring rather than duplicating them.
pub struct InstantKickManager {
    inner: BulletManager,
}

impl InstantKickManager {
    pub fn new(name: &str) -> Self {
        Self {
            inner: BulletManager::new(name),
        }
    }

    pub fn callback_name(&self) -> &str {
        self.inner.callback_name()
    }

    pub fn fire(
        &mut self,
        store: &mut crate::primitive::PrimitiveStore,
        origin: Vec2,
        direction: Vec2,
        mass: f32,
        group: i32,
        max_distance: f32,
        tracer_colour: Color,
    ) -> PrimitiveId {
        self.inner.fire(
            store,
            origin,
            direction.normalized() * KICK_SPEED,
            mass,
            group,
            max_distance,
            tracer_colour,
        )
    }

    pub fn update(&mut self, store: &mut crate::primitive::PrimitiveStore) {
        self.inner.update(store);
    }

    pub fn active_count(&self) -> usize {
        self.inner.active_count()
    }

    pub fn register_player_hit_callback<F>(&self, sim: &mut crate::simulation::PhysicSimulation, on_player_hit: F)
    where
        F: FnMut(&mut crate::primitive::PrimitiveStore, PrimitiveId, Vec2) + Send + 'static,
    {
        self.inner.register_player_hit_callback(sim, on_player_hit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::PrimitiveStore;
    use crate::simulation::PhysicSimulation;

    #[test]
    fn firing_a_kick_inserts_a_tracked_point_primitive() {
        let mut store = PrimitiveStore::new();
        let mut kicks = InstantKickManager::new("test");
        let id = kicks.fire(&mut store, Vec2::ZERO, Vec2::new(1.0, 0.0), 1.0, -1, 10.0, Color::WHITE);
        assert_eq!(kicks.active_count(), 1);
        assert!(store.get(id).is_some());
    }

    #[test]
    fn firing_normalises_direction_to_the_kick_speed() {
        let mut store = PrimitiveStore::new();
        let mut kicks = InstantKickManager::new("test");
        let id = kicks.fire(&mut store, Vec2::ZERO, Vec2::new(0.0, 3.0), 1.0, -1, 10.0, Color::WHITE);
        let speed = store.get(id).unwrap().attrs().velocity().magnitude();
        assert!((speed - KICK_SPEED).abs() < 1.0, "expected kick speed ~{KICK_SPEED}, got {speed}");
    }

    #[test]
    fn a_kick_that_outruns_its_travel_budget_expires_on_update() {
        let mut store = PrimitiveStore::new();
        let mut sim = PhysicSimulation::new();
        let mut kicks = InstantKickManager::new("test");
        kicks.fire(&mut store, Vec2::ZERO, Vec2::new(1.0, 0.0), 1.0, -1, 10.0, Color::WHITE);
        assert_eq!(kicks.active_count(), 1);

        sim.step_now(&mut store, 1.0 / 60.0);
        kicks.update(&mut store);
        assert_eq!(kicks.active_count(), 0, "the kick speed vastly exceeds the 10-unit travel budget in one step");
    }
}
