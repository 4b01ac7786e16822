//! Simulation world container (§2 System Overview control flow, §3 Player /
//! Bullet / Adjustment Box, §4.3, §4.4). `Game` ties the primitive store,
//! the physic simulator, the entity managers, and the AI worker handle
//! together and drives one tick of the documented control flow: poll
//! inbound actions → apply remote state → drain AI action queues → step
//! simulator → run post-step callbacks → publish a new AI snapshot → emit
//! outbound replication actions. The replication half (poll/apply/emit) is
//! the caller's responsibility — `Game::step` covers everything from
//! "drain AI" onward, since that part owns the primitive store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use tracing::{debug, error};

use crate::ai::{self, AiAction, AiWorkerHandle, NativeOperator};
use crate::ai::snapshot::{BulletSnapshot, PhysicSimSnapshot, PlatformSnapshot, PlayerSnapshot, WorldSnapshot};
use crate::color::Color;
use crate::entities::weapon::MuzzleShot;
use crate::entities::{AdjustmentBoxManager, BulletManager, FacingDir, InputState, InstantKickManager, Player, PlayerKinematics};
use crate::error::SimError;
use crate::geometry::Vec2;
use crate::platform::Platform;
use crate::primitive::{PrimitiveId, PrimitiveStore};
use crate::simulation::PhysicSimulation;

/// A pending bullet/adjustment-box hit, captured by the collision callbacks
/// and applied to the hit player once the step has finished. Routes a side
/// effect that needs the entity table (outside `PrimitiveStore`) back out
/// of a callback that only has access to the store (§4.3 Bullet Manager /
/// Adjustment Box Manager).
#[derive(Debug, Clone, Copy)]
struct PendingHit {
    collision_box: PrimitiveId,
    pushed_from_left: bool,
}

type PendingHits = Arc<Mutex<Vec<PendingHit>>>;

/// Applies a bullet/kick's momentum to the hit player's collision group,
/// matching the impulse application `adjustment_box.rs`'s callback performs
/// directly on the target group (§4.3 Bullet Manager).
fn apply_hit_impulse(store: &mut PrimitiveStore, player_root: PrimitiveId, impulse: Vec2) {
    if let Some(prim) = store.get_mut(player_root) {
        let a = prim.attrs_mut();
        let mass = a.mass.max(1e-4);
        let v = a.velocity() + impulse / mass;
        a.set_velocity(v);
    }
    store.propagate_group_motion(player_root);
}

/// One player slot: the entity plus whether its input is currently being
/// driven by an AI operator rather than a network connection.
struct PlayerSlot {
    player: Player,
    ai_operated: bool,
}

pub struct Game {
    store: PrimitiveStore,
    sim: PhysicSimulation,
    players: HashMap<String, PlayerSlot>,
    collision_box_to_name: HashMap<PrimitiveId, String>,
    bullets: BulletManager,
    instant_kicks: InstantKickManager,
    adjustment_boxes: AdjustmentBoxManager,
    pending_hits: PendingHits,
    ai_worker: Option<AiWorkerHandle>,
    rps: u32,
    tick: u64,
}

impl Game {
    pub fn new(gravity: Vec2, rps: u32) -> Self {
        let mut sim = PhysicSimulation::new();
        sim.gravity = gravity;

        let pending_hits: PendingHits = Arc::new(Mutex::new(Vec::new()));
        let mut bullets = BulletManager::new("main");
        let instant_kicks = InstantKickManager::new("main_kick");

        let hits_for_bullets = pending_hits.clone();
        bullets.register_player_hit_callback(&mut sim, move |store, player_root, impulse| {
            apply_hit_impulse(store, player_root, impulse);
            hits_for_bullets.lock().unwrap().push(PendingHit { collision_box: player_root, pushed_from_left: impulse.x < 0.0 });
        });

        let hits_for_kicks = pending_hits.clone();
        instant_kicks.register_player_hit_callback(&mut sim, move |store, player_root, impulse| {
            apply_hit_impulse(store, player_root, impulse);
            hits_for_kicks.lock().unwrap().push(PendingHit { collision_box: player_root, pushed_from_left: impulse.x < 0.0 });
        });

        Self {
            store: PrimitiveStore::new(),
            sim,
            players: HashMap::new(),
            collision_box_to_name: HashMap::new(),
            bullets,
            instant_kicks,
            adjustment_boxes: AdjustmentBoxManager::new(),
            pending_hits,
            ai_worker: None,
            rps,
            tick: 0,
        }
    }

    pub fn add_platform(&mut self, platform: Platform) {
        self.sim.add_platform(platform);
    }

    pub fn platforms(&self) -> &[Platform] {
        self.sim.platforms()
    }

    pub fn gravity(&self) -> Vec2 {
        self.sim.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.sim.gravity = gravity;
    }

    pub fn player_names(&self) -> impl Iterator<Item = &str> {
        self.players.keys().map(String::as_str)
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Spawns a new player, wiring its collision box into the hit-routing
    /// table so bullet/adjustment-box callbacks can find it by id.
    pub fn spawn_player(&mut self, name: &str, size: Vec2, position: Vec2, kinematics: PlayerKinematics) {
        let id = self.players.len() as u32;
        let player = Player::spawn(&mut self.store, id, size, position, kinematics);
        self.collision_box_to_name.insert(player.collision_box(), name.to_string());
        self.players.insert(name.to_string(), PlayerSlot { player, ai_operated: false });
    }

    pub fn remove_player(&mut self, name: &str) {
        if let Some(slot) = self.players.remove(name) {
            self.collision_box_to_name.remove(&slot.player.collision_box());
        }
        if let Some(worker) = self.ai_worker.as_mut() {
            worker.remove(name);
        }
    }

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.get(name).map(|s| &s.player)
    }

    pub fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.get_mut(name).map(|s| &mut s.player)
    }

    pub fn store(&self) -> &PrimitiveStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PrimitiveStore {
        &mut self.store
    }

    /// Borrows a named player together with the primitive store, split so
    /// callers that need both at once (server-side input application)
    /// don't have to go through two separate, conflicting `&mut self`
    /// calls.
    pub fn player_and_store_mut(&mut self, name: &str) -> Option<(&mut Player, &mut PrimitiveStore)> {
        let slot = self.players.get_mut(name)?;
        Some((&mut slot.player, &mut self.store))
    }

    /// Applies a network-originated input record to a non-AI-operated
    /// player. Silently ignored for AI-operated players and unknown names,
    /// since a stray late packet for either is not an error.
    pub fn apply_network_input(&mut self, name: &str, input: InputState) {
        if let Some(slot) = self.players.get_mut(name) {
            if !slot.ai_operated {
                slot.player.apply_input(input, &mut self.store);
            }
        }
    }

    /// Hands a player's input over to an AI operator for the rest of the
    /// session (until [`Game::release_ai`] is called), spinning up the
    /// worker thread on first use (§4.4 AI Worker).
    pub fn attach_ai(&mut self, name: &str, difficulty: ai::Difficulty) {
        if !self.players.contains_key(name) {
            return;
        }
        if self.ai_worker.is_none() {
            self.ai_worker = Some(ai::spawn(WorldSnapshot::default(), self.rps));
        }
        if let Some(slot) = self.players.get_mut(name) {
            slot.ai_operated = true;
        }
        if let Some(worker) = self.ai_worker.as_mut() {
            worker.register(Box::new(NativeOperator::new(name, difficulty)));
        }
    }

    pub fn release_ai(&mut self, name: &str) {
        if let Some(slot) = self.players.get_mut(name) {
            slot.ai_operated = false;
        }
        if let Some(worker) = self.ai_worker.as_mut() {
            worker.remove(name);
        }
    }

    /// Drains queued AI actions into `InputState` updates, then steps the
    /// simulator, runs post-step entity bookkeeping, and republishes a
    /// fresh AI snapshot. Covers the control-flow steps from "drain AI
    /// action queues" through "publish new world snapshot" (§2).
    pub fn step(&mut self, dt: f32, now: Instant) {
        self.drain_ai_actions();

        let mut shots: Vec<(String, MuzzleShot, i32, Color)> = Vec::new();
        for (name, slot) in self.players.iter_mut() {
            slot.player.physic_update(&mut self.store, dt, now);
            if let Some(weapon) = slot.player.weapon_mut() {
                weapon.update(dt);
                if weapon.on_shot() {
                    let pos = slot.player.position(&self.store);
                    let facing = if slot.player.facing() == FacingDir::Right { Vec2::new(1.0, 0.0) } else { Vec2::new(-1.0, 0.0) };
                    if let Some(shot) = weapon.try_fire(pos, facing) {
                        shots.push((name.clone(), shot, slot.player.group(), slot.player.tracer_colour()));
                    }
                }
            }
        }
        for (shooter_name, shot, group, tracer) in shots {
            self.fire_shot(&shooter_name, shot, group, tracer, now);
        }

        self.sim.step(&mut self.store, self.rps, 1.0);

        self.bullets.update(&mut self.store);
        self.instant_kicks.update(&mut self.store);
        self.adjustment_boxes.update(&mut self.store, &mut self.sim);
        self.apply_pending_hits();
        self.respawn_fallen_players();

        self.tick += 1;
        if let Some(worker) = self.ai_worker.as_ref() {
            worker.set_rps(self.rps);
            worker.publish(self.build_ai_snapshot());
        }

        if let Err(err) = self.check_invariants() {
            error!(%err, "simulation invariant violated");
        }

        debug!(tick = self.tick, players = self.players.len(), "simulation tick advanced");
    }

    /// Fires `shot` on `shooter_name`'s behalf: spawns the travelling
    /// bullet and, if the shooter's connection carries measurable latency,
    /// a linked instant-kick fast-forwarded to where the bullet would be
    /// after that latency, plus a lag-compensation adjustment box over
    /// every other player at the position its own trace says it occupied
    /// when the shot was actually taken (§4.3 Adjustment Box Manager,
    /// §4.5 Clock sync / ping).
    fn fire_shot(&mut self, shooter_name: &str, shot: MuzzleShot, group: i32, tracer: Color, now: Instant) {
        self.bullets.fire(&mut self.store, shot.position, shot.velocity, shot.hit_mass, group, 2000.0, tracer);

        let latency = self.players.get(shooter_name).map(|s| s.player.latency()).unwrap_or_default();
        if latency.is_zero() {
            return;
        }
        let latency_secs = latency.as_secs_f32();
        let shot_speed = shot.velocity.magnitude().max(1.0);
        let end_point = shot.position + shot.velocity * latency_secs;
        let kick_distance = (end_point - shot.position).magnitude();
        self.instant_kicks.fire(&mut self.store, shot.position, end_point - shot.position, shot.hit_mass, group, kick_distance, tracer);

        for (name, slot) in self.players.iter() {
            if name == shooter_name {
                continue;
            }
            let plr_pos = slot.player.position(&self.store);
            let bullet_time = (plr_pos - shot.position).magnitude() / shot_speed;
            let offset = latency_secs - bullet_time;
            if offset <= 0.0 {
                continue;
            }
            let Some(historical) = slot.player.position_trace_lookup(now, offset) else { continue };
            let collision_box = slot.player.collision_box();
            let size = slot.player.size();
            let hits = self.pending_hits.clone();
            self.adjustment_boxes.spawn(&mut self.store, &mut self.sim, collision_box, historical, size, move |store, target, impulse, pushed_from_left| {
                apply_hit_impulse(store, target, impulse);
                hits.lock().unwrap().push(PendingHit { collision_box: target, pushed_from_left });
            });
        }
    }

    /// Checks the §3 data-model invariant that a `y_locked` primitive never
    /// carries vertical velocity. Logged rather than propagated out of
    /// `step`, since callers drive the simulation on a fixed tick and have
    /// no recovery action beyond what's already in the tracing output.
    pub fn check_invariants(&self) -> Result<(), SimError> {
        for slot in self.players.values() {
            let prim = self.store.try_get(slot.player.collision_box())?;
            let a = prim.attrs();
            if a.flags.y_locked && a.velocity().y.abs() > 1e-3 {
                return Err(SimError::YLockedWithVelocity);
            }
        }
        Ok(())
    }

    fn drain_ai_actions(&mut self) {
        let Some(worker) = self.ai_worker.as_ref() else { return };
        let names: Vec<String> = self.players.iter().filter(|(_, s)| s.ai_operated).map(|(n, _)| n.clone()).collect();
        for name in names {
            let actions = worker.drain(&name);
            if actions.is_empty() {
                continue;
            }
            let Some(slot) = self.players.get_mut(&name) else { continue };
            let mut input = slot.player.extract_input_state(&self.store);
            for action in actions {
                match action {
                    AiAction::MoveLeft => {
                        input.move_left = true;
                        input.move_right = false;
                    }
                    AiAction::MoveRight => {
                        input.move_right = true;
                        input.move_left = false;
                    }
                    AiAction::Stop => {
                        input.move_left = false;
                        input.move_right = false;
                    }
                    AiAction::Jump => input.jump = true,
                    AiAction::JumpDown => input.jump_down = true,
                    AiAction::Shot | AiAction::EnableLongShot => input.fire = true,
                    AiAction::Relax | AiAction::DisableLongShot => input.fire = false,
                }
            }
            slot.player.apply_input(input, &mut self.store);
        }
    }

    fn apply_pending_hits(&mut self) {
        let hits: Vec<PendingHit> = std::mem::take(&mut *self.pending_hits.lock().unwrap());
        for hit in hits {
            let Some(name) = self.collision_box_to_name.get(&hit.collision_box).cloned() else { continue };
            if let Some(slot) = self.players.get_mut(&name) {
                slot.player.set_on_hit_event();
                slot.player.reset_accel_ramp(hit.pushed_from_left);
            }
        }
    }

    fn respawn_fallen_players(&mut self) {
        let fallen: Vec<String> =
            self.players.iter().filter(|(_, s)| s.player.past_death_plane(&self.store)).map(|(n, _)| n.clone()).collect();
        for name in fallen {
            if let Some(slot) = self.players.get_mut(&name) {
                slot.player.increase_deaths();
                slot.player.respawn_at(&mut self.store, Vec2::ZERO);
            }
        }
    }

    fn build_ai_snapshot(&self) -> WorldSnapshot {
        let mut players = HashMap::new();
        for (name, slot) in &self.players {
            let p = &slot.player;
            let (dispersion, bullet_vel) =
                p.weapon().map(|w| (w.metrics().dispersion, w.metrics().bullet_speed())).unwrap_or((0.0, 0.0));
            players.insert(
                name.clone(),
                PlayerSnapshot {
                    name: name.clone(),
                    pos: p.position(&self.store),
                    vel: p.velocity(&self.store),
                    size: p.size(),
                    group: p.group(),
                    is_y_locked: p.is_y_locked(&self.store),
                    on_left: p.facing() == FacingDir::Left,
                    x_accel: p.kinematics().x_accel,
                    x_slowdown: p.kinematics().x_slowdown,
                    jump_speed: p.kinematics().jump_speed,
                    gun_dispersion: dispersion,
                    gun_bullet_vel: bullet_vel,
                    barrel_pos: p.barrel_position(&self.store),
                },
            );
        }

        let platforms: Vec<PlatformSnapshot> = self
            .sim
            .platforms()
            .iter()
            .map(|plat| PlatformSnapshot { pos1: plat.position, pos2: Vec2::new(plat.right(), plat.position.y) })
            .collect();

        let bullets: Vec<BulletSnapshot> = self
            .store
            .point_like_ids()
            .iter()
            .filter_map(|&id| self.store.get(id))
            .filter(|p| p.attrs().user_tag == crate::primitive::TAG_BULLET)
            .map(|p| BulletSnapshot { pos: p.attrs().position, vel: p.attrs().velocity(), group: p.attrs().group, hit_mass: p.attrs().mass })
            .collect();

        WorldSnapshot::new(
            players,
            bullets,
            platforms,
            PhysicSimSnapshot { gravity: self.sim.gravity, time_speed: self.sim.last_speed() },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawning_a_player_registers_its_collision_box() {
        let mut game = Game::new(Vec2::new(0.0, 980.0), 60);
        game.spawn_player("alice", Vec2::new(40.0, 80.0), Vec2::ZERO, PlayerKinematics::default());
        assert!(game.player("alice").is_some());
        assert_eq!(game.collision_box_to_name.len(), 1);
    }

    #[test]
    fn stepping_advances_tick_counter() {
        let mut game = Game::new(Vec2::new(0.0, 980.0), 60);
        game.spawn_player("alice", Vec2::new(40.0, 80.0), Vec2::ZERO, PlayerKinematics::default());
        let dt = 1.0 / 60.0;
        game.step(dt, Instant::now());
        assert_eq!(game.tick(), 1);
    }

    #[test]
    fn attaching_ai_marks_the_player_as_ai_operated() {
        let mut game = Game::new(Vec2::new(0.0, 980.0), 60);
        game.spawn_player("bot", Vec2::new(40.0, 80.0), Vec2::ZERO, PlayerKinematics::default());
        game.attach_ai("bot", ai::Difficulty::Easy);
        assert!(game.players.get("bot").unwrap().ai_operated);
        if let Some(worker) = game.ai_worker.take() {
            worker.shutdown();
        }
    }

    #[test]
    fn check_invariants_flags_a_y_locked_primitive_with_nonzero_vertical_velocity() {
        let mut game = Game::new(Vec2::ZERO, 60);
        game.spawn_player("alice", Vec2::new(40.0, 80.0), Vec2::ZERO, PlayerKinematics::default());
        assert!(game.check_invariants().is_ok());

        let collision_box = game.player("alice").unwrap().collision_box();
        let prim = game.store_mut().get_mut(collision_box).unwrap();
        let a = prim.attrs_mut();
        a.flags.y_locked = true;
        a.set_velocity(Vec2::new(0.0, 50.0));

        assert!(matches!(game.check_invariants(), Err(SimError::YLockedWithVelocity)));
    }

    /// §8 scenario 5 "lag-compensated hit": a shooter with measured
    /// connection latency fires on another player. The fire path must
    /// spawn both the linked instant kick and a historical adjustment box
    /// for the other player, not just the travelling bullet.
    #[test]
    fn firing_with_latency_spawns_a_linked_kick_and_an_adjustment_box() {
        use std::time::Duration;

        let mut game = Game::new(Vec2::ZERO, 60);
        game.spawn_player("shooter", Vec2::new(40.0, 80.0), Vec2::ZERO, PlayerKinematics::default());
        game.spawn_player("target", Vec2::new(40.0, 80.0), Vec2::new(60.0, 0.0), PlayerKinematics::default());
        game.player_mut("shooter").unwrap().set_latency(Duration::from_millis(500));

        // Warm up the target's position trace; with no input applied its
        // position stays put across these ticks.
        for _ in 0..3 {
            game.step(1.0 / 60.0, Instant::now());
        }

        let shot = MuzzleShot { position: Vec2::new(10.0, 0.0), velocity: Vec2::new(1000.0, 0.0), hit_mass: 1.0, buckshot: 1 };
        game.fire_shot("shooter", shot, -1, crate::color::Color::new(255, 255, 0, 255), Instant::now());

        assert_eq!(game.instant_kicks.active_count(), 1);
        assert_eq!(game.adjustment_boxes.active_count(), 1);
    }

    #[test]
    fn firing_without_latency_does_not_spawn_lag_compensation_entities() {
        let mut game = Game::new(Vec2::ZERO, 60);
        game.spawn_player("shooter", Vec2::new(40.0, 80.0), Vec2::ZERO, PlayerKinematics::default());
        game.spawn_player("target", Vec2::new(40.0, 80.0), Vec2::new(60.0, 0.0), PlayerKinematics::default());

        let shot = MuzzleShot { position: Vec2::new(10.0, 0.0), velocity: Vec2::new(1000.0, 0.0), hit_mass: 1.0, buckshot: 1 };
        game.fire_shot("shooter", shot, -1, crate::color::Color::new(255, 255, 0, 255), Instant::now());

        assert_eq!(game.instant_kicks.active_count(), 0);
        assert_eq!(game.adjustment_boxes.active_count(), 0);
    }
}
