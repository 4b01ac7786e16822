//! Player entity (§3 Player, §4.3 Player). Grounded in `player.hpp`'s
//! `player` class: the collision group shape, the fixed-step acceleration
//! ramp / friction model, jump bookkeeping, and the position trace used for
//! lag compensation, all stripped of sprite/animation state.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::color::Color;
use crate::geometry::Vec2;
use crate::primitive::{Group, Line, Primitive, PrimitiveAttrs, PrimitiveId, PrimitiveStore, TAG_PLAYER};

use super::weapon::WeaponInstance;

/// Maximum age, in seconds, of a retained position-trace sample (§3
/// invariant 5).
const POSITION_TRACE_MAX_AGE: f32 = 5.0;
/// Hard cap on trace length regardless of age, matching the original
/// source's `_position_trace.size() > 300` bound.
const POSITION_TRACE_MAX_LEN: usize = 300;

const Y_DEATH_PLANE: f32 = 2100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub move_left: bool,
    pub move_right: bool,
    pub fire: bool,
    pub jump: bool,
    pub jump_down: bool,
    pub y_locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingDir {
    Left,
    Right,
}

/// One sample in the lag-compensation position trace.
#[derive(Debug, Clone, Copy)]
struct TraceSample {
    at: Instant,
    position: Vec2,
}

/// A player's tunable kinematics, loaded from configuration (§3 Player
/// configuration carries the cosmetic half; these are the physical half).
#[derive(Debug, Clone)]
pub struct PlayerKinematics {
    pub max_speed: f32,
    pub x_accel: f32,
    pub x_slowdown: f32,
    pub jump_speed: f32,
    pub accel_ramp_seconds: f32,
    pub max_jumps: u32,
}

impl Default for PlayerKinematics {
    fn default() -> Self {
        Self {
            max_speed: 280.0,
            x_accel: 2250.0,
            x_slowdown: 700.0,
            jump_speed: 620.0,
            accel_ramp_seconds: 0.5,
            max_jumps: 1,
        }
    }
}

pub struct Player {
    id: u32,
    collision_box: PrimitiveId,
    size: Vec2,
    kinematics: PlayerKinematics,

    weapon: Option<WeaponInstance>,
    facing: FacingDir,

    input: InputState,
    jump_held: bool,
    jump_down_held: bool,
    cur_accel_l: f32,
    cur_accel_r: f32,
    accel_ramp_factor: f32,
    accel_ramp_from_left: bool,

    jumps_left: u32,

    group: i32,
    deaths: u32,
    evt_counter: u64,
    on_hit_event: bool,
    tracer_colour: Color,
    /// Half-RTT to this player's connection, fed in from the server's
    /// `RttTracker` and used to size the lag-compensation offset when
    /// resolving a *different* shooter's hit against this player.
    latency: Duration,

    position_trace: VecDeque<TraceSample>,
}

impl Player {
    /// Builds the player's four-line rectangular collision group and
    /// registers it as a root primitive (§3 Player, `player::player`
    /// constructor).
    pub fn spawn(
        store: &mut PrimitiveStore,
        id: u32,
        size: Vec2,
        position: Vec2,
        kinematics: PlayerKinematics,
    ) -> Self {
        let mut group_attrs = PrimitiveAttrs::new(position, Vec2::new(1.0, 0.0), 0.0, 1.0, 0.0);
        group_attrs.flags.gravity_enabled = true;
        group_attrs.flags.allow_platform = true;
        group_attrs.user_tag = TAG_PLAYER;

        let collision_box = store.insert(Primitive::Group(Group::new(group_attrs)));

        let corners = [
            (Vec2::new(0.0, 0.0), Vec2::new(0.0, -size.y)),
            (Vec2::new(0.0, -size.y), Vec2::new(size.x, 0.0)),
            (Vec2::new(size.x, -size.y), Vec2::new(0.0, size.y)),
            (Vec2::new(size.x, 0.0), Vec2::new(-size.x, 0.0)),
        ];
        for (offset, displacement) in corners {
            let line_attrs = PrimitiveAttrs::new(Vec2::ZERO, Vec2::new(1.0, 0.0), 0.0, 1.0, 0.0);
            let line = Line::new(line_attrs, displacement);
            store.attach_child(collision_box, Primitive::Line(line), offset);
        }

        let jumps_left = kinematics.max_jumps;

        Self {
            id,
            collision_box,
            size,
            kinematics,
            weapon: None,
            facing: FacingDir::Right,
            input: InputState::default(),
            jump_held: false,
            jump_down_held: false,
            cur_accel_l: 0.0,
            cur_accel_r: 0.0,
            accel_ramp_factor: 1.0,
            accel_ramp_from_left: false,
            jumps_left,
            group: -1,
            deaths: 0,
            evt_counter: 0,
            on_hit_event: false,
            tracer_colour: Color::new(255, 255, 0, 255),
            latency: Duration::ZERO,
            position_trace: VecDeque::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn collision_box(&self) -> PrimitiveId {
        self.collision_box
    }

    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn kinematics(&self) -> &PlayerKinematics {
        &self.kinematics
    }

    pub fn position(&self, store: &PrimitiveStore) -> Vec2 {
        store.get(self.collision_box).map(|p| p.attrs().position).unwrap_or_default()
    }

    pub fn velocity(&self, store: &PrimitiveStore) -> Vec2 {
        store.get(self.collision_box).map(|p| p.attrs().velocity()).unwrap_or_default()
    }

    pub fn facing(&self) -> FacingDir {
        self.facing
    }

    pub fn weapon(&self) -> Option<&WeaponInstance> {
        self.weapon.as_ref()
    }

    pub fn weapon_mut(&mut self) -> Option<&mut WeaponInstance> {
        self.weapon.as_mut()
    }

    pub fn equip(&mut self, weapon: WeaponInstance) {
        self.weapon = Some(weapon);
    }

    pub fn group(&self) -> i32 {
        self.group
    }

    pub fn set_group(&mut self, group: i32, store: &mut PrimitiveStore) {
        self.group = group;
        if let Some(prim) = store.get_mut(self.collision_box) {
            prim.attrs_mut().group = group;
        }
        store.propagate_group_motion(self.collision_box);
    }

    pub fn deaths(&self) -> u32 {
        self.deaths
    }

    pub fn increase_deaths(&mut self) {
        self.deaths += 1;
    }

    pub fn evt_counter(&self) -> u64 {
        self.evt_counter
    }

    pub fn set_evt_counter(&mut self, value: u64) {
        self.evt_counter = value;
    }

    pub fn increment_evt_counter(&mut self) {
        self.evt_counter += 1;
    }

    pub fn tracer_colour(&self) -> Color {
        self.tracer_colour
    }

    pub fn set_tracer_colour(&mut self, colour: Color) {
        self.tracer_colour = colour;
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn set_latency(&mut self, latency: Duration) {
        self.latency = latency;
    }

    pub fn set_on_hit_event(&mut self) {
        self.on_hit_event = true;
    }

    pub fn pop_on_hit_event(&mut self) -> bool {
        std::mem::take(&mut self.on_hit_event)
    }

    pub fn is_y_locked(&self, store: &PrimitiveStore) -> bool {
        store.get(self.collision_box).map(|p| p.attrs().flags.y_locked).unwrap_or(false)
    }

    /// Jumps available right now, matching `get_available_jumps`: while
    /// grounded, one extra jump is always reported since landing resets
    /// the counter on the *next* jump press rather than immediately.
    pub fn available_jumps(&self, store: &PrimitiveStore) -> u32 {
        if self.is_y_locked(store) {
            self.jumps_left + 1
        } else {
            self.jumps_left
        }
    }

    pub fn reset_jumps(&mut self) {
        self.jumps_left = self.kinematics.max_jumps;
    }

    /// Consumes an input record (§4.3 Player): updates held-key state,
    /// horizontal accel targets, facing, jump edge-triggers, and the
    /// weapon's trigger state.
    pub fn apply_input(&mut self, input: InputState, store: &mut PrimitiveStore) {
        if input.jump && !self.jump_held {
            self.jump(store);
            self.jump_held = true;
        } else if !input.jump {
            self.jump_held = false;
        }

        if input.jump_down && !self.jump_down_held {
            self.jump_down(store);
            self.jump_down_held = true;
        } else if !input.jump_down {
            self.jump_down_held = false;
        }

        if input.move_left {
            self.cur_accel_l = -self.kinematics.x_accel;
            self.facing = FacingDir::Left;
        } else {
            self.cur_accel_l = 0.0;
        }

        if input.move_right {
            self.cur_accel_r = self.kinematics.x_accel;
            self.facing = FacingDir::Right;
        } else {
            self.cur_accel_r = 0.0;
        }

        if let Some(weapon) = self.weapon.as_mut() {
            if input.fire {
                weapon.pull_trigger();
            } else {
                weapon.relax_trigger();
            }
        }

        if let Some(prim) = store.get_mut(self.collision_box) {
            prim.attrs_mut().flags.y_locked = input.y_locked;
        }

        self.input = input;
    }

    pub fn jump(&mut self, store: &mut PrimitiveStore) {
        let y_locked = self.is_y_locked(store);
        if !y_locked && self.jumps_left == 0 {
            return;
        }
        if let Some(prim) = store.get_mut(self.collision_box) {
            let a = prim.attrs_mut();
            let mut v = a.velocity();
            v.y = -self.kinematics.jump_speed;
            a.set_velocity(v);
            if y_locked {
                a.flags.y_locked = false;
            }
        }
        if !y_locked {
            self.jumps_left -= 1;
        }
    }

    pub fn jump_down(&mut self, store: &mut PrimitiveStore) {
        if !self.is_y_locked(store) {
            return;
        }
        if let Some(prim) = store.get_mut(self.collision_box) {
            let a = prim.attrs_mut();
            a.flags.y_locked = false;
            let mut v = a.velocity();
            v.y += 100.0;
            a.set_velocity(v);
        }
    }

    /// One fixed physic step's worth of horizontal acceleration-ramp and
    /// ground-friction update, plus position-trace bookkeeping (§4.3
    /// Player, `player::physic_update`).
    pub fn physic_update(&mut self, store: &mut PrimitiveStore, dt: f32, now: Instant) {
        self.accel_ramp_factor = (self.accel_ramp_factor + dt / self.kinematics.accel_ramp_seconds.max(1e-4)).min(1.0);

        let Some(prim) = store.get_mut(self.collision_box) else {
            return;
        };
        let a = prim.attrs_mut();
        let mut vel = a.velocity();

        let mut accel = 0.0;
        if a.flags.y_locked {
            if vel.x > 0.0 {
                accel = -self.kinematics.x_slowdown;
            } else if vel.x < 0.0 {
                accel = self.kinematics.x_slowdown;
            }
        }

        let ramp_r = if self.accel_ramp_from_left { 1.0 } else { self.accel_ramp_factor };
        let ramp_l = if !self.accel_ramp_from_left { 1.0 } else { self.accel_ramp_factor };

        if vel.x < self.kinematics.max_speed {
            accel += self.cur_accel_r * ramp_r;
        }
        if vel.x > -self.kinematics.max_speed {
            accel += self.cur_accel_l * ramp_l;
        }

        let moving = self.cur_accel_l.abs() > 1e-6 || self.cur_accel_r.abs() > 1e-6;
        let prev_vx = vel.x;
        vel.x += accel * dt;
        if !moving && ((prev_vx < 0.0 && vel.x > 0.0) || (prev_vx > 0.0 && vel.x < 0.0)) {
            vel.x = 0.0;
        }

        a.set_velocity(vel);
        let position = a.position;
        drop(prim);

        self.position_trace.push_back(TraceSample { at: now, position });
        while self.position_trace.len() > POSITION_TRACE_MAX_LEN {
            self.position_trace.pop_front();
        }
        while let Some(front) = self.position_trace.front() {
            if now.duration_since(front.at).as_secs_f32() > POSITION_TRACE_MAX_AGE {
                self.position_trace.pop_front();
            } else {
                break;
            }
        }
    }

    /// Resets the acceleration ramp after a hit lands, biased toward the
    /// direction the bullet pushed from (§4.3 Bullet Manager,
    /// `player::reset_accel_f`).
    pub fn reset_accel_ramp(&mut self, pushed_from_left: bool) {
        self.accel_ramp_factor = 0.0;
        self.accel_ramp_from_left = pushed_from_left;
    }

    /// Death check run as a step callback: a player whose Y has crossed
    /// the death plane is reported so the caller can respawn it (§4.3
    /// Player).
    pub fn past_death_plane(&self, store: &PrimitiveStore) -> bool {
        self.position(store).y > Y_DEATH_PLANE
    }

    /// Teleports the player to `spawn_point` with zero velocity and resets
    /// available jumps (§4.3 Player).
    pub fn respawn_at(&mut self, store: &mut PrimitiveStore, spawn_point: Vec2) {
        if let Some(prim) = store.get_mut(self.collision_box) {
            let a = prim.attrs_mut();
            a.position = spawn_point;
            a.set_velocity(Vec2::ZERO);
            a.flags.y_locked = false;
        }
        store.propagate_group_motion(self.collision_box);
        self.reset_jumps();
        self.position_trace.clear();
    }

    /// Looks up the historical position at `now - latency_offset` by
    /// linear interpolation between the two nearest trace samples (§3
    /// Player position trace, `player::position_trace_lookup`).
    pub fn position_trace_lookup(&self, now: Instant, latency_offset: f32) -> Option<Vec2> {
        let mut iter = self.position_trace.iter().peekable();
        let mut prev: Option<&TraceSample> = None;
        while let Some(sample) = iter.next() {
            let age = now.duration_since(sample.at).as_secs_f32();
            if age < latency_offset {
                return match prev {
                    None => Some(sample.position),
                    Some(before) => {
                        let dist_before = now.duration_since(before.at).as_secs_f32();
                        let dist = age;
                        let f = dist_before / (dist + dist_before).max(1e-6);
                        Some(before.position + (sample.position - before.position) * f)
                    }
                };
            }
            prev = Some(sample);
        }
        None
    }

    pub fn extract_input_state(&self, store: &PrimitiveStore) -> InputState {
        InputState {
            move_left: self.cur_accel_l < 0.0,
            move_right: self.cur_accel_r > 0.0,
            fire: self.weapon.as_ref().map(|w| w.on_shot()).unwrap_or(false),
            jump: self.jump_held,
            jump_down: self.jump_down_held,
            y_locked: self.is_y_locked(store),
        }
    }

    pub fn barrel_position(&self, store: &PrimitiveStore) -> Vec2 {
        let pos = self.position(store);
        match (&self.weapon, self.facing) {
            (Some(weapon), facing) => {
                let facing_vec = if facing == FacingDir::Left { Vec2::new(-1.0, 0.0) } else { Vec2::new(1.0, 0.0) };
                let barrel = weapon.metrics().barrel_offset;
                pos + Vec2::new(if facing_vec.x < 0.0 { -barrel.x } else { barrel.x }, barrel.y)
            }
            (None, _) => pos,
        }
    }
}
