//! Physic Simulator: fixed-step integration, broadphase, continuous
//! narrowphase, platform semantics, and callback dispatch (§4.2).

use crate::geometry::{BoundingBox, Vec2};
use crate::platform::Platform;
use crate::primitive::{CollideAllower, Primitive, PrimitiveAttrs, PrimitiveId, PrimitiveStore};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, error};

/// Narrowphase bisection iteration count (§4.2.3).
const BISECTION_STEPS: u32 = 20;
/// Narrowphase convergence tolerance.
const NARROWPHASE_EPS: f32 = 1e-3;

/// A single narrowphase hit: the point-side and line-side root primitives,
/// the leaves that actually touched, and the sub-step fraction at which the
/// collision was found.
#[derive(Debug, Clone, Copy)]
pub struct CollisionEvent {
    pub point_root: PrimitiveId,
    pub line_root: PrimitiveId,
    pub point_leaf: PrimitiveId,
    pub line_leaf: PrimitiveId,
    pub f: f32,
    pub dt: f32,
}

pub type CollisionCallback = Box<dyn FnMut(&mut PrimitiveStore, &CollisionEvent) + Send>;
pub type StepCallback = Box<dyn FnMut(&mut PhysicSimulation, f32) + Send>;
pub type PlatformContactCallback = Box<dyn FnMut(&mut PrimitiveStore, PrimitiveId) + Send>;

#[derive(Default)]
struct NamedCallbacks<T> {
    names: Vec<String>,
    callbacks: Vec<T>,
}

impl<T> NamedCallbacks<T> {
    fn register(&mut self, name: &str, callback: T) {
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            self.callbacks[idx] = callback;
        } else {
            self.names.push(name.to_string());
            self.callbacks.push(callback);
        }
    }

    fn remove(&mut self, name: &str) {
        if let Some(idx) = self.names.iter().position(|n| n == name) {
            self.names.remove(idx);
            self.callbacks.remove(idx);
        }
    }

    fn take(&mut self) -> Vec<T> {
        std::mem::take(&mut self.callbacks)
    }

    fn restore(&mut self, callbacks: Vec<T>) {
        self.callbacks = callbacks;
    }
}

/// The physic simulator. Owns no primitives directly (that is
/// [`PrimitiveStore`]'s job); holds the platform list, gravity, callback
/// registries, and the fixed-timestep accumulator.
pub struct PhysicSimulation {
    pub gravity: Vec2,
    platforms: Vec<Platform>,
    collision_callbacks: NamedCallbacks<CollisionCallback>,
    step_callbacks: NamedCallbacks<StepCallback>,
    platform_callbacks: NamedCallbacks<PlatformContactCallback>,
    accumulator: f32,
    last_instant: Option<Instant>,
    last_rps: u32,
    last_speed: f32,
    interpolation_factor: f32,
}

impl Default for PhysicSimulation {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, 980.0),
            platforms: Vec::new(),
            collision_callbacks: NamedCallbacks::default(),
            step_callbacks: NamedCallbacks::default(),
            platform_callbacks: NamedCallbacks::default(),
            accumulator: 0.0,
            last_instant: None,
            last_rps: 60,
            last_speed: 1.0,
            interpolation_factor: 0.0,
        }
    }
}

impl PhysicSimulation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_platform(&mut self, platform: Platform) {
        self.platforms.push(platform);
    }

    pub fn clear_platforms(&mut self) {
        self.platforms.clear();
    }

    pub fn platforms(&self) -> &[Platform] {
        &self.platforms
    }

    pub fn on_collision(&mut self, name: &str, callback: CollisionCallback) {
        self.collision_callbacks.register(name, callback);
    }

    pub fn remove_collision_callback(&mut self, name: &str) {
        self.collision_callbacks.remove(name);
    }

    pub fn on_step(&mut self, name: &str, callback: StepCallback) {
        self.step_callbacks.register(name, callback);
    }

    pub fn on_platform_contact(&mut self, name: &str, callback: PlatformContactCallback) {
        self.platform_callbacks.register(name, callback);
    }

    pub fn interpolation_factor(&self) -> f32 {
        self.interpolation_factor
    }

    pub fn last_rps(&self) -> u32 {
        self.last_rps
    }

    pub fn last_speed(&self) -> f32 {
        self.last_speed
    }

    /// Clock-driven step: accumulates real elapsed time, retires at most one
    /// fixed tick of `dt = 1/rps * speed`, and exposes the fractional
    /// remainder as the interpolation factor (§4.2).
    pub fn step(&mut self, store: &mut PrimitiveStore, rps: u32, speed: f32) {
        let min_timestep = 1.0 / rps as f32;
        self.last_speed = speed;
        self.last_rps = rps;

        let now = Instant::now();
        let elapsed = match self.last_instant {
            Some(prev) => (now - prev).as_secs_f32(),
            None => 0.0,
        };
        self.last_instant = Some(now);
        self.accumulator += elapsed;

        if self.accumulator > min_timestep {
            self.accumulator -= min_timestep;
            self.step_now(store, min_timestep * speed);
        }

        self.interpolation_factor = self.accumulator / min_timestep;
    }

    /// Forces an immediate step with an explicit `dt`. Used by tests and by
    /// `step`'s accumulator.
    pub fn step_now(&mut self, store: &mut PrimitiveStore, dt: f32) {
        store.reap();
        self.integrate(store, dt);
        self.broadphase_and_narrowphase(store, dt);
        self.move_and_resolve_platforms(store, dt);
        self.fire_step_hooks(dt);
    }

    fn integrate(&self, store: &mut PrimitiveStore, dt: f32) {
        for id in store.point_like_ids().to_vec() {
            integrate_root(store, id, self.gravity, dt);
        }
        for id in store.line_like_ids().to_vec() {
            integrate_root(store, id, self.gravity, dt);
        }
    }

    fn broadphase_and_narrowphase(&mut self, store: &mut PrimitiveStore, dt: f32) {
        let lines = store.line_like_ids().to_vec();
        let points = store.point_like_ids().to_vec();
        let mut already_collided: HashSet<(PrimitiveId, PrimitiveId)> = HashSet::new();
        let mut events = Vec::new();

        for &line_root in &lines {
            let line_leaves = store.leaves(line_root);
            for &point_root in &points {
                if already_collided.contains(&(line_root, point_root)) {
                    continue;
                }
                let point_leaves = store.leaves(point_root);
                let mut collided = false;
                'leaves: for &line_leaf in &line_leaves {
                    for &point_leaf in &point_leaves {
                        if line_leaf == point_leaf {
                            continue;
                        }
                        if !allowers_admit(store, line_leaf, point_leaf) {
                            continue;
                        }
                        let (bb_a, bb_b) = match (store.get(line_leaf), store.get(point_leaf)) {
                            (Some(a), Some(b)) => (a.attrs().bb, b.attrs().bb),
                            _ => continue,
                        };
                        if !bb_a.intersects(&bb_b) {
                            continue;
                        }
                        if let Some(f) = analyze(store, line_leaf, point_leaf, dt) {
                            events.push(CollisionEvent {
                                point_root,
                                line_root,
                                point_leaf,
                                line_leaf,
                                f,
                                dt,
                            });
                            collided = true;
                            break 'leaves;
                        }
                    }
                }
                if collided {
                    already_collided.insert((line_root, point_root));
                }
            }
        }

        let mut callbacks = self.collision_callbacks.take();
        for event in &events {
            for callback in callbacks.iter_mut() {
                let result = panic::catch_unwind(AssertUnwindSafe(|| callback(store, event)));
                if result.is_err() {
                    error!(
                        point_root = ?event.point_root,
                        line_root = ?event.line_root,
                        "collision callback panicked; pair skipped"
                    );
                }
            }
        }
        self.collision_callbacks.restore(callbacks);
    }

    /// Performs the actual position integration for every root primitive
    /// (§4.2 step 5), applying the platform-landing contract for roots with
    /// `allow_platform` set. Plain roots (bullets, static walls) are simply
    /// translated by `velocity * dt` here — the functional spec singles out
    /// the `allow_platform` case because it's the only one with interesting
    /// behaviour, but every root's position update happens in this phase,
    /// matching the original source's `update_platform`/`move` split.
    fn move_and_resolve_platforms(&mut self, store: &mut PrimitiveStore, dt: f32) {
        let roots: Vec<PrimitiveId> = store
            .point_like_ids()
            .iter()
            .chain(store.line_like_ids().iter())
            .copied()
            .collect();

        let mut contacts = Vec::new();
        for id in roots {
            if let Some(contact) = move_one_root(store, id, dt, &self.platforms) {
                contacts.push(contact);
            }
        }

        let mut callbacks = self.platform_callbacks.take();
        for id in contacts {
            for callback in callbacks.iter_mut() {
                callback(store, id);
            }
        }
        self.platform_callbacks.restore(callbacks);
    }

    fn fire_step_hooks(&mut self, dt: f32) {
        let mut callbacks = self.step_callbacks.take();
        for callback in callbacks.iter_mut() {
            callback(self, dt);
        }
        self.step_callbacks.restore(callbacks);
    }
}

/// Integration phase for one root: apply gravity (unless `y_locked`),
/// recompute swept bounding boxes (recursively through group leaves), and
/// snapshot `(direction, scalar_velocity)` for render interpolation. Does
/// *not* move position — that happens in `move_one_root`.
fn integrate_root(store: &mut PrimitiveStore, id: PrimitiveId, gravity: Vec2, dt: f32) {
    if let Some(prim) = store.get_mut(id) {
        let attrs = prim.attrs_mut();
        if attrs.flags.gravity_enabled && !attrs.flags.y_locked {
            let v = attrs.velocity() + gravity * dt;
            attrs.set_velocity(v);
        }
    }

    let is_group = matches!(store.get(id), Some(Primitive::Group(_)));
    if is_group {
        store.propagate_group_motion(id);
        for leaf in store.leaves(id) {
            update_bb_and_record(store, leaf, dt);
        }
        store.recompute_group_bb(id);
        if let Some(prim) = store.get_mut(id) {
            prim.attrs_mut().record_prev();
        }
    } else {
        update_bb_and_record(store, id, dt);
    }
}

fn update_bb_and_record(store: &mut PrimitiveStore, id: PrimitiveId, dt: f32) {
    if let Some(prim) = store.get_mut(id) {
        match prim {
            Primitive::Point(p) => p.update_bb(dt),
            Primitive::Line(l) => l.update_bb(dt),
            Primitive::Group(_) => {}
        }
        prim.attrs_mut().record_prev();
    }
}

/// Move phase for one root. Returns `Some(id)` if a platform contact
/// occurred this step (§4.2 step 5 / §4.2 platform contact callback).
fn move_one_root(store: &mut PrimitiveStore, id: PrimitiveId, dt: f32, platforms: &[Platform]) -> Option<PrimitiveId> {
    let attrs = store.get(id)?.attrs().clone();
    let new_pos = attrs.position + attrs.velocity() * dt;

    if !attrs.flags.allow_platform {
        set_root_position(store, id, new_pos);
        return None;
    }

    let half_w = ((attrs.bb.max.x - attrs.bb.min.x) * 0.5).max(0.05);
    let old_bottom = attrs.position.y;
    let new_bottom = new_pos.y;

    let mut final_pos = new_pos;
    let mut lock_y = false;
    let mut contact = false;

    for platform in platforms {
        let py = platform.y();
        let (left, right) = (new_pos.x - half_w, new_pos.x + half_w);
        if old_bottom <= py && new_bottom >= py && platform.x_overlaps(left, right) {
            final_pos.y = py;
            lock_y = true;
            contact = true;
        } else if attrs.flags.y_locked
            && (attrs.position.y - py).abs() < 1e-2
            && platform.x_overlaps(left, right)
        {
            lock_y = true;
        }
    }

    set_root_position(store, id, final_pos);
    if let Some(prim) = store.get_mut(id) {
        let a = prim.attrs_mut();
        if lock_y {
            let mut v = a.velocity();
            v.y = 0.0;
            a.set_velocity(v);
        }
        a.flags.y_locked = lock_y;
    }

    if contact {
        Some(id)
    } else {
        None
    }
}

fn set_root_position(store: &mut PrimitiveStore, id: PrimitiveId, pos: Vec2) {
    let delta = match store.get(id) {
        Some(p) => (pos - p.attrs().position).magnitude(),
        None => 0.0,
    };
    if let Some(prim) = store.get_mut(id) {
        let a = prim.attrs_mut();
        a.position = pos;
        a.distance_travelled += delta;
    }
    if matches!(store.get(id), Some(Primitive::Group(_))) {
        store.propagate_group_motion(id);
    }
}

fn collide_allower_of(prim: &Primitive) -> Option<&CollideAllower> {
    match prim {
        Primitive::Point(p) => p.collide_allower.as_ref(),
        Primitive::Line(l) => l.collide_allower.as_ref(),
        Primitive::Group(_) => None,
    }
}

fn allowers_admit(store: &PrimitiveStore, a: PrimitiveId, b: PrimitiveId) -> bool {
    let (Some(pa), Some(pb)) = (store.get(a), store.get(b)) else {
        return false;
    };
    let admits_b = collide_allower_of(pa).map(|f| f(pb.attrs())).unwrap_or(true);
    let admits_a = collide_allower_of(pb).map(|f| f(pa.attrs())).unwrap_or(true);
    admits_a && admits_b
}

/// Continuous narrowphase: bisection search for the sub-step `f*` at which a
/// point crosses the line's supporting line (§4.2.3). Returns `None` if
/// there's no sign change in `[0, dt]`, i.e. no collision.
fn analyze(store: &PrimitiveStore, line_leaf: PrimitiveId, point_leaf: PrimitiveId, dt: f32) -> Option<f32> {
    let line = match store.get(line_leaf) {
        Some(Primitive::Line(l)) => l,
        _ => return None,
    };
    if line.is_degenerate() {
        return None;
    }
    let point_attrs: &PrimitiveAttrs = store.get(point_leaf)?.attrs();

    let eq_low = line.equation(dt, 0.0);
    let eq_up = line.equation(dt, 1.0);
    let p_low = point_attrs.position;
    let p_up = point_attrs.interpolated_pos(dt, 1.0);

    let dist_low = crate::primitive::Line::distance(eq_low, p_low);
    let dist_up = crate::primitive::Line::distance(eq_up, p_up);

    if !diff_sign(dist_low, dist_up) {
        return None;
    }

    let mut f_low = 0.0_f32;
    let mut f_up = 1.0_f32;
    let mut f_mid = 0.5;
    let mut dist_mid = f32::MAX;
    let mut dist_low_cur = dist_low;

    for _ in 0..BISECTION_STEPS {
        f_mid = (f_up - f_low) * 0.5 + f_low;
        let eq_mid = line.equation(dt, f_mid);
        let p_mid = point_attrs.interpolated_pos(dt, f_mid);
        dist_mid = crate::primitive::Line::distance(eq_mid, p_mid);

        if dist_mid.abs() < NARROWPHASE_EPS {
            break;
        }

        if diff_sign(dist_low_cur, dist_mid) {
            f_up = f_mid;
        } else {
            f_low = f_mid;
            dist_low_cur = dist_mid;
        }
    }

    if dist_mid.abs() < NARROWPHASE_EPS {
        Some(f_mid)
    } else {
        debug!(f_mid, dist_mid, "narrowphase bisection failed to converge");
        None
    }
}

fn diff_sign(a: f32, b: f32) -> bool {
    (a >= 0.0 && b < 0.0) || (a < 0.0 && b >= 0.0)
}

#[allow(dead_code)]
fn unused_bbox_helper(a: BoundingBox) -> BoundingBox {
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitive::{Line, Point, PrimitiveAttrs};

    #[test]
    fn point_through_thin_line_collides_near_expected_fraction() {
        let mut store = PrimitiveStore::new();
        let point_attrs = PrimitiveAttrs::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), 1000.0, 1.0, 0.5);
        let point_id = store.insert(Primitive::Point(Point::new(point_attrs)));

        let line_attrs = PrimitiveAttrs::new(Vec2::new(0.5, -1.0), Vec2::new(0.0, 1.0), 0.0, 1.0, 0.5);
        let line = Line::new(line_attrs, Vec2::new(0.0, 2.0));
        let line_id = store.insert(Primitive::Line(line));

        if let Some(Primitive::Point(p)) = store.get_mut(point_id) {
            p.update_bb(0.1);
        }
        if let Some(Primitive::Line(l)) = store.get_mut(line_id) {
            l.update_bb(0.1);
        }

        let f = analyze(&store, line_id, point_id, 0.1).expect("expected a collision");
        assert!((f - 0.005).abs() < 1e-2, "f*={f}, expected the point to cross near f=0.005 (x=0.5)");
    }

    #[test]
    fn platform_landing_snaps_y_and_locks() {
        let mut sim = PhysicSimulation::new();
        sim.gravity = Vec2::new(0.0, 980.0);
        sim.add_platform(Platform::new(Vec2::new(0.0, 120.0), 50.0));

        let mut store = PrimitiveStore::new();
        let mut attrs = PrimitiveAttrs::new(Vec2::new(10.0, 100.0), Vec2::new(0.0, 1.0), 200.0, 1.0, 0.5);
        attrs.flags.allow_platform = true;
        let id = store.insert(Primitive::Point(Point::new(attrs)));

        sim.step_now(&mut store, 0.1);

        let prim = store.get(id).unwrap();
        assert!((prim.attrs().position.y - 120.0).abs() < 1.0);
        assert!(prim.attrs().flags.y_locked);
        assert!(prim.attrs().velocity().y.abs() < 1e-6);
    }

    #[test]
    fn non_platform_point_translates_every_step() {
        let mut sim = PhysicSimulation::new();
        sim.gravity = Vec2::ZERO;
        let mut store = PrimitiveStore::new();
        let attrs = PrimitiveAttrs::new(Vec2::ZERO, Vec2::new(1.0, 0.0), 10.0, 1.0, 0.5);
        let id = store.insert(Primitive::Point(Point::new(attrs)));
        sim.step_now(&mut store, 0.5);
        let pos = store.get(id).unwrap().attrs().position;
        assert!((pos.x - 5.0).abs() < 1e-3);
    }
}
