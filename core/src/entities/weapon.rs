//! Gun metrics and the per-player weapon slot (§3 Weapon / Gun metrics,
//! §4.3 Weapon). Grounded in `weapon.hpp`/`weapon_instance`: ammo tracking,
//! fire cadence, and reload state, stripped of rendering/animation.

use crate::geometry::Vec2;

/// Tier-to-muzzle-speed table, carried over from `weapon::tier_to_bullet_vel`.
pub fn tier_to_bullet_speed(tier: u32) -> f32 {
    match tier {
        0 => 1200.0,
        1 => 1500.0,
        2 => 1800.0,
        3 => 2100.0,
        _ => 1500.0,
    }
}

/// Static metrics for a gun model, loaded once from configuration and
/// shared by every instance of that model (mirrors `weapon` vs.
/// `weapon_instance` in the original source).
#[derive(Debug, Clone)]
pub struct GunMetrics {
    pub hit_mass: f32,
    pub dispersion: f32,
    pub fire_rate_rpm: f32,
    pub recoil: f32,
    pub buckshot: u32,
    pub mag_size: u32,
    pub bullet_velocity_tier: u32,
    pub barrel_offset: Vec2,
}

impl GunMetrics {
    pub fn bullet_speed(&self) -> f32 {
        tier_to_bullet_speed(self.bullet_velocity_tier)
    }

    fn fire_interval(&self) -> f32 {
        60.0 / self.fire_rate_rpm
    }
}

/// The muzzle kinematics reported by a successful `try_fire`.
#[derive(Debug, Clone, Copy)]
pub struct MuzzleShot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub hit_mass: f32,
    pub buckshot: u32,
}

/// A weapon instance held by a player: ammo state layered over shared
/// [`GunMetrics`] (§4.3 Weapon).
pub struct WeaponInstance {
    metrics: GunMetrics,
    ammo: u32,
    reloading: bool,
    reload_elapsed: f32,
    reload_duration: f32,
    cadence_elapsed: f32,
    trigger_held: bool,
}

impl WeaponInstance {
    pub fn new(metrics: GunMetrics, reload_duration: f32) -> Self {
        let ammo = metrics.mag_size;
        Self {
            metrics,
            ammo,
            reloading: false,
            reload_elapsed: 0.0,
            reload_duration,
            cadence_elapsed: f32::MAX,
            trigger_held: false,
        }
    }

    pub fn metrics(&self) -> &GunMetrics {
        &self.metrics
    }

    pub fn ammo(&self) -> u32 {
        self.ammo
    }

    pub fn set_ammo(&mut self, ammo: u32) {
        self.ammo = ammo.min(self.metrics.mag_size);
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading
    }

    pub fn pull_trigger(&mut self) {
        self.trigger_held = true;
    }

    pub fn relax_trigger(&mut self) {
        self.trigger_held = false;
    }

    pub fn on_shot(&self) -> bool {
        self.trigger_held
    }

    /// Advances cadence and reload timers by `dt` (§4.3 Weapon).
    pub fn update(&mut self, dt: f32) {
        self.cadence_elapsed += dt;
        if self.reloading {
            self.reload_elapsed += dt;
            if self.reload_elapsed >= self.reload_duration {
                self.ammo = self.metrics.mag_size;
                self.reloading = false;
                self.reload_elapsed = 0.0;
            }
        }
    }

    /// Reports muzzle kinematics if cadence and ammo allow a shot right now,
    /// consuming one round and resetting the cadence timer. Starts a reload
    /// when the magazine just emptied. Never perturbs direction for
    /// dispersion — that's the caller's job (§4.3 Weapon).
    pub fn try_fire(&mut self, group_position: Vec2, facing: Vec2) -> Option<MuzzleShot> {
        if self.reloading {
            return None;
        }
        if self.ammo == 0 {
            self.reloading = true;
            self.reload_elapsed = 0.0;
            return None;
        }
        if self.cadence_elapsed < self.metrics.fire_interval() {
            return None;
        }

        self.cadence_elapsed = 0.0;
        self.ammo -= 1;
        if self.ammo == 0 {
            self.reloading = true;
            self.reload_elapsed = 0.0;
        }

        let barrel = Vec2::new(
            if facing.x < 0.0 { -self.metrics.barrel_offset.x } else { self.metrics.barrel_offset.x },
            self.metrics.barrel_offset.y,
        );

        Some(MuzzleShot {
            position: group_position + barrel,
            velocity: facing * self.metrics.bullet_speed(),
            hit_mass: self.metrics.hit_mass,
            buckshot: self.metrics.buckshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_metrics() -> GunMetrics {
        GunMetrics {
            hit_mass: 1.0,
            dispersion: 0.05,
            fire_rate_rpm: 600.0,
            recoil: 10.0,
            buckshot: 1,
            mag_size: 2,
            bullet_velocity_tier: 1,
            barrel_offset: Vec2::new(20.0, -5.0),
        }
    }

    #[test]
    fn empty_magazine_starts_reload_instead_of_firing() {
        let mut w = WeaponInstance::new(test_metrics(), 1.5);
        w.set_ammo(1);
        assert!(w.try_fire(Vec2::ZERO, Vec2::new(1.0, 0.0)).is_some());
        assert_eq!(w.ammo(), 0);
        assert!(w.is_reloading());
        assert!(w.try_fire(Vec2::ZERO, Vec2::new(1.0, 0.0)).is_none());
    }

    #[test]
    fn reload_completes_after_duration_elapses() {
        let mut w = WeaponInstance::new(test_metrics(), 1.0);
        w.set_ammo(0);
        assert!(w.try_fire(Vec2::ZERO, Vec2::new(1.0, 0.0)).is_none());
        assert!(w.is_reloading());
        w.update(1.1);
        assert!(!w.is_reloading());
        assert_eq!(w.ammo(), w.metrics().mag_size);
    }

    #[test]
    fn cadence_gate_blocks_rapid_refire() {
        let mut w = WeaponInstance::new(test_metrics(), 1.5);
        assert!(w.try_fire(Vec2::ZERO, Vec2::new(1.0, 0.0)).is_some());
        assert!(w.try_fire(Vec2::ZERO, Vec2::new(1.0, 0.0)).is_none());
    }
}
