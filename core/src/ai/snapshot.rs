//! Immutable world snapshot handed to AI operators (§4.4 AI Worker).
//! Grounded in `ai_types.hpp`'s `ai_data_t` and friends: a flattened,
//! copy-out view of just enough state for an operator to plan a move and a
//! shot without touching the live simulation.

use std::collections::HashMap;

use crate::geometry::Vec2;

#[derive(Debug, Clone)]
pub struct PlayerSnapshot {
    pub name: String,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub group: i32,
    pub is_y_locked: bool,
    pub on_left: bool,
    pub x_accel: f32,
    pub x_slowdown: f32,
    pub jump_speed: f32,
    pub gun_dispersion: f32,
    pub gun_bullet_vel: f32,
    pub barrel_pos: Vec2,
}

#[derive(Debug, Clone, Copy)]
pub struct BulletSnapshot {
    pub pos: Vec2,
    pub vel: Vec2,
    pub group: i32,
    pub hit_mass: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct PlatformSnapshot {
    pub pos1: Vec2,
    pub pos2: Vec2,
}

#[derive(Debug, Clone, Copy)]
pub struct PhysicSimSnapshot {
    pub gravity: Vec2,
    pub time_speed: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LevelSnapshot {
    pub level_size: Vec2,
    pub platforms_bound_start_x: f32,
    pub platforms_bound_end_x: f32,
}

/// `platform_map[i][j]` is the displacement from platform `i` to platform
/// `j`: zero vertical+horizontal overlap is folded into a pure-Y distance,
/// otherwise it is the nearest-edge-to-nearest-edge displacement. Built once
/// per snapshot by [`build_platform_map`], mirroring
/// `ai_mgr_singleton::rebuild_platform_map`.
pub type PlatformDistanceMap = Vec<Vec<Vec2>>;

#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    pub players: HashMap<String, PlayerSnapshot>,
    pub bullets: Vec<BulletSnapshot>,
    pub platforms: Vec<PlatformSnapshot>,
    pub platform_map: PlatformDistanceMap,
    pub physic_sim: PhysicSimSnapshot,
    pub level: LevelSnapshot,
}

impl Default for PhysicSimSnapshot {
    fn default() -> Self {
        Self { gravity: Vec2::new(0.0, 980.0), time_speed: 1.0 }
    }
}

impl WorldSnapshot {
    pub fn new(
        players: HashMap<String, PlayerSnapshot>,
        bullets: Vec<BulletSnapshot>,
        platforms: Vec<PlatformSnapshot>,
        physic_sim: PhysicSimSnapshot,
    ) -> Self {
        let (platform_map, level) = build_platform_map(&platforms);
        Self { players, bullets, platforms, platform_map, physic_sim, level }
    }
}

/// Computes the pairwise platform distance map and the level's horizontal
/// bounds from a flat platform list.
fn build_platform_map(platforms: &[PlatformSnapshot]) -> (PlatformDistanceMap, LevelSnapshot) {
    let mut bound_start = f32::MAX;
    let mut bound_end = f32::MIN;
    let mut map = vec![vec![Vec2::ZERO; platforms.len()]; platforms.len()];

    for (i, current) in platforms.iter().enumerate() {
        bound_start = bound_start.min(current.pos1.x);
        bound_end = bound_end.max(current.pos2.x);

        for (j, neighbour) in platforms.iter().enumerate() {
            if i == j {
                continue;
            }
            let (cl, cr, cy) = (current.pos1.x, current.pos2.x, current.pos1.y);
            let (nl, nr, ny) = (neighbour.pos1.x, neighbour.pos2.x, neighbour.pos1.y);

            map[i][j] = if (cl <= nr && cr > nl) || (cl < nr && cr >= nl) {
                Vec2::new(0.0, ny - cy)
            } else if cl > nr {
                Vec2::new(nr - cl, ny - cy)
            } else {
                Vec2::new(nl - cr, ny - cy)
            };
        }
    }

    let level = LevelSnapshot {
        level_size: Vec2::new(bound_end - bound_start, 0.0),
        platforms_bound_start_x: bound_start,
        platforms_bound_end_x: bound_end,
    };
    (map, level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_platforms_reduce_to_pure_vertical_distance() {
        let platforms = vec![
            PlatformSnapshot { pos1: Vec2::new(0.0, 100.0), pos2: Vec2::new(100.0, 100.0) },
            PlatformSnapshot { pos1: Vec2::new(50.0, 50.0), pos2: Vec2::new(150.0, 50.0) },
        ];
        let (map, _) = build_platform_map(&platforms);
        assert_eq!(map[0][1], Vec2::new(0.0, -50.0));
    }

    #[test]
    fn disjoint_platforms_use_nearest_edge_displacement() {
        let platforms = vec![
            PlatformSnapshot { pos1: Vec2::new(0.0, 100.0), pos2: Vec2::new(100.0, 100.0) },
            PlatformSnapshot { pos1: Vec2::new(300.0, 50.0), pos2: Vec2::new(400.0, 50.0) },
        ];
        let (map, level) = build_platform_map(&platforms);
        assert_eq!(map[0][1], Vec2::new(200.0, -50.0));
        assert_eq!(level.platforms_bound_start_x, 0.0);
        assert_eq!(level.platforms_bound_end_x, 400.0);
    }
}
