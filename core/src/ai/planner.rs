//! Move and shot planning shared by the native difficulty strategies
//! (§4.4 AI Worker). Grounded in `ai.hpp`'s free functions
//! (`find_platform`, `i_see_you`/`hard_i_see_you`, `ai_move_spec`,
//! `easy_ai_platform_actions`, `dodge_ai`, `hard_shooter`, `pathfinder`).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::geometry::Vec2;

use super::operator::{AiAction, Difficulty};
use super::snapshot::{BulletSnapshot, PlatformSnapshot, PlayerSnapshot, WorldSnapshot};

const FALLING_DIST: f32 = 350.0;

fn overlap(a1: f32, a2: f32, b1: f32, b2: f32) -> bool {
    (a2 > b1 && a1 < b2) || (b2 > a1 && b1 < a2)
}

/// Whether `it` can see `pl`: same group never sees, `hard` additionally
/// accounts for the gun's dispersion cone widening the visible band.
pub fn can_see(it: &PlayerSnapshot, pl: &PlayerSnapshot, level_size_x: f32, difficulty: Difficulty) -> bool {
    if it.group != -1 && it.group == pl.group {
        return false;
    }
    if difficulty != Difficulty::Hard {
        return overlap(it.pos.y, it.pos.y + it.size.y, pl.pos.y, pl.pos.y + pl.size.y);
    }

    if it.gun_dispersion > std::f32::consts::PI {
        return true;
    }
    if (pl.pos.x).abs() - level_size_x > FALLING_DIST {
        return false;
    }
    let disp = it.gun_dispersion * 0.35;
    let x_dist = (pl.pos.x - it.pos.x).abs();
    let y_add = disp.sin() * x_dist;
    overlap(pl.pos.y, pl.pos.y + pl.size.y, it.pos.y - y_add + it.size.y * 0.5, it.pos.y + y_add + it.size.y * 0.5)
}

/// Nearest visible, non-group-mate player, by straight-line distance.
pub fn find_nearest_target<'a>(
    it: &PlayerSnapshot,
    players: impl Iterator<Item = &'a PlayerSnapshot>,
    level_size_x: f32,
    difficulty: Difficulty,
) -> Option<&'a PlayerSnapshot> {
    players
        .filter(|pl| pl.name != it.name && can_see(it, pl, level_size_x, difficulty))
        .min_by(|a, b| {
            let da = (a.pos - it.pos).magnitude_sq();
            let db = (b.pos - it.pos).magnitude_sq();
            da.partial_cmp(&db).unwrap_or(Ordering::Equal)
        })
}

pub fn calc_dist_to_platform(plat: &PlatformSnapshot, pos: Vec2) -> Vec2 {
    if pos.x > plat.pos2.x {
        plat.pos2 - pos
    } else if pos.x < plat.pos1.x {
        plat.pos1 - pos
    } else {
        Vec2::new(0.0, plat.pos1.y - pos.y)
    }
}

/// Local platform context: which platform (if any) a position stands on,
/// could next stand on, and is nearest overall, all as indices into the
/// snapshot's platform list.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformContext {
    pub stand_on: Option<usize>,
    pub can_stand_on: Option<usize>,
    pub nearest: Option<usize>,
}

pub fn find_platform(platforms: &[PlatformSnapshot], pos: Vec2) -> PlatformContext {
    let mut ctx = PlatformContext::default();
    let mut nearest_dist = f32::MAX;

    for (i, plat) in platforms.iter().enumerate() {
        if pos.x > plat.pos1.x && pos.x < plat.pos2.x {
            if (plat.pos1.y - pos.y).abs() < 0.0001 {
                ctx = PlatformContext { stand_on: Some(i), can_stand_on: Some(i), nearest: Some(i) };
                break;
            }
            if plat.pos1.y > pos.y {
                let better = ctx
                    .can_stand_on
                    .map(|c| platforms[c].pos1.y - pos.y > plat.pos1.y - pos.y)
                    .unwrap_or(true);
                if better {
                    ctx.can_stand_on = Some(i);
                }
            }
        }

        let dist = calc_dist_to_platform(plat, pos).magnitude();
        if dist < nearest_dist {
            nearest_dist = dist;
            ctx.nearest = Some(i);
        }
    }
    ctx
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MoveKind {
    None,
    Left,
    Right,
    Stop,
}

/// Priority-merging accumulator for the move planner's sub-goals. Per the
/// documented ordering resolution, ties at equal priority are resolved
/// last-writer-wins: sub-goals are folded in a fixed call order and a later
/// goal's action overwrites an earlier one's at equal priority.
#[derive(Debug, Default)]
pub struct MoveSpec {
    kind: MoveKind,
    priority: i32,
}

impl MoveSpec {
    pub fn update(&mut self, kind_action: AiAction, priority: i32) {
        if priority < self.priority {
            return;
        }
        self.priority = priority;
        self.kind = match kind_action {
            AiAction::MoveLeft => MoveKind::Left,
            AiAction::MoveRight => MoveKind::Right,
            AiAction::Stop => MoveKind::Stop,
            _ => MoveKind::None,
        };
    }

    pub fn into_action(self) -> Option<AiAction> {
        match self.kind {
            MoveKind::Left => Some(AiAction::MoveLeft),
            MoveKind::Right => Some(AiAction::MoveRight),
            MoveKind::Stop => Some(AiAction::Stop),
            MoveKind::None => None,
        }
    }
}

/// Avoid-falling-off-the-platform sub-goal: if the operated player stands on
/// nothing, walk and jump toward the nearest platform; if it stands on one,
/// project its drift under deceleration and reverse course before it walks
/// off the edge.
pub fn platform_avoidance(
    platforms: &[PlatformSnapshot],
    ctx: &PlatformContext,
    player: &PlayerSnapshot,
    move_spec: &mut MoveSpec,
) -> Option<AiAction> {
    if ctx.stand_on.is_none() && ctx.can_stand_on.is_none() {
        let Some(nearest) = ctx.nearest.map(|i| &platforms[i]) else { return None };
        let dist = calc_dist_to_platform(nearest, player.pos);
        move_spec.update(if dist.x < 0.0 { AiAction::MoveLeft } else { AiAction::MoveRight }, 200);
        if dist.y < 0.0 && player.vel.y > -0.001 {
            return Some(AiAction::Jump);
        }
        return None;
    }

    let project = |x: f32, v0: f32, a: f32| {
        let t = v0 / a;
        x + v0 * t + a * t * t * 0.5
    };

    if player.vel.x > 0.0 {
        let light = project(player.pos.x, player.vel.x, player.x_slowdown + player.x_accel * 0.2);
        if find_platform(platforms, Vec2::new(light, player.pos.y)).can_stand_on.is_none() {
            let hard_stop = project(player.pos.x, player.vel.x, player.x_slowdown + player.x_accel);
            let still_falls = find_platform(platforms, Vec2::new(hard_stop, player.pos.y)).can_stand_on.is_none();
            move_spec.update(AiAction::MoveLeft, 100);
            if still_falls && player.vel.y > -0.001 {
                return Some(AiAction::Jump);
            }
        }
    } else if player.vel.x < 0.0 {
        let light = project(player.pos.x, player.vel.x, -(player.x_slowdown + player.x_accel * 0.2));
        if find_platform(platforms, Vec2::new(light, player.pos.y)).can_stand_on.is_none() {
            let hard_stop = project(player.pos.x, player.vel.x, -player.x_slowdown - player.x_accel);
            let still_falls = find_platform(platforms, Vec2::new(hard_stop, player.pos.y)).can_stand_on.is_none();
            move_spec.update(AiAction::MoveRight, 100);
            if still_falls && player.vel.y > -0.001 {
                return Some(AiAction::Jump);
            }
        }
    }
    None
}

/// Bullets on a collision course with `player` within `timeshift` seconds.
pub fn find_dangerous_bullets<'a>(
    bullets: &'a [BulletSnapshot],
    player: &PlayerSnapshot,
    timeshift: f32,
) -> Vec<&'a BulletSnapshot> {
    bullets
        .iter()
        .filter(|bl| {
            if bl.pos.y > player.pos.y || bl.pos.y < player.pos.y - player.size.y {
                return false;
            }
            if bl.group != -1 && bl.group == player.group {
                return false;
            }
            let dist_x = player.pos.x - bl.pos.x;
            if !((bl.vel.x > 0.0 && dist_x > 0.0) || (bl.vel.x < 0.0 && dist_x < 0.0)) {
                return false;
            }
            let time = dist_x / (bl.vel.x - player.vel.x);
            time < bl.vel.x.abs() * 0.00013 + timeshift
        })
        .collect()
}

/// Dodge sub-goal for `medium`/`hard`: a chance-gated micro-jump on medium,
/// a jump chosen only if it reduces net incoming bullet momentum on hard.
pub fn dodge(
    bullets: &[BulletSnapshot],
    player: &PlayerSnapshot,
    gravity: Vec2,
    difficulty: Difficulty,
) -> Option<AiAction> {
    if difficulty == Difficulty::Easy {
        return None;
    }

    if difficulty == Difficulty::Medium {
        if (player.pos.x.abs() as u32) % 12 != 0 {
            return None;
        }
        for bl in bullets {
            if bl.pos.y > player.pos.y || bl.pos.y < player.pos.y - player.size.y {
                continue;
            }
            if bl.group != -1 && bl.group == player.group {
                continue;
            }
            let dist_x = player.pos.x - bl.pos.x;
            if (bl.vel.x > 0.0 && dist_x > 0.0) || (bl.vel.x < 0.0 && dist_x < 0.0) {
                let time = dist_x / (bl.vel.x - player.vel.x);
                if time < 0.2 && player.vel.y > -0.001 {
                    return Some(AiAction::Jump);
                }
            }
        }
        return None;
    }

    let hit_mass = |bullets: &[&BulletSnapshot]| -> f32 {
        bullets.iter().map(|b| if b.vel.x > 0.0 { b.hit_mass } else { -b.hit_mass }).sum()
    };

    let full_mass = hit_mass(&find_dangerous_bullets(bullets, player, 0.0));
    if full_mass.abs() < 0.1 {
        return None;
    }

    let mut after_jump = player.clone();
    after_jump.pos = player.pos + Vec2::new(player.vel.x, -player.jump_speed) * 0.5 + gravity * 0.125;
    let after_jump_mass = hit_mass(&find_dangerous_bullets(bullets, &after_jump, 0.5));

    if after_jump_mass.abs() < full_mass.abs() && player.vel.y > -0.001 {
        Some(AiAction::Jump)
    } else {
        None
    }
}

/// Ballistic shot planner: predicts a target's vertical drop under gravity,
/// solves for intercept time, and fires only when the horizontal error at
/// that time stays inside the gun's dispersion cone. `hard` only; lower
/// difficulties fire whenever a target is in sight (handled by the
/// operator directly).
pub fn plan_shot(
    plr: &PlayerSnapshot,
    targets: impl Iterator<Item = PlayerSnapshot>,
    gravity: Vec2,
    level_size_x: f32,
) -> Option<AiAction> {
    let a = 0.5 * gravity.y;
    let mut best: Option<(f32, PlayerSnapshot)> = None;

    for trg in targets {
        if trg.name == plr.name || trg.is_y_locked {
            continue;
        }
        if trg.group != -1 && trg.group == plr.group {
            continue;
        }
        if trg.pos.x.abs() - level_size_x > FALLING_DIST {
            continue;
        }

        let b = trg.vel.y;
        let c = trg.pos.y - plr.pos.y;
        let d = b * b - 4.0 * a * c;
        if d < 0.0 {
            continue;
        }
        let sqrt_d = d.sqrt();
        let x1 = (-b + sqrt_d) / (2.0 * a);
        let x2 = (-b - sqrt_d) / (2.0 * a);
        let t = match (x1 >= 0.0, x2 >= 0.0) {
            (false, false) => continue,
            (false, true) => x2,
            (true, false) => x1,
            (true, true) => x1.min(x2),
        };
        if t < 1.0 && best.as_ref().map(|(bt, _)| t < *bt).unwrap_or(true) {
            best = Some((t, trg));
        }
    }

    let (t, trg) = best?;
    let trg_new_pos = trg.pos + trg.vel * t + gravity * t * t * 0.5;
    let dist = trg_new_pos - (plr.pos - (plr.barrel_pos - plr.pos));
    let blt_dist = plr.gun_bullet_vel * t;

    let on_course = (dist.x < 0.0 && dist.x < blt_dist) || (dist.x > 0.0 && dist.x > blt_dist);
    let within_cone = (dist.x.abs() - blt_dist).abs() < 50.0 / (plr.gun_dispersion * 0.5).cos();

    if on_course && within_cone {
        Some(AiAction::Shot)
    } else {
        None
    }
}

#[derive(PartialEq)]
struct HeapEntry(f32, usize);
impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so `BinaryHeap` (a max-heap) behaves as a min-heap on cost.
        other.0.partial_cmp(&self.0).unwrap_or(Ordering::Equal)
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Dijkstra/A*-equivalent shortest path across the platform distance map
/// (edge weights are non-negative Euclidean displacements, so Dijkstra with
/// no heuristic already finds the optimum). Returns the sequence of
/// platform indices from (but excluding) `src` to (and including) `dst`.
pub fn pathfind(map: &WorldSnapshotPlatformMap, src: usize, dst: usize) -> Vec<usize> {
    if src == dst || map.is_empty() {
        return Vec::new();
    }

    let n = map.len();
    let mut cost = vec![f32::MAX; n];
    let mut came_from = vec![usize::MAX; n];
    let mut heap = BinaryHeap::new();
    cost[src] = 0.0;
    heap.push(HeapEntry(0.0, src));

    while let Some(HeapEntry(d, current)) = heap.pop() {
        if d > cost[current] {
            continue;
        }
        if current == dst {
            break;
        }
        for (next, disp) in map[current].iter().enumerate() {
            if next == current {
                continue;
            }
            let step = disp.magnitude();
            let new_cost = cost[current] + step;
            if new_cost < cost[next] {
                cost[next] = new_cost;
                came_from[next] = current;
                heap.push(HeapEntry(new_cost, next));
            }
        }
    }

    if came_from[dst] == usize::MAX {
        return Vec::new();
    }
    let mut path = vec![dst];
    let mut cur = dst;
    while cur != src {
        cur = came_from[cur];
        path.push(cur);
    }
    path.reverse();
    path.remove(0);
    path
}

/// Alias kept distinct from [`super::snapshot::PlatformDistanceMap`] only to
/// make the pathfinder's signature self-documenting at call sites.
pub type WorldSnapshotPlatformMap = super::snapshot::PlatformDistanceMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn plat(x1: f32, y: f32, x2: f32) -> PlatformSnapshot {
        PlatformSnapshot { pos1: Vec2::new(x1, y), pos2: Vec2::new(x2, y) }
    }

    #[test]
    fn move_spec_last_writer_wins_at_equal_priority() {
        let mut spec = MoveSpec::default();
        spec.update(AiAction::MoveLeft, 100);
        spec.update(AiAction::MoveRight, 100);
        assert_eq!(spec.into_action(), Some(AiAction::MoveRight));
    }

    #[test]
    fn move_spec_lower_priority_does_not_override() {
        let mut spec = MoveSpec::default();
        spec.update(AiAction::MoveLeft, 200);
        spec.update(AiAction::MoveRight, 100);
        assert_eq!(spec.into_action(), Some(AiAction::MoveLeft));
    }

    #[test]
    fn find_platform_detects_standing_on() {
        let platforms = vec![plat(0.0, 100.0, 200.0)];
        let ctx = find_platform(&platforms, Vec2::new(50.0, 100.0));
        assert_eq!(ctx.stand_on, Some(0));
    }

    #[test]
    fn pathfind_returns_empty_for_same_platform() {
        let map = vec![vec![Vec2::ZERO]];
        assert!(pathfind(&map, 0, 0).is_empty());
    }

    #[test]
    fn pathfind_finds_two_hop_route() {
        let map = vec![
            vec![Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(1000.0, 0.0)],
            vec![Vec2::new(-10.0, 0.0), Vec2::ZERO, Vec2::new(10.0, 0.0)],
            vec![Vec2::new(-1000.0, 0.0), Vec2::new(-10.0, 0.0), Vec2::ZERO],
        ];
        let path = pathfind(&map, 0, 2);
        assert_eq!(path, vec![1, 2]);
    }
}
