//! AI operator state machines (§4.4 AI Worker). Grounded in `ai.hpp`'s
//! `ai_operator_base`/`ai_operator_native`: a per-player action-producing
//! state machine polled once per worker tick. The scripted-operator
//! counterpart (`ai_operator_lua`) is out of scope; [`AiOperator`] is a
//! trait precisely so a future scripting binding can implement it without
//! touching the worker loop.

use std::time::Instant;

use super::planner::{dodge, find_nearest_target, find_platform, plan_shot, platform_avoidance, MoveSpec};
use super::snapshot::WorldSnapshot;

/// One action an operator may push onto its queue per §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiAction {
    MoveLeft,
    MoveRight,
    Stop,
    Jump,
    JumpDown,
    Shot,
    Relax,
    EnableLongShot,
    DisableLongShot,
}

/// The safe action stream forced onto an operator after it has panicked or
/// errored once (§4.4 lifecycle & failure isolation): stop moving, stop
/// shooting, and disable the long-shot behaviour for the rest of the
/// session.
pub const SAFE_ACTION_STREAM: [AiAction; 3] = [AiAction::Relax, AiAction::Stop, AiAction::DisableLongShot];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "easy" => Some(Self::Easy),
            "medium" => Some(Self::Medium),
            "hard" => Some(Self::Hard),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

/// An operator consumes a world snapshot and produces zero or more actions.
/// Implemented here by [`NativeOperator`]; a scripted/Lua-style binding
/// would implement the same trait and plug into the worker unmodified.
pub trait AiOperator: Send {
    fn player_name(&self) -> &str;
    fn difficulty(&self) -> &str;
    fn update(&mut self, snapshot: &WorldSnapshot) -> anyhow::Result<Vec<AiAction>>;
}

/// The three built-in difficulty strategies, sharing a common skeleton:
/// target acquisition, platform context, move planning, shot planning.
pub struct NativeOperator {
    player_name: String,
    difficulty: Difficulty,
    target_id: Option<String>,
    jump_was: bool,
    is_on_shot: bool,
    shot_next_frame_at: Option<Instant>,
}

impl NativeOperator {
    pub fn new(player_name: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            player_name: player_name.into(),
            difficulty,
            target_id: None,
            jump_was: false,
            is_on_shot: false,
            shot_next_frame_at: None,
        }
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }
}

impl AiOperator for NativeOperator {
    fn player_name(&self) -> &str {
        &self.player_name
    }

    fn difficulty(&self) -> &str {
        self.difficulty.as_str()
    }

    fn update(&mut self, snapshot: &WorldSnapshot) -> anyhow::Result<Vec<AiAction>> {
        let Some(me) = snapshot.players.get(&self.player_name) else {
            return Ok(Vec::new());
        };
        let mut actions = Vec::new();

        let target =
            find_nearest_target(me, snapshot.players.values(), snapshot.level.level_size.x, self.difficulty);
        self.target_id = target.map(|t| t.name.clone());

        let ctx = find_platform(&snapshot.platforms, me.pos);

        let mut move_spec = MoveSpec::default();
        if let Some(action) = platform_avoidance(&snapshot.platforms, &ctx, me, &mut move_spec) {
            if !self.jump_was {
                actions.push(action);
                self.jump_was = true;
            }
        } else {
            self.jump_was = false;
        }

        if let Some(target) = target {
            let dx = target.pos.x - me.pos.x;
            move_spec.update(if dx < 0.0 { AiAction::MoveLeft } else { AiAction::MoveRight }, 150);
        }

        if let Some(action) = move_spec.into_action() {
            actions.push(action);
        }

        if let Some(action) = dodge(&snapshot.bullets, me, snapshot.physic_sim.gravity, self.difficulty) {
            actions.push(action);
        }

        match self.difficulty {
            Difficulty::Hard => {
                if !self.is_on_shot {
                    if let Some(shot) = plan_shot(
                        me,
                        snapshot.players.values().cloned(),
                        snapshot.physic_sim.gravity,
                        snapshot.level.level_size.x,
                    ) {
                        actions.push(shot);
                        self.is_on_shot = true;
                        self.shot_next_frame_at = Some(Instant::now());
                    }
                } else if self.shot_next_frame_at.map(|t| t.elapsed().as_secs_f32() > 0.2).unwrap_or(false) {
                    self.is_on_shot = false;
                }
            }
            _ => {
                if target.is_some() {
                    actions.push(AiAction::Shot);
                } else {
                    actions.push(AiAction::Relax);
                }
            }
        }

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::snapshot::{PhysicSimSnapshot, PlayerSnapshot, WorldSnapshot};
    use crate::geometry::Vec2;
    use std::collections::HashMap;

    fn player(name: &str, x: f32) -> PlayerSnapshot {
        PlayerSnapshot {
            name: name.to_string(),
            pos: Vec2::new(x, 0.0),
            vel: Vec2::ZERO,
            size: Vec2::new(40.0, 80.0),
            group: -1,
            is_y_locked: false,
            on_left: false,
            x_accel: 2250.0,
            x_slowdown: 700.0,
            jump_speed: 620.0,
            gun_dispersion: 0.1,
            gun_bullet_vel: 1500.0,
            barrel_pos: Vec2::new(x + 20.0, 0.0),
        }
    }

    #[test]
    fn no_players_in_snapshot_yields_no_actions() {
        let mut op = NativeOperator::new("bot", Difficulty::Easy);
        let snapshot = WorldSnapshot::default();
        assert!(op.update(&snapshot).unwrap().is_empty());
    }

    #[test]
    fn easy_operator_moves_toward_visible_target() {
        let mut players = HashMap::new();
        players.insert("bot".to_string(), player("bot", 0.0));
        players.insert("enemy".to_string(), player("enemy", 500.0));
        let snapshot = WorldSnapshot::new(players, Vec::new(), Vec::new(), PhysicSimSnapshot::default());

        let mut op = NativeOperator::new("bot", Difficulty::Easy);
        let actions = op.update(&snapshot).unwrap();
        assert!(actions.contains(&AiAction::MoveRight));
        assert!(actions.contains(&AiAction::Shot));
    }

    #[test]
    fn difficulty_as_str_round_trips_parse() {
        for d in [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard] {
            assert_eq!(Difficulty::parse(d.as_str()), Some(d));
        }
    }
}
