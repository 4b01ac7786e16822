//! The replicated action set (§4.5, §6). Grounded in `net_actions.hpp`'s
//! macro-generated action list; each variant here carries exactly the
//! fields the original struct did, serialised little-endian with the
//! bounded-string helpers from [`super::wire`].

use crate::color::Color;
use crate::error::WireError;
use crate::geometry::Vec2;

use super::wire::{decode_bounded_string, decode_vec2, encode_bounded_string, encode_vec2};

/// Player names and skin identifiers are bounded to this many bytes on
/// the wire (mirrors the original's 23-byte fixed char arrays).
pub const NAME_LEN: usize = 23;

/// Numeric action kind carried in the packet header, used to dispatch
/// [`Action::decode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ActionKind {
    ClientHello = 1,
    Ping = 2,
    TransControlOk = 3,
    TransControlCorrupted = 4,
    PlayerSkinParams = 5,
    PlayerMoveStates = 6,
    CliPlayerSync = 7,
    SrvPlayerSync = 8,
    SrvPlayerGameSync = 9,
    SpawnBullet = 10,
    LevelSync = 11,
    PlayerConf = 12,
}

impl ActionKind {
    pub fn from_u32(v: u32) -> Result<Self, WireError> {
        Ok(match v {
            1 => Self::ClientHello,
            2 => Self::Ping,
            3 => Self::TransControlOk,
            4 => Self::TransControlCorrupted,
            5 => Self::PlayerSkinParams,
            6 => Self::PlayerMoveStates,
            7 => Self::CliPlayerSync,
            8 => Self::SrvPlayerSync,
            9 => Self::SrvPlayerGameSync,
            10 => Self::SpawnBullet,
            11 => Self::LevelSync,
            12 => Self::PlayerConf,
            other => return Err(WireError::UnknownActionKind(other)),
        })
    }
}

/// The magic value a client's initial hello carries, matching the
/// original's `cli_i_wanna_play` handshake constant.
pub const CLIENT_HELLO_MAGIC: u64 = 0xdead_beef_feed_f00d;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveStates {
    pub mov_left: bool,
    pub mov_right: bool,
    pub on_shot: bool,
    pub jump: bool,
    pub jump_down: bool,
    pub lock_y: bool,
}

impl MoveStates {
    fn to_bits(self) -> u8 {
        (self.mov_left as u8)
            | ((self.mov_right as u8) << 1)
            | ((self.on_shot as u8) << 2)
            | ((self.jump as u8) << 3)
            | ((self.jump_down as u8) << 4)
            | ((self.lock_y as u8) << 5)
    }

    fn from_bits(bits: u8) -> Self {
        Self {
            mov_left: bits & 0x01 != 0,
            mov_right: bits & 0x02 != 0,
            on_shot: bits & 0x04 != 0,
            jump: bits & 0x08 != 0,
            jump_down: bits & 0x10 != 0,
            lock_y: bits & 0x20 != 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulletSpawn {
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    ClientHello { magic: u64 },
    Ping { ping_id: u64, ping_ms: u32 },
    TransControlOk { target_id: u64, target_hash: u64 },
    TransControlCorrupted { target_id: u64, target_hash: u64 },
    PlayerSkinParams { body_txtr: String, face_txtr: String, body_color: Color, tracer_color: Color },
    PlayerMoveStates { states: MoveStates },
    CliPlayerSync { states: MoveStates, evt_counter: u32, position: Vec2, velocity: Vec2 },
    SrvPlayerSync { states: MoveStates, evt_counter: u32, position: Vec2, velocity: Vec2, name: String },
    SrvPlayerGameSync {
        states: MoveStates,
        evt_counter: u32,
        position: Vec2,
        velocity: Vec2,
        name: String,
        wpn_name: String,
        ammo_elapsed: u32,
        group: u32,
        on_left: bool,
    },
    SpawnBullet { shooter: String, mass: f32, bullets: Vec<BulletSpawn> },
    LevelSync { level_name: String, game_speed: f32, on_game: bool },
    PlayerConf { skin: String, game: String, pistol: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::ClientHello { .. } => ActionKind::ClientHello,
            Action::Ping { .. } => ActionKind::Ping,
            Action::TransControlOk { .. } => ActionKind::TransControlOk,
            Action::TransControlCorrupted { .. } => ActionKind::TransControlCorrupted,
            Action::PlayerSkinParams { .. } => ActionKind::PlayerSkinParams,
            Action::PlayerMoveStates { .. } => ActionKind::PlayerMoveStates,
            Action::CliPlayerSync { .. } => ActionKind::CliPlayerSync,
            Action::SrvPlayerSync { .. } => ActionKind::SrvPlayerSync,
            Action::SrvPlayerGameSync { .. } => ActionKind::SrvPlayerGameSync,
            Action::SpawnBullet { .. } => ActionKind::SpawnBullet,
            Action::LevelSync { .. } => ActionKind::LevelSync,
            Action::PlayerConf { .. } => ActionKind::PlayerConf,
        }
    }

    /// Whether this action kind is sent over the reliable channel by
    /// default (handshake, acks, configuration) versus the unreliable,
    /// best-effort sync stream (§4.5).
    pub fn is_reliable_by_default(&self) -> bool {
        matches!(
            self,
            Action::ClientHello { .. }
                | Action::TransControlOk { .. }
                | Action::TransControlCorrupted { .. }
                | Action::PlayerSkinParams { .. }
                | Action::SpawnBullet { .. }
                | Action::LevelSync { .. }
                | Action::PlayerConf { .. }
        )
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Action::ClientHello { magic } => {
                buf.extend_from_slice(&magic.to_le_bytes());
            }
            Action::Ping { ping_id, ping_ms } => {
                buf.extend_from_slice(&ping_id.to_le_bytes());
                buf.extend_from_slice(&ping_ms.to_le_bytes());
            }
            Action::TransControlOk { target_id, target_hash } | Action::TransControlCorrupted { target_id, target_hash } => {
                buf.extend_from_slice(&target_id.to_le_bytes());
                buf.extend_from_slice(&target_hash.to_le_bytes());
            }
            Action::PlayerSkinParams { body_txtr, face_txtr, body_color, tracer_color } => {
                buf.extend_from_slice(&encode_bounded_string::<NAME_LEN>(body_txtr).unwrap_or([0; NAME_LEN]));
                buf.extend_from_slice(&encode_bounded_string::<NAME_LEN>(face_txtr).unwrap_or([0; NAME_LEN]));
                buf.extend_from_slice(&[body_color.r, body_color.g, body_color.b, body_color.a]);
                buf.extend_from_slice(&[tracer_color.r, tracer_color.g, tracer_color.b, tracer_color.a]);
            }
            Action::PlayerMoveStates { states } => {
                buf.push(states.to_bits());
            }
            Action::CliPlayerSync { states, evt_counter, position, velocity } => {
                buf.push(states.to_bits());
                buf.extend_from_slice(&evt_counter.to_le_bytes());
                buf.extend_from_slice(&encode_vec2(*position));
                buf.extend_from_slice(&encode_vec2(*velocity));
            }
            Action::SrvPlayerSync { states, evt_counter, position, velocity, name } => {
                buf.push(states.to_bits());
                buf.extend_from_slice(&evt_counter.to_le_bytes());
                buf.extend_from_slice(&encode_vec2(*position));
                buf.extend_from_slice(&encode_vec2(*velocity));
                buf.extend_from_slice(&encode_bounded_string::<NAME_LEN>(name).unwrap_or([0; NAME_LEN]));
            }
            Action::SrvPlayerGameSync { states, evt_counter, position, velocity, name, wpn_name, ammo_elapsed, group, on_left } => {
                buf.push(states.to_bits());
                buf.extend_from_slice(&evt_counter.to_le_bytes());
                buf.extend_from_slice(&encode_vec2(*position));
                buf.extend_from_slice(&encode_vec2(*velocity));
                buf.extend_from_slice(&encode_bounded_string::<NAME_LEN>(name).unwrap_or([0; NAME_LEN]));
                buf.extend_from_slice(&encode_bounded_string::<NAME_LEN>(wpn_name).unwrap_or([0; NAME_LEN]));
                buf.extend_from_slice(&ammo_elapsed.to_le_bytes());
                buf.extend_from_slice(&group.to_le_bytes());
                buf.push(*on_left as u8);
            }
            Action::SpawnBullet { shooter, mass, bullets } => {
                buf.extend_from_slice(&encode_bounded_string::<NAME_LEN>(shooter).unwrap_or([0; NAME_LEN]));
                buf.extend_from_slice(&mass.to_le_bytes());
                buf.extend_from_slice(&(bullets.len() as u32).to_le_bytes());
                for b in bullets {
                    buf.extend_from_slice(&encode_vec2(b.position));
                    buf.extend_from_slice(&encode_vec2(b.velocity));
                }
            }
            Action::LevelSync { level_name, game_speed, on_game } => {
                buf.extend_from_slice(&encode_bounded_string::<NAME_LEN>(level_name).unwrap_or([0; NAME_LEN]));
                buf.extend_from_slice(&game_speed.to_le_bytes());
                buf.push(*on_game as u8);
            }
            Action::PlayerConf { skin, game, pistol } => {
                buf.extend_from_slice(&encode_bounded_string::<NAME_LEN>(skin).unwrap_or([0; NAME_LEN]));
                buf.extend_from_slice(&encode_bounded_string::<NAME_LEN>(game).unwrap_or([0; NAME_LEN]));
                buf.extend_from_slice(&encode_bounded_string::<NAME_LEN>(pistol).unwrap_or([0; NAME_LEN]));
            }
        }
        buf
    }

    pub fn decode(kind: ActionKind, payload: &[u8]) -> Result<Self, WireError> {
        fn need(payload: &[u8], at: usize, len: usize) -> Result<&[u8], WireError> {
            payload.get(at..at + len).ok_or(WireError::Truncated { expected: at + len, actual: payload.len() })
        }
        fn read_name(payload: &[u8], at: usize) -> Result<String, WireError> {
            let slice = need(payload, at, NAME_LEN)?;
            let mut buf = [0u8; NAME_LEN];
            buf.copy_from_slice(slice);
            Ok(decode_bounded_string(&buf))
        }

        Ok(match kind {
            ActionKind::ClientHello => {
                let magic = u64::from_le_bytes(need(payload, 0, 8)?.try_into().unwrap());
                Action::ClientHello { magic }
            }
            ActionKind::Ping => {
                let ping_id = u64::from_le_bytes(need(payload, 0, 8)?.try_into().unwrap());
                let ping_ms = u32::from_le_bytes(need(payload, 8, 4)?.try_into().unwrap());
                Action::Ping { ping_id, ping_ms }
            }
            ActionKind::TransControlOk | ActionKind::TransControlCorrupted => {
                let target_id = u64::from_le_bytes(need(payload, 0, 8)?.try_into().unwrap());
                let target_hash = u64::from_le_bytes(need(payload, 8, 8)?.try_into().unwrap());
                if kind == ActionKind::TransControlOk {
                    Action::TransControlOk { target_id, target_hash }
                } else {
                    Action::TransControlCorrupted { target_id, target_hash }
                }
            }
            ActionKind::PlayerSkinParams => {
                let body_txtr = read_name(payload, 0)?;
                let face_txtr = read_name(payload, NAME_LEN)?;
                let bc = need(payload, NAME_LEN * 2, 4)?;
                let tc = need(payload, NAME_LEN * 2 + 4, 4)?;
                Action::PlayerSkinParams {
                    body_txtr,
                    face_txtr,
                    body_color: Color::new(bc[0], bc[1], bc[2], bc[3]),
                    tracer_color: Color::new(tc[0], tc[1], tc[2], tc[3]),
                }
            }
            ActionKind::PlayerMoveStates => {
                let bits = *need(payload, 0, 1)?.first().unwrap();
                Action::PlayerMoveStates { states: MoveStates::from_bits(bits) }
            }
            ActionKind::CliPlayerSync => {
                let bits = *need(payload, 0, 1)?.first().unwrap();
                let evt_counter = u32::from_le_bytes(need(payload, 1, 4)?.try_into().unwrap());
                let position = decode_vec2(need(payload, 5, 8)?)?;
                let velocity = decode_vec2(need(payload, 13, 8)?)?;
                Action::CliPlayerSync { states: MoveStates::from_bits(bits), evt_counter, position, velocity }
            }
            ActionKind::SrvPlayerSync => {
                let bits = *need(payload, 0, 1)?.first().unwrap();
                let evt_counter = u32::from_le_bytes(need(payload, 1, 4)?.try_into().unwrap());
                let position = decode_vec2(need(payload, 5, 8)?)?;
                let velocity = decode_vec2(need(payload, 13, 8)?)?;
                let name = read_name(payload, 21)?;
                Action::SrvPlayerSync { states: MoveStates::from_bits(bits), evt_counter, position, velocity, name }
            }
            ActionKind::SrvPlayerGameSync => {
                let bits = *need(payload, 0, 1)?.first().unwrap();
                let evt_counter = u32::from_le_bytes(need(payload, 1, 4)?.try_into().unwrap());
                let position = decode_vec2(need(payload, 5, 8)?)?;
                let velocity = decode_vec2(need(payload, 13, 8)?)?;
                let name = read_name(payload, 21)?;
                let wpn_name = read_name(payload, 21 + NAME_LEN)?;
                let at = 21 + NAME_LEN * 2;
                let ammo_elapsed = u32::from_le_bytes(need(payload, at, 4)?.try_into().unwrap());
                let group = u32::from_le_bytes(need(payload, at + 4, 4)?.try_into().unwrap());
                let on_left = *need(payload, at + 8, 1)?.first().unwrap() != 0;
                Action::SrvPlayerGameSync {
                    states: MoveStates::from_bits(bits),
                    evt_counter,
                    position,
                    velocity,
                    name,
                    wpn_name,
                    ammo_elapsed,
                    group,
                    on_left,
                }
            }
            ActionKind::SpawnBullet => {
                let shooter = read_name(payload, 0)?;
                let mass = f32::from_le_bytes(need(payload, NAME_LEN, 4)?.try_into().unwrap());
                let count = u32::from_le_bytes(need(payload, NAME_LEN + 4, 4)?.try_into().unwrap()) as usize;
                let mut bullets = Vec::with_capacity(count);
                let mut at = NAME_LEN + 8;
                for _ in 0..count {
                    let position = decode_vec2(need(payload, at, 8)?)?;
                    let velocity = decode_vec2(need(payload, at + 8, 8)?)?;
                    bullets.push(BulletSpawn { position, velocity });
                    at += 16;
                }
                Action::SpawnBullet { shooter, mass, bullets }
            }
            ActionKind::LevelSync => {
                let level_name = read_name(payload, 0)?;
                let game_speed = f32::from_le_bytes(need(payload, NAME_LEN, 4)?.try_into().unwrap());
                let on_game = *need(payload, NAME_LEN + 4, 1)?.first().unwrap() != 0;
                Action::LevelSync { level_name, game_speed, on_game }
            }
            ActionKind::PlayerConf => {
                let skin = read_name(payload, 0)?;
                let game = read_name(payload, NAME_LEN)?;
                let pistol = read_name(payload, NAME_LEN * 2)?;
                Action::PlayerConf { skin, game, pistol }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_hello_round_trips() {
        let action = Action::ClientHello { magic: CLIENT_HELLO_MAGIC };
        let encoded = action.encode();
        let decoded = Action::decode(ActionKind::ClientHello, &encoded).unwrap();
        assert_eq!(decoded, action);
    }

    #[test]
    fn cli_player_sync_round_trips() {
        let action = Action::CliPlayerSync {
            states: MoveStates { mov_left: true, mov_right: false, on_shot: true, jump: false, jump_down: true, lock_y: false },
            evt_counter: 42,
            position: Vec2::new(1.5, -2.5),
            velocity: Vec2::new(0.0, 980.0),
        };
        let encoded = action.encode();
        let decoded = Action::decode(ActionKind::CliPlayerSync, &encoded).unwrap();
        assert_eq!(decoded, action);
    }

    #[test]
    fn srv_player_game_sync_round_trips_with_name_fields() {
        let action = Action::SrvPlayerGameSync {
            states: MoveStates { mov_left: false, mov_right: true, on_shot: false, jump: true, jump_down: false, lock_y: true },
            evt_counter: 7,
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
            name: "alice".to_string(),
            wpn_name: "pistol".to_string(),
            ammo_elapsed: 3,
            group: 1,
            on_left: true,
        };
        let encoded = action.encode();
        let decoded = Action::decode(ActionKind::SrvPlayerGameSync, &encoded).unwrap();
        assert_eq!(decoded, action);
    }

    #[test]
    fn spawn_bullet_round_trips_with_multiple_bullets() {
        let action = Action::SpawnBullet {
            shooter: "bob".to_string(),
            mass: 0.2,
            bullets: vec![
                BulletSpawn { position: Vec2::new(1.0, 2.0), velocity: Vec2::new(500.0, 0.0) },
                BulletSpawn { position: Vec2::new(1.0, 2.0), velocity: Vec2::new(480.0, -20.0) },
            ],
        };
        let encoded = action.encode();
        let decoded = Action::decode(ActionKind::SpawnBullet, &encoded).unwrap();
        assert_eq!(decoded, action);
    }

    #[test]
    fn truncated_payload_is_rejected_rather_than_panicking() {
        let err = Action::decode(ActionKind::CliPlayerSync, &[0u8; 3]).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }));
    }

    #[test]
    fn move_states_bit_pack_round_trips_all_flags() {
        let states = MoveStates { mov_left: true, mov_right: true, on_shot: true, jump: true, jump_down: true, lock_y: true };
        assert_eq!(MoveStates::from_bits(states.to_bits()), states);
    }

    #[test]
    fn default_reliability_matches_handshake_and_config_actions() {
        assert!(Action::ClientHello { magic: CLIENT_HELLO_MAGIC }.is_reliable_by_default());
        assert!(!Action::PlayerMoveStates { states: MoveStates::from_bits(0) }.is_reliable_by_default());
    }
}
