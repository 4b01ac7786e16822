//! Hollowpoint - Simulation Core
//!
//! A deterministic, fixed-timestep physics and entity simulation for a 2-D
//! side-scrolling multiplayer shooter: a slotmap-backed primitive store,
//! continuous collision detection, player/weapon/bullet entities, a
//! dedicated AI worker thread, and the UDP replication layer tying it to a
//! server or client process.

pub mod color;
pub mod commands;
pub mod config;
pub mod entities;
pub mod error;
pub mod geometry;
pub mod platform;
pub mod primitive;
pub mod simulation;
pub mod world;

pub mod ai;
pub mod net;

pub use color::Color;
pub use entities::{AdjustmentBoxManager, BulletManager, FacingDir, InputState, InstantKickManager, Player, PlayerKinematics};
pub use error::SimError;
pub use geometry::{BoundingBox, Vec2};
pub use platform::Platform;
pub use primitive::{Group, Line, Point, Primitive, PrimitiveAttrs, PrimitiveId, PrimitiveStore};
pub use simulation::{CollisionEvent, PhysicSimulation};
pub use world::Game;
