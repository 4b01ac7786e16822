//! AI worker subsystem (§4.4). A dedicated thread drives a set of
//! [`operator::AiOperator`]s against periodic [`snapshot::WorldSnapshot`]
//! publications, producing actions the main simulation loop applies the
//! same way it applies a remote player's network input.

pub mod operator;
pub mod planner;
pub mod snapshot;
pub mod worker;

pub use operator::{AiAction, AiOperator, Difficulty, NativeOperator};
pub use snapshot::WorldSnapshot;
pub use worker::{spawn, AiWorkerHandle, OperatorId};
