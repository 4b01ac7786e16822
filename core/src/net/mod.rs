//! Replication layer (§4.5, §6): UDP framing and hashing, the replicated
//! action set, reliable delivery, and the server/client authority rules
//! built on top. Grounded in `packet.hpp`/`net_actions.hpp`/
//! `net_transcontrol.hpp`, adapted to the leading-header wire layout this
//! crate's wire format settled on (see [`wire`]).

pub mod actions;
pub mod client;
pub mod reliability;
pub mod server;
pub mod socket;
pub mod wire;

pub use actions::{Action, ActionKind, BulletSpawn, MoveStates, CLIENT_HELLO_MAGIC};
pub use reliability::{ReceiveOutcome, ReliableReceiver, ReliableSender};
pub use socket::{RecvOutcome, Received, Socket};
pub use wire::{PacketHeader, HEADER_SIZE, MAX_DATAGRAM_SIZE};
