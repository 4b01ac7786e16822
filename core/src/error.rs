//! Error types for the boundaries named in the data model: configuration
//! loading, wire decoding, command dispatch, and simulation-contract
//! violations (§3 invariants). Grounded in the teacher's use of
//! `thiserror` for typed errors at module boundaries and `anyhow` for
//! ambient call-site context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("{path}:{line}: {message}")]
    Parse { path: String, line: usize, message: String },
    #[error("missing required key '{key}' in section [{section}]")]
    MissingKey { section: String, key: String },
    #[error("invalid value for '{key}' in section [{section}]: {message}")]
    InvalidValue { section: String, key: String, message: String },
    #[error("include cycle detected at {0}")]
    IncludeCycle(String),
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("datagram too large: {0} bytes (max 1472)")]
    TooBig(usize),
    #[error("datagram too small to contain a header: {0} bytes")]
    TooSmall(usize),
    #[error("payload hash mismatch: expected {expected:#018x}, got {actual:#018x}")]
    InvalidHash { expected: u64, actual: u64 },
    #[error("unknown action kind: {0}")]
    UnknownActionKind(u32),
    #[error("truncated payload: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("string field exceeds its bounded length: {len} > {max}")]
    StringTooLong { len: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("'{command}' expects {expected} argument(s), got {actual}")]
    ArityMismatch { command: String, expected: usize, actual: usize },
    #[error("invalid argument to '{command}': {message}")]
    InvalidArgument { command: String, message: String },
}

/// A violation of a §3 data-model invariant, surfaced rather than
/// silently tolerated so the violating call site gets fixed. Checked by
/// [`crate::world::Game::check_invariants`] and by
/// [`crate::primitive::PrimitiveStore::try_get`].
#[derive(Debug, Error)]
pub enum SimError {
    #[error("primitive {0:?} not found in store")]
    MissingPrimitive(crate::primitive::PrimitiveId),
    #[error("y_locked primitive has non-zero vertical velocity")]
    YLockedWithVelocity,
}
