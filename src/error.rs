//! Caller-reported failures.
//!
//! Only operations a caller can act on get an error type. Parse failures,
//! buffer overflows, unbound drivers, and degraded decodes are log-only
//! conditions handled at their source; nothing in this subsystem is fatal.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// Replay/delete/bind referenced an index the registry does not hold.
    #[error("index {index} out of range ({count} signals stored)")]
    InvalidIndex { index: usize, count: usize },

    /// The registry is at capacity; nothing was added.
    #[error("signal registry full ({capacity} entries)")]
    RegistryFull { capacity: usize },

    /// The named signal does not exist.
    #[error("no signal named {name:?}")]
    UnknownName { name: String },

    /// Send/compare attempted on the empty sentinel or a malformed signal.
    #[error("signal has no valid address/key")]
    InvalidSignal,
}
