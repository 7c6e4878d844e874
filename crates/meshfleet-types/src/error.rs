//! Error taxonomy for the coordination core.
//!
//! Every error here is recoverable: the owning worker logs it and keeps
//! running.  [`FleetError`] collects them for callers that cross layers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::robot::RobotAddress;
use crate::wire::MessageKind;

/// Byte stream could not be framed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FramingError {
    #[error("unknown message kind 0x{0:02x}")]
    UnknownKind(u8),

    #[error("{kind:?} frame must be {expected} bytes, got {actual}")]
    LengthMismatch {
        kind: MessageKind,
        expected: usize,
        actual: usize,
    },
}

/// Registry lookup or insertion failed.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryError {
    #[error("robot {0} is already registered")]
    DuplicateAddress(RobotAddress),

    #[error("robot {0} is not registered")]
    NotFound(RobotAddress),
}

/// Shadow document could not be reconciled; nothing was applied.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileError {
    #[error("malformed shadow document: {0}")]
    MalformedDocument(String),

    #[error("failed to encode shadow document: {0}")]
    Encode(String),
}

/// Link transmit path failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkError {
    #[error("link operation timed out")]
    Timeout,

    #[error("transmit aborted")]
    TransmitAborted,

    #[error("link closed")]
    Closed,

    #[error("link I/O error: {0}")]
    Io(String),
}

/// Message bus delivery failure.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusError {
    #[error("mailbox of {module} is full; event dropped")]
    MailboxFull { module: String },

    #[error("mailbox of {module} is closed")]
    MailboxClosed { module: String },
}

/// Umbrella error spanning every layer of the core.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FleetError {
    #[error(transparent)]
    Framing(#[from] FramingError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_display_uses_shadow_key() {
        let err = RegistryError::NotFound(RobotAddress(0x2a));
        assert_eq!(err.to_string(), "robot 000000000000002a is not registered");
    }

    #[test]
    fn fleet_error_wraps_layers() {
        let err: FleetError = LinkError::Timeout.into();
        assert!(matches!(err, FleetError::Link(LinkError::Timeout)));
        assert_eq!(err.to_string(), "link operation timed out");

        let err: FleetError = FramingError::UnknownKind(0xfe).into();
        assert!(err.to_string().contains("0xfe"));
    }
}
