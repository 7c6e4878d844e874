//! `meshfleet-types` – shared vocabulary of the fleet coordination core.
//!
//! - [`robot`] – robot addresses, states and configuration values.
//! - [`wire`] – link frame kinds and the big-endian frame codec.
//! - [`error`] – the error taxonomy.
//! - [`Event`] / [`EventPayload`] – what travels over the message bus.

pub mod error;
pub mod robot;
pub mod wire;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use error::{BusError, FleetError, FramingError, LinkError, ReconcileError, RegistryError};
pub use robot::{LedConfig, RobotAddress, RobotConfig, RobotState};
pub use wire::{LinkMessage, MessageKind, WireMessage};

/// Envelope for everything routed over the message bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Publishing module, e.g. `"gateway"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Variants of data routed over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// A complete frame arrived on the link.
    FrameReceived(LinkMessage),
    /// Link handshake completed.
    LinkReady,
    /// Coprocessor status word.
    LinkStatus { status: i16 },
    RobotAdded { address: RobotAddress },
    RobotRemoved { address: RobotAddress },
    MovementReported {
        address: RobotAddress,
        x: i32,
        y: i32,
        yaw: i32,
    },
    /// Command: push a movement configuration to a robot.
    MovementConfigure {
        address: RobotAddress,
        config: RobotConfig,
    },
    /// Command: push an LED animation to a robot.
    LedConfigure { address: RobotAddress, led: LedConfig },
    /// The robot acknowledged its movement configuration.
    MovementConfigAccepted { address: RobotAddress },
    /// Release robots that needed no reconfiguration.
    ClearToMoveRequested,
    /// Command: fleet-wide go-ahead.
    ClearToMove,
    FleetReset,
    CloudConnected,
    CloudDisconnected,
    /// Desired-state delta from the cloud (JSON text).
    ShadowDelta { document: String },
    /// Reported-state document for the cloud (JSON text).
    ShadowReport { document: String },
    Error { module: String, message: String },
}

/// Tag of an [`EventPayload`]; the unit of subscription interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    FrameReceived,
    LinkReady,
    LinkStatus,
    RobotAdded,
    RobotRemoved,
    MovementReported,
    MovementConfigure,
    LedConfigure,
    MovementConfigAccepted,
    ClearToMoveRequested,
    ClearToMove,
    FleetReset,
    CloudConnected,
    CloudDisconnected,
    ShadowDelta,
    ShadowReport,
    Error,
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::FrameReceived(_) => EventKind::FrameReceived,
            EventPayload::LinkReady => EventKind::LinkReady,
            EventPayload::LinkStatus { .. } => EventKind::LinkStatus,
            EventPayload::RobotAdded { .. } => EventKind::RobotAdded,
            EventPayload::RobotRemoved { .. } => EventKind::RobotRemoved,
            EventPayload::MovementReported { .. } => EventKind::MovementReported,
            EventPayload::MovementConfigure { .. } => EventKind::MovementConfigure,
            EventPayload::LedConfigure { .. } => EventKind::LedConfigure,
            EventPayload::MovementConfigAccepted { .. } => EventKind::MovementConfigAccepted,
            EventPayload::ClearToMoveRequested => EventKind::ClearToMoveRequested,
            EventPayload::ClearToMove => EventKind::ClearToMove,
            EventPayload::FleetReset => EventKind::FleetReset,
            EventPayload::CloudConnected => EventKind::CloudConnected,
            EventPayload::CloudDisconnected => EventKind::CloudDisconnected,
            EventPayload::ShadowDelta { .. } => EventKind::ShadowDelta,
            EventPayload::ShadowReport { .. } => EventKind::ShadowReport,
            EventPayload::Error { .. } => EventKind::Error,
        }
    }
}
