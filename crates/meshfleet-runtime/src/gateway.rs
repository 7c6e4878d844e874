//! Gateway module – owns the link to the radio coprocessor.
//!
//! ```text
//!   LinkNotReady ── Hello(token) echoed ──▶ LinkReady
//! ```
//!
//! | Input | LinkNotReady | LinkReady |
//! |---|---|---|
//! | `Hello` frame with our token | → LinkReady, publish `LinkReady` | ignored |
//! | `RobotAdded` / `MovementReported` / `Status` frame | ignored | translated to bus events |
//! | `MovementConfigure` | dropped | `SetMovementConfig`, await `ConfigAck`, publish `MovementConfigAccepted` |
//! | `LedConfigure` | dropped | `SetLightConfig` |
//! | `ClearToMove` | dropped | `ClearToMove` frame |

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use meshfleet_middleware::{LinkWriter, MessageBus};
use meshfleet_types::{
    Event, EventKind, EventPayload, LedConfig, LinkMessage, RobotAddress, RobotConfig, WireMessage,
};
use tracing::{debug, error, info, warn};

use crate::module::Module;

/// Token the coprocessor must echo back to complete the handshake.
pub const DEFAULT_HANDSHAKE_TOKEN: u16 = 0x1010;

pub const NAME: &str = "gateway";

const INTERESTS: &[EventKind] = &[
    EventKind::FrameReceived,
    EventKind::MovementConfigure,
    EventKind::LedConfigure,
    EventKind::ClearToMove,
];

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub handshake_token: u16,
    /// Bound on waiting for, and performing, one transmit.
    pub transmit_timeout: Duration,
    /// Bound on waiting for a `ConfigAck`.
    pub ack_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            handshake_token: DEFAULT_HANDSHAKE_TOKEN,
            transmit_timeout: Duration::from_millis(1000),
            ack_timeout: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    NotReady,
    Ready,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::NotReady => write!(f, "LINK_NOT_READY"),
            LinkState::Ready => write!(f, "LINK_READY"),
        }
    }
}

pub struct GatewayModule {
    state: LinkState,
    config: GatewayConfig,
    writer: LinkWriter,
    bus: MessageBus,
}

impl GatewayModule {
    pub fn new(bus: MessageBus, writer: LinkWriter, config: GatewayConfig) -> Self {
        Self {
            state: LinkState::NotReady,
            config,
            writer,
            bus,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Send the greeting frame.  The echo arrives as a `FrameReceived` event.
    pub async fn begin_handshake(&mut self) {
        let hello = WireMessage::Hello {
            echo: self.config.handshake_token,
        };
        if let Err(err) = self.writer.send(&hello).await {
            self.report_error(format!("handshake transmit failed: {err}"));
        }
    }

    fn set_state(&mut self, next: LinkState) {
        if self.state == next {
            debug!(state = %next, "already in state");
            return;
        }
        debug!("state transition {} --> {}", self.state, next);
        self.state = next;
    }

    fn publish(&self, payload: EventPayload) {
        self.bus.publish(Event::new(NAME, payload));
    }

    fn report_error(&self, message: String) {
        error!(%message, "gateway error");
        self.publish(EventPayload::Error {
            module: NAME.to_string(),
            message,
        });
    }

    fn on_frame(&mut self, msg: LinkMessage) {
        let wire = msg.decode();
        match (self.state, wire) {
            (LinkState::NotReady, WireMessage::Hello { echo }) if echo == self.config.handshake_token => {
                self.set_state(LinkState::Ready);
                info!("link handshake complete");
                self.publish(EventPayload::LinkReady);
            }
            (LinkState::NotReady, WireMessage::Hello { echo }) => {
                warn!(echo, expected = self.config.handshake_token, "handshake token mismatch");
            }
            (LinkState::NotReady, other) => {
                debug!(kind = ?other.kind(), "frame ignored before handshake");
            }
            (LinkState::Ready, WireMessage::RobotAdded { address }) => {
                self.publish(EventPayload::RobotAdded { address });
            }
            (LinkState::Ready, WireMessage::MovementReported { address, x, y, yaw }) => {
                self.publish(EventPayload::MovementReported { address, x, y, yaw });
            }
            (LinkState::Ready, WireMessage::Status { status }) => {
                self.publish(EventPayload::LinkStatus { status });
            }
            (LinkState::Ready, WireMessage::Hello { .. } | WireMessage::ConfigAck { .. }) => {}
            (LinkState::Ready, other) => {
                warn!(kind = ?other.kind(), "unexpected inbound frame");
            }
        }
    }

    async fn configure_movement(&mut self, address: RobotAddress, config: RobotConfig) {
        let cmd = WireMessage::SetMovementConfig {
            addr: address.mesh_address(),
            time_ms: config.drive_time_ms,
            angle_deg: config.rotation_deg,
        };
        match self.writer.send_and_await_ack(&cmd, self.config.ack_timeout).await {
            Ok(seq) => {
                debug!(address = %address, seq, "movement configuration accepted");
                self.publish(EventPayload::MovementConfigAccepted { address });
            }
            Err(err) => self.report_error(format!("movement configuration for {address} failed: {err}")),
        }
    }

    async fn configure_led(&mut self, address: RobotAddress, led: LedConfig) {
        let cmd = WireMessage::SetLightConfig {
            addr: address.mesh_address(),
            r: led.r,
            g: led.g,
            b: led.b,
            time_ms: led.time_ms,
        };
        if let Err(err) = self.writer.send(&cmd).await {
            self.report_error(format!("light configuration for {address} failed: {err}"));
        }
    }

    async fn clear_to_move(&mut self) {
        info!("broadcasting clear to move");
        if let Err(err) = self.writer.send(&WireMessage::ClearToMove).await {
            self.report_error(format!("clear to move failed: {err}"));
        }
    }
}

#[async_trait]
impl Module for GatewayModule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn interests(&self) -> &'static [EventKind] {
        INTERESTS
    }

    async fn on_start(&mut self) {
        self.begin_handshake().await;
    }

    async fn handle(&mut self, event: Event) {
        let ready = self.state == LinkState::Ready;
        match event.payload {
            EventPayload::FrameReceived(msg) => self.on_frame(msg),
            EventPayload::MovementConfigure { address, config } if ready => {
                self.configure_movement(address, config).await;
            }
            EventPayload::LedConfigure { address, led } if ready => self.configure_led(address, led).await,
            EventPayload::ClearToMove if ready => self.clear_to_move().await,
            other => warn!(kind = ?other.kind(), state = %self.state, "event dropped"),
        }
    }
}
