//! Fleet module – owns the [`FleetRegistry`] and talks to the cloud.
//!
//! ```text
//!   CloudDisconnected ── CloudConnected ──▶ CloudConnected
//!          ▲                                      │
//!          └──────────── CloudDisconnected ◀──────┘
//! ```
//!
//! The registry is mutated only here.  Reports go out as `ShadowReport`
//! events and only while connected; registry bookkeeping happens in both
//! states.  Entering `CloudConnected` publishes a clear-all document followed
//! by the full fleet report.

use std::fmt;

use async_trait::async_trait;
use meshfleet_middleware::MessageBus;
use meshfleet_registry::FleetRegistry;
use meshfleet_shadow::{
    DeltaOutcome, ShadowDocument, ShadowReconciler, report_added, report_cleared, report_led_config,
    report_movement_config, report_removed, report_revolution_counts, serialize_report,
};
use meshfleet_types::{Event, EventKind, EventPayload, RobotAddress};
use tracing::{debug, error, info, warn};

use crate::module::Module;

pub const NAME: &str = "fleet";

const INTERESTS: &[EventKind] = &[
    EventKind::RobotAdded,
    EventKind::RobotRemoved,
    EventKind::MovementReported,
    EventKind::MovementConfigAccepted,
    EventKind::ClearToMoveRequested,
    EventKind::FleetReset,
    EventKind::CloudConnected,
    EventKind::CloudDisconnected,
    EventKind::ShadowDelta,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudState {
    Disconnected,
    Connected,
}

impl fmt::Display for CloudState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloudState::Disconnected => write!(f, "CLOUD_DISCONNECTED"),
            CloudState::Connected => write!(f, "CLOUD_CONNECTED"),
        }
    }
}

pub struct FleetModule {
    state: CloudState,
    registry: FleetRegistry,
    reconciler: ShadowReconciler,
    bus: MessageBus,
}

impl FleetModule {
    pub fn new(bus: MessageBus) -> Self {
        Self {
            state: CloudState::Disconnected,
            registry: FleetRegistry::new(),
            reconciler: ShadowReconciler::new(),
            bus,
        }
    }

    pub fn state(&self) -> CloudState {
        self.state
    }

    pub fn registry(&self) -> &FleetRegistry {
        &self.registry
    }

    fn connected(&self) -> bool {
        self.state == CloudState::Connected
    }

    fn set_state(&mut self, next: CloudState) {
        if self.state == next {
            debug!(state = %next, "already in state");
            return;
        }
        debug!("state transition {} --> {}", self.state, next);
        self.state = next;
        if next == CloudState::Connected {
            self.report(report_cleared());
            self.report(serialize_report(&self.registry));
        }
    }

    fn publish(&self, payload: EventPayload) {
        self.bus.publish(Event::new(NAME, payload));
    }

    fn report(&self, doc: ShadowDocument) {
        match doc.to_json() {
            Ok(document) => self.publish(EventPayload::ShadowReport { document }),
            Err(err) => error!(error = %err, "failed to encode report"),
        }
    }

    fn report_error(&self, message: String) {
        warn!(%message, "fleet error");
        self.publish(EventPayload::Error {
            module: NAME.to_string(),
            message,
        });
    }

    fn check_barrier(&mut self) {
        if self.registry.poll_barrier() {
            info!(robots = self.registry.len(), "all robots configured");
            self.publish(EventPayload::ClearToMove);
        }
    }

    fn on_robot_added(&mut self, address: RobotAddress) {
        match self.registry.add(address) {
            Ok(()) if self.connected() => self.report(report_added(address)),
            Ok(()) => {}
            Err(err) => warn!(error = %err, "robot add rejected"),
        }
    }

    fn on_robot_removed(&mut self, address: RobotAddress) {
        match self.registry.remove(address) {
            Ok(_) => {
                if self.connected() {
                    self.report(report_removed(address));
                }
                self.check_barrier();
            }
            Err(err) => warn!(error = %err, "robot remove rejected"),
        }
    }

    fn on_movement_reported(&mut self, address: RobotAddress, yaw: i32) {
        match self.registry.record_revolution_count(address, yaw) {
            Ok(true) if self.connected() => self.report(report_revolution_counts(&self.registry)),
            Ok(true) => debug!("revolution round complete while disconnected"),
            Ok(false) => {
                debug!(address = %address, pending = ?self.registry.pending_round(), "revolution round open");
            }
            Err(err) => warn!(error = %err, "movement report for unknown robot"),
        }
    }

    fn on_config_accepted(&mut self, address: RobotAddress) {
        if let Err(err) = self.registry.mark_configured(address) {
            warn!(error = %err, "configuration accepted for unknown robot");
            return;
        }
        if self.connected()
            && let Some(robot) = self.registry.get(address)
        {
            self.report(report_movement_config(address, &robot.config));
        }
        self.check_barrier();
    }

    fn on_clear_to_move_requested(&mut self) {
        let released = self.registry.release_idle();
        debug!(released, "idle robots released");
        self.check_barrier();
    }

    fn on_fleet_reset(&mut self) {
        self.registry.clear();
        self.reconciler.reset();
        info!("fleet reset");
        if self.connected() {
            self.report(report_cleared());
        }
    }

    fn on_shadow_delta(&mut self, document: &str) {
        if !self.connected() {
            debug!("shadow delta ignored while disconnected");
            return;
        }
        let outcome = ShadowDocument::parse(document)
            .and_then(|doc| self.reconciler.apply_delta(&mut self.registry, &doc));
        match outcome {
            Ok(DeltaOutcome::Applied { events }) => {
                for payload in events {
                    if let EventPayload::LedConfigure { address, led } = &payload {
                        self.report(report_led_config(*address, led));
                    }
                    self.publish(payload);
                }
            }
            Ok(DeltaOutcome::Stale { version, last_applied }) => {
                debug!(version, last_applied, "stale delta dropped");
            }
            Err(err) => self.report_error(format!("delta discarded: {err}")),
        }
    }
}

#[async_trait]
impl Module for FleetModule {
    fn name(&self) -> &'static str {
        NAME
    }

    fn interests(&self) -> &'static [EventKind] {
        INTERESTS
    }

    async fn handle(&mut self, event: Event) {
        match event.payload {
            EventPayload::RobotAdded { address } => self.on_robot_added(address),
            EventPayload::RobotRemoved { address } => self.on_robot_removed(address),
            EventPayload::MovementReported { address, yaw, .. } => self.on_movement_reported(address, yaw),
            EventPayload::MovementConfigAccepted { address } => self.on_config_accepted(address),
            EventPayload::ClearToMoveRequested => self.on_clear_to_move_requested(),
            EventPayload::FleetReset => self.on_fleet_reset(),
            EventPayload::CloudConnected => self.set_state(CloudState::Connected),
            EventPayload::CloudDisconnected => self.set_state(CloudState::Disconnected),
            EventPayload::ShadowDelta { document } => self.on_shadow_delta(&document),
            other => debug!(kind = ?other.kind(), "event ignored"),
        }
    }
}
