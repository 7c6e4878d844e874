//! Wires a transport, the bus and both modules into a running fleet.

use std::sync::Arc;

use meshfleet_middleware::{AckTracker, LinkPump, LinkTransport, LinkWriter, MessageBus};
use tokio::task::JoinHandle;
use tracing::info;

use crate::fleet::FleetModule;
use crate::gateway::{GatewayConfig, GatewayModule};
use crate::module;

/// Handles of every task started by [`launch`].
pub struct Supervisor {
    bus: MessageBus,
    tasks: Vec<JoinHandle<()>>,
}

/// Start the fleet module, the gateway module and the link pump.
///
/// Both modules are subscribed before the pump delivers its first frame,
/// and the gateway starts the link handshake immediately.
pub async fn launch(transport: Arc<dyn LinkTransport>, bus: MessageBus, config: GatewayConfig) -> Supervisor {
    let acks = AckTracker::new();
    let writer = LinkWriter::new(transport.clone(), acks.clone(), config.transmit_timeout);
    let chunks = transport.chunk_stream().await;

    let fleet = module::spawn(&bus, FleetModule::new(bus.clone()));
    let gateway = module::spawn(&bus, GatewayModule::new(bus.clone(), writer, config));
    let pump = LinkPump::new(bus.clone(), acks);
    let pump = tokio::spawn(async move {
        pump.run(chunks).await;
    });

    info!("fleet coordinator running");
    Supervisor {
        bus,
        tasks: vec![fleet, gateway, pump],
    }
}

impl Supervisor {
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Abort every task.
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!(dropped_events = self.bus.dropped(), "fleet coordinator stopped");
    }
}
