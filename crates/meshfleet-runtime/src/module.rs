//! Worker plumbing shared by every module.
//!
//! A [`Module`] is a single-threaded state machine fed from one mailbox.
//! [`spawn`] subscribes it on the bus *before* starting the task, so nothing
//! published after `spawn` returns can be missed.

use async_trait::async_trait;
use meshfleet_middleware::{Mailbox, MessageBus};
use meshfleet_types::{Event, EventKind};
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[async_trait]
pub trait Module: Send + 'static {
    /// Bus name; also the `source` of every event the module publishes.
    fn name(&self) -> &'static str;

    /// Event kinds delivered to this module's mailbox.
    fn interests(&self) -> &'static [EventKind];

    /// Runs once, after subscription and before the first event.
    async fn on_start(&mut self) {}

    async fn handle(&mut self, event: Event);
}

/// Drain `mailbox` into `module` until the bus goes away.
pub async fn run<M: Module>(mut module: M, mut mailbox: Mailbox) {
    module.on_start().await;
    info!(module = module.name(), "module started");
    while let Some(event) = mailbox.recv().await {
        debug!(module = module.name(), kind = ?event.kind(), source = %event.source, "event");
        module.handle(event).await;
    }
    info!(module = module.name(), "mailbox closed; module stopped");
}

/// Subscribe `module` on `bus` and run it on its own task.
pub fn spawn<M: Module>(bus: &MessageBus, module: M) -> JoinHandle<()> {
    let mailbox = bus.subscribe(module.name(), module.interests());
    tokio::spawn(run(module, mailbox))
}
