//! Link plumbing between the transport, the framer and the bus.
//!
//! * [`LinkPump`] – runs in the byte-delivery context: feeds chunks to the
//!   [`LinkFramer`], resolves configuration acknowledgements and publishes
//!   every frame to the bus in framing order.
//! * [`LinkWriter`] – outbound path with a single outstanding transmit,
//!   enforced by a binary permit with a bounded wait.
//! * [`AckTracker`] – FIFO of callers waiting for a `ConfigAck` frame.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use meshfleet_types::{Event, EventPayload, LinkError, WireMessage};
use tokio::sync::{Semaphore, oneshot};
use tracing::{debug, info, warn};

use crate::adapter::LinkTransport;
use crate::bus::MessageBus;
use crate::framer::{FramerStats, LinkFramer};

/// Bus source name of frames published by the pump.
pub const PUMP_SOURCE: &str = "link";

// ─────────────────────────────────────────────────────────────────────────────
// Acknowledgements
// ─────────────────────────────────────────────────────────────────────────────

/// Waiters for `ConfigAck` frames, resolved oldest first.
#[derive(Clone, Default)]
pub struct AckTracker {
    waiters: Arc<Mutex<VecDeque<oneshot::Sender<i32>>>>,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in the next acknowledgement.
    ///
    /// Register before transmitting so an early ack cannot be missed.
    pub fn register(&self) -> PendingAck {
        let (tx, rx) = oneshot::channel();
        self.lock().push_back(tx);
        PendingAck { rx }
    }

    /// Hand `seq` to the oldest waiter that is still listening.
    ///
    /// Returns `false` when nobody was waiting.
    pub fn resolve(&self, seq: i32) -> bool {
        let mut waiters = self.lock();
        while let Some(tx) = waiters.pop_front() {
            if tx.send(seq).is_ok() {
                return true;
            }
        }
        false
    }

    /// Waiters still queued, abandoned ones included.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<oneshot::Sender<i32>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One caller's claim on a future acknowledgement.
pub struct PendingAck {
    rx: oneshot::Receiver<i32>,
}

impl PendingAck {
    /// Wait at most `limit` for the acknowledgement's sequence number.
    pub async fn wait(self, limit: Duration) -> Result<i32, LinkError> {
        match tokio::time::timeout(limit, self.rx).await {
            Ok(Ok(seq)) => Ok(seq),
            Ok(Err(_)) => Err(LinkError::Closed),
            Err(_) => Err(LinkError::Timeout),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// Serialises outbound frames onto a [`LinkTransport`].
#[derive(Clone)]
pub struct LinkWriter {
    transport: Arc<dyn LinkTransport>,
    permit: Arc<Semaphore>,
    acks: AckTracker,
    transmit_timeout: Duration,
}

impl LinkWriter {
    pub fn new(transport: Arc<dyn LinkTransport>, acks: AckTracker, transmit_timeout: Duration) -> Self {
        Self {
            transport,
            permit: Arc::new(Semaphore::new(1)),
            acks,
            transmit_timeout,
        }
    }

    /// Transmit one frame.
    ///
    /// Waits up to the transmit timeout for the previous transmit to finish
    /// ([`LinkError::Timeout`]), then up to the same timeout for this one
    /// ([`LinkError::TransmitAborted`]).
    pub async fn send(&self, msg: &WireMessage) -> Result<(), LinkError> {
        let _permit = tokio::time::timeout(self.transmit_timeout, self.permit.acquire())
            .await
            .map_err(|_| LinkError::Timeout)?
            .map_err(|_| LinkError::Closed)?;
        let frame = msg.encode().to_bytes();
        debug!(kind = ?msg.kind(), len = frame.len(), "transmit");
        tokio::time::timeout(self.transmit_timeout, self.transport.transmit(frame))
            .await
            .map_err(|_| LinkError::TransmitAborted)?
    }

    /// Transmit `msg` and wait up to `ack_timeout` for the peer's `ConfigAck`.
    pub async fn send_and_await_ack(&self, msg: &WireMessage, ack_timeout: Duration) -> Result<i32, LinkError> {
        let pending = self.acks.register();
        self.send(msg).await?;
        pending.wait(ack_timeout).await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// Drives inbound bytes through the framer onto the bus.
pub struct LinkPump {
    framer: LinkFramer,
    bus: MessageBus,
    acks: AckTracker,
}

impl LinkPump {
    pub fn new(bus: MessageBus, acks: AckTracker) -> Self {
        Self {
            framer: LinkFramer::new(),
            bus,
            acks,
        }
    }

    /// Frame one chunk and publish the result.  Returns frames completed.
    pub fn ingest(&mut self, chunk: &[u8]) -> usize {
        let mut count = 0;
        for msg in self.framer.feed(chunk) {
            if let WireMessage::ConfigAck { seq } = msg.decode()
                && !self.acks.resolve(seq)
            {
                warn!(seq, "acknowledgement with no waiter");
            }
            self.bus.publish(Event::new(PUMP_SOURCE, EventPayload::FrameReceived(msg)));
            count += 1;
        }
        count
    }

    pub fn stats(&self) -> FramerStats {
        self.framer.stats()
    }

    /// Consume `chunks` until the transport closes it.
    pub async fn run(mut self, mut chunks: BoxStream<'static, Bytes>) -> FramerStats {
        while let Some(chunk) = chunks.next().await {
            self.ingest(&chunk);
        }
        let stats = self.framer.stats();
        info!(
            frames = stats.frames,
            framing_errors = stats.framing_errors,
            "link stream ended"
        );
        stats
    }
}
