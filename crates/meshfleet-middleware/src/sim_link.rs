//! In-process stand-in for the radio coprocessor.
//!
//! [`SimLink`] implements [`LinkTransport`] without any hardware:
//!
//! * **Outbound** – every transmitted frame is decoded and recorded.  A
//!   `Hello` is echoed back with the same token; a `SetMovementConfig` is
//!   answered with a `ConfigAck` (unless auto-ack is switched off).
//! * **Inbound** – tests and the `--simulate` CLI mode push byte chunks with
//!   [`SimLink::inject`] or whole robot-side frames with the helpers.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use meshfleet_types::{LinkError, LinkMessage, RobotAddress, WireMessage};
use tokio::sync::mpsc;
use tracing::debug;

use crate::adapter::LinkTransport;

pub struct SimLink {
    inbound: mpsc::UnboundedSender<Bytes>,
    stream: Mutex<Option<mpsc::UnboundedReceiver<Bytes>>>,
    sent: Mutex<Vec<WireMessage>>,
    echo_hello: AtomicBool,
    auto_ack: AtomicBool,
    next_seq: AtomicI32,
}

impl SimLink {
    pub fn new() -> Self {
        let (inbound, rx) = mpsc::unbounded_channel();
        Self {
            inbound,
            stream: Mutex::new(Some(rx)),
            sent: Mutex::new(Vec::new()),
            echo_hello: AtomicBool::new(true),
            auto_ack: AtomicBool::new(true),
            next_seq: AtomicI32::new(0),
        }
    }

    /// Answer `SetMovementConfig` with `ConfigAck`.
    pub fn set_auto_ack(&self, enabled: bool) {
        self.auto_ack.store(enabled, Ordering::SeqCst);
    }

    /// Echo `Hello` frames back.
    pub fn set_echo_hello(&self, enabled: bool) {
        self.echo_hello.store(enabled, Ordering::SeqCst);
    }

    /// Deliver raw bytes as if they arrived on the link.
    pub fn inject(&self, chunk: impl Into<Bytes>) {
        // The receiver only goes away when the pump has shut down.
        let _ = self.inbound.send(chunk.into());
    }

    /// Deliver one encoded frame.
    pub fn inject_message(&self, msg: &WireMessage) {
        self.inject(msg.encode().to_bytes());
    }

    /// A robot joined the mesh.
    pub fn announce_robot(&self, address: RobotAddress) {
        self.inject_message(&WireMessage::RobotAdded { address });
    }

    /// A robot finished a move.
    pub fn report_movement(&self, address: RobotAddress, x: i32, y: i32, yaw: i32) {
        self.inject_message(&WireMessage::MovementReported { address, x, y, yaw });
    }

    /// Every frame transmitted so far, in order.
    pub fn sent(&self) -> Vec<WireMessage> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for SimLink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkTransport for SimLink {
    async fn transmit(&self, frame: Bytes) -> Result<(), LinkError> {
        let msg = LinkMessage::from_frame(frame)
            .map_err(|e| LinkError::Io(e.to_string()))?
            .decode();
        debug!(msg = ?msg, "sim link received frame");
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg);

        match msg {
            WireMessage::Hello { echo } if self.echo_hello.load(Ordering::SeqCst) => {
                self.inject_message(&WireMessage::Hello { echo });
            }
            WireMessage::SetMovementConfig { .. } if self.auto_ack.load(Ordering::SeqCst) => {
                let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
                self.inject_message(&WireMessage::ConfigAck { seq });
            }
            _ => {}
        }
        Ok(())
    }

    async fn chunk_stream(&self) -> BoxStream<'static, Bytes> {
        let taken = self
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|chunk| (chunk, rx))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }
}
