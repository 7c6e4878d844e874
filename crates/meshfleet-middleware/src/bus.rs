//! Interest-routed publish/subscribe bus with one bounded mailbox per module.
//!
//! Each module calls [`MessageBus::subscribe`] once at start-up with the set
//! of [`EventKind`]s it handles and receives a [`Mailbox`].  Publishing never
//! blocks: a copy of the event is offered to every interested mailbox with
//! `try_send`.
//!
//! | Situation | Outcome |
//! |---|---|
//! | Mailbox has room | Event queued, FIFO with earlier publishes |
//! | Mailbox full | Copy dropped, `warn!` logged, [`MessageBus::dropped`] incremented |
//! | Mailbox receiver gone | Subscriber pruned |
//!
//! The subscriber list lock is held for the whole fan-out of one publish, so
//! two concurrent publishes reach every common mailbox in the same order.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use meshfleet_types::{BusError, Event, EventKind};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::{debug, warn};

/// Default mailbox capacity (events buffered per module).
pub const DEFAULT_CAPACITY: usize = 64;

struct Subscriber {
    module: String,
    interests: HashSet<EventKind>,
    sender: mpsc::Sender<Event>,
}

struct BusInner {
    capacity: usize,
    subscribers: Mutex<Vec<Subscriber>>,
    dropped: AtomicU64,
}

/// Shared bus handle.  Clones share the same subscriber table.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

impl MessageBus {
    /// Create a bus whose mailboxes each hold up to `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                capacity: capacity.max(1),
                subscribers: Mutex::new(Vec::new()),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Register `module` for the given event kinds and return its mailbox.
    pub fn subscribe(&self, module: impl Into<String>, interests: &[EventKind]) -> Mailbox {
        let module = module.into();
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        self.lock().push(Subscriber {
            module: module.clone(),
            interests: interests.iter().copied().collect(),
            sender,
        });
        debug!(module = %module, interests = ?interests, "subscribed");
        Mailbox { module, receiver }
    }

    /// Offer `event` to every interested mailbox.
    ///
    /// Returns the number of mailboxes the event was queued in.
    pub fn publish(&self, event: Event) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        self.lock().retain(|sub| {
            if !sub.interests.contains(&kind) {
                return true;
            }
            match sub.sender.try_send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    let err = BusError::MailboxFull {
                        module: sub.module.clone(),
                    };
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %err, kind = ?kind, source = %event.source, "bus overflow");
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(module = %sub.module, "mailbox closed; pruning subscriber");
                    false
                }
            }
        });
        delivered
    }

    /// Total event copies dropped because a mailbox was full.
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Receiving end owned by exactly one module worker.
pub struct Mailbox {
    module: String,
    receiver: mpsc::Receiver<Event>,
}

impl Mailbox {
    /// Wait for the next event.  Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Result<Option<Event>, BusError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BusError::MailboxClosed {
                module: self.module.clone(),
            }),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }
}
