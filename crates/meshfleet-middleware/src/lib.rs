//! `meshfleet-middleware` – link and bus plumbing.
//!
//! Moves bytes and events between the radio coprocessor and the module
//! workers without interpreting fleet semantics.
//!
//! # Modules
//!
//! - [`bus`] – interest-routed publish/subscribe with per-module mailboxes.
//! - [`framer`] – reassembles fixed-length frames from arbitrary chunks.
//! - [`link`] – inbound pump, single-permit writer and acknowledgement tracking.
//! - [`adapter`] – the [`LinkTransport`] trait every byte transport implements.
//! - [`sim_link`] – in-process simulated coprocessor.

pub mod adapter;
pub mod bus;
pub mod framer;
pub mod link;
pub mod sim_link;

pub use adapter::LinkTransport;
pub use bus::{Mailbox, MessageBus};
pub use framer::{FramerStats, LinkFramer};
pub use link::{AckTracker, LinkPump, LinkWriter, PendingAck};
pub use sim_link::SimLink;
