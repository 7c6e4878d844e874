//! `meshfleet-runtime` – the module state machines and their wiring.
//!
//! # Modules
//!
//! - [`gateway`] – link handshake, inbound frame translation, outbound commands.
//! - [`fleet`] – registry owner, shadow reconciliation, cloud reporting, barrier.
//! - [`module`] – the [`Module`] trait and mailbox-driven worker loop.
//! - [`supervisor`] – starts pump and modules over a transport.
//! - [`telemetry`] – tracing subscriber and optional OTLP export.

pub mod fleet;
pub mod gateway;
pub mod module;
pub mod supervisor;
pub mod telemetry;

pub use fleet::{CloudState, FleetModule};
pub use gateway::{GatewayConfig, GatewayModule, LinkState};
pub use module::Module;
pub use supervisor::{Supervisor, launch};
