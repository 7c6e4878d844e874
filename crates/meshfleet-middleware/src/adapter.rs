//! The link transport seam.
//!
//! The coordination core never touches a UART, socket or DMA buffer itself.
//! It writes encoded frames through a [`LinkTransport`] and reads raw byte
//! chunks from the stream the transport hands out.
//!
//! - [`SimLink`][crate::sim_link::SimLink] – in-process coprocessor used by
//!   tests and `--simulate` runs.
//! - `TcpLink` (in `meshfleet-cli`) – serial-over-TCP bridge.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use meshfleet_types::LinkError;

/// Every byte transport to the radio coprocessor implements this trait.
///
/// # Contract
///
/// * `transmit` – writes one complete encoded frame.  Returns once the bytes
///   are handed to the transport.
///
/// * `chunk_stream` – returns the inbound byte stream.  Chunk boundaries are
///   arbitrary.  Only the first call is guaranteed to return live data.
#[async_trait]
pub trait LinkTransport: Send + Sync {
    async fn transmit(&self, frame: Bytes) -> Result<(), LinkError>;

    async fn chunk_stream(&self) -> BoxStream<'static, Bytes>;
}
