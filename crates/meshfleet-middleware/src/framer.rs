//! Link Framer – reassembles fixed-length frames from arbitrary byte chunks.
//!
//! The framer only sees a sequence of octets; chunk boundaries carry no
//! meaning.  After each [`LinkFramer::feed`] the caller pulls completed
//! frames from the returned iterator.  Trailing bytes of a following frame
//! stay buffered until the rest arrives.
//!
//! # Resynchronisation
//!
//! An unknown tag in header position is a framing error for the message in
//! progress: everything buffered at that point is discarded and framing
//! restarts at offset 0 of the next chunk.  The stream itself is never
//! aborted.

use bytes::BytesMut;
use meshfleet_types::wire::HEADER_LEN;
use meshfleet_types::{FramingError, LinkMessage, MessageKind};
use tracing::{trace, warn};

/// Largest frame in the wire table.
const MAX_FRAME_LEN: usize = 21;

/// Framer statistics for monitoring and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FramerStats {
    /// Complete frames emitted.
    pub frames: u64,
    /// Unknown-kind headers seen.
    pub framing_errors: u64,
    /// Bytes thrown away while resynchronising.
    pub bytes_discarded: u64,
}

#[derive(Debug)]
pub struct LinkFramer {
    buf: BytesMut,
    stats: FramerStats,
}

impl LinkFramer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(MAX_FRAME_LEN * 4),
            stats: FramerStats::default(),
        }
    }

    /// Append `chunk` and return the frames it completes.
    ///
    /// The iterator is lazy: frames that are not pulled stay buffered and
    /// are produced by the next iteration.
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.buf.extend_from_slice(chunk);
        Frames { framer: self }
    }

    /// Bytes of the message in progress.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    fn next_frame(&mut self) -> Option<LinkMessage> {
        loop {
            if self.buf.len() < HEADER_LEN {
                return None;
            }
            let tag = self.buf[0];
            let Some(kind) = MessageKind::from_tag(tag) else {
                self.resync(FramingError::UnknownKind(tag));
                return None;
            };
            let len = kind.frame_len();
            if self.buf.len() < len {
                trace!(kind = ?kind, have = self.buf.len(), need = len, "waiting for more bytes");
                return None;
            }
            let frame = self.buf.split_to(len).freeze();
            match LinkMessage::from_frame(frame) {
                Ok(msg) => {
                    self.stats.frames += 1;
                    return Some(msg);
                }
                Err(err) => self.resync(err),
            }
        }
    }

    fn resync(&mut self, err: FramingError) {
        let discarded = self.buf.len();
        warn!(error = %err, discarded, "framing error; resynchronising at next header");
        self.stats.framing_errors += 1;
        self.stats.bytes_discarded += discarded as u64;
        self.buf.clear();
    }
}

impl Default for LinkFramer {
    fn default() -> Self {
        Self::new()
    }
}

/// Frames completed by one [`LinkFramer::feed`] call.
pub struct Frames<'a> {
    framer: &'a mut LinkFramer,
}

impl Iterator for Frames<'_> {
    type Item = LinkMessage;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_frame()
    }
}
