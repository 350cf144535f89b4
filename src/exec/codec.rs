//! JSON Lines codec for the agent's event stream.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so an
//! unterminated or oversized record from a misbehaving agent cannot exhaust
//! memory.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tokio_util::codec::FramedRead;
//! use adom_sdk::exec::codec::EventCodec;
//!
//! let frames = FramedRead::new(child_stdout, EventCodec::new());
//! ```

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec};

use crate::{Result, SdkError};

/// Maximum record length accepted from the agent: 1 MiB.
///
/// A longer line makes [`EventCodec::decode`] fail with
/// [`SdkError::Decode`]`("line too long: …")`.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Newline-delimited UTF-8 framing for agent events.
///
/// Each `\n`-terminated line is one complete event record. A trailing `\r`
/// is stripped. The decoder never buffers more than one partial record.
#[derive(Debug)]
pub struct EventCodec(LinesCodec);

impl EventCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_BYTES))
    }
}

impl Default for EventCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for EventCodec {
    type Item = String;
    type Error = SdkError;

    /// Decode the next complete line from `src`.
    ///
    /// Returns `Ok(None)` while `src` holds no complete line yet.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        Ok(self.0.decode(src)?)
    }

    /// Decode the final, possibly unterminated, line at EOF.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        Ok(self.0.decode_eof(src)?)
    }
}
