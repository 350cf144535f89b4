//! Event decoder.
//!
//! Turns the agent's stdout into an ordered, single-pass sequence of
//! [`ThreadEvent`]s. Decoding is strict: a line that is not JSON, has no
//! `type`, or is missing a required field of a known event kind fails with
//! [`SdkError::Decode`] and ends the sequence. Unknown event kinds decode to
//! [`ThreadEvent::Unknown`].

use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::debug;

use crate::exec::codec::EventCodec;
use crate::models::events::ThreadEvent;
use crate::{Result, SdkError};

/// Parse a single JSON line into a [`ThreadEvent`].
///
/// # Return value
///
/// - `Ok(Some(event))` for a decodable record.
/// - `Ok(None)` for a blank line.
///
/// # Errors
///
/// - [`SdkError::Decode`]`("malformed json: …")` when the line is not JSON.
/// - [`SdkError::Decode`] naming the field when a record is incomplete.
pub fn decode_event_line(line: &str) -> Result<Option<ThreadEvent>> {
    if line.trim().is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(line)?;

    ThreadEvent::from_value(value)
        .map(Some)
        .map_err(SdkError::Decode)
}

/// Lazy, forward-only reader of [`ThreadEvent`]s over any byte stream.
///
/// Once it has returned an error or reached EOF it yields `None` forever.
#[derive(Debug)]
pub struct EventReader<R> {
    frames: FramedRead<R, EventCodec>,
    finished: bool,
}

impl<R> EventReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Wrap `stdout` in a framed event reader.
    pub fn new(stdout: R) -> Self {
        Self {
            frames: FramedRead::new(stdout, EventCodec::new()),
            finished: false,
        }
    }

    /// Read the next event.
    ///
    /// Returns `None` on EOF, and after any error.
    pub async fn next_event(&mut self) -> Option<Result<ThreadEvent>> {
        while !self.finished {
            match self.frames.next().await {
                None => {
                    debug!("event reader: EOF detected");
                    self.finished = true;
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                Some(Ok(line)) => match decode_event_line(&line) {
                    Ok(Some(event)) => {
                        debug!(kind = event.kind(), "event reader: event decoded");
                        return Some(Ok(event));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        debug!(error = %e, raw_line = %line, "event reader: undecodable line");
                        self.finished = true;
                        return Some(Err(e));
                    }
                },
            }
        }
        None
    }
}
