//! Turn request writer.
//!
//! Serialises the [`TurnRequest`] as one compact JSON line and writes it to
//! the agent's stdin, then closes stdin so the agent sees end of input.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::options::TurnRequest;
use crate::{Result, SdkError};

/// Write `request` as a single JSON line and shut the stream down.
///
/// Consumes the writer: a request is written exactly once per process.
///
/// # Errors
///
/// - [`SdkError::InvalidOptions`] if the request cannot be serialised.
/// - [`SdkError::Io`]`("write failed: …")` if the agent closed its stdin
///   (for example because it already exited).
pub async fn send_request<W>(mut stdin: W, request: &TurnRequest) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = request.to_line()?.into_bytes();
    bytes.push(b'\n');

    stdin
        .write_all(&bytes)
        .await
        .map_err(|e| SdkError::Io(format!("write failed: {e}")))?;
    stdin
        .shutdown()
        .await
        .map_err(|e| SdkError::Io(format!("failed to close agent stdin: {e}")))?;

    debug!(bytes = bytes.len(), "turn request sent");
    Ok(())
}
