//! Error types shared across the SDK.

use std::fmt::{Display, Formatter};

/// Shared SDK result type.
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error enumeration covering every failure a caller of
/// [`Thread::run`](crate::Thread::run) can observe.
#[derive(Debug)]
pub enum SdkError {
    /// The agent executable could not be found or failed to start.
    Launch(String),
    /// Run or thread options failed validation; nothing was spawned.
    InvalidOptions(String),
    /// A record on the agent's output stream was malformed or out of order.
    Decode(String),
    /// A resumed thread id is unknown to the agent.
    ThreadNotFound {
        /// The id the caller tried to resume.
        thread_id: String,
        /// Detail reported by the agent.
        message: String,
    },
    /// The agent reported a failed turn. A new turn may be issued.
    TurnFailed(String),
    /// The agent reported an unexpected thread-level failure, or exited
    /// before the turn reached a terminal event.
    ThreadRuntime(String),
    /// The turn deadline expired; the agent process was terminated.
    Timeout(String),
    /// Another turn is still outstanding on the same thread.
    TurnInProgress(String),
    /// Client configuration parsing or validation failure.
    Config(String),
    /// I/O failure while talking to the agent process.
    Io(String),
}

impl Display for SdkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Launch(msg) => write!(f, "launch: {msg}"),
            Self::InvalidOptions(msg) => write!(f, "invalid options: {msg}"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::ThreadNotFound { thread_id, message } => {
                write!(f, "thread not found: {thread_id}: {message}")
            }
            Self::TurnFailed(msg) => write!(f, "turn failed: {msg}"),
            Self::ThreadRuntime(msg) => write!(f, "thread runtime: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::TurnInProgress(msg) => write!(f, "turn in progress: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for SdkError {}

impl From<toml::de::Error> for SdkError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for SdkError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(format!("malformed json: {err}"))
    }
}

impl From<tokio_util::codec::LinesCodecError> for SdkError {
    fn from(err: tokio_util::codec::LinesCodecError) -> Self {
        match err {
            tokio_util::codec::LinesCodecError::MaxLineLengthExceeded => Self::Decode(format!(
                "line too long: exceeded {} bytes",
                crate::exec::codec::MAX_LINE_BYTES
            )),
            tokio_util::codec::LinesCodecError::Io(err) => Self::Io(err.to_string()),
        }
    }
}
