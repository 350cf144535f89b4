//! Thread events emitted by the agent, one per output line.
//!
//! | `type`           | Variant                          |
//! |------------------|----------------------------------|
//! | `thread.started` | [`ThreadEvent::ThreadStarted`]   |
//! | `turn.started`   | [`ThreadEvent::TurnStarted`]     |
//! | `turn.completed` | [`ThreadEvent::TurnCompleted`]   |
//! | `turn.failed`    | [`ThreadEvent::TurnFailed`]      |
//! | `item.started`   | [`ThreadEvent::ItemStarted`]     |
//! | `item.updated`   | [`ThreadEvent::ItemUpdated`]     |
//! | `item.completed` | [`ThreadEvent::ItemCompleted`]   |
//! | `error`          | [`ThreadEvent::ThreadError`]     |
//! | *(any other)*    | [`ThreadEvent::Unknown`]         |

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::items::ThreadItem;
use super::{discriminator, serialize_tagged};

/// Token accounting for a completed turn.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Input tokens served from the prompt cache.
    #[serde(default)]
    pub cached_input_tokens: u64,
    /// Output tokens produced.
    pub output_tokens: u64,
}

impl Usage {
    /// Add `other` to this usage, saturating on overflow.
    pub fn accumulate(&mut self, other: &Usage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.cached_input_tokens = self
            .cached_input_tokens
            .saturating_add(other.cached_input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }

    /// Whether every counter is at least the corresponding counter of `other`.
    #[must_use]
    pub fn dominates(&self, other: &Usage) -> bool {
        self.input_tokens >= other.input_tokens
            && self.cached_input_tokens >= other.cached_input_tokens
            && self.output_tokens >= other.output_tokens
    }
}

/// Failure detail attached to `turn.failed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadErrorDetail {
    /// Human-readable message.
    pub message: String,
}

/// `thread.started` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadStartedEvent {
    /// Id assigned by the agent; use it to resume the thread later.
    pub thread_id: String,
}

/// `turn.started` payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnStartedEvent {}

/// `turn.completed` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnCompletedEvent {
    /// Usage for the turn.
    pub usage: Usage,
}

/// `turn.failed` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TurnFailedEvent {
    /// What went wrong.
    pub error: ThreadErrorDetail,
}

/// Payload of `item.started`, `item.updated`, and `item.completed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemEvent {
    /// Current state of the item.
    pub item: ThreadItem,
}

/// `error` payload: an unrecoverable thread-level failure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadErrorEvent {
    /// Human-readable message.
    pub message: String,
}

/// Event emitted by the agent while running a thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadEvent {
    /// A new thread was created; carries its id.
    ThreadStarted(ThreadStartedEvent),
    /// The turn began processing input.
    TurnStarted(TurnStartedEvent),
    /// The turn finished successfully.
    TurnCompleted(TurnCompletedEvent),
    /// The turn finished with an agent-reported failure.
    TurnFailed(TurnFailedEvent),
    /// An item appeared.
    ItemStarted(ItemEvent),
    /// An item changed.
    ItemUpdated(ItemEvent),
    /// An item reached its final state.
    ItemCompleted(ItemEvent),
    /// The thread hit an unrecoverable error.
    ThreadError(ThreadErrorEvent),
    /// An event kind this SDK does not recognize.
    Unknown {
        /// Raw `type` discriminator.
        kind: String,
        /// The full record as received.
        payload: Value,
    },
}

impl ThreadEvent {
    /// Wire discriminator of this event.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::ThreadStarted(_) => "thread.started",
            Self::TurnStarted(_) => "turn.started",
            Self::TurnCompleted(_) => "turn.completed",
            Self::TurnFailed(_) => "turn.failed",
            Self::ItemStarted(_) => "item.started",
            Self::ItemUpdated(_) => "item.updated",
            Self::ItemCompleted(_) => "item.completed",
            Self::ThreadError(_) => "error",
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Whether this event ends a turn's event sequence.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TurnCompleted(_) | Self::TurnFailed(_) | Self::ThreadError(_)
        )
    }

    /// The item carried by an `item.*` event.
    #[must_use]
    pub fn item(&self) -> Option<&ThreadItem> {
        match self {
            Self::ItemStarted(ev) | Self::ItemUpdated(ev) | Self::ItemCompleted(ev) => {
                Some(&ev.item)
            }
            _ => None,
        }
    }

    /// Decode an event from its JSON record.
    ///
    /// # Errors
    ///
    /// Returns a message when the record has no `type`, or a known kind is
    /// missing a required field.
    pub fn from_value(value: Value) -> std::result::Result<Self, String> {
        let kind = discriminator(&value, "event")?.to_owned();
        let event = match kind.as_str() {
            "thread.started" => Self::ThreadStarted(payload(value, &kind)?),
            "turn.started" => Self::TurnStarted(payload(value, &kind)?),
            "turn.completed" => Self::TurnCompleted(payload(value, &kind)?),
            "turn.failed" => Self::TurnFailed(payload(value, &kind)?),
            "item.started" => Self::ItemStarted(payload(value, &kind)?),
            "item.updated" => Self::ItemUpdated(payload(value, &kind)?),
            "item.completed" => Self::ItemCompleted(payload(value, &kind)?),
            "error" => Self::ThreadError(payload(value, &kind)?),
            _ => Self::Unknown {
                kind,
                payload: value,
            },
        };
        Ok(event)
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    value: Value,
    kind: &str,
) -> std::result::Result<T, String> {
    serde_json::from_value(value).map_err(|e| format!("invalid {kind} event: {e}"))
}

impl Serialize for ThreadEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::ThreadStarted(ev) => serialize_tagged(serializer, self.kind(), ev),
            Self::TurnStarted(ev) => serialize_tagged(serializer, self.kind(), ev),
            Self::TurnCompleted(ev) => serialize_tagged(serializer, self.kind(), ev),
            Self::TurnFailed(ev) => serialize_tagged(serializer, self.kind(), ev),
            Self::ItemStarted(ev) | Self::ItemUpdated(ev) | Self::ItemCompleted(ev) => {
                serialize_tagged(serializer, self.kind(), ev)
            }
            Self::ThreadError(ev) => serialize_tagged(serializer, self.kind(), ev),
            Self::Unknown { payload, .. } => payload.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ThreadEvent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}
