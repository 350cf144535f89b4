//! Per-turn state machine and result aggregation.
//!
//! A turn moves `Sent → Started → Running → {Completed | Failed | Errored}`.
//! [`TurnTracker::observe`] enforces the event ordering the agent promises
//! and rejects anything else as [`SdkError::Decode`]; no transition is
//! possible out of a terminal state.

use std::collections::{HashMap, HashSet};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::exec::spawner::ThreadDirective;
use crate::models::events::{ThreadEvent, Usage};
use crate::models::items::ThreadItem;
use crate::{Result, SdkError};

/// Lifecycle of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Request written; nothing received yet.
    Sent,
    /// `turn.started` received.
    Started,
    /// At least one item event received.
    Running,
    /// `turn.completed` received.
    Completed,
    /// `turn.failed` received.
    Failed,
    /// Thread-level `error` received.
    Errored,
}

impl TurnState {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Errored)
    }

    fn accepts_items(self) -> bool {
        matches!(self, Self::Started | Self::Running)
    }
}

/// Final aggregate of a successful turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    /// Thread the turn ran on.
    pub thread_id: Option<String>,
    /// Text of the last completed agent message; empty if there was none.
    pub final_response: String,
    /// One entry per item id, in first-seen order, with its latest payload.
    pub items: Vec<ThreadItem>,
    /// Token usage reported for the turn.
    pub usage: Usage,
}

impl RunResult {
    /// Parse [`final_response`](Self::final_response) as JSON, for turns run
    /// with an output schema.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Decode`] if the response is not valid JSON for `T`.
    pub fn parse_response<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.final_response)
            .map_err(|e| SdkError::Decode(format!("final response is not valid JSON: {e}")))
    }
}

/// Ordering checks and aggregation for one turn's event sequence.
#[derive(Debug)]
pub struct TurnTracker {
    state: TurnState,
    resuming: Option<String>,
    thread_id: Option<String>,
    items: Vec<ThreadItem>,
    index: HashMap<String, usize>,
    completed: HashSet<String>,
    final_response: Option<String>,
    usage: Usage,
    failure: Option<String>,
    began: bool,
}

impl TurnTracker {
    /// Create a tracker for a turn launched with `directive`.
    #[must_use]
    pub fn new(directive: &ThreadDirective) -> Self {
        let resuming = directive.thread_id().map(str::to_owned);
        Self {
            state: TurnState::Sent,
            thread_id: resuming.clone(),
            resuming,
            items: Vec::new(),
            index: HashMap::new(),
            completed: HashSet::new(),
            final_response: None,
            usage: Usage::default(),
            failure: None,
            began: false,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Thread id, once known.
    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Usage recorded so far.
    #[must_use]
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Apply `event` to the state machine.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Decode`] when the event is out of order: anything
    /// after a terminal event, items before `turn.started`, a repeated
    /// `turn.started`, `turn.started` on a new thread before `thread.started`,
    /// `thread.started` after the turn began, or an update to
    /// an item that was never started or is already completed.
    pub fn observe(&mut self, event: &ThreadEvent) -> Result<()> {
        if self.state.is_terminal() {
            return Err(out_of_order(event, "after the terminal event"));
        }

        match event {
            ThreadEvent::ThreadStarted(ev) => {
                if self.state != TurnState::Sent {
                    return Err(out_of_order(event, "after turn.started"));
                }
                self.thread_id = Some(ev.thread_id.clone());
            }
            ThreadEvent::TurnStarted(_) => {
                if self.state != TurnState::Sent {
                    return Err(out_of_order(event, "twice in one turn"));
                }
                if self.thread_id.is_none() {
                    return Err(out_of_order(event, "before thread.started on a new thread"));
                }
                self.state = TurnState::Started;
                self.began = true;
            }
            ThreadEvent::ItemStarted(ev) => {
                self.require_items(event)?;
                let id = ev.item.id();
                if self.completed.contains(id) {
                    return Err(out_of_order(event, &format!("for completed item `{id}`")));
                }
                self.upsert(&ev.item);
            }
            ThreadEvent::ItemUpdated(ev) => {
                self.require_items(event)?;
                let id = ev.item.id();
                if !self.index.contains_key(id) {
                    return Err(out_of_order(event, &format!("for unknown item `{id}`")));
                }
                if self.completed.contains(id) {
                    return Err(out_of_order(event, &format!("for completed item `{id}`")));
                }
                self.upsert(&ev.item);
            }
            ThreadEvent::ItemCompleted(ev) => {
                self.require_items(event)?;
                let id = ev.item.id();
                if self.completed.contains(id) {
                    return Err(out_of_order(event, &format!("for completed item `{id}`")));
                }
                self.upsert(&ev.item);
                self.completed.insert(id.to_owned());
                if let ThreadItem::AgentMessage(msg) = &ev.item {
                    self.final_response = Some(msg.text.clone());
                }
            }
            ThreadEvent::TurnCompleted(ev) => {
                if !self.state.accepts_items() {
                    return Err(out_of_order(event, "before turn.started"));
                }
                self.usage.accumulate(&ev.usage);
                self.state = TurnState::Completed;
            }
            ThreadEvent::TurnFailed(ev) => {
                self.failure = Some(ev.error.message.clone());
                self.state = TurnState::Failed;
            }
            ThreadEvent::ThreadError(ev) => {
                self.failure = Some(ev.message.clone());
                self.state = TurnState::Errored;
            }
            ThreadEvent::Unknown { .. } => {}
        }
        Ok(())
    }

    /// Convert the finished turn into its outcome.
    ///
    /// # Errors
    ///
    /// - [`SdkError::TurnFailed`] after `turn.failed`.
    /// - [`SdkError::ThreadNotFound`] after an `error` on a resumed thread
    ///   before `turn.started`.
    /// - [`SdkError::ThreadRuntime`] after any other `error`, or when the
    ///   turn never reached a terminal event.
    pub fn finish(self) -> Result<RunResult> {
        let detail = self.failure.unwrap_or_default();
        match self.state {
            TurnState::Completed => Ok(RunResult {
                thread_id: self.thread_id,
                final_response: self.final_response.unwrap_or_default(),
                items: self.items,
                usage: self.usage,
            }),
            TurnState::Failed => Err(SdkError::TurnFailed(detail)),
            TurnState::Errored => match self.resuming {
                Some(thread_id) if !self.began => {
                    Err(SdkError::ThreadNotFound {
                        thread_id,
                        message: detail,
                    })
                }
                _ => Err(SdkError::ThreadRuntime(detail)),
            },
            TurnState::Sent | TurnState::Started | TurnState::Running => Err(
                SdkError::ThreadRuntime("event stream ended before the turn finished".into()),
            ),
        }
    }

    fn require_items(&self, event: &ThreadEvent) -> Result<()> {
        if self.state.accepts_items() {
            Ok(())
        } else {
            Err(out_of_order(event, "before turn.started"))
        }
    }

    fn upsert(&mut self, item: &ThreadItem) {
        match self.index.get(item.id()) {
            Some(&pos) => self.items[pos] = item.clone(),
            None => {
                self.index.insert(item.id().to_owned(), self.items.len());
                self.items.push(item.clone());
            }
        }
        self.state = TurnState::Running;
    }
}

fn out_of_order(event: &ThreadEvent, context: &str) -> SdkError {
    SdkError::Decode(format!("out-of-order event: `{}` {context}", event.kind()))
}
