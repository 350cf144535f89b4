//! Thread session: a handle bound to one conversation.
//!
//! A [`Thread`] hosts sequential turns, never concurrent ones. Each turn
//! spawns a fresh agent process; the first turn of a new thread starts it,
//! and every later turn resumes it by the id announced in `thread.started`.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::exec::spawner::{Launcher, ThreadDirective};
use crate::models::events::ThreadEvent;
use crate::models::input::Input;
use crate::options::{ThreadOptions, TurnOptions, TurnRequest};
use crate::orchestrator::controller::{spawn_stream, EventStream, TurnDriver};
use crate::orchestrator::turn::RunResult;
use crate::{Result, SdkError};

/// Shared, observable slot holding a thread's id once known.
#[derive(Debug, Clone)]
pub(crate) struct ThreadIdCell(Arc<watch::Sender<Option<String>>>);

impl ThreadIdCell {
    fn new(initial: Option<String>) -> Self {
        Self(Arc::new(watch::Sender::new(initial)))
    }

    pub(crate) fn get(&self) -> Option<String> {
        self.0.borrow().clone()
    }

    pub(crate) fn publish(&self, id: &str) {
        let previous = self.0.send_replace(Some(id.to_owned()));
        if previous.as_deref() != Some(id) {
            info!(thread_id = id, "thread id assigned");
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.0.subscribe()
    }
}

/// A conversation with the agent.
///
/// Obtained from [`Adom::start_thread`](crate::Adom::start_thread) or
/// [`Adom::resume_thread`](crate::Adom::resume_thread). Clones share the same
/// id and the same one-turn-at-a-time lock.
#[derive(Debug, Clone)]
pub struct Thread {
    launcher: Launcher,
    options: ThreadOptions,
    id: ThreadIdCell,
    turn_lock: Arc<Mutex<()>>,
}

impl Thread {
    pub(crate) fn new(launcher: Launcher, options: ThreadOptions, id: Option<String>) -> Self {
        Self {
            launcher,
            options,
            id: ThreadIdCell::new(id),
            turn_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Thread id: supplied on resume, or assigned by the agent during the
    /// first turn. `None` before that.
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.id.get()
    }

    /// Watch for the thread id to be assigned or change.
    #[must_use]
    pub fn watch_id(&self) -> watch::Receiver<Option<String>> {
        self.id.subscribe()
    }

    /// Options applied to every turn of this thread.
    #[must_use]
    pub fn options(&self) -> &ThreadOptions {
        &self.options
    }

    /// Run a turn and wait for its result.
    ///
    /// # Errors
    ///
    /// - [`SdkError::InvalidOptions`] before anything is spawned.
    /// - [`SdkError::TurnInProgress`] if another turn is outstanding.
    /// - [`SdkError::Launch`] if the agent cannot be started.
    /// - [`SdkError::Decode`] on a malformed or out-of-order event.
    /// - [`SdkError::TurnFailed`], [`SdkError::ThreadNotFound`], or
    ///   [`SdkError::ThreadRuntime`] per the terminal event.
    /// - [`SdkError::Timeout`] when the turn deadline expires.
    pub async fn run(&self, input: impl Into<Input>, options: TurnOptions) -> Result<RunResult> {
        let (mut driver, _turn_guard) = self.begin(input.into(), &options).await?;

        while let Some(event) = driver.next_event().await {
            if let ThreadEvent::ThreadStarted(ev) = event? {
                self.id.publish(&ev.thread_id);
            }
        }

        let result = driver.into_tracker().finish()?;
        debug!(
            thread_id = result.thread_id.as_deref(),
            items = result.items.len(),
            "turn completed"
        );
        Ok(result)
    }

    /// Run a turn and receive its events as they arrive.
    ///
    /// The stream forwards events verbatim, including `turn.failed` and
    /// `error`; the caller decides how to treat them. The thread stays busy
    /// until the stream ends, is cancelled, or is dropped.
    ///
    /// # Errors
    ///
    /// Same pre-spawn failures as [`Thread::run`]. Later failures arrive as
    /// `Err` items on the stream.
    pub async fn run_streamed(
        &self,
        input: impl Into<Input>,
        options: TurnOptions,
    ) -> Result<EventStream> {
        let (driver, turn_guard) = self.begin(input.into(), &options).await?;
        Ok(spawn_stream(driver, turn_guard, self.id.clone()))
    }

    async fn begin(
        &self,
        input: Input,
        options: &TurnOptions,
    ) -> Result<(TurnDriver, OwnedMutexGuard<()>)> {
        let request = TurnRequest::build(input, &self.options, options)?;

        let turn_guard = Arc::clone(&self.turn_lock)
            .try_lock_owned()
            .map_err(|_| {
                SdkError::TurnInProgress(format!(
                    "thread {} already has a turn in flight",
                    self.id().as_deref().unwrap_or("<new>")
                ))
            })?;

        let directive = match self.id() {
            Some(id) => ThreadDirective::Resume(id),
            None => ThreadDirective::New,
        };

        let driver =
            TurnDriver::start(&self.launcher, &directive, &request, options.timeout()).await?;
        Ok((driver, turn_guard))
    }
}
