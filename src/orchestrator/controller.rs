//! Turn controller.
//!
//! Drives a single turn against one agent process:
//!
//! 1. **`TurnDriver::start`** spawns the agent and writes the turn request
//!    to its stdin exactly once.
//! 2. **`TurnDriver::next_event`** decodes the next event under the turn
//!    deadline and feeds it through the [`TurnTracker`]. The terminal event
//!    is handed out as soon as it is read; the call after it releases the
//!    process (wait for exit, bounded by the deadline, then kill) and
//!    returns `None`.
//! 3. **`spawn_stream`** moves a driver into its own task and forwards
//!    events over an [`mpsc`] channel as an [`EventStream`].
//!
//! Every exit path releases the process: a decode error, ordering violation,
//! or expired deadline terminates it; dropping the driver kills it.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::Stream;
use tokio::process::ChildStdout;
use tokio::sync::{mpsc, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::exec::reader::EventReader;
use crate::exec::spawner::{AgentProcess, Launcher, ThreadDirective};
use crate::exec::writer::send_request;
use crate::models::events::ThreadEvent;
use crate::options::TurnRequest;
use crate::orchestrator::thread::ThreadIdCell;
use crate::orchestrator::turn::TurnTracker;
use crate::{Result, SdkError};

/// How long the agent may take to exit after its terminal event.
pub const EXIT_GRACE: Duration = Duration::from_secs(5);

/// How long a cancelled or timed-out agent gets between `SIGTERM` and kill.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Events buffered between the stream task and its consumer.
const STREAM_BUFFER: usize = 16;

/// One in-flight turn bound to one agent process.
#[derive(Debug)]
pub(crate) struct TurnDriver {
    process: AgentProcess,
    reader: EventReader<ChildStdout>,
    tracker: TurnTracker,
    deadline: Option<Instant>,
    timeout: Option<Duration>,
    done: bool,
    released: bool,
}

impl TurnDriver {
    /// Spawn the agent for `directive` and send `request`.
    ///
    /// # Errors
    ///
    /// - [`SdkError::Launch`] if the agent cannot be started.
    /// - [`SdkError::Io`] if the request cannot be written; the process is
    ///   terminated first.
    /// - [`SdkError::Timeout`] if the agent does not take the request before
    ///   the deadline.
    pub(crate) async fn start(
        launcher: &Launcher,
        directive: &ThreadDirective,
        request: &TurnRequest,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut process = launcher.spawn(directive)?;

        let stdout = process
            .take_stdout()
            .ok_or_else(|| SdkError::Launch("agent stdout already taken".into()))?;
        let stdin = process
            .take_stdin()
            .ok_or_else(|| SdkError::Launch("agent stdin already taken".into()))?;

        let sent = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, send_request(stdin, request))
                .await
                .unwrap_or_else(|_elapsed| {
                    Err(SdkError::Timeout(format!(
                        "turn did not finish within {:?}",
                        timeout.unwrap_or_default()
                    )))
                }),
            None => send_request(stdin, request).await,
        };
        if let Err(err) = sent {
            warn!(pid = process.pid, error = %err, "failed to send turn request");
            process.terminate(TERMINATE_GRACE).await;
            return Err(err);
        }

        Ok(Self {
            process,
            reader: EventReader::new(stdout),
            tracker: TurnTracker::new(directive),
            deadline,
            timeout,
            done: false,
            released: false,
        })
    }

    /// Read, check, and return the next event.
    ///
    /// Returns `None` once the turn is over and the process released.
    /// Errors end the turn.
    pub(crate) async fn next_event(&mut self) -> Option<Result<ThreadEvent>> {
        if self.done {
            self.release().await;
            return None;
        }

        let next = match self.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, self.reader.next_event()).await
            {
                Ok(next) => next,
                Err(_elapsed) => return Some(Err(self.expire().await)),
            },
            None => self.reader.next_event().await,
        };

        match next {
            None => {
                self.done = true;
                if self.tracker.state().is_terminal() {
                    self.release().await;
                    return None;
                }
                let (status, stderr) = self.process.finish(self.exit_grace()).await;
                self.released = true;
                let stderr = stderr.trim();
                let detail = if stderr.is_empty() {
                    format!("agent {status} before the turn finished")
                } else {
                    format!("agent {status} before the turn finished: {stderr}")
                };
                Some(Err(SdkError::ThreadRuntime(detail)))
            }
            Some(Err(err)) => Some(Err(self.abort(err).await)),
            Some(Ok(event)) => {
                if let Err(err) = self.tracker.observe(&event) {
                    return Some(Err(self.abort(err).await));
                }
                if event.is_terminal() {
                    self.done = true;
                    debug!(
                        pid = self.process.pid,
                        kind = event.kind(),
                        "turn reached terminal event"
                    );
                }
                Some(Ok(event))
            }
        }
    }

    /// Stop the turn early and release the process.
    pub(crate) async fn cancel(&mut self) {
        self.done = true;
        if !self.released {
            info!(pid = self.process.pid, "turn cancelled, terminating agent");
            self.process.terminate(TERMINATE_GRACE).await;
            self.released = true;
        }
    }

    /// The tracker, for aggregation once the turn is over.
    pub(crate) fn into_tracker(self) -> TurnTracker {
        self.tracker
    }

    /// Wait for the agent to exit after the turn ended, killing it once the
    /// exit grace or the turn deadline runs out.
    async fn release(&mut self) {
        if self.released {
            return;
        }
        let (status, _stderr) = self.process.finish(self.exit_grace()).await;
        self.released = true;
        debug!(pid = self.process.pid, status = %status, "agent released");
    }

    fn exit_grace(&self) -> Duration {
        self.deadline.map_or(EXIT_GRACE, |deadline| {
            EXIT_GRACE.min(deadline.saturating_duration_since(Instant::now()))
        })
    }

    async fn abort(&mut self, err: SdkError) -> SdkError {
        self.done = true;
        warn!(pid = self.process.pid, error = %err, "turn aborted, terminating agent");
        self.process.terminate(TERMINATE_GRACE).await;
        self.released = true;
        err
    }

    async fn expire(&mut self) -> SdkError {
        let timeout = self.timeout.unwrap_or_default();
        self.abort(SdkError::Timeout(format!(
            "turn did not finish within {timeout:?}"
        )))
        .await
    }
}

/// Live event sequence of a streamed turn.
///
/// Yields each [`ThreadEvent`] as the agent emits it, ending after the
/// terminal event or the first error. Dropping the stream, or calling
/// [`EventStream::cancel`], terminates the agent process.
#[derive(Debug)]
pub struct EventStream {
    events: mpsc::Receiver<Result<ThreadEvent>>,
    task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    _drop_guard: DropGuard,
}

impl EventStream {
    /// Receive the next event, or `None` when the turn is over.
    pub async fn next_event(&mut self) -> Option<Result<ThreadEvent>> {
        self.events.recv().await
    }

    /// Stop consuming: terminate the agent and wait until it is gone.
    ///
    /// No further events are delivered after this returns.
    pub async fn cancel(mut self) {
        self.cancel.cancel();
        self.events.close();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(%err, "turn stream task failed");
            }
        }
    }
}

impl Stream for EventStream {
    type Item = Result<ThreadEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

/// Run `driver` on its own task and expose its events as a stream.
///
/// `turn_guard` keeps the thread marked busy until the task ends; thread ids
/// announced by `thread.started` are published to `thread_id`.
pub(crate) fn spawn_stream(
    driver: TurnDriver,
    turn_guard: OwnedMutexGuard<()>,
    thread_id: ThreadIdCell,
) -> EventStream {
    let (tx, rx) = mpsc::channel(STREAM_BUFFER);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(forward_events(
        driver,
        turn_guard,
        thread_id,
        tx,
        cancel.clone(),
    ));

    EventStream {
        events: rx,
        task: Some(task),
        _drop_guard: cancel.clone().drop_guard(),
        cancel,
    }
}

async fn forward_events(
    mut driver: TurnDriver,
    turn_guard: OwnedMutexGuard<()>,
    thread_id: ThreadIdCell,
    tx: mpsc::Sender<Result<ThreadEvent>>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;

            () = cancel.cancelled() => None,
            next = driver.next_event() => Some(next),
        };

        let Some(next) = next else {
            driver.cancel().await;
            break;
        };
        let Some(item) = next else {
            break;
        };

        if let Ok(ThreadEvent::ThreadStarted(ev)) = &item {
            thread_id.publish(&ev.thread_id);
        }

        let delivered = tokio::select! {
            biased;

            () = cancel.cancelled() => false,
            sent = tx.send(item) => sent.is_ok(),
        };

        if !delivered {
            debug!("turn stream consumer gone, stopping");
            driver.cancel().await;
            break;
        }
    }

    drop(turn_guard);
}
