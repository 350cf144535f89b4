//! Agent process launcher.
//!
//! Resolves the agent executable once, at construction, in this order:
//!
//! 1. an explicit path from [`ClientConfig::executable_path`];
//! 2. the [`EXECUTABLE_ENV_VAR`] environment variable;
//! 3. `adom` installed next to the current executable;
//! 4. the bare name `adom`, looked up on `PATH` at spawn time.
//!
//! Each spawned process gets `kill_on_drop(true)`, piped stdio, and the
//! caller's environment plus the client's API settings. Spawn failures are
//! reported as [`SdkError::Launch`] and never retried.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::{Result, SdkError};

/// Environment variable that overrides the agent executable path.
pub const EXECUTABLE_ENV_VAR: &str = "ADOM_EXECUTABLE";

/// File name of the agent executable.
pub const DEFAULT_EXECUTABLE_NAME: &str = if cfg!(windows) { "adom.exe" } else { "adom" };

/// Environment variable carrying the API base URL to the agent.
pub const BASE_URL_ENV_VAR: &str = "ADOM_BASE_URL";

/// Environment variable carrying the API key to the agent.
pub const API_KEY_ENV_VAR: &str = "ADOM_API_KEY";

/// Environment variable identifying this SDK as the agent's originator.
pub const ORIGINATOR_ENV_VAR: &str = "ADOM_INTERNAL_ORIGINATOR_OVERRIDE";

const ORIGINATOR: &str = "adom_sdk_rs";

/// Most stderr kept per process; older output is discarded.
const STDERR_TAIL_BYTES: usize = 64 * 1024;

/// How long to wait for stderr to reach EOF once the process has exited.
pub const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Which conversation the agent process operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadDirective {
    /// Start a new thread; the agent assigns the id.
    New,
    /// Resume the thread with this id.
    Resume(String),
}

impl ThreadDirective {
    /// Command-line arguments encoding this directive.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["exec".to_owned(), "--experimental-json".to_owned()];
        if let Self::Resume(id) = self {
            args.push("resume".to_owned());
            args.push(id.clone());
        }
        args
    }

    /// Thread id being resumed, if any.
    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        match self {
            Self::New => None,
            Self::Resume(id) => Some(id),
        }
    }
}

/// Resolve the executable path from an explicit override and the value of
/// [`EXECUTABLE_ENV_VAR`].
///
/// Empty overrides are ignored.
#[must_use]
pub fn resolve_executable(explicit: Option<&Path>, env_override: Option<OsString>) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return path.to_path_buf();
    }
    if let Some(path) = env_override.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    default_executable()
}

fn default_executable() -> PathBuf {
    let sibling = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_EXECUTABLE_NAME)));

    match sibling {
        Some(path) if path.is_file() => path,
        _ => PathBuf::from(DEFAULT_EXECUTABLE_NAME),
    }
}

/// Spawns agent processes for turns.
#[derive(Debug, Clone)]
pub struct Launcher {
    executable: PathBuf,
    env: BTreeMap<String, String>,
}

impl Launcher {
    /// Build a launcher from client configuration, resolving the executable
    /// path now.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let executable = resolve_executable(
            config.executable_path.as_deref(),
            std::env::var_os(EXECUTABLE_ENV_VAR),
        );

        let mut env = config.env.clone();
        if let Some(url) = &config.base_url {
            env.insert(BASE_URL_ENV_VAR.to_owned(), url.clone());
        }
        if let Some(key) = &config.api_key {
            env.insert(API_KEY_ENV_VAR.to_owned(), key.clone());
        }
        env.insert(ORIGINATOR_ENV_VAR.to_owned(), ORIGINATOR.to_owned());

        debug!(executable = %executable.display(), "launcher: executable resolved");
        Self { executable, env }
    }

    /// Resolved executable path.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Spawn the agent for one turn.
    ///
    /// # Errors
    ///
    /// - [`SdkError::Launch`]`("executable not found: …")` when a path with a
    ///   directory component does not exist.
    /// - [`SdkError::Launch`]`("failed to spawn agent: …")` on OS failure.
    pub fn spawn(&self, directive: &ThreadDirective) -> Result<AgentProcess> {
        let has_dir = self
            .executable
            .parent()
            .is_some_and(|p| !p.as_os_str().is_empty());
        if has_dir && !self.executable.exists() {
            return Err(SdkError::Launch(format!(
                "executable not found: {}",
                self.executable.display()
            )));
        }

        let mut cmd = Command::new(&self.executable);
        cmd.args(directive.args())
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|err| {
            SdkError::Launch(format!(
                "failed to spawn agent {}: {err}",
                self.executable.display()
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SdkError::Launch("failed to capture agent stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SdkError::Launch("failed to capture agent stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SdkError::Launch("failed to capture agent stderr".into()))?;

        let pid = child.id();
        info!(
            pid,
            thread_id = directive.thread_id(),
            executable = %self.executable.display(),
            "agent process spawned"
        );

        Ok(AgentProcess {
            pid,
            child,
            stdin: Some(stdin),
            stdout: Some(stdout),
            stderr: Some(collect_stderr(stderr)),
        })
    }
}

/// A running agent process and its stdio handles.
///
/// Dropping it kills the process (`kill_on_drop`).
#[derive(Debug)]
pub struct AgentProcess {
    /// OS process id, when still known.
    pub pid: Option<u32>,
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
}

impl AgentProcess {
    /// Take the stdin handle. Returns `None` after the first call.
    pub fn take_stdin(&mut self) -> Option<ChildStdin> {
        self.stdin.take()
    }

    /// Take the stdout handle. Returns `None` after the first call.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    /// Wait for the process to exit, up to `timeout`, and describe how it
    /// ended. Kills the process if it is still running when `timeout` elapses.
    ///
    /// Returns the exit description and the tail of its stderr.
    pub async fn finish(&mut self, timeout: Duration) -> (String, String) {
        drop(self.stdin.take());

        let status = match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => status.code().map_or_else(
                || "terminated by signal".to_owned(),
                |c| format!("exited with code {c}"),
            ),
            Ok(Err(err)) => {
                warn!(pid = self.pid, %err, "error waiting for agent process");
                format!("wait error: {err}")
            }
            Err(_elapsed) => {
                warn!(pid = self.pid, "agent did not exit after turn ended, killing");
                self.terminate(Duration::ZERO).await;
                "killed after exit timeout".to_owned()
            }
        };

        info!(pid = self.pid, status = %status, "agent process finished");
        let stderr = self.stderr_tail().await;
        (status, stderr)
    }

    /// Terminate the process: `SIGTERM` first on unix, then a hard kill if
    /// it is still alive after `grace`.
    pub async fn terminate(&mut self, grace: Duration) {
        drop(self.stdin.take());
        drop(self.stdout.take());

        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }

        if !grace.is_zero() && send_sigterm(self.pid) {
            if tokio::time::timeout(grace, self.child.wait()).await.is_ok() {
                debug!(pid = self.pid, "agent exited after SIGTERM");
                return;
            }
        }

        if let Err(err) = self.child.kill().await {
            warn!(pid = self.pid, %err, "failed to kill agent process");
        } else {
            debug!(pid = self.pid, "agent process killed");
        }
    }

    /// Collected stderr output; empty if already taken, or if a leftover
    /// descendant still holds the pipe open after [`STDERR_DRAIN_TIMEOUT`].
    pub async fn stderr_tail(&mut self) -> String {
        let Some(mut handle) = self.stderr.take() else {
            return String::new();
        };
        match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, &mut handle).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_elapsed) => {
                handle.abort();
                String::new()
            }
        }
    }
}

/// Ask the process to exit. Returns whether the signal was delivered.
#[cfg(unix)]
fn send_sigterm(pid: Option<u32>) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return false;
    };
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => true,
        Err(err) => {
            debug!(pid, %err, "SIGTERM failed");
            false
        }
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: Option<u32>) -> bool {
    false
}

fn collect_stderr(mut stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut tail: Vec<u8> = Vec::new();
        let mut chunk = [0_u8; 4096];
        loop {
            match stderr.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    tail.extend_from_slice(&chunk[..n]);
                    if tail.len() > STDERR_TAIL_BYTES {
                        let excess = tail.len() - STDERR_TAIL_BYTES;
                        tail.drain(..excess);
                    }
                }
            }
        }
        String::from_utf8_lossy(&tail).into_owned()
    })
}
