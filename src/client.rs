//! Entry point for talking to the agent.

use crate::config::ClientConfig;
use crate::exec::spawner::Launcher;
use crate::options::ThreadOptions;
use crate::orchestrator::thread::Thread;
use crate::{Result, SdkError};

/// Client for the `adom` agent.
///
/// Use [`Adom::start_thread`] to begin a conversation or
/// [`Adom::resume_thread`] to continue one. Threads are persisted by the
/// agent itself; this client only ever handles their ids.
#[derive(Debug, Clone)]
pub struct Adom {
    launcher: Launcher,
    defaults: ThreadOptions,
}

impl Adom {
    /// Create a client, resolving the agent executable now.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Config`] if `config` fails validation.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            launcher: Launcher::new(&config),
            defaults: config.thread,
        })
    }

    /// Create a client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Config`] if the default configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Path of the agent executable this client launches.
    #[must_use]
    pub fn executable(&self) -> &std::path::Path {
        self.launcher.executable()
    }

    /// Start a new thread. Its id is assigned during the first turn.
    ///
    /// Fields left unset in `options` fall back to the configured defaults.
    #[must_use]
    pub fn start_thread(&self, options: ThreadOptions) -> Thread {
        Thread::new(
            self.launcher.clone(),
            options.with_defaults(&self.defaults),
            None,
        )
    }

    /// Resume a thread by id. The agent validates the id on the first turn.
    ///
    /// Fields left unset in `options` fall back to the configured defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::InvalidOptions`] if `id` is blank.
    pub fn resume_thread(
        &self,
        id: impl Into<String>,
        options: ThreadOptions,
    ) -> Result<Thread> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SdkError::InvalidOptions("thread id must not be empty".into()));
        }
        Ok(Thread::new(
            self.launcher.clone(),
            options.with_defaults(&self.defaults),
            Some(id),
        ))
    }
}
