//! Client configuration parsing and validation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::options::ThreadOptions;
use crate::{Result, SdkError};

/// Configuration for an [`Adom`](crate::Adom) client.
///
/// Built in code or parsed from a TOML file:
///
/// ```toml
/// executable_path = "/opt/adom/bin/adom"
/// base_url = "https://proxy.internal/v1"
///
/// [env]
/// HTTPS_PROXY = "http://proxy.internal:3128"
///
/// [thread]
/// model = "adom-mini"
/// sandbox_mode = "workspace-write"
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ClientConfig {
    /// Explicit path to the agent executable. Takes precedence over the
    /// `ADOM_EXECUTABLE` environment variable and the default location.
    #[serde(default)]
    pub executable_path: Option<PathBuf>,
    /// API base URL passed to the agent as `ADOM_BASE_URL`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// API key passed to the agent as `ADOM_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Extra environment variables set on every agent process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Default options for threads started from this client.
    #[serde(default)]
    pub thread: ThreadOptions,
}

impl ClientConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| SdkError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the executable path override.
    #[must_use]
    pub fn with_executable_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable_path = Some(path.into());
        self
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Add an environment variable for the agent process.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Check values that deserialization cannot.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::Config` on an empty executable path or an empty
    /// environment variable name.
    pub fn validate(&self) -> Result<()> {
        if self
            .executable_path
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(SdkError::Config(
                "executable_path must not be empty".into(),
            ));
        }

        if self.env.keys().any(|k| k.is_empty() || k.contains('=')) {
            return Err(SdkError::Config(
                "env keys must be non-empty and must not contain '='".into(),
            ));
        }

        Ok(())
    }
}
