//! Thread and turn options, their validation, and the turn request payload.
//!
//! Options can be built in code or parsed from untyped JSON/TOML maps. The
//! untyped path rejects unrecognized keys so a typo never silently drops a
//! policy setting. Keys are accepted in `snake_case` and in the camelCase
//! spelling used by other agent SDKs (`outputSchema`, `approvalMode`, …).

pub mod schema;

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::input::{Input, UserInput};
use crate::{Result, SdkError};

pub use schema::validate_output_schema;

/// When the agent must ask before running risky actions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ApprovalMode {
    /// Never ask; failures are reported back to the model.
    Never,
    /// The model decides when to ask.
    OnRequest,
    /// Ask only when a sandboxed command fails.
    OnFailure,
    /// Ask for anything outside a small set of trusted commands.
    Untrusted,
}

/// Isolation applied to commands the agent executes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SandboxMode {
    /// Commands may read but not write.
    ReadOnly,
    /// Commands may write inside the working directory.
    WorkspaceWrite,
    /// No isolation.
    DangerFullAccess,
}

/// How much reasoning the model spends per step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    /// Minimal reasoning.
    Minimal,
    /// Low.
    Low,
    /// Medium.
    Medium,
    /// High.
    High,
}

impl ApprovalMode {
    /// Wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::OnRequest => "on-request",
            Self::OnFailure => "on-failure",
            Self::Untrusted => "untrusted",
        }
    }
}

impl SandboxMode {
    /// Wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::WorkspaceWrite => "workspace-write",
            Self::DangerFullAccess => "danger-full-access",
        }
    }
}

impl ReasoningEffort {
    /// Wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl Display for ApprovalMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for SandboxMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for ReasoningEffort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Defaults applied to every turn of a thread.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ThreadOptions {
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
    /// Default sandbox mode.
    #[serde(default, alias = "sandboxMode")]
    pub sandbox_mode: Option<SandboxMode>,
    /// Default approval mode.
    #[serde(default, alias = "approvalMode")]
    pub approval_mode: Option<ApprovalMode>,
    /// Default reasoning effort.
    #[serde(default, alias = "reasoningEffort")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Directory the agent works in.
    #[serde(default, alias = "workingDirectory")]
    pub working_directory: Option<PathBuf>,
    /// Let the agent run outside a Git repository.
    #[serde(default, alias = "skipGitRepoCheck")]
    pub skip_git_repo_check: bool,
}

impl ThreadOptions {
    /// Parse thread options from an untyped JSON map.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::InvalidOptions`] on unknown keys or bad values.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| SdkError::InvalidOptions(format!("thread options: {e}")))
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the default sandbox mode.
    #[must_use]
    pub fn with_sandbox_mode(mut self, mode: SandboxMode) -> Self {
        self.sandbox_mode = Some(mode);
        self
    }

    /// Set the default approval mode.
    #[must_use]
    pub fn with_approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = Some(mode);
        self
    }

    /// Set the default reasoning effort.
    #[must_use]
    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Allow running outside a Git repository.
    #[must_use]
    pub fn with_skip_git_repo_check(mut self, skip: bool) -> Self {
        self.skip_git_repo_check = skip;
        self
    }

    /// Fill every unset field from `defaults`.
    #[must_use]
    pub fn with_defaults(self, defaults: &ThreadOptions) -> Self {
        Self {
            model: self.model.or_else(|| defaults.model.clone()),
            sandbox_mode: self.sandbox_mode.or(defaults.sandbox_mode),
            approval_mode: self.approval_mode.or(defaults.approval_mode),
            reasoning_effort: self.reasoning_effort.or(defaults.reasoning_effort),
            working_directory: self
                .working_directory
                .or_else(|| defaults.working_directory.clone()),
            skip_git_repo_check: self.skip_git_repo_check || defaults.skip_git_repo_check,
        }
    }
}

/// Options for a single turn. Values set here override [`ThreadOptions`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TurnOptions {
    /// JSON Schema the final response must conform to.
    #[serde(default, alias = "outputSchema")]
    pub output_schema: Option<Value>,
    /// Approval mode for this turn.
    #[serde(default, alias = "approvalMode")]
    pub approval_mode: Option<ApprovalMode>,
    /// Sandbox mode for this turn.
    #[serde(default, alias = "sandboxMode")]
    pub sandbox_mode: Option<SandboxMode>,
    /// Reasoning effort for this turn.
    #[serde(default, alias = "reasoningEffort")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Deadline for the whole turn, in milliseconds.
    #[serde(default, alias = "timeoutMs")]
    pub timeout_ms: Option<u64>,
}

impl TurnOptions {
    /// Parse and validate turn options from an untyped JSON map.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::InvalidOptions`] on unknown keys, bad values, or a
    /// malformed `output_schema`.
    pub fn from_value(value: Value) -> Result<Self> {
        let options: Self = serde_json::from_value(value)
            .map_err(|e| SdkError::InvalidOptions(format!("turn options: {e}")))?;
        options.validate()?;
        Ok(options)
    }

    /// Set the output schema.
    #[must_use]
    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Set the approval mode.
    #[must_use]
    pub fn with_approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.approval_mode = Some(mode);
        self
    }

    /// Set the sandbox mode.
    #[must_use]
    pub fn with_sandbox_mode(mut self, mode: SandboxMode) -> Self {
        self.sandbox_mode = Some(mode);
        self
    }

    /// Set the reasoning effort.
    #[must_use]
    pub fn with_reasoning_effort(mut self, effort: ReasoningEffort) -> Self {
        self.reasoning_effort = Some(effort);
        self
    }

    /// Set the turn deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Turn deadline, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Check option values that serde cannot.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::InvalidOptions`] if `output_schema` is malformed or
    /// `timeout_ms` is zero.
    pub fn validate(&self) -> Result<()> {
        if let Some(schema) = &self.output_schema {
            validate_output_schema(schema)?;
        }
        if self.timeout_ms == Some(0) {
            return Err(SdkError::InvalidOptions(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// The single JSON line written to the agent's stdin for one turn.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TurnRequest {
    /// Ordered input parts.
    pub input: Vec<UserInput>,
    /// Output schema, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,
    /// Effective approval mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_mode: Option<ApprovalMode>,
    /// Effective sandbox mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox_mode: Option<SandboxMode>,
    /// Effective reasoning effort.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Model override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,
    /// Skip the agent's Git repository check.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skip_git_repo_check: bool,
}

impl TurnRequest {
    /// Validate `turn` and merge it over `thread` into a request payload.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::InvalidOptions`] if the turn options are invalid
    /// or `input` has no parts.
    pub fn build(input: Input, thread: &ThreadOptions, turn: &TurnOptions) -> Result<Self> {
        turn.validate()?;

        let input = input.into_parts();
        if input.is_empty() {
            return Err(SdkError::InvalidOptions("input must not be empty".into()));
        }

        Ok(Self {
            input,
            output_schema: turn.output_schema.clone(),
            approval_mode: turn.approval_mode.or(thread.approval_mode),
            sandbox_mode: turn.sandbox_mode.or(thread.sandbox_mode),
            reasoning_effort: turn.reasoning_effort.or(thread.reasoning_effort),
            model: thread.model.clone(),
            working_directory: thread.working_directory.clone(),
            skip_git_repo_check: thread.skip_git_repo_check,
        })
    }

    /// Serialize as one compact JSON line, without the trailing newline.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::InvalidOptions`] if serialization fails.
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SdkError::InvalidOptions(format!("failed to serialise turn request: {e}")))
    }
}
