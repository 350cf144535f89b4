//! User input for a turn.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One part of a structured user input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserInput {
    /// Plain text.
    Text {
        /// The text.
        text: String,
    },
    /// An image on the local file system, attached to the prompt.
    LocalImage {
        /// Path to the image file.
        path: PathBuf,
    },
}

/// Input accepted by [`Thread::run`](crate::Thread::run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// A single text prompt.
    Text(String),
    /// A sequence of text and image parts, sent in order.
    Items(Vec<UserInput>),
}

impl Input {
    /// Normalize into the ordered list of parts sent to the agent.
    #[must_use]
    pub fn into_parts(self) -> Vec<UserInput> {
        match self {
            Self::Text(text) => vec![UserInput::Text { text }],
            Self::Items(items) => items,
        }
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<UserInput>> for Input {
    fn from(items: Vec<UserInput>) -> Self {
        Self::Items(items)
    }
}
