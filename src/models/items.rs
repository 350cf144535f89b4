//! Thread items: discrete units of work produced during a turn.
//!
//! Each item carries an `id` that stays stable across its `item.started`,
//! `item.updated`, and `item.completed` events. Item kinds this SDK does not
//! know yet decode to [`ThreadItem::Unknown`] so newer agents keep working.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::{discriminator, serialize_tagged};

/// Lifecycle of a command execution item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommandExecutionStatus {
    /// The command is still running.
    InProgress,
    /// The command exited.
    Completed,
    /// The command could not run or was aborted.
    Failed,
}

/// A command executed by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandExecutionItem {
    /// Item identifier.
    pub id: String,
    /// Command line as executed.
    pub command: String,
    /// Combined stdout and stderr captured so far.
    #[serde(default)]
    pub aggregated_output: String,
    /// Exit code, once the command has exited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Current status.
    pub status: CommandExecutionStatus,
}

/// Kind of change applied to a single file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatchChangeKind {
    /// File created.
    Add,
    /// File removed.
    Delete,
    /// File modified in place.
    Update,
}

/// One file touched by a [`FileChangeItem`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileUpdateChange {
    /// Path of the changed file.
    pub path: String,
    /// What happened to the file.
    pub kind: PatchChangeKind,
}

/// Outcome of a patch application.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PatchApplyStatus {
    /// The patch was applied.
    Completed,
    /// The patch could not be applied.
    Failed,
}

/// A set of file changes made by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChangeItem {
    /// Item identifier.
    pub id: String,
    /// Individual file changes.
    pub changes: Vec<FileUpdateChange>,
    /// Whether the patch applied.
    pub status: PatchApplyStatus,
}

/// Lifecycle of an MCP tool call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum McpToolCallStatus {
    /// The call is in flight.
    InProgress,
    /// The call returned.
    Completed,
    /// The call errored.
    Failed,
}

/// A call to a tool exposed by an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct McpToolCallItem {
    /// Item identifier.
    pub id: String,
    /// MCP server name.
    pub server: String,
    /// Tool name on that server.
    pub tool: String,
    /// Current status.
    pub status: McpToolCallStatus,
}

/// A message from the agent. The last one of a turn is its final response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentMessageItem {
    /// Item identifier.
    pub id: String,
    /// Natural-language text, or JSON when an output schema was supplied.
    pub text: String,
}

/// A reasoning summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReasoningItem {
    /// Item identifier.
    pub id: String,
    /// Reasoning text.
    pub text: String,
}

/// A web search issued by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebSearchItem {
    /// Item identifier.
    pub id: String,
    /// Search query.
    pub query: String,
}

/// A non-fatal error surfaced as an item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorItem {
    /// Item identifier.
    pub id: String,
    /// Error message.
    pub message: String,
}

/// One entry of the agent's running plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoItem {
    /// Task description.
    pub text: String,
    /// Whether the task is done.
    pub completed: bool,
}

/// The agent's to-do list for the turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TodoListItem {
    /// Item identifier.
    pub id: String,
    /// Entries in plan order.
    pub items: Vec<TodoItem>,
}

/// Work unit produced during a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ThreadItem {
    /// `agent_message`
    AgentMessage(AgentMessageItem),
    /// `reasoning`
    Reasoning(ReasoningItem),
    /// `command_execution`
    CommandExecution(CommandExecutionItem),
    /// `file_change`
    FileChange(FileChangeItem),
    /// `mcp_tool_call`
    McpToolCall(McpToolCallItem),
    /// `web_search`
    WebSearch(WebSearchItem),
    /// `todo_list`
    TodoList(TodoListItem),
    /// `error`
    Error(ErrorItem),
    /// An item kind this SDK does not recognize.
    Unknown {
        /// Item identifier.
        id: String,
        /// Raw `type` discriminator.
        kind: String,
        /// The full record as received.
        payload: Value,
    },
}

impl ThreadItem {
    /// Identifier shared by every event that refers to this item.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::AgentMessage(item) => &item.id,
            Self::Reasoning(item) => &item.id,
            Self::CommandExecution(item) => &item.id,
            Self::FileChange(item) => &item.id,
            Self::McpToolCall(item) => &item.id,
            Self::WebSearch(item) => &item.id,
            Self::TodoList(item) => &item.id,
            Self::Error(item) => &item.id,
            Self::Unknown { id, .. } => id,
        }
    }

    /// Wire discriminator of this item.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::AgentMessage(_) => "agent_message",
            Self::Reasoning(_) => "reasoning",
            Self::CommandExecution(_) => "command_execution",
            Self::FileChange(_) => "file_change",
            Self::McpToolCall(_) => "mcp_tool_call",
            Self::WebSearch(_) => "web_search",
            Self::TodoList(_) => "todo_list",
            Self::Error(_) => "error",
            Self::Unknown { kind, .. } => kind,
        }
    }

    /// Decode an item from its JSON record.
    ///
    /// # Errors
    ///
    /// Returns a message when the record has no `type`, or a known kind is
    /// missing a required field. Unknown kinds still require an `id`.
    pub fn from_value(value: Value) -> std::result::Result<Self, String> {
        let kind = discriminator(&value, "item")?.to_owned();
        let item = match kind.as_str() {
            "agent_message" => Self::AgentMessage(payload(value, &kind)?),
            "reasoning" => Self::Reasoning(payload(value, &kind)?),
            "command_execution" => Self::CommandExecution(payload(value, &kind)?),
            "file_change" => Self::FileChange(payload(value, &kind)?),
            "mcp_tool_call" => Self::McpToolCall(payload(value, &kind)?),
            "web_search" => Self::WebSearch(payload(value, &kind)?),
            "todo_list" => Self::TodoList(payload(value, &kind)?),
            "error" => Self::Error(payload(value, &kind)?),
            _ => {
                let id = value
                    .get("id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("missing required field: `id` in {kind} item"))?
                    .to_owned();
                Self::Unknown {
                    id,
                    kind,
                    payload: value,
                }
            }
        };
        Ok(item)
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    value: Value,
    kind: &str,
) -> std::result::Result<T, String> {
    serde_json::from_value(value).map_err(|e| format!("invalid {kind} item: {e}"))
}

impl Serialize for ThreadItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::AgentMessage(item) => serialize_tagged(serializer, self.kind(), item),
            Self::Reasoning(item) => serialize_tagged(serializer, self.kind(), item),
            Self::CommandExecution(item) => serialize_tagged(serializer, self.kind(), item),
            Self::FileChange(item) => serialize_tagged(serializer, self.kind(), item),
            Self::McpToolCall(item) => serialize_tagged(serializer, self.kind(), item),
            Self::WebSearch(item) => serialize_tagged(serializer, self.kind(), item),
            Self::TodoList(item) => serialize_tagged(serializer, self.kind(), item),
            Self::Error(item) => serialize_tagged(serializer, self.kind(), item),
            Self::Unknown { payload, .. } => payload.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ThreadItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}
