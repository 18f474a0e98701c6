use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::message::Message;

/// Wire shape of a conversation record (`type` = user | assistant | system).
///
/// Everything is optional at this layer; the record parser decides which
/// absences are fatal for the line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub parent_uuid: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::parsers::deserializers::deserialize_optional_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub is_sidechain: Option<bool>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default, alias = "parent_tool_use_id")]
    pub parent_tool_use_id: Option<String>,
    #[serde(default, deserialize_with = "crate::parsers::deserializers::deserialize_non_empty")]
    pub git_branch: Option<String>,
    #[serde(default, deserialize_with = "crate::parsers::deserializers::deserialize_non_empty")]
    pub cwd: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub message: Option<RawMessage>,
    /// System records carry their text at the top level
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub tool_use_result: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<RawUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUsage {
    #[serde(default)]
    pub input_tokens: Option<u64>,
    #[serde(default)]
    pub output_tokens: Option<u64>,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    pub cache_read_input_tokens: Option<u64>,
}

/// `toolUseResult` payload of a finished sub-agent run
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAgentResult {
    pub agent_id: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub total_duration_ms: Option<u64>,
}

/// One successfully parsed log line
#[derive(Debug, Clone)]
pub enum Record {
    Message(Box<Message>),
    /// Session title written by the assistant (`type` = summary)
    Summary { summary: String, leaf_id: Option<String> },
    /// Bookkeeping records (file-history-snapshot, queue-operation, ...)
    Metadata { kind: String },
}
