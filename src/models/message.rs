use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::ContentBlock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    User,
    Assistant,
    System,
    Tool,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::User => "user",
            SenderRole::Assistant => "assistant",
            SenderRole::System => "system",
            SenderRole::Tool => "tool",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "user" => Some(SenderRole::User),
            "assistant" => Some(SenderRole::Assistant),
            "system" => Some(SenderRole::System),
            "tool" => Some(SenderRole::Tool),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    /// Tokens counted toward session totals (input + output)
    pub fn total(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Sub-agent run reported back through a `toolUseResult` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInvocation {
    pub agent_id: String,
    /// `tool_use_id` of the tool_result block this run answered
    pub tool_use_id: Option<String>,
    pub prompt: String,
    pub status: String,
    pub total_tokens: u64,
    pub total_duration_ms: u64,
}

/// One conversation turn, immutable once its snapshot is published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub message_id: String,
    pub session_id: String,
    pub parent_id: Option<String>,
    pub sender_role: SenderRole,
    pub timestamp: DateTime<Utc>,
    pub token_usage: Option<TokenUsage>,
    pub content_blocks: Vec<ContentBlock>,
    pub is_side_chain: bool,
    /// Set only on side-chain messages; inherited from the nearest claim toward the chain root
    pub owning_tool_use_id: Option<String>,
    /// Child ids in the same chain, in file order
    pub children: Vec<String>,
    pub model: Option<String>,
    pub git_branch: Option<String>,
    pub cwd: Option<String>,
    pub request_id: Option<String>,
    /// `agentId` stamped on records written by a sub-agent
    pub agent_id: Option<String>,
    pub agent: Option<AgentInvocation>,
    /// 1-based line in the file the record came from
    pub line_number: usize,
}

impl Message {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Text blocks joined with newlines, or `None` when the message has no text
    pub fn text(&self) -> Option<String> {
        let parts: Vec<&str> = self.content_blocks.iter().filter_map(|b| b.as_text()).collect();
        if parts.is_empty() { None } else { Some(parts.join("\n")) }
    }

    /// `tool_use_id`s of every tool_use block in this message
    pub fn tool_use_ids(&self) -> impl Iterator<Item = &str> {
        self.content_blocks.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { tool_use_id, .. } => Some(tool_use_id.as_str()),
            _ => None,
        })
    }

    /// `tool_use_id`s referenced by tool_result blocks in this message
    pub fn tool_result_ids(&self) -> impl Iterator<Item = &str> {
        self.content_blocks.iter().filter_map(|block| match block {
            ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
            _ => None,
        })
    }
}
