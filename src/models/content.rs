use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How an image block carries its bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSourceKind {
    Base64,
    Url,
}

/// Discriminant of a [`ContentBlock`], used by block-kind filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Thinking,
    ToolUse,
    ToolResult,
    Image,
    FileHistorySnapshot,
    Unknown,
}

impl BlockKind {
    pub const ALL: [BlockKind; 7] = [
        BlockKind::Text,
        BlockKind::Thinking,
        BlockKind::ToolUse,
        BlockKind::ToolResult,
        BlockKind::Image,
        BlockKind::FileHistorySnapshot,
        BlockKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Thinking => "thinking",
            BlockKind::ToolUse => "tool_use",
            BlockKind::ToolResult => "tool_result",
            BlockKind::Image => "image",
            BlockKind::FileHistorySnapshot => "file_history_snapshot",
            BlockKind::Unknown => "unknown",
        }
    }

    /// Parse a block kind name; accepts both `file_history_snapshot` and the
    /// log's own `file-history-snapshot` spelling
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        BlockKind::ALL.into_iter().find(|kind| kind.as_str() == normalized)
    }
}

/// One classified piece of message content.
///
/// Every raw block maps to exactly one variant. Blocks whose discriminant is
/// unknown, or whose known discriminant comes with an unusable shape, land in
/// [`ContentBlock::Unknown`] with the raw JSON preserved.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        value: String,
    },
    Thinking {
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    ToolUse {
        tool_name: String,
        tool_use_id: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        output: Vec<ContentBlock>,
        is_error: bool,
    },
    Image {
        source_kind: ImageSourceKind,
        data_or_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        media_type: Option<String>,
    },
    FileHistorySnapshot {
        payload: Value,
    },
    Unknown {
        raw: Value,
    },
}

impl ContentBlock {
    pub fn kind(&self) -> BlockKind {
        match self {
            ContentBlock::Text { .. } => BlockKind::Text,
            ContentBlock::Thinking { .. } => BlockKind::Thinking,
            ContentBlock::ToolUse { .. } => BlockKind::ToolUse,
            ContentBlock::ToolResult { .. } => BlockKind::ToolResult,
            ContentBlock::Image { .. } => BlockKind::Image,
            ContentBlock::FileHistorySnapshot { .. } => BlockKind::FileHistorySnapshot,
            ContentBlock::Unknown { .. } => BlockKind::Unknown,
        }
    }

    /// Text carried directly by this block (text blocks only)
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { value } => Some(value),
            _ => None,
        }
    }
}
