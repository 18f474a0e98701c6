//! Content block classification.
//!
//! Dispatches on the raw block's `type` discriminant. Known kinds are read
//! through small serde shapes; a known kind whose shape does not fit, and any
//! kind not listed here, becomes [`ContentBlock::Unknown`] carrying the raw
//! JSON so nothing is dropped.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{ContentBlock, ImageSourceKind};

#[derive(Deserialize)]
struct TextShape {
    text: String,
}

#[derive(Deserialize)]
struct ThinkingShape {
    thinking: String,
    #[serde(default)]
    signature: Option<String>,
}

#[derive(Deserialize)]
struct ToolUseShape {
    id: String,
    name: String,
    #[serde(default)]
    input: Value,
}

#[derive(Deserialize)]
struct ToolResultShape {
    tool_use_id: String,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    is_error: Option<bool>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ImageSourceShape {
    Base64 {
        data: String,
        #[serde(default)]
        media_type: Option<String>,
    },
    Url {
        url: String,
        #[serde(default)]
        media_type: Option<String>,
    },
}

#[derive(Deserialize)]
struct ImageShape {
    source: ImageSourceShape,
}

/// Classify a message's content payload into ordered blocks.
///
/// The payload may be absent, a bare string, a single block object or an
/// array of blocks.
pub fn classify_content(payload: Option<&Value>) -> Vec<ContentBlock> {
    match payload {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => vec![ContentBlock::Text { value: text.clone() }],
        Some(Value::Array(items)) => items.iter().map(classify_item).collect(),
        Some(value @ Value::Object(_)) => vec![classify_block(value)],
        Some(other) => vec![ContentBlock::Unknown { raw: other.clone() }],
    }
}

fn classify_item(item: &Value) -> ContentBlock {
    match item {
        Value::String(text) => ContentBlock::Text { value: text.clone() },
        Value::Object(_) => classify_block(item),
        other => ContentBlock::Unknown { raw: other.clone() },
    }
}

/// Classify one raw block object
pub fn classify_block(value: &Value) -> ContentBlock {
    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();

    let classified = match kind {
        "text" => TextShape::deserialize(value).ok().map(|b| ContentBlock::Text { value: b.text }),
        "thinking" => ThinkingShape::deserialize(value)
            .ok()
            .map(|b| ContentBlock::Thinking { value: b.thinking, signature: b.signature }),
        "tool_use" => ToolUseShape::deserialize(value).ok().map(|b| ContentBlock::ToolUse {
            tool_name: b.name,
            tool_use_id: b.id,
            input: b.input,
        }),
        "tool_result" => ToolResultShape::deserialize(value).ok().map(|b| ContentBlock::ToolResult {
            tool_use_id: b.tool_use_id,
            output: classify_content(b.content.as_ref()),
            is_error: b.is_error.unwrap_or(false),
        }),
        "image" => ImageShape::deserialize(value).ok().map(|b| flatten_image(b.source)),
        "file-history-snapshot" | "file_history_snapshot" => {
            Some(ContentBlock::FileHistorySnapshot { payload: value.clone() })
        }
        _ => None,
    };

    classified.unwrap_or_else(|| ContentBlock::Unknown { raw: value.clone() })
}

fn flatten_image(source: ImageSourceShape) -> ContentBlock {
    match source {
        ImageSourceShape::Base64 { data, media_type } => ContentBlock::Image {
            source_kind: ImageSourceKind::Base64,
            data_or_url: data,
            media_type,
        },
        ImageSourceShape::Url { url, media_type } => ContentBlock::Image {
            source_kind: ImageSourceKind::Url,
            data_or_url: url,
            media_type,
        },
    }
}
