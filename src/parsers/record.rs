use serde::Deserialize;
use serde_json::Value;

use super::content::classify_content;
use crate::error::{ParseError, ParseFailure};
use crate::models::{
    AgentInvocation, ContentBlock, Message, RawAgentResult, RawRecord, Record, SenderRole,
    TokenUsage,
};

const RECORD_USER: &str = "user";
const RECORD_ASSISTANT: &str = "assistant";
const RECORD_SYSTEM: &str = "system";
const RECORD_SUMMARY: &str = "summary";

/// Parse one raw log line into a [`Record`].
///
/// Pure: nothing is logged, the caller decides what to do with the error.
/// `line_number` is 1-based and only used for error reporting.
pub fn parse_record(line: &str, line_number: usize) -> Result<Record, ParseError> {
    let fail = |reason: ParseFailure| ParseError::new(line_number, reason);

    let value: Value =
        serde_json::from_str(line).map_err(|e| fail(ParseFailure::MalformedJson(e.to_string())))?;

    let Some(object) = value.as_object() else {
        return Err(fail(ParseFailure::UnrecognizedShape("expected a JSON object".into())));
    };
    let Some(kind) = object.get("type").and_then(Value::as_str).map(str::to_owned) else {
        return Err(fail(ParseFailure::UnrecognizedShape(
            "missing string `type` discriminant".into(),
        )));
    };

    match kind.as_str() {
        RECORD_USER | RECORD_ASSISTANT | RECORD_SYSTEM => {
            parse_message(value, line_number).map(|m| Record::Message(Box::new(m)))
        }
        RECORD_SUMMARY => {
            let summary = object
                .get("summary")
                .and_then(Value::as_str)
                .ok_or_else(|| fail(ParseFailure::MissingField("summary")))?;
            let leaf_id = object.get("leafUuid").and_then(Value::as_str).map(str::to_string);
            Ok(Record::Summary { summary: summary.to_string(), leaf_id })
        }
        other => Ok(Record::Metadata { kind: other.to_string() }),
    }
}

fn parse_message(value: Value, line_number: usize) -> Result<Message, ParseError> {
    let fail = |reason: ParseFailure| ParseError::new(line_number, reason);

    let raw: RawRecord =
        serde_json::from_value(value).map_err(|e| fail(ParseFailure::InvalidField(e.to_string())))?;

    let message_id = raw
        .uuid
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| fail(ParseFailure::MissingField("uuid")))?;
    let timestamp = raw.timestamp.ok_or_else(|| fail(ParseFailure::MissingField("timestamp")))?;

    let declared_role = if raw.record_type == RECORD_SYSTEM {
        SenderRole::System
    } else {
        let role_name = raw
            .message
            .as_ref()
            .and_then(|m| m.role.as_deref())
            .ok_or_else(|| fail(ParseFailure::MissingField("message.role")))?;
        SenderRole::parse(role_name)
            .ok_or_else(|| fail(ParseFailure::InvalidField(format!("unknown role `{}`", role_name))))?
    };

    let payload = match &raw.message {
        Some(message) => message.content.as_ref(),
        None => raw.content.as_ref(),
    };
    let content_blocks = classify_content(payload);
    let sender_role = refine_role(declared_role, &content_blocks);

    let token_usage = raw.message.as_ref().and_then(|m| m.usage.as_ref()).map(|usage| TokenUsage {
        input_tokens: usage.input_tokens.unwrap_or(0),
        output_tokens: usage.output_tokens.unwrap_or(0),
        cache_creation_input_tokens: usage.cache_creation_input_tokens.unwrap_or(0),
        cache_read_input_tokens: usage.cache_read_input_tokens.unwrap_or(0),
    });

    let agent = raw.tool_use_result.as_ref().and_then(|result| extract_agent(result, &content_blocks));
    let owning_tool_use_id = raw.parent_tool_use_id.filter(|id| !id.is_empty());

    Ok(Message {
        message_id,
        session_id: raw.session_id.unwrap_or_default(),
        parent_id: raw.parent_uuid.filter(|id| !id.is_empty()),
        sender_role,
        timestamp,
        token_usage,
        content_blocks,
        is_side_chain: raw.is_sidechain.unwrap_or(false) || owning_tool_use_id.is_some(),
        owning_tool_use_id,
        children: Vec::new(),
        model: raw.message.and_then(|m| m.model),
        git_branch: raw.git_branch,
        cwd: raw.cwd,
        request_id: raw.request_id,
        agent_id: raw.agent_id.filter(|id| !id.is_empty()),
        agent,
        line_number,
    })
}

/// User turns made only of tool results are tool output, not user input
fn refine_role(role: SenderRole, blocks: &[ContentBlock]) -> SenderRole {
    let all_tool_results =
        !blocks.is_empty() && blocks.iter().all(|b| matches!(b, ContentBlock::ToolResult { .. }));
    if role == SenderRole::User && all_tool_results { SenderRole::Tool } else { role }
}

fn extract_agent(result: &Value, blocks: &[ContentBlock]) -> Option<AgentInvocation> {
    let raw = RawAgentResult::deserialize(result).ok()?;
    if raw.agent_id.is_empty() {
        return None;
    }
    let tool_use_id = blocks.iter().find_map(|block| match block {
        ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.clone()),
        _ => None,
    });

    Some(AgentInvocation {
        agent_id: raw.agent_id,
        tool_use_id,
        prompt: raw.prompt.unwrap_or_default(),
        status: raw.status.unwrap_or_else(|| "unknown".to_string()),
        total_tokens: raw.total_tokens.unwrap_or(0),
        total_duration_ms: raw.total_duration_ms.unwrap_or(0),
    })
}
