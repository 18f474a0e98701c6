//! Per-session derived metrics computed from a built tree.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::tree::SessionTree;
use crate::error::ParseError;
use crate::index_store::FileFingerprint;
use crate::models::{Diagnostic, Message, SenderRole, Session};

/// Everything about a session that does not come from the tree itself
#[derive(Debug, Clone, Default)]
pub struct SessionSources {
    pub file_path: PathBuf,
    pub agent_files: Vec<PathBuf>,
    pub summary: Option<String>,
    pub parse_errors: Vec<ParseError>,
    pub metadata_records: usize,
    /// Findings from outside the tree builder, e.g. skipped sub-agent files
    pub diagnostics: Vec<Diagnostic>,
    pub files: Vec<FileFingerprint>,
}

/// Fold a built tree into a publishable [`Session`].
///
/// Token totals cover every linked message, main chain and side-chains;
/// messages without usage contribute nothing. `message_count` is the number of
/// main-chain messages actually linked.
pub fn aggregate(tree: SessionTree, sources: SessionSources) -> Session {
    let SessionTree {
        session_id,
        messages,
        root_messages,
        main_chain,
        side_chain_roots,
        unattributed_side_chains,
        tool_uses,
        diagnostics: tree_diagnostics,
    } = tree;

    let (start_time, end_time) = time_span(&messages);

    let mut total_input_tokens = 0u64;
    let mut total_output_tokens = 0u64;
    let mut roles = BTreeSet::new();
    let mut block_kinds = BTreeSet::new();
    for message in &messages {
        if let Some(usage) = &message.token_usage {
            total_input_tokens = total_input_tokens.saturating_add(usage.input_tokens);
            total_output_tokens = total_output_tokens.saturating_add(usage.output_tokens);
        }
        roles.insert(message.sender_role);
        block_kinds.extend(message.content_blocks.iter().map(|b| b.kind()));
    }

    let git_branch = messages.iter().find_map(|m| m.git_branch.clone());
    let project_path = messages.iter().find_map(|m| m.cwd.clone());
    let side_chain_message_count = messages.iter().filter(|m| m.is_side_chain).count();

    let messages: HashMap<String, Arc<Message>> =
        messages.into_iter().map(|m| (m.message_id.clone(), Arc::new(m))).collect();

    let title = sources
        .summary
        .clone()
        .or_else(|| first_user_line(&main_chain, &messages));

    let mut diagnostics = tree_diagnostics;
    diagnostics.extend(sources.diagnostics);
    let partial =
        !sources.parse_errors.is_empty() || diagnostics.iter().any(Diagnostic::marks_partial);

    Session {
        session_id,
        file_path: sources.file_path,
        agent_files: sources.agent_files,
        project_path,
        summary: sources.summary,
        title,
        start_time,
        end_time,
        message_count: main_chain.len(),
        side_chain_message_count,
        total_token_count: total_input_tokens.saturating_add(total_output_tokens),
        total_input_tokens,
        total_output_tokens,
        git_branch,
        root_messages,
        main_chain,
        side_chain_roots,
        unattributed_side_chains,
        roles,
        block_kinds,
        tool_uses,
        messages,
        parse_errors: sources.parse_errors,
        metadata_records: sources.metadata_records,
        diagnostics,
        partial,
        files: sources.files,
    }
}

fn time_span(messages: &[Message]) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = messages.iter().map(|m| m.timestamp).min();
    let end = messages.iter().map(|m| m.timestamp).max();
    match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => (DateTime::<Utc>::UNIX_EPOCH, DateTime::<Utc>::UNIX_EPOCH),
    }
}

fn first_user_line(main_chain: &[String], messages: &HashMap<String, Arc<Message>>) -> Option<String> {
    main_chain
        .iter()
        .filter_map(|id| messages.get(id))
        .filter(|m| m.sender_role == SenderRole::User)
        .filter_map(|m| m.text())
        .find_map(|text| {
            text.lines().map(str::trim).find(|line| !line.is_empty()).map(str::to_string)
        })
}
