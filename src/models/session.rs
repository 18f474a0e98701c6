use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::content::BlockKind;
use super::message::{Message, SenderRole};
use crate::error::ParseError;
use crate::index_store::FileFingerprint;

/// A side-chain subtree attributed to one tool invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideChain {
    pub tool_use_id: String,
    /// Subtree roots in file order; more than one only when several records claim the same id
    pub roots: Vec<String>,
    /// Message holding the originating `tool_use` block, if it is in this session
    pub origin_message_id: Option<String>,
    pub message_count: usize,
}

/// Structural finding recorded while building a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Parent never appeared in the file; the message was promoted to a root
    OrphanedMessage { message_id: String, missing_parent_id: String },
    /// Message sat on a parent cycle; its parent link was cut
    CycleBroken { message_id: String },
    /// A later record reused an id; the later record was dropped
    DuplicateMessageId { message_id: String, line_number: usize },
    /// tool_result pointing at a tool_use that is not in the session
    UnresolvedToolResult { message_id: String, tool_use_id: String },
    /// Side-chain root whose owning tool invocation could not be determined
    UnattributedSideChain { root_message_id: String, agent_id: Option<String> },
    /// A second subtree claimed an owning id that already had a root
    DuplicateSideChainRoot { tool_use_id: String, message_id: String },
    /// A descendant claimed a different owner than the one it inherited
    ConflictingSideChainOwner { message_id: String, claimed: String, inherited: String },
    /// A sub-agent file for this session could not be merged
    AgentFileSkipped { path: PathBuf, reason: String },
    /// Lines of a merged sub-agent file that failed to parse
    AgentFileParseErrors { path: PathBuf, count: usize },
}

impl Diagnostic {
    /// Whether this finding means the session is missing or rearranged data
    pub fn marks_partial(&self) -> bool {
        !matches!(
            self,
            Diagnostic::UnresolvedToolResult { .. } | Diagnostic::ConflictingSideChainOwner { .. }
        )
    }
}

/// One session log (plus any merged sub-agent logs) as published in a snapshot
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub file_path: PathBuf,
    pub agent_files: Vec<PathBuf>,
    pub project_path: Option<String>,
    pub summary: Option<String>,
    pub title: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Main-chain messages actually linked
    pub message_count: usize,
    pub side_chain_message_count: usize,
    pub total_token_count: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub git_branch: Option<String>,
    pub root_messages: Vec<String>,
    /// Main-chain message ids in file order
    pub main_chain: Vec<String>,
    pub side_chain_roots: BTreeMap<String, SideChain>,
    pub unattributed_side_chains: Vec<String>,
    pub roles: BTreeSet<SenderRole>,
    pub block_kinds: BTreeSet<BlockKind>,
    /// tool_use_id -> id of the message that issued it
    pub tool_uses: HashMap<String, String>,
    pub messages: HashMap<String, Arc<Message>>,
    pub parse_errors: Vec<ParseError>,
    pub metadata_records: usize,
    pub diagnostics: Vec<Diagnostic>,
    pub partial: bool,
    pub files: Vec<FileFingerprint>,
}

impl Session {
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    pub fn message(&self, message_id: &str) -> Option<&Arc<Message>> {
        self.messages.get(message_id)
    }

    pub fn summary_view(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            title: self.title.clone(),
            project_path: self.project_path.clone(),
            git_branch: self.git_branch.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            message_count: self.message_count,
            side_chain_count: self.side_chain_roots.len() + self.unattributed_side_chains.len(),
            total_token_count: self.total_token_count,
            total_input_tokens: self.total_input_tokens,
            total_output_tokens: self.total_output_tokens,
            partial: self.partial,
            parse_error_count: self.parse_errors.len(),
            diagnostic_count: self.diagnostics.len(),
        }
    }
}

/// Flat per-session row returned by session listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub title: Option<String>,
    pub project_path: Option<String>,
    pub git_branch: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub message_count: usize,
    pub side_chain_count: usize,
    pub total_token_count: u64,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub partial: bool,
    pub parse_error_count: usize,
    pub diagnostic_count: usize,
}
