use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::BuildError;
use crate::models::{Message, Session};

/// A file (or a whole session) that could not be indexed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: BuildError,
}

/// Counters describing one build pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// Session and sub-agent logs considered
    pub files_scanned: usize,
    pub sessions_built: usize,
    /// Sessions carried over unchanged from the previous snapshot
    pub sessions_reused: usize,
    pub sessions_partial: usize,
    pub files_failed: usize,
    /// Symlinks and unreadable directory entries
    pub files_skipped: usize,
    pub parse_errors: usize,
    pub metadata_records: usize,
    pub messages_indexed: usize,
}

/// One immutable, fully built index.
///
/// Readers hold it through an `Arc`; a rebuild publishes a new snapshot and
/// never touches this one.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    generation: u64,
    built_at: Option<DateTime<Utc>>,
    source_dir: Option<PathBuf>,
    sessions: HashMap<String, Arc<Session>>,
    /// Every message of every session, main chain and side-chains
    messages: HashMap<String, Arc<Message>>,
    failures: Vec<FileFailure>,
    stats: IndexStats,
}

impl IndexSnapshot {
    /// The snapshot a store publishes before its first rebuild
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        generation: u64,
        source_dir: &Path,
        sessions: HashMap<String, Arc<Session>>,
        failures: Vec<FileFailure>,
        stats: IndexStats,
    ) -> Self {
        // Resumed sessions can repeat message ids; the first session by id wins
        let mut ordered: Vec<&Arc<Session>> = sessions.values().collect();
        ordered.sort_by(|a, b| a.session_id.cmp(&b.session_id));

        let mut messages = HashMap::with_capacity(ordered.iter().map(|s| s.messages.len()).sum());
        for session in ordered {
            for (id, message) in &session.messages {
                messages.entry(id.clone()).or_insert_with(|| Arc::clone(message));
            }
        }

        Self {
            generation,
            built_at: Some(Utc::now()),
            source_dir: Some(source_dir.to_path_buf()),
            sessions,
            messages,
            failures,
            stats,
        }
    }

    /// Monotonic per store; 0 for the initial empty snapshot
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    pub fn source_dir(&self) -> Option<&Path> {
        self.source_dir.as_deref()
    }

    pub fn session(&self, session_id: &str) -> Option<&Arc<Session>> {
        self.sessions.get(session_id)
    }

    /// Sessions in no particular order
    pub fn sessions(&self) -> impl Iterator<Item = &Arc<Session>> {
        self.sessions.values()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Lookup in the flat cross-session message map
    pub fn message(&self, message_id: &str) -> Option<&Arc<Message>> {
        self.messages.get(message_id)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn failures(&self) -> &[FileFailure] {
        &self.failures
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}
