use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{info, warn};

use super::snapshot::{IndexSnapshot, IndexStats};
use crate::config::IndexConfig;
use crate::error::{IndexError, QueryError};
use crate::indexer::build_sessions;

/// Why a rebuild was requested; recorded in logs and reports only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildTrigger {
    /// First build after the store was created
    Startup,
    /// Explicit user or API request
    Manual,
    /// Periodic refresh
    Scheduled,
    /// An external watcher saw the source directory change
    SourceChanged,
}

impl fmt::Display for RebuildTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RebuildTrigger::Startup => "startup",
            RebuildTrigger::Manual => "manual",
            RebuildTrigger::Scheduled => "scheduled",
            RebuildTrigger::SourceChanged => "source-changed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful rebuild
#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub trigger: RebuildTrigger,
    pub generation: u64,
    pub sessions: usize,
    pub stats: IndexStats,
    pub elapsed: Duration,
}

/// Owns the one published [`IndexSnapshot`].
///
/// Created empty (generation 0); each successful [`rebuild`](Self::rebuild)
/// publishes a complete new snapshot with a single pointer swap. Readers call
/// [`current`](Self::current) and keep working on the `Arc` they got, so a
/// rebuild never changes what an in-flight read sees.
///
/// Rebuilds are serialized: a rebuild requested while another runs waits for
/// it to finish, then scans the directory again.
pub struct IndexStore {
    source_dir: PathBuf,
    config: IndexConfig,
    published: RwLock<Arc<IndexSnapshot>>,
    rebuild_lock: Mutex<()>,
}

impl IndexStore {
    pub fn new(source_dir: impl Into<PathBuf>, config: IndexConfig) -> Self {
        Self {
            source_dir: source_dir.into(),
            config,
            published: RwLock::new(Arc::new(IndexSnapshot::empty())),
            rebuild_lock: Mutex::new(()),
        }
    }

    /// Store reading `<claude_dir>/projects` as resolved from `config`
    pub fn from_config(config: IndexConfig) -> Result<Self> {
        let source_dir = config.source_dir()?;
        Ok(Self::new(source_dir, config))
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// The published snapshot. Never waits on a running rebuild.
    pub fn current(&self) -> Arc<IndexSnapshot> {
        // Snapshots are immutable, so a poisoned lock still guards a valid Arc
        let guard = self.published.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Scan the source directory and publish a new snapshot.
    ///
    /// Per-file problems end up in the new snapshot's failures and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] when the source directory is missing or
    /// unreadable; the previous snapshot then stays published.
    pub fn rebuild(&self, trigger: RebuildTrigger) -> Result<RebuildReport, IndexError> {
        let _serialized = self.rebuild_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let previous = self.current();
        let output = match build_sessions(&self.source_dir, &self.config, Some(&previous)) {
            Ok(output) => output,
            Err(error) => {
                warn!(
                    %trigger,
                    source = %self.source_dir.display(),
                    %error,
                    generation = previous.generation(),
                    "rebuild failed; keeping the published snapshot"
                );
                return Err(error);
            }
        };

        let generation = previous.generation() + 1;
        let stats = output.stats.clone();
        let snapshot =
            IndexSnapshot::new(generation, &self.source_dir, output.sessions, output.failures, output.stats);
        let sessions = snapshot.session_count();

        *self.published.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(snapshot);

        let elapsed = started.elapsed();
        info!(
            %trigger,
            generation,
            sessions,
            reused = stats.sessions_reused,
            partial = stats.sessions_partial,
            failed = stats.files_failed,
            parse_errors = stats.parse_errors,
            elapsed_ms = elapsed.as_millis() as u64,
            "index rebuilt"
        );

        Ok(RebuildReport { trigger, generation, sessions, stats, elapsed })
    }

    /// Whether any file a published session was built from has changed on disk
    pub fn is_session_stale(&self, session_id: &str) -> Result<bool, QueryError> {
        let snapshot = self.current();
        let session = snapshot.session(session_id).ok_or_else(|| QueryError::session(session_id))?;
        Ok(session.files.iter().any(|fp| fp.is_stale()))
    }
}
