use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::IndexError;
use crate::utils::{agent_id_from_path, is_log_file, session_id_from_path};

/// Deepest layout: `<project>/<session-id>/subagents/agent-<id>.jsonl`
const MAX_WALK_DEPTH: usize = 4;

const SUBAGENTS_DIR: &str = "subagents";

/// A main session log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSource {
    pub session_id: String,
    pub path: PathBuf,
}

/// A sub-agent log, to be merged into its parent session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSource {
    pub agent_id: String,
    pub path: PathBuf,
    /// Parent session named by the directory layout, when the file sits under
    /// `<session-id>/subagents/`
    pub layout_session_id: Option<String>,
}

/// Everything found under the source directory, sorted by path
#[derive(Debug, Clone, Default)]
pub struct DiscoveredSources {
    pub sessions: Vec<SessionSource>,
    pub agents: Vec<AgentSource>,
    /// Entries that were not indexed and why
    pub skipped: Vec<(PathBuf, String)>,
}

/// Scan the source directory for session and sub-agent logs.
///
/// Only the source directory itself being missing or unreadable is an error.
/// Symlinks are never followed; symlinked entries and unreadable
/// subdirectories are recorded in [`DiscoveredSources::skipped`] and logged.
pub fn discover_sources(source_dir: &Path) -> Result<DiscoveredSources, IndexError> {
    let metadata = fs::metadata(source_dir).map_err(|e| IndexError::unavailable(source_dir, e))?;
    if !metadata.is_dir() {
        return Err(IndexError::SourceNotDirectory { path: source_dir.to_path_buf() });
    }
    // Surface permission problems on the root itself instead of an empty index
    fs::read_dir(source_dir).map_err(|e| IndexError::unavailable(source_dir, e))?;

    let mut found = DiscoveredSources::default();
    let walker = WalkDir::new(source_dir).follow_links(false).max_depth(MAX_WALK_DEPTH).sort_by_file_name();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source_dir.to_path_buf());
                warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                found.skipped.push((path, e.to_string()));
                continue;
            }
        };

        let path = entry.path();
        if entry.path_is_symlink() {
            if is_log_file(path) || entry.depth() == 1 {
                warn!(path = %path.display(), "skipping symlink");
                found.skipped.push((path.to_path_buf(), "symlinks are not followed".to_string()));
            }
            continue;
        }
        if !entry.file_type().is_file() || !is_log_file(path) {
            continue;
        }

        if let Some(agent_id) = agent_id_from_path(path) {
            found.agents.push(AgentSource {
                agent_id,
                path: path.to_path_buf(),
                layout_session_id: layout_session_id(path),
            });
        } else if let Some(session_id) = session_id_from_path(path) {
            found.sessions.push(SessionSource { session_id, path: path.to_path_buf() });
        }
    }

    debug!(
        sessions = found.sessions.len(),
        agents = found.agents.len(),
        skipped = found.skipped.len(),
        "discovered session logs"
    );
    Ok(found)
}

/// `<session-id>` from `<session-id>/subagents/agent-<id>.jsonl`
fn layout_session_id(path: &Path) -> Option<String> {
    let subagents = path.parent()?;
    if subagents.file_name()? != SUBAGENTS_DIR {
        return None;
    }
    let session_dir = subagents.parent()?;
    Some(session_dir.file_name()?.to_string_lossy().into_owned())
}
