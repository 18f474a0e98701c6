use std::borrow::Cow;
use std::env;
use std::fs::{self, File};
use std::path::Path;

use crate::error::BuildError;

/// File name prefix of sub-agent logs (`agent-<id>.jsonl`)
pub const AGENT_FILE_PREFIX: &str = "agent-";

/// Extension of every session log
pub const LOG_EXTENSION: &str = "jsonl";

/// Open a log file for reading, refusing symlinks and files above `max_size`.
///
/// The size is checked on the open handle so the file cannot be swapped between
/// the check and the read.
pub fn safe_open_file(path: &Path, max_size: u64) -> Result<File, BuildError> {
    let unreadable = |reason: String| BuildError::FileUnreadable { path: path.to_path_buf(), reason };

    let link_meta = fs::symlink_metadata(path).map_err(|e| unreadable(e.to_string()))?;
    if link_meta.file_type().is_symlink() {
        return Err(unreadable("symlinks are not followed".to_string()));
    }

    let file = File::open(path).map_err(|e| unreadable(e.to_string()))?;
    let size = file.metadata().map_err(|e| unreadable(e.to_string()))?.len();
    if size > max_size {
        return Err(BuildError::FileTooLarge { path: path.to_path_buf(), size, max: max_size });
    }

    Ok(file)
}

/// Whether a path names a JSONL log file
pub fn is_log_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == LOG_EXTENSION)
}

/// Session id derived from a main session log's file name (`<id>.jsonl`)
pub fn session_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    if stem.is_empty() || stem.starts_with(AGENT_FILE_PREFIX) {
        return None;
    }
    Some(stem.into_owned())
}

/// Agent id of a sub-agent log (`agent-<id>.jsonl`)
pub fn agent_id_from_path(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    stem.strip_prefix(AGENT_FILE_PREFIX).filter(|id| !id.is_empty()).map(str::to_owned)
}

/// Formats a path with ~ substitution for the home directory
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
/// use session_inspector::utils::format_path_with_tilde;
///
/// let path = PathBuf::from("/Users/alice/.claude/projects");
/// // Returns "~/.claude/projects" when the home directory is /Users/alice
/// let formatted = format_path_with_tilde(&path);
/// ```
pub fn format_path_with_tilde(path: &Path) -> String {
    let home = dirs::home_dir().map(|h| h.to_string_lossy().into_owned());
    format_path_with_tilde_internal(path, home.as_deref())
}

/// Internal helper for path formatting with an explicit home (for testing)
pub(crate) fn format_path_with_tilde_internal(path: &Path, home: Option<&str>) -> String {
    let home = home.map(str::to_owned).or_else(|| env::var("HOME").ok());

    let path_str = path.to_string_lossy();
    if let Some(home) = home.as_deref()
        && !home.is_empty()
        && let Some(rest) = path_str.strip_prefix(home)
        && (rest.is_empty() || rest.starts_with('/'))
    {
        return format!("~{}", rest);
    }

    match path_str {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}
