//! File fingerprints for staleness detection and incremental rebuilds

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Result;
use serde::Serialize;

/// Size and modification time of one log file at the moment it was read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFingerprint {
    pub path: PathBuf,
    pub size: u64,
    pub mtime_secs: i64,
    pub mtime_nanos: u32,
}

impl FileFingerprint {
    /// Fingerprint a file as it is on disk now
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        let since_epoch = metadata.modified()?.duration_since(SystemTime::UNIX_EPOCH)?;

        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime_secs: since_epoch.as_secs() as i64,
            mtime_nanos: since_epoch.subsec_nanos(),
        })
    }

    /// Whether the file changed (size or mtime differs, or it is gone)
    pub fn is_stale(&self) -> bool {
        match Self::from_path(&self.path) {
            Ok(current) => current != *self,
            Err(_) => true,
        }
    }
}

/// Whether two fingerprint sets describe the same files in the same state
pub fn unchanged(previous: &[FileFingerprint], current: &[FileFingerprint]) -> bool {
    if previous.len() != current.len() {
        return false;
    }
    current.iter().all(|fp| previous.contains(fp))
}
