//! Index configuration.
//!
//! Resolution order, lowest to highest priority: built-in defaults, an
//! optional TOML file, environment variables, then whatever the caller (the
//! CLI) sets explicitly.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::get_claude_dir;

/// Overrides `max_file_size_bytes`, in MiB
pub const MAX_FILE_MB_ENV: &str = "SESSION_INSPECTOR_MAX_FILE_MB";

const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 256 * 1024 * 1024;
const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Root of the Claude data directory; `None` resolves to
    /// `$CLAUDE_CONFIG_DIR` or `~/.claude`
    pub claude_dir: Option<PathBuf>,
    /// Files above this size are reported as failures instead of parsed
    pub max_file_size_bytes: u64,
    /// Merge `agent-*.jsonl` logs into their parent session as side-chains
    pub include_agent_files: bool,
    pub default_page_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            claude_dir: None,
            max_file_size_bytes: DEFAULT_MAX_FILE_SIZE_BYTES,
            include_agent_files: true,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl IndexConfig {
    /// Load from a TOML file if given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a TOML file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("failed to parse config: {}", path.display()))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_max_file_mb(env::var(MAX_FILE_MB_ENV).ok().as_deref())
    }

    fn apply_max_file_mb(&mut self, value: Option<&str>) -> Result<()> {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(());
        };
        let mb: u64 = raw
            .parse()
            .with_context(|| format!("{} must be a whole number of MiB, got {:?}", MAX_FILE_MB_ENV, raw))?;
        self.max_file_size_bytes = mb.saturating_mul(1024 * 1024);
        Ok(())
    }

    /// The Claude data directory this configuration points at
    pub fn resolve_claude_dir(&self) -> Result<PathBuf> {
        match &self.claude_dir {
            Some(dir) => Ok(dir.clone()),
            None => get_claude_dir(),
        }
    }

    /// Directory holding one subdirectory of session logs per project
    pub fn source_dir(&self) -> Result<PathBuf> {
        Ok(self.resolve_claude_dir()?.join("projects"))
    }
}
