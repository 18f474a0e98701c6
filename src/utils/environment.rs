use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Environment variable that relocates the Claude directory
pub const CLAUDE_CONFIG_DIR_ENV: &str = "CLAUDE_CONFIG_DIR";

/// Get the Claude directory path: `$CLAUDE_CONFIG_DIR` if set, else `~/.claude`
pub fn get_claude_dir() -> Result<PathBuf> {
    resolve_claude_dir(env::var_os(CLAUDE_CONFIG_DIR_ENV).map(PathBuf::from), dirs::home_dir())
}

fn resolve_claude_dir(override_dir: Option<PathBuf>, home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = override_dir.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir);
    }
    let home = home.context("could not determine the home directory")?;
    Ok(home.join(".claude"))
}
