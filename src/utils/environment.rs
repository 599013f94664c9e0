use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Overrides the external tool's home directory when set
pub const CLAUDE_CONFIG_DIR_ENV: &str = "CLAUDE_CONFIG_DIR";

/// Get the external tool's home directory
///
/// `$CLAUDE_CONFIG_DIR` wins when set and non-empty, otherwise `~/.claude`.
pub fn get_claude_dir() -> Result<PathBuf> {
    let config_dir = env::var(CLAUDE_CONFIG_DIR_ENV).ok();
    let home = env::var("HOME").ok().map(PathBuf::from).or_else(dirs::home_dir);
    resolve_claude_dir(config_dir.as_deref(), home)
}

fn resolve_claude_dir(config_dir: Option<&str>, home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = config_dir.filter(|d| !d.trim().is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = home.context("HOME environment variable not set")?;
    Ok(home.join(".claude"))
}
