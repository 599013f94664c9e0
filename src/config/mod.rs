//! Runtime configuration for talking to the external assistant executable
//!
//! Defaults work out of the box; an optional JSON file can override any field
//! and the CLI layers its flags on top.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::parsers::PREVIEW_CHARS;
use crate::utils::get_claude_dir;

pub const DEFAULT_EXECUTABLE: &str = "claude";
pub const DEFAULT_MODEL: &str = "sonnet";
pub const DEFAULT_APPLICATION_NAME: &str = "folio";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    /// Name or path of the external assistant executable
    pub executable: String,
    pub model: String,
    /// Tools the assistant may use without asking
    pub allowed_tools: Vec<String>,
    /// External tool home; `None` resolves via [`get_claude_dir`]
    pub claude_dir: Option<PathBuf>,
    /// Prefix of the chat registry file name
    pub application_name: String,
    pub preview_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            allowed_tools: vec!["Read".to_string(), "Glob".to_string(), "Grep".to_string()],
            claude_dir: None,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
            preview_chars: PREVIEW_CHARS,
        }
    }
}

impl AgentConfig {
    /// Loads a JSON config file; a missing file yields the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read config file: {}", path.display()));
            }
        };
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Resolved external tool home directory
    pub fn resolve_claude_dir(&self) -> Result<PathBuf> {
        match &self.claude_dir {
            Some(dir) => Ok(dir.clone()),
            None => get_claude_dir(),
        }
    }

    /// Value for the tool-allowlist flag
    pub fn allowed_tools_arg(&self) -> String {
        self.allowed_tools.join(",")
    }
}
