use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Registry file name for an application: `<application_name>-chat-sessions.json`
pub fn registry_file_name(application_name: &str) -> String {
    format!("{}-chat-sessions.json", application_name)
}

/// Session ids created by this application's "new chat" path
///
/// Stored as a JSON array of strings next to the session logs. Every update
/// is a whole-file read, merge and rewrite; there is no locking against other
/// writers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRegistry {
    ids: Vec<String>,
}

impl ChatRegistry {
    /// Path of the registry file inside a sessions directory
    pub fn path(sessions_dir: &Path, application_name: &str) -> PathBuf {
        sessions_dir.join(registry_file_name(application_name))
    }

    /// Loads the registry, treating a missing or unreadable file as empty
    pub fn load(sessions_dir: &Path, application_name: &str) -> Self {
        let path = Self::path(sessions_dir, application_name);
        match Self::try_load(&path) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "ignoring unreadable chat registry");
                Self::default()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Self> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read chat registry: {}", path.display()));
            }
        };
        let ids: Vec<String> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse chat registry: {}", path.display()))?;

        let mut registry = Self::default();
        for id in ids {
            registry.insert(id);
        }
        Ok(registry)
    }

    /// Adds an id to the on-disk registry (read, merge, rewrite)
    ///
    /// Creates the sessions directory if needed. Registering an id twice is a
    /// no-op apart from the rewrite.
    pub fn register(sessions_dir: &Path, application_name: &str, session_id: &str) -> Result<Self> {
        let mut registry = Self::load(sessions_dir, application_name);
        registry.insert(session_id.to_string());
        registry.save(sessions_dir, application_name)?;
        debug!(session_id, total = registry.len(), "registered chat session");
        Ok(registry)
    }

    /// Writes the registry atomically (temp file + rename)
    pub fn save(&self, sessions_dir: &Path, application_name: &str) -> Result<()> {
        fs::create_dir_all(sessions_dir).with_context(|| {
            format!("Failed to create sessions directory: {}", sessions_dir.display())
        })?;

        let path = Self::path(sessions_dir, application_name);
        let temp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&self.ids)
            .context("Failed to serialize chat registry")?;
        fs::write(&temp, json).context("Failed to write chat registry temp file")?;
        fs::rename(&temp, &path).context("Failed to rename chat registry temp file")?;
        Ok(())
    }

    fn insert(&mut self, id: String) {
        if !self.contains(&id) {
            self.ids.push(id);
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.ids.iter().any(|id| id == session_id)
    }

    /// Registered ids in insertion order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
