use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::registry::ChatRegistry;
use crate::utils::SESSION_LOG_EXTENSION;

/// File name prefix the external tool uses for its own sub-agent logs
pub const AGENT_ARTIFACT_PREFIX: &str = "agent-";

/// Session log file names present in a sessions directory at one moment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSnapshot {
    names: BTreeSet<String>,
}

impl LogSnapshot {
    /// Lists `*.jsonl` files; a directory that does not exist yet is empty
    pub fn capture(sessions_dir: &Path) -> Result<Self> {
        let entries = match fs::read_dir(sessions_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read sessions directory: {}", sessions_dir.display())
                });
            }
        };

        let names = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_session_log(name))
            .collect();
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names present in `self` but not in `earlier`
    pub fn added_since<'a>(&'a self, earlier: &'a LogSnapshot) -> impl Iterator<Item = &'a str> {
        self.names.difference(&earlier.names).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CleanupOutcome {
    pub deleted: usize,
    pub kept: usize,
    pub failed: usize,
}

fn is_session_log(name: &str) -> bool {
    Path::new(name).extension().is_some_and(|ext| ext == SESSION_LOG_EXTENSION)
}

fn session_id_of(name: &str) -> &str {
    name.strip_suffix(".jsonl").unwrap_or(name)
}

/// Removes session logs that appeared since `before` and are not ours
///
/// A new log survives when its session id is in the chat registry or its name
/// carries the agent artifact prefix. Logs that existed in `before` are never
/// touched, registered or not.
pub fn cleanup_incidental_sessions(
    sessions_dir: &Path,
    before: &LogSnapshot,
    registry: &ChatRegistry,
) -> Result<CleanupOutcome> {
    let after = LogSnapshot::capture(sessions_dir)?;
    let mut outcome = CleanupOutcome::default();

    for name in after.added_since(before) {
        if registry.contains(session_id_of(name)) || name.starts_with(AGENT_ARTIFACT_PREFIX) {
            outcome.kept += 1;
            continue;
        }

        let path = sessions_dir.join(name);
        if !path.starts_with(sessions_dir) {
            outcome.failed += 1;
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "removed incidental session log");
                outcome.deleted += 1;
            }
            // Someone else removed it first
            Err(e) if e.kind() == io::ErrorKind::NotFound => outcome.deleted += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to remove incidental session log");
                outcome.failed += 1;
            }
        }
    }

    Ok(outcome)
}
