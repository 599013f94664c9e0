//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use folio_agent::AgentConfig;
use folio_agent::session::RESPONSE_MARKER;
use folio_agent::utils::sessions_dir;
use serde_json::{Value, json};
use tempfile::TempDir;

/// Builder for a throwaway external tool home (what `~/.claude` would be)
pub struct ClaudeDirBuilder {
    temp_dir: TempDir,
}

impl ClaudeDirBuilder {
    /// Create a new builder with an empty home directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self { temp_dir }
    }

    /// Get the path to the home directory
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a session log for `working_dir` made of the given records
    pub fn with_session_log(self, working_dir: &Path, session_id: &str, records: &[RecordBuilder]) -> Self {
        write_session_log(self.path(), working_dir, session_id, records);
        self
    }

    /// Write a session log with raw content, one JSON object per line or not
    pub fn with_raw_session_log(self, working_dir: &Path, session_id: &str, content: &str) -> Self {
        let dir = sessions_dir(self.path(), working_dir);
        fs::create_dir_all(&dir).expect("Failed to create sessions dir");
        fs::write(dir.join(format!("{}.jsonl", session_id)), content).expect("Failed to write session log");
        self
    }

    /// Record a session id in the chat registry for `working_dir`
    pub fn with_registered_chat(self, working_dir: &Path, session_id: &str) -> Self {
        let dir = sessions_dir(self.path(), working_dir);
        folio_agent::ChatRegistry::register(&dir, folio_agent::config::DEFAULT_APPLICATION_NAME, session_id)
            .expect("Failed to register chat");
        self
    }

    /// Build and return the temp directory (consumes self)
    pub fn build(self) -> TempDir {
        self.temp_dir
    }
}

impl Default for ClaudeDirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes (or replaces) one session log under `claude_dir`
pub fn write_session_log(claude_dir: &Path, working_dir: &Path, session_id: &str, records: &[RecordBuilder]) -> PathBuf {
    let dir = sessions_dir(claude_dir, working_dir);
    fs::create_dir_all(&dir).expect("Failed to create sessions dir");
    let path = dir.join(format!("{}.jsonl", session_id));
    let content = records.iter().map(|r| r.to_json()).collect::<Vec<_>>().join("\n");
    fs::write(&path, content + "\n").expect("Failed to write session log");
    path
}

/// Builder for records in an external tool session log
pub struct RecordBuilder {
    kind: String,
    role: Option<String>,
    content: Option<Value>,
    timestamp: Option<Value>,
}

impl RecordBuilder {
    /// A user record whose stored text carries the prompt scaffolding
    pub fn user(text: &str) -> Self {
        Self::raw_user(&format!("Instructions for the assistant.\n\n{}\n{}", RESPONSE_MARKER, text))
    }

    /// A user record storing exactly `text`
    pub fn raw_user(text: &str) -> Self {
        Self {
            kind: "user".to_string(),
            role: Some("user".to_string()),
            content: Some(json!(text)),
            timestamp: Some(json!("2025-03-01T09:00:00Z")),
        }
    }

    /// An assistant record with one text block
    pub fn assistant(text: &str) -> Self {
        Self {
            kind: "assistant".to_string(),
            role: Some("assistant".to_string()),
            content: Some(json!([{ "type": "text", "text": text }])),
            timestamp: Some(json!("2025-03-01T09:00:05Z")),
        }
    }

    /// A bookkeeping record with a timestamp and no message
    pub fn summary() -> Self {
        Self { kind: "summary".to_string(), role: None, content: None, timestamp: Some(json!("2025-03-01T08:59:59Z")) }
    }

    /// Set an RFC3339 timestamp
    pub fn at(mut self, timestamp: &str) -> Self {
        self.timestamp = Some(json!(timestamp));
        self
    }

    /// Set a millisecond epoch timestamp
    pub fn at_millis(mut self, millis: i64) -> Self {
        self.timestamp = Some(json!(millis));
        self
    }

    /// Drop the timestamp field
    pub fn without_timestamp(mut self) -> Self {
        self.timestamp = None;
        self
    }

    /// Convert to a JSON line
    pub fn to_json(&self) -> String {
        let mut record = json!({ "type": self.kind });
        if self.role.is_some() || self.content.is_some() {
            record["message"] = json!({ "role": self.role, "content": self.content });
        }
        if let Some(timestamp) = &self.timestamp {
            record["timestamp"] = timestamp.clone();
        }
        record.to_string()
    }
}

/// Config pointing the library at a fake home and executable
pub fn test_config(claude_dir: &Path, executable: &Path) -> AgentConfig {
    AgentConfig {
        claude_dir: Some(claude_dir.to_path_buf()),
        executable: executable.display().to_string(),
        ..Default::default()
    }
}

/// Writes an executable `sh` script standing in for the assistant CLI
#[cfg(unix)]
pub fn write_fake_agent(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write fake agent");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("Failed to chmod fake agent");
    path
}

/// Script body that records its arguments, one per line, into `args_file`
pub fn record_args(args_file: &Path) -> String {
    format!("printf '%s\\n' \"$@\" > '{}'", args_file.display())
}

/// Script body that copies `transcript` into the session log named by the
/// `--session-id`/`--resume` flag under `sessions_dir`
pub fn append_transcript(transcript: &Path, sessions_dir: &Path) -> String {
    format!(
        r#"id=""
while [ $# -gt 0 ]; do
  case "$1" in
    --session-id|--resume) id="$2"; shift 2 ;;
    *) shift ;;
  esac
done
mkdir -p '{dir}'
cat '{transcript}' >> '{dir}'/"$id".jsonl"#,
        dir = sessions_dir.display(),
        transcript = transcript.display()
    )
}
