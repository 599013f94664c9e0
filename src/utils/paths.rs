use std::borrow::Cow;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Windows drive separators as they appear in a working directory (`C:\`, `C:/`)
const DRIVE_SEPARATORS: [&str; 2] = [":\\", ":/"];

/// Extension used by the external tool for session logs
pub const SESSION_LOG_EXTENSION: &str = "jsonl";

/// Encodes a working directory into the external tool's project directory name
///
/// Drive separators (`:\` or `:/`) become `--`, every remaining `/` or `\`
/// becomes `-`. Everything else is kept as is, so both sides agree on the
/// directory name.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use folio_agent::encode_path;
///
/// assert_eq!(encode_path(&PathBuf::from("/Users/foo/bar")), "-Users-foo-bar");
/// assert_eq!(encode_path(&PathBuf::from(r"C:\Users\foo")), "C--Users-foo");
/// ```
pub fn encode_path(path: &Path) -> String {
    let mut encoded = path.to_string_lossy().into_owned();
    for separator in DRIVE_SEPARATORS {
        encoded = encoded.replace(separator, "--");
    }
    encoded.replace(['\\', '/'], "-")
}

/// Directory holding the session logs for one working directory
///
/// `<claude_dir>/projects/<encode_path(working_dir)>`
pub fn sessions_dir(claude_dir: &Path, working_dir: &Path) -> PathBuf {
    claude_dir.join("projects").join(encode_path(working_dir))
}

/// Path of the append-only log for a single session
pub fn session_log_path(sessions_dir: &Path, session_id: &str) -> PathBuf {
    sessions_dir.join(format!("{}.{}", session_id, SESSION_LOG_EXTENSION))
}

/// Checks that a session id names a file inside the sessions directory
///
/// # Errors
///
/// Returns an error if the id is blank or contains a path separator or `..`.
pub fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.trim().is_empty() {
        bail!("Session id must not be empty");
    }
    if session_id.contains(['/', '\\']) || session_id.contains("..") {
        bail!("Session id must not contain path separators or '..': {}", session_id);
    }
    Ok(())
}

/// Formats a path with ~ substitution for the home directory
///
/// # Examples
///
/// ```no_run
/// use std::path::PathBuf;
/// use folio_agent::format_path_with_tilde;
///
/// let path = PathBuf::from("/Users/alice/Documents");
/// // Returns "~/Documents" if HOME=/Users/alice
/// let formatted = format_path_with_tilde(&path);
/// ```
pub fn format_path_with_tilde(path: &Path) -> String {
    format_path_with_tilde_internal(path, None)
}

/// Internal helper for path formatting with optional home override (for testing)
pub(crate) fn format_path_with_tilde_internal(path: &Path, home_override: Option<&str>) -> String {
    let home_from_env = env::var("HOME").ok();
    let home = home_override.or(home_from_env.as_deref());

    if let Some(home) = home
        && let Ok(rest) = path.strip_prefix(home)
    {
        if rest.as_os_str().is_empty() {
            return "~".to_string();
        }
        return format!("~/{}", rest.display());
    }

    match path.to_string_lossy() {
        Cow::Borrowed(s) => s.to_string(),
        Cow::Owned(s) => s,
    }
}
