use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use crate::models::{Message, Role, SessionPreview, SessionRecord};
use crate::session::prompt::strip_scaffolding;

/// Number of characters kept for a history picker preview
pub const PREVIEW_CHARS: usize = 100;

/// Decodes one log line, `None` for blank or malformed lines
fn decode_line(line: &str) -> Option<SessionRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    serde_json::from_str(line).ok()
}

/// Displayable text of a record, with scaffolding stripped from user turns
fn display_text(record: &SessionRecord) -> Option<(Role, String)> {
    let role = record.role()?;
    let text = record.text()?;
    let text = match role {
        Role::User => strip_scaffolding(text),
        Role::Assistant => text,
    };
    (!text.is_empty()).then(|| (role, text.to_string()))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Replays user/assistant turns from log lines, in line order
///
/// Lines that fail to decode are skipped and never abort the replay.
pub fn history_from_lines<I, S>(lines: I) -> Vec<Message>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut messages = Vec::new();
    let mut skipped = 0usize;

    for line in lines {
        let line = line.as_ref();
        let Some(record) = decode_line(line) else {
            if !line.trim().is_empty() {
                skipped += 1;
            }
            continue;
        };
        if let Some((role, content)) = display_text(&record) {
            messages.push(Message { role, content });
        }
    }

    if skipped > 0 {
        debug!(skipped, kept = messages.len(), "skipped undecodable session log lines");
    }
    messages
}

/// Finds the first timestamp and the first user text, stopping once both are known
///
/// Returns `None` when no user text exists, even if a timestamp was seen.
pub fn preview_from_lines<I, S>(lines: I, max_chars: usize) -> Option<SessionPreview>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut timestamp = None;
    let mut first_message = None;

    for line in lines {
        let Some(record) = decode_line(line.as_ref()) else {
            continue;
        };
        if timestamp.is_none() {
            timestamp = record.timestamp;
        }
        if first_message.is_none()
            && let Some((Role::User, text)) = display_text(&record)
        {
            first_message = Some(truncate_chars(&text, max_chars));
        }
        if timestamp.is_some() && first_message.is_some() {
            break;
        }
    }

    first_message.map(|first_message_preview| SessionPreview { timestamp, first_message_preview })
}

/// Replays a log held in memory
pub fn parse_history(content: &str) -> Vec<Message> {
    history_from_lines(content.lines())
}

/// Previews a log held in memory
pub fn parse_preview(content: &str, max_chars: usize) -> Option<SessionPreview> {
    preview_from_lines(content.lines(), max_chars)
}

/// Opens a session log, `Ok(None)` if it does not exist yet
fn open_log(path: &Path) -> Result<Option<BufReader<File>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to open session log: {}", path.display()));
        }
    };
    Ok(Some(BufReader::new(file)))
}

/// Lines of a log as lossy UTF-8; a read error ends the sequence
///
/// The writer may be mid-append, so a torn tail is expected and harmless.
fn log_lines(reader: BufReader<File>, path: &Path) -> impl Iterator<Item = String> + '_ {
    reader
        .split(b'\n')
        .map_while(move |chunk| match chunk {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "stopped reading session log");
                None
            }
        })
        .map(|bytes| match String::from_utf8_lossy(&bytes) {
            Cow::Borrowed(s) => s.to_string(),
            Cow::Owned(s) => s,
        })
}

/// Reads the full message history of a session log
///
/// A missing file is "no history yet" and yields an empty list.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be opened.
pub fn read_history(path: &Path) -> Result<Vec<Message>> {
    match open_log(path)? {
        Some(reader) => Ok(history_from_lines(log_lines(reader, path))),
        None => Ok(Vec::new()),
    }
}

/// Reads just enough of a session log to build a preview
///
/// # Errors
///
/// Same conditions as [`read_history`].
pub fn read_preview(path: &Path, max_chars: usize) -> Result<Option<SessionPreview>> {
    match open_log(path)? {
        Some(reader) => Ok(preview_from_lines(log_lines(reader, path), max_chars)),
        None => Ok(None),
    }
}
