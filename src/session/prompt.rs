use std::path::Path;

/// Instructions prepended to every chat turn
pub const INSTRUCTION_PREFIX: &str = "You are an assistant inside a note-taking app. \
The user is browsing the markdown and PDF files of the current folder. \
Use the available read-only tools to look at files when the question is about them, \
and answer in Markdown.\n\n";

/// Separates scaffolding from what the user typed
///
/// The external tool stores the whole prompt as the user turn, so replay cuts
/// everything up to and including this token.
pub const RESPONSE_MARKER: &str = "[[user-message]]";

/// Builds the prompt handed to the external executable
///
/// `INSTRUCTION_PREFIX + optional current-file line + RESPONSE_MARKER + text`
pub fn compose_prompt(text: &str, current_file: Option<&Path>) -> String {
    let mut prompt = String::with_capacity(INSTRUCTION_PREFIX.len() + text.len() + 128);
    prompt.push_str(INSTRUCTION_PREFIX);
    if let Some(file) = current_file {
        prompt.push_str("The user currently has this file open: ");
        prompt.push_str(&file.to_string_lossy());
        prompt.push_str("\n\n");
    }
    prompt.push_str(RESPONSE_MARKER);
    prompt.push('\n');
    prompt.push_str(text);
    prompt
}

/// Recovers what the user typed from a stored user turn
///
/// Text without the marker was not produced by us and is returned verbatim.
pub fn strip_scaffolding(stored: &str) -> &str {
    match stored.find(RESPONSE_MARKER) {
        Some(idx) => stored[idx + RESPONSE_MARKER.len()..].trim_start(),
        None => stored,
    }
}
