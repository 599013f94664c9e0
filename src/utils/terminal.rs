//! Terminal output sanitization
//!
//! Transcript text comes from a log file written by another program. Before the
//! CLI prints it, escape sequences are removed so a log cannot move the cursor,
//! clear the screen or recolor the terminal.

/// Strips ANSI CSI escape codes and stray control characters
///
/// Tabs and line breaks survive; everything else below 0x20 (bell, backspace)
/// is dropped.
///
/// # Examples
///
/// ```
/// use folio_agent::utils::terminal::strip_ansi_codes;
///
/// assert_eq!(strip_ansi_codes("\x1b[31mRed\x1b[0m"), "Red");
/// ```
pub fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            chars.next();
            // CSI ends at its first alphabetic byte
            for next_ch in chars.by_ref() {
                if next_ch.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }

        if ch.is_control() && !matches!(ch, '\t' | '\n' | '\r') {
            continue;
        }

        result.push(ch);
    }

    result
}
