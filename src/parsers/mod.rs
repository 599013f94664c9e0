//! Tolerant readers for the external tool's session logs
//!
//! # Error Handling Strategy
//!
//! The log is written by a process we do not control and may be read while it
//! is still being appended to:
//!
//! - **Individual line failures**: a line that is not a decodable record is
//!   skipped. Torn writes, unknown record kinds and format drift all land here.
//!   Skips are counted and reported at `debug` level only; they are never
//!   surfaced to the user.
//!
//! - **Missing file**: "no history yet", an empty result rather than an error.
//!
//! - **Unreadable file**: open failures are returned as `anyhow` errors with
//!   context; callers at the orchestrator boundary decide how to degrade. There
//!   is no size limit: logs are streamed line by line, so long conversations
//!   with large tool results replay like any other.
//!
//! The line-level functions take any iterator of lines and have no side
//! effects, so they can be exercised without a filesystem.

pub mod deserializers;
pub mod session_log;

pub use session_log::{
    PREVIEW_CHARS, parse_history, parse_preview, read_history, read_preview,
};
