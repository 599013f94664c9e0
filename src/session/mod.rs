//! Conversation orchestration on top of the external assistant
//!
//! # Source of truth
//!
//! The orchestrator never accumulates process output into a transcript. A
//! turn is: spawn, wait for the single completion, then re-derive messages
//! from the session log the external tool appended to. The log is foreign
//! data, so every read goes through the tolerant parsers.
//!
//! # Error Handling Strategy
//!
//! - **Process failures** (spawn errors, non-zero exits) reach the caller as a
//!   single human readable string on [`Completion::error`], never retried.
//! - **Cancellation** is not an error kind: a cancelled run still completes,
//!   [`Completion::cancelled`] reports it (also when the cancel landed after
//!   the process had already exited) and [`Completion::user_visible_error`]
//!   hides it.
//! - **Log problems** degrade to "no history" / "no preview" with a warning.
//! - **Registry writes** are the one failure `send_message` returns directly,
//!   because an unregistered chat would never show up in the history picker.

pub mod cleanup;
pub mod orchestrator;
pub mod prompt;

pub use cleanup::{AGENT_ARTIFACT_PREFIX, CleanupOutcome, LogSnapshot, cleanup_incidental_sessions};
pub use orchestrator::{Completion, OrchestratorState, SendRequest, SessionOrchestrator};
pub use prompt::{RESPONSE_MARKER, compose_prompt, strip_scaffolding};
