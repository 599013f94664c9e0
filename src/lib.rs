//! Folio Agent - conversation sessions with an external AI assistant
//!
//! This library drives a command-line assistant as a subprocess on behalf of a
//! note-taking app and keeps track of the resulting conversations. It supports:
//!
//! - Sending chat turns with at most one assistant process in flight
//! - Cancelling a turn without corrupting later ones
//! - Replaying history from the assistant's own append-only session logs
//! - Listing this app's conversations via a private chat registry
//! - Cleaning up session logs left behind by one-shot invocations
//!
//! # Example
//!
//! ```no_run
//! use folio_agent::{AgentConfig, SendRequest, SessionOrchestrator};
//!
//! let (mut agent, completions) = SessionOrchestrator::new(AgentConfig::default())?;
//! let session_id = agent.send_message(SendRequest::new("What did I write today?", "/Users/alice/notes"))?;
//! let done = completions.recv()?;
//! if let Some(error) = done.user_visible_error() {
//!     eprintln!("{}", error);
//! }
//! for message in agent.load_history("/Users/alice/notes".as_ref(), &session_id) {
//!     println!("{:?}: {}", message.role, message.content);
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cli;
pub mod config;
pub mod models;
pub mod parsers;
pub mod process;
pub mod registry;
pub mod session;
pub mod utils;

// Re-export commonly used types
pub use config::AgentConfig;
pub use models::{AgentSession, Message, Role};
pub use parsers::{read_history, read_preview};
pub use registry::ChatRegistry;
pub use session::{Completion, OrchestratorState, SendRequest, SessionOrchestrator};
pub use utils::paths::{encode_path, format_path_with_tilde, sessions_dir};
