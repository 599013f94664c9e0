//! Data models for agent conversations.
//!
//! - [`SessionRecord`] - one line of the external tool's session log
//! - [`Message`] - a replayed user/assistant turn
//! - [`SessionPreview`] / [`AgentSession`] - history picker projections
//!
//! Records are read-only views of a foreign format. Custom deserializers for
//! tolerant fields (timestamps) live in `parsers::deserializers`.

pub mod message;
pub mod record;

pub use message::{AgentSession, Message, Role, SessionPreview};
pub use record::{ContentBlock, RecordContent, RecordMessage, SessionRecord};
