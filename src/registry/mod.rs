//! Private record of which session ids are real conversations
//!
//! The external tool writes a log for every invocation, including one-shot
//! features that reuse it. The registry is what separates "our" chats from
//! that noise.

pub mod chat_registry;

pub use chat_registry::{ChatRegistry, registry_file_name};
