use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::message::Role;

const RECORD_TYPE_USER: &str = "user";
const RECORD_TYPE_ASSISTANT: &str = "assistant";
const CONTENT_TYPE_TEXT: &str = "text";

/// One line of a session log, as written by the external tool
///
/// Only the fields needed for replay are modelled; everything else on the line
/// is ignored by serde.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub message: Option<RecordMessage>,
    #[serde(
        default,
        deserialize_with = "crate::parsers::deserializers::deserialize_optional_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<RecordContent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecordContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl SessionRecord {
    /// Conversation role of this record, `None` for internal record kinds
    ///
    /// The kind tag decides; a nested `message.role` that disagrees with it
    /// disqualifies the record.
    pub fn role(&self) -> Option<Role> {
        let role = match self.kind.as_str() {
            RECORD_TYPE_USER => Role::User,
            RECORD_TYPE_ASSISTANT => Role::Assistant,
            _ => return None,
        };
        match self.message.as_ref().and_then(|m| m.role.as_deref()) {
            Some(inner) if inner != role.as_str() => None,
            _ => Some(role),
        }
    }

    /// Text carried by the record, if any
    pub fn text(&self) -> Option<&str> {
        self.message.as_ref()?.content.as_ref()?.text()
    }
}

impl RecordContent {
    /// Plain string content, or the first `text` block of a block list
    pub fn text(&self) -> Option<&str> {
        match self {
            RecordContent::Text(text) => Some(text),
            RecordContent::Blocks(blocks) => blocks
                .iter()
                .find(|b| b.block_type == CONTENT_TYPE_TEXT)
                .and_then(|b| b.text.as_deref()),
        }
    }
}
