//! Chat, message, and retrieval source types for Colloquy.
//!
//! These types model persisted conversations: a [`Chat`] owned by one user,
//! the [`ChatMessage`] turns inside it, and the [`ChatMessageSource`]
//! citations attached to a message by retrieval-augmented generation.
//!
//! Field names serialize in camelCase and timestamps as epoch milliseconds,
//! which is the shape clients of the chat API already consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Current time truncated to millisecond precision.
///
/// Stores persist timestamps as epoch milliseconds, so every timestamp is
/// created at that precision to read back unchanged.
pub fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Kind of a chat message turn.
///
/// The three well-known tags get their own variants; any other tag a client
/// sends (`"tool"`, `"function"`, ...) is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MessageType {
    Human,
    Ai,
    System,
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Human => "human",
            MessageType::Ai => "ai",
            MessageType::System => "system",
            MessageType::Other(tag) => tag,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for MessageType {
    type Error = String;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        if tag.trim().is_empty() {
            return Err("message type must not be empty".to_string());
        }
        Ok(match tag.as_str() {
            "human" => MessageType::Human,
            "ai" => MessageType::Ai,
            "system" => MessageType::System,
            _ => MessageType::Other(tag),
        })
    }
}

impl From<MessageType> for String {
    fn from(message_type: MessageType) -> Self {
        match message_type {
            MessageType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MessageType::try_from(s.to_string())
    }
}

/// A conversation session owned by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub chat_id: Uuid,
    pub user_id: String,
    pub title: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// One turn within a chat.
///
/// `sources` is populated when the message is created with sources; listing
/// operations leave it `None` and sources are fetched separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub message_id: Uuid,
    pub message_type: MessageType,
    pub user_id: String,
    pub chat_id: Uuid,
    pub content: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<ChatMessageSource>>,
}

/// A retrieved context fragment cited by a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageSource {
    pub source_id: Uuid,
    pub message_id: Uuid,
    pub page_content: String,
    pub metadata: Map<String, Value>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// Source payload accepted when creating a message.
///
/// Deserializes from any JSON object with a `pageContent` string and an
/// optional `metadata` object; other keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInput {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SourceInput {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Convert a loosely typed JSON mapping into a source payload.
    pub fn from_value(value: Value) -> Result<Self, String> {
        serde_json::from_value(value).map_err(|e| format!("invalid source: {e}"))
    }

    /// Materialize this payload as a source attached to `message_id`.
    pub fn into_source(self, message_id: Uuid, created_at: DateTime<Utc>) -> ChatMessageSource {
        ChatMessageSource {
            source_id: Uuid::now_v7(),
            message_id,
            page_content: self.page_content,
            metadata: self.metadata,
            created_at,
        }
    }
}

/// Default page size for message listing.
pub const DEFAULT_MESSAGE_PAGE_LIMIT: u32 = 50;

/// Pagination and ordering options for listing chat messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListMessagesOptions {
    /// Opaque cursor returned by a previous call.
    pub next_token: Option<String>,
    /// Maximum number of messages in the page.
    pub limit: u32,
    /// Oldest first when true, newest first otherwise.
    pub ascending: bool,
}

impl Default for ListMessagesOptions {
    fn default() -> Self {
        Self {
            next_token: None,
            limit: DEFAULT_MESSAGE_PAGE_LIMIT,
            ascending: true,
        }
    }
}

impl ListMessagesOptions {
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    pub fn after(mut self, token: impl Into<String>) -> Self {
        self.next_token = Some(token.into());
        self
    }
}

/// One page of messages plus the cursor for the next page, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_type_roundtrip() {
        for tag in ["human", "ai", "system", "tool"] {
            let parsed: MessageType = tag.parse().unwrap();
            assert_eq!(parsed.to_string(), tag);
        }
        assert_eq!("ai".parse::<MessageType>().unwrap(), MessageType::Ai);
    }

    #[test]
    fn test_message_type_keeps_unknown_tags() {
        assert_eq!(
            "tool".parse::<MessageType>().unwrap(),
            MessageType::Other("tool".to_string())
        );
        // Stored tags are taken as-is; aliases belong to the CLI.
        assert_eq!(
            "assistant".parse::<MessageType>().unwrap(),
            MessageType::Other("assistant".to_string())
        );
        assert!("".parse::<MessageType>().is_err());
        assert!("  ".parse::<MessageType>().is_err());
    }

    #[test]
    fn test_message_type_serde() {
        let json = serde_json::to_string(&MessageType::Ai).unwrap();
        assert_eq!(json, "\"ai\"");
        let json = serde_json::to_string(&MessageType::Other("tool".to_string())).unwrap();
        assert_eq!(json, "\"tool\"");
        assert!(serde_json::from_str::<MessageType>("\"\"").is_err());
    }

    #[test]
    fn test_message_with_open_tag_deserializes() {
        let message: ChatMessage = serde_json::from_value(json!({
            "messageId": Uuid::nil(),
            "messageType": "tool",
            "userId": "u",
            "chatId": Uuid::nil(),
            "content": "{\"temperature\": 21}",
            "createdAt": 1_700_000_000_000_i64
        }))
        .unwrap();
        assert_eq!(message.message_type, MessageType::Other("tool".to_string()));
        assert_eq!(serde_json::to_value(&message).unwrap()["messageType"], json!("tool"));
    }

    #[test]
    fn test_chat_serializes_camel_case_millis() {
        let created = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let chat = Chat {
            chat_id: Uuid::nil(),
            user_id: "user-1".to_string(),
            title: "Trip planning".to_string(),
            created_at: created,
            updated_at: created,
        };
        let value = serde_json::to_value(&chat).unwrap();
        assert_eq!(value["chatId"], json!(Uuid::nil().to_string()));
        assert_eq!(value["userId"], json!("user-1"));
        assert_eq!(value["createdAt"], json!(1_700_000_000_123_i64));
        assert_eq!(value["updatedAt"], json!(1_700_000_000_123_i64));
    }

    #[test]
    fn test_message_without_sources_omits_field() {
        let message = ChatMessage {
            message_id: Uuid::now_v7(),
            message_type: MessageType::Human,
            user_id: "u".to_string(),
            chat_id: Uuid::now_v7(),
            content: "hi".to_string(),
            created_at: timestamp_now(),
            sources: None,
        };
        let value = serde_json::to_value(&message).unwrap();
        assert!(value.get("sources").is_none());
        assert_eq!(value["messageType"], json!("human"));
    }

    #[test]
    fn test_source_input_from_loose_mapping() {
        let input = SourceInput::from_value(json!({
            "pageContent": "Paris is the capital of France.",
            "metadata": { "source": "wiki", "score": 0.92 },
            "ignored": true
        }))
        .unwrap();
        assert_eq!(input.page_content, "Paris is the capital of France.");
        assert_eq!(input.metadata["source"], json!("wiki"));

        let bare = SourceInput::from_value(json!({ "pageContent": "x" })).unwrap();
        assert!(bare.metadata.is_empty());

        assert!(SourceInput::from_value(json!({ "metadata": {} })).is_err());
    }

    #[test]
    fn test_timestamp_now_is_millisecond_precise() {
        let ts = timestamp_now();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_list_options_default() {
        let opts = ListMessagesOptions::default();
        assert_eq!(opts.limit, 50);
        assert!(opts.ascending);
        assert!(opts.next_token.is_none());

        let opts = ListMessagesOptions::default().limit(3).descending().after("abc");
        assert_eq!(opts.limit, 3);
        assert!(!opts.ascending);
        assert_eq!(opts.next_token.as_deref(), Some("abc"));
    }
}
