//! Opaque pagination tokens for message listing.
//!
//! A token is URL-safe base64 (no padding) over a small JSON cursor that
//! points at the last message of the previous page. Messages are totally
//! ordered by `(created_at, message_id)`, so a cursor resumes exactly after
//! the message it names regardless of timestamp collisions.

use std::cmp::Ordering;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use colloquy_types::chat::{ChatMessage, ListMessagesOptions};
use colloquy_types::error::RepositoryError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position of the last message handed out in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCursor {
    /// Chat the page was listed from.
    #[serde(rename = "chat")]
    pub chat_id: Uuid,
    /// `created_at` in epoch milliseconds.
    #[serde(rename = "t")]
    pub created_at_ms: i64,
    #[serde(rename = "id")]
    pub message_id: Uuid,
    /// Direction the token was minted for.
    #[serde(rename = "asc")]
    pub ascending: bool,
}

impl MessageCursor {
    pub fn after(message: &ChatMessage, ascending: bool) -> Self {
        Self {
            chat_id: message.chat_id,
            created_at_ms: message.created_at.timestamp_millis(),
            message_id: message.message_id,
            ascending,
        }
    }

    pub fn encode(&self) -> String {
        // Serializing a struct of integers, a uuid and a bool cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decode a token and check it was minted for the same chat and direction.
    pub fn decode(token: &str, chat_id: &Uuid, ascending: bool) -> Result<Self, RepositoryError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| invalid_token())?;
        let cursor: MessageCursor = serde_json::from_slice(&bytes).map_err(|_| invalid_token())?;
        if cursor.chat_id != *chat_id {
            return Err(RepositoryError::InvalidInput(
                "pagination token was issued for a different chat".to_string(),
            ));
        }
        if cursor.ascending != ascending {
            return Err(RepositoryError::InvalidInput(
                "pagination token was issued for the opposite sort order".to_string(),
            ));
        }
        Ok(cursor)
    }

    pub fn created_at(&self) -> Result<DateTime<Utc>, RepositoryError> {
        DateTime::from_timestamp_millis(self.created_at_ms).ok_or_else(invalid_token)
    }

    /// True when `message` comes strictly after this cursor in its direction.
    pub fn precedes(&self, message: &ChatMessage) -> bool {
        let key = (message.created_at.timestamp_millis(), message.message_id);
        let ord = key.cmp(&(self.created_at_ms, self.message_id));
        if self.ascending {
            ord == Ordering::Greater
        } else {
            ord == Ordering::Less
        }
    }
}

fn invalid_token() -> RepositoryError {
    RepositoryError::InvalidInput("invalid pagination token".to_string())
}

/// Reject a zero page size before touching storage.
pub fn validate_limit(options: &ListMessagesOptions) -> Result<(), RepositoryError> {
    if options.limit == 0 {
        return Err(RepositoryError::InvalidInput(
            "limit must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Sort key ordering used by every backend.
pub fn compare_messages(a: &ChatMessage, b: &ChatMessage, ascending: bool) -> Ordering {
    let ord = (a.created_at, a.message_id).cmp(&(b.created_at, b.message_id));
    if ascending { ord } else { ord.reverse() }
}

/// Cut a page from an already ordered, cursor-filtered run of messages.
///
/// `ordered` should hold up to `limit + 1` messages; the extra one only
/// signals that another page exists.
pub fn into_page(
    mut ordered: Vec<ChatMessage>,
    limit: u32,
    ascending: bool,
) -> (Vec<ChatMessage>, Option<String>) {
    let limit = limit as usize;
    if ordered.len() > limit {
        ordered.truncate(limit);
        let token = ordered
            .last()
            .map(|last| MessageCursor::after(last, ascending).encode());
        (ordered, token)
    } else {
        (ordered, None)
    }
}
