//! SQLite chat history store.
//!
//! Implements `ChatHistoryStore` from `colloquy-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reads on the reader
//! pool and writes on the writer pool. Cascading deletes come from the
//! `ON DELETE CASCADE` foreign keys in the schema.

use chrono::{DateTime, Utc};
use colloquy_core::chat::pagination::{MessageCursor, into_page, validate_limit};
use colloquy_core::chat::store::ChatHistoryStore;
use colloquy_types::chat::{
    Chat, ChatMessage, ChatMessageSource, ListMessagesOptions, MessagePage, MessageType,
    SourceInput, timestamp_now,
};
use colloquy_types::error::RepositoryError;
use serde_json::{Map, Value};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatHistoryStore`.
pub struct SqliteChatHistoryStore {
    pool: DatabasePool,
}

impl SqliteChatHistoryStore {
    /// Create a new store backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    async fn owns_chat(&self, user_id: &str, chat_id: &Uuid) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM chats WHERE id = ? AND user_id = ?")
            .bind(chat_id.to_string())
            .bind(user_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn owns_message(&self, user_id: &str, message_id: &Uuid) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM chat_messages WHERE id = ? AND user_id = ?")
            .bind(message_id.to_string())
            .bind(user_id)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(row.is_some())
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ChatRow {
    id: String,
    user_id: String,
    title: String,
    created_at: i64,
    updated_at: i64,
}

impl ChatRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_chat(self) -> Result<Chat, RepositoryError> {
        Ok(Chat {
            chat_id: parse_uuid(&self.id, "chat id")?,
            user_id: self.user_id,
            title: self.title,
            created_at: parse_millis(self.created_at)?,
            updated_at: parse_millis(self.updated_at)?,
        })
    }
}

struct ChatMessageRow {
    id: String,
    chat_id: String,
    user_id: String,
    message_type: String,
    content: String,
    created_at: i64,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_id: row.try_get("chat_id")?,
            user_id: row.try_get("user_id")?,
            message_type: row.try_get("message_type")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let message_type: MessageType = self
            .message_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(ChatMessage {
            message_id: parse_uuid(&self.id, "message id")?,
            message_type,
            user_id: self.user_id,
            chat_id: parse_uuid(&self.chat_id, "chat_id")?,
            content: self.content,
            created_at: parse_millis(self.created_at)?,
            sources: None,
        })
    }
}

struct ChatMessageSourceRow {
    id: String,
    message_id: String,
    page_content: String,
    metadata: String,
    created_at: i64,
}

impl ChatMessageSourceRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            message_id: row.try_get("message_id")?,
            page_content: row.try_get("page_content")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_source(self) -> Result<ChatMessageSource, RepositoryError> {
        let metadata: Map<String, Value> = serde_json::from_str(&self.metadata)
            .map_err(|e| RepositoryError::Query(format!("invalid source metadata: {e}")))?;

        Ok(ChatMessageSource {
            source_id: parse_uuid(&self.id, "source id")?,
            message_id: parse_uuid(&self.message_id, "message_id")?,
            page_content: self.page_content,
            metadata,
            created_at: parse_millis(self.created_at)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str, what: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {what}: {e}")))
}

fn parse_millis(ms: i64) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| RepositoryError::Query(format!("invalid timestamp: {ms}")))
}

// ---------------------------------------------------------------------------
// ChatHistoryStore implementation
// ---------------------------------------------------------------------------

impl ChatHistoryStore for SqliteChatHistoryStore {
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<Chat, RepositoryError> {
        let now = timestamp_now();
        let chat = Chat {
            chat_id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO chats (id, user_id, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(chat.chat_id.to_string())
        .bind(&chat.user_id)
        .bind(&chat.title)
        .bind(chat.created_at.timestamp_millis())
        .bind(chat.updated_at.timestamp_millis())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        info!(chat_id = %chat.chat_id, user_id, "Chat created");
        Ok(chat)
    }

    async fn update_chat(
        &self,
        user_id: &str,
        chat_id: &Uuid,
        title: &str,
    ) -> Result<Chat, RepositoryError> {
        let result = sqlx::query(
            "UPDATE chats SET title = ?, updated_at = MAX(?, created_at) WHERE id = ? AND user_id = ?",
        )
        .bind(title)
        .bind(timestamp_now().timestamp_millis())
        .bind(chat_id.to_string())
        .bind(user_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        let row = sqlx::query("SELECT * FROM chats WHERE id = ?")
            .bind(chat_id.to_string())
            .fetch_one(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        ChatRow::from_row(&row)
            .map_err(|e| RepositoryError::Query(e.to_string()))?
            .into_chat()
    }

    async fn delete_chat(&self, user_id: &str, chat_id: &Uuid) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = ? AND user_id = ?")
            .bind(chat_id.to_string())
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        info!(chat_id = %chat_id, "Chat deleted");
        Ok(())
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<Chat>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chats WHERE user_id = ? ORDER BY updated_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut chats = Vec::with_capacity(rows.len());
        for row in &rows {
            let chat_row = ChatRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            chats.push(chat_row.into_chat()?);
        }

        Ok(chats)
    }

    async fn create_chat_message(
        &self,
        user_id: &str,
        chat_id: &Uuid,
        message_type: MessageType,
        content: &str,
        sources: Option<Vec<SourceInput>>,
    ) -> Result<ChatMessage, RepositoryError> {
        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let owned = sqlx::query("SELECT 1 FROM chats WHERE id = ? AND user_id = ?")
            .bind(chat_id.to_string())
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        if owned.is_none() {
            return Err(RepositoryError::NotFound);
        }

        let now = timestamp_now();
        let message = ChatMessage {
            message_id: Uuid::now_v7(),
            message_type,
            user_id: user_id.to_string(),
            chat_id: *chat_id,
            content: content.to_string(),
            created_at: now,
            sources: None,
        };

        sqlx::query(
            r#"INSERT INTO chat_messages (id, chat_id, user_id, message_type, content, created_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.message_id.to_string())
        .bind(message.chat_id.to_string())
        .bind(&message.user_id)
        .bind(message.message_type.to_string())
        .bind(&message.content)
        .bind(message.created_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut created_sources = None;
        if let Some(inputs) = sources {
            let mut created = Vec::with_capacity(inputs.len());
            for (position, input) in inputs.into_iter().enumerate() {
                let source = input.into_source(message.message_id, now);
                let metadata = serde_json::to_string(&source.metadata)
                    .map_err(|e| RepositoryError::InvalidInput(e.to_string()))?;

                sqlx::query(
                    r#"INSERT INTO chat_message_sources (id, message_id, position, page_content, metadata, created_at)
                       VALUES (?, ?, ?, ?, ?, ?)"#,
                )
                .bind(source.source_id.to_string())
                .bind(source.message_id.to_string())
                .bind(position as i64)
                .bind(&source.page_content)
                .bind(metadata)
                .bind(source.created_at.timestamp_millis())
                .execute(&mut *tx)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

                created.push(source);
            }
            created_sources = Some(created);
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(ChatMessage {
            sources: created_sources,
            ..message
        })
    }

    async fn delete_chat_message(
        &self,
        user_id: &str,
        message_id: &Uuid,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE id = ? AND user_id = ?")
            .bind(message_id.to_string())
            .bind(user_id)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_chat_messages(
        &self,
        user_id: &str,
        chat_id: &Uuid,
        options: &ListMessagesOptions,
    ) -> Result<MessagePage, RepositoryError> {
        validate_limit(options)?;
        let cursor = options
            .next_token
            .as_deref()
            .map(|token| MessageCursor::decode(token, chat_id, options.ascending))
            .transpose()?;

        if !self.owns_chat(user_id, chat_id).await? {
            return Err(RepositoryError::NotFound);
        }

        let (cmp, order) = if options.ascending {
            (">", "ASC")
        } else {
            ("<", "DESC")
        };
        let mut sql = String::from("SELECT * FROM chat_messages WHERE chat_id = ?");
        if cursor.is_some() {
            sql.push_str(&format!(
                " AND (created_at {cmp} ? OR (created_at = ? AND id {cmp} ?))"
            ));
        }
        sql.push_str(&format!(" ORDER BY created_at {order}, id {order} LIMIT ?"));

        let mut query = sqlx::query(&sql).bind(chat_id.to_string());
        if let Some(cursor) = &cursor {
            query = query
                .bind(cursor.created_at_ms)
                .bind(cursor.created_at_ms)
                .bind(cursor.message_id.to_string());
        }
        let rows = query
            .bind(i64::from(options.limit) + 1)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row =
                ChatMessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(msg_row.into_message()?);
        }

        let (messages, next_token) = into_page(messages, options.limit, options.ascending);
        Ok(MessagePage {
            messages,
            next_token,
        })
    }

    async fn list_chat_message_sources(
        &self,
        user_id: &str,
        message_id: &Uuid,
    ) -> Result<Vec<ChatMessageSource>, RepositoryError> {
        if !self.owns_message(user_id, message_id).await? {
            return Err(RepositoryError::NotFound);
        }

        let rows = sqlx::query(
            "SELECT * FROM chat_message_sources WHERE message_id = ? ORDER BY position ASC",
        )
        .bind(message_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut sources = Vec::with_capacity(rows.len());
        for row in &rows {
            let source_row = ChatMessageSourceRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            sources.push(source_row.into_source()?);
        }

        Ok(sources)
    }
}
