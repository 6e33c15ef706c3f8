//! In-memory `ChatHistoryStore`.
//!
//! Reference implementation of the store contract: hash maps behind a
//! `RwLock`. Nothing survives the process. Used for ephemeral sessions
//! (`storage.backend = "memory"`) and in tests.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use colloquy_types::chat::{
    Chat, ChatMessage, ChatMessageSource, ListMessagesOptions, MessagePage, MessageType,
    SourceInput, timestamp_now,
};
use colloquy_types::error::RepositoryError;
use tracing::info;
use uuid::Uuid;

use super::pagination::{MessageCursor, compare_messages, into_page, validate_limit};
use super::store::ChatHistoryStore;

#[derive(Default)]
struct Tables {
    chats: HashMap<Uuid, Chat>,
    /// Stored with `sources = None`.
    messages: HashMap<Uuid, ChatMessage>,
    /// Keyed by message id, insertion order.
    sources: HashMap<Uuid, Vec<ChatMessageSource>>,
}

impl Tables {
    fn owned_chat_mut(&mut self, user_id: &str, chat_id: &Uuid) -> Result<&mut Chat, RepositoryError> {
        self.chats
            .get_mut(chat_id)
            .filter(|chat| chat.user_id == user_id)
            .ok_or(RepositoryError::NotFound)
    }

    fn owns_chat(&self, user_id: &str, chat_id: &Uuid) -> bool {
        self.chats
            .get(chat_id)
            .is_some_and(|chat| chat.user_id == user_id)
    }

    fn owns_message(&self, user_id: &str, message_id: &Uuid) -> bool {
        self.messages
            .get(message_id)
            .is_some_and(|msg| msg.user_id == user_id)
    }
}

/// `ChatHistoryStore` kept entirely in process memory.
#[derive(Default)]
pub struct InMemoryChatHistoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryChatHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, RepositoryError> {
        self.tables
            .read()
            .map_err(|_| RepositoryError::Query("chat store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, RepositoryError> {
        self.tables
            .write()
            .map_err(|_| RepositoryError::Query("chat store lock poisoned".to_string()))
    }
}

impl ChatHistoryStore for InMemoryChatHistoryStore {
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<Chat, RepositoryError> {
        let now = timestamp_now();
        let chat = Chat {
            chat_id: Uuid::now_v7(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };

        self.write()?.chats.insert(chat.chat_id, chat.clone());
        info!(chat_id = %chat.chat_id, user_id, "Chat created");
        Ok(chat)
    }

    async fn update_chat(
        &self,
        user_id: &str,
        chat_id: &Uuid,
        title: &str,
    ) -> Result<Chat, RepositoryError> {
        let mut tables = self.write()?;
        let chat = tables.owned_chat_mut(user_id, chat_id)?;
        chat.title = title.to_string();
        chat.updated_at = timestamp_now().max(chat.created_at);
        Ok(chat.clone())
    }

    async fn delete_chat(&self, user_id: &str, chat_id: &Uuid) -> Result<(), RepositoryError> {
        let mut tables = self.write()?;
        if !tables.owns_chat(user_id, chat_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.chats.remove(chat_id);

        let message_ids: Vec<Uuid> = tables
            .messages
            .values()
            .filter(|msg| msg.chat_id == *chat_id)
            .map(|msg| msg.message_id)
            .collect();
        for message_id in &message_ids {
            tables.messages.remove(message_id);
            tables.sources.remove(message_id);
        }

        info!(chat_id = %chat_id, messages = message_ids.len(), "Chat deleted");
        Ok(())
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<Chat>, RepositoryError> {
        let tables = self.read()?;
        let mut chats: Vec<Chat> = tables
            .chats
            .values()
            .filter(|chat| chat.user_id == user_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| {
            (b.updated_at, b.chat_id).cmp(&(a.updated_at, a.chat_id))
        });
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
        let mut tables = self.write()?;
        if !tables.owns_chat(user_id, chat_id) {
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
        tables.messages.insert(message.message_id, message.clone());

        let created_sources = sources.map(|inputs| {
            let created: Vec<ChatMessageSource> = inputs
                .into_iter()
                .map(|input| input.into_source(message.message_id, now))
                .collect();
            tables.sources.insert(message.message_id, created.clone());
            created
        });

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
        let mut tables = self.write()?;
        if !tables.owns_message(user_id, message_id) {
            return Err(RepositoryError::NotFound);
        }
        tables.messages.remove(message_id);
        tables.sources.remove(message_id);
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

        let tables = self.read()?;
        if !tables.owns_chat(user_id, chat_id) {
            return Err(RepositoryError::NotFound);
        }

        let mut messages: Vec<ChatMessage> = tables
            .messages
            .values()
            .filter(|msg| msg.chat_id == *chat_id)
            .filter(|msg| cursor.is_none_or(|c| c.precedes(msg)))
            .cloned()
            .collect();
        messages.sort_by(|a, b| compare_messages(a, b, options.ascending));
        messages.truncate(options.limit as usize + 1);

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
        let tables = self.read()?;
        if !tables.owns_message(user_id, message_id) {
            return Err(RepositoryError::NotFound);
        }
        Ok(tables.sources.get(message_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seed_messages(store: &InMemoryChatHistoryStore, chat_id: &Uuid, n: usize) -> Vec<Uuid> {
        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let kind = if i % 2 == 0 { MessageType::Human } else { MessageType::Ai };
            let msg = store
                .create_chat_message("alice", chat_id, kind, &format!("message {i}"), None)
                .await
                .unwrap();
            ids.push(msg.message_id);
        }
        ids
    }

    #[tokio::test]
    async fn test_create_chat() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "First chat").await.unwrap();
        assert!(!chat.chat_id.is_nil());
        assert_eq!(chat.user_id, "alice");
        assert_eq!(chat.title, "First chat");
        assert_eq!(chat.created_at, chat.updated_at);
    }

    #[tokio::test]
    async fn test_update_chat() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "Old").await.unwrap();

        let updated = store.update_chat("alice", &chat.chat_id, "New").await.unwrap();
        assert_eq!(updated.title, "New");
        assert_eq!(updated.chat_id, chat.chat_id);
        assert_eq!(updated.user_id, "alice");
        assert!(updated.updated_at >= updated.created_at);
        assert_eq!(updated.created_at, chat.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_or_foreign_chat_is_not_found() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "Mine").await.unwrap();

        let err = store.update_chat("alice", &Uuid::now_v7(), "x").await.unwrap_err();
        assert!(err.is_not_found());

        let err = store.update_chat("bob", &chat.chat_id, "x").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_chats_is_user_scoped_and_recent_first() {
        let store = InMemoryChatHistoryStore::new();
        let first = store.create_chat("alice", "first").await.unwrap();
        let second = store.create_chat("alice", "second").await.unwrap();
        store.create_chat("bob", "other").await.unwrap();

        // Touch the first chat so it becomes the most recently updated.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.update_chat("alice", &first.chat_id, "first!").await.unwrap();

        let chats = store.list_chats("alice").await.unwrap();
        assert_eq!(chats.len(), 2);
        assert_eq!(chats[0].chat_id, first.chat_id);
        assert_eq!(chats[1].chat_id, second.chat_id);

        assert!(store.list_chats("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_message_with_sources() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "rag").await.unwrap();

        let sources = vec![
            SourceInput::new("alpha").with_metadata("page", 1),
            SourceInput::new("beta").with_metadata("page", 2),
        ];
        let msg = store
            .create_chat_message("alice", &chat.chat_id, MessageType::Ai, "answer", Some(sources))
            .await
            .unwrap();

        let created = msg.sources.as_ref().unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|s| s.message_id == msg.message_id));

        let listed = store
            .list_chat_message_sources("alice", &msg.message_id)
            .await
            .unwrap();
        let contents: Vec<&str> = listed.iter().map(|s| s.page_content.as_str()).collect();
        assert_eq!(contents, vec!["alpha", "beta"]);
        assert_eq!(listed[1].metadata["page"], json!(2));
    }

    #[tokio::test]
    async fn test_create_message_in_foreign_chat_is_not_found() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "private").await.unwrap();

        let err = store
            .create_chat_message("bob", &chat.chat_id, MessageType::Human, "hi", None)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_messages_ascending_and_descending() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "c").await.unwrap();
        seed_messages(&store, &chat.chat_id, 5).await;

        let asc = store
            .list_chat_messages("alice", &chat.chat_id, &ListMessagesOptions::default())
            .await
            .unwrap();
        assert_eq!(asc.messages.len(), 5);
        assert!(asc.next_token.is_none());
        assert!(asc.messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert_eq!(asc.messages[0].content, "message 0");

        let desc = store
            .list_chat_messages(
                "alice",
                &chat.chat_id,
                &ListMessagesOptions::default().descending(),
            )
            .await
            .unwrap();
        assert!(desc.messages.windows(2).all(|w| w[0].created_at >= w[1].created_at));
        assert_eq!(desc.messages[0].content, "message 4");
    }

    #[tokio::test]
    async fn test_paginate_visits_every_message_once() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "long").await.unwrap();
        let ids = seed_messages(&store, &chat.chat_id, 7).await;

        for ascending in [true, false] {
            let mut seen = Vec::new();
            let mut options = ListMessagesOptions {
                ascending,
                ..ListMessagesOptions::default().limit(3)
            };
            let mut pages = 0;
            loop {
                let page = store
                    .list_chat_messages("alice", &chat.chat_id, &options)
                    .await
                    .unwrap();
                assert!(page.messages.len() <= 3);
                pages += 1;
                seen.extend(page.messages.iter().map(|m| m.message_id));
                match page.next_token {
                    Some(token) => options.next_token = Some(token),
                    None => break,
                }
            }
            assert_eq!(pages, 3);
            let mut expected = ids.clone();
            if !ascending {
                expected.reverse();
            }
            assert_eq!(seen, expected);
        }
    }

    #[tokio::test]
    async fn test_exact_page_has_no_token() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "c").await.unwrap();
        seed_messages(&store, &chat.chat_id, 3).await;

        let page = store
            .list_chat_messages("alice", &chat.chat_id, &ListMessagesOptions::default().limit(3))
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 3);
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_list_messages_rejects_bad_input() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "c").await.unwrap();

        let err = store
            .list_chat_messages("alice", &chat.chat_id, &ListMessagesOptions::default().limit(0))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidInput(_)));

        let err = store
            .list_chat_messages(
                "alice",
                &chat.chat_id,
                &ListMessagesOptions::default().after("garbage"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidInput(_)));

        let err = store
            .list_chat_messages("bob", &chat.chat_id, &ListMessagesOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_open_message_type_roundtrip() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "tools").await.unwrap();
        let tool = MessageType::Other("tool".to_string());

        let created = store
            .create_chat_message("alice", &chat.chat_id, tool.clone(), "{}", None)
            .await
            .unwrap();
        assert_eq!(created.message_type, tool);

        let page = store
            .list_chat_messages("alice", &chat.chat_id, &ListMessagesOptions::default())
            .await
            .unwrap();
        assert_eq!(page.messages[0].message_type, tool);
    }

    #[tokio::test]
    async fn test_token_from_another_chat_is_rejected() {
        let store = InMemoryChatHistoryStore::new();
        let first = store.create_chat("alice", "a").await.unwrap();
        let second = store.create_chat("alice", "b").await.unwrap();
        seed_messages(&store, &first.chat_id, 3).await;
        seed_messages(&store, &second.chat_id, 3).await;

        let page = store
            .list_chat_messages("alice", &first.chat_id, &ListMessagesOptions::default().limit(1))
            .await
            .unwrap();
        let token = page.next_token.unwrap();

        let err = store
            .list_chat_messages(
                "alice",
                &second.chat_id,
                &ListMessagesOptions::default().limit(1).after(token),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_delete_chat_cascades() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "doomed").await.unwrap();
        let msg = store
            .create_chat_message(
                "alice",
                &chat.chat_id,
                MessageType::Ai,
                "cited",
                Some(vec![SourceInput::new("fragment")]),
            )
            .await
            .unwrap();

        store.delete_chat("alice", &chat.chat_id).await.unwrap();

        assert!(store.list_chats("alice").await.unwrap().is_empty());
        let err = store
            .list_chat_message_sources("alice", &msg.message_id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        let err = store.delete_chat_message("alice", &msg.message_id).await.unwrap_err();
        assert!(err.is_not_found());
        let err = store.delete_chat("alice", &chat.chat_id).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_message_cascades_to_sources() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "c").await.unwrap();
        let keep = store
            .create_chat_message("alice", &chat.chat_id, MessageType::Human, "keep", None)
            .await
            .unwrap();
        let drop = store
            .create_chat_message(
                "alice",
                &chat.chat_id,
                MessageType::Ai,
                "drop",
                Some(vec![SourceInput::new("a"), SourceInput::new("b")]),
            )
            .await
            .unwrap();

        let err = store.delete_chat_message("bob", &drop.message_id).await.unwrap_err();
        assert!(err.is_not_found());

        store.delete_chat_message("alice", &drop.message_id).await.unwrap();

        let page = store
            .list_chat_messages("alice", &chat.chat_id, &ListMessagesOptions::default())
            .await
            .unwrap();
        assert_eq!(page.messages.len(), 1);
        assert_eq!(page.messages[0].message_id, keep.message_id);
        assert!(
            store
                .list_chat_message_sources("alice", &drop.message_id)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_sources_are_user_scoped() {
        let store = InMemoryChatHistoryStore::new();
        let chat = store.create_chat("alice", "c").await.unwrap();
        let msg = store
            .create_chat_message(
                "alice",
                &chat.chat_id,
                MessageType::Ai,
                "a",
                Some(vec![SourceInput::new("s")]),
            )
            .await
            .unwrap();

        let err = store
            .list_chat_message_sources("bob", &msg.message_id)
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let plain = store
            .create_chat_message("alice", &chat.chat_id, MessageType::Human, "no sources", None)
            .await
            .unwrap();
        assert!(plain.sources.is_none());
        assert!(
            store
                .list_chat_message_sources("alice", &plain.message_id)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
