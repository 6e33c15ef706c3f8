//! ChatHistoryStore trait definition.
//!
//! The capability set every chat-history backend exposes. Follows the
//! RPITIT pattern used by all repository traits in this workspace.

use colloquy_types::chat::{
    Chat, ChatMessage, ChatMessageSource, ListMessagesOptions, MessagePage, MessageType,
    SourceInput,
};
use colloquy_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for chats, chat messages, and their retrieval sources.
///
/// Every operation is scoped by `user_id`: a backend never returns or
/// mutates another user's data, and an id that exists but belongs to a
/// different user is reported as [`RepositoryError::NotFound`].
///
/// Deletes cascade. Removing a chat removes its messages and their sources;
/// removing a message removes its sources.
///
/// Implementations: `InMemoryChatHistoryStore` (this crate) and
/// `SqliteChatHistoryStore` (colloquy-infra).
pub trait ChatHistoryStore: Send + Sync {
    /// Create a chat with a fresh id and `created_at == updated_at == now`.
    fn create_chat(
        &self,
        user_id: &str,
        title: &str,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Rename a chat and bump its `updated_at`. Returns the updated chat.
    fn update_chat(
        &self,
        user_id: &str,
        chat_id: &Uuid,
        title: &str,
    ) -> impl std::future::Future<Output = Result<Chat, RepositoryError>> + Send;

    /// Delete a chat together with its messages and sources.
    fn delete_chat(
        &self,
        user_id: &str,
        chat_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List a user's chats, most recently updated first.
    fn list_chats(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Chat>, RepositoryError>> + Send;

    /// Append a message to a chat, persisting `sources` in the given order.
    ///
    /// The returned message carries the created sources when any were given.
    fn create_chat_message(
        &self,
        user_id: &str,
        chat_id: &Uuid,
        message_type: MessageType,
        content: &str,
        sources: Option<Vec<SourceInput>>,
    ) -> impl std::future::Future<Output = Result<ChatMessage, RepositoryError>> + Send;

    /// Delete a message together with its sources.
    fn delete_chat_message(
        &self,
        user_id: &str,
        message_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// One page of a chat's messages ordered by `created_at`.
    ///
    /// `next_token` in the result is `Some` iff more messages remain.
    /// Listed messages have `sources == None`.
    fn list_chat_messages(
        &self,
        user_id: &str,
        chat_id: &Uuid,
        options: &ListMessagesOptions,
    ) -> impl std::future::Future<Output = Result<MessagePage, RepositoryError>> + Send;

    /// All sources of a message in insertion order.
    fn list_chat_message_sources(
        &self,
        user_id: &str,
        message_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessageSource>, RepositoryError>> + Send;
}
