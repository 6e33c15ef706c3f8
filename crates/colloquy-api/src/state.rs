//! Application state wiring the chat store and embedding adapter together.
//!
//! `ChatHistoryStore` uses async trait methods and is not object safe, so the
//! configured backend is pinned in the `ChatStore` enum rather than boxed.

use std::path::PathBuf;

use anyhow::{Context, bail};
use colloquy_core::chat::memory::InMemoryChatHistoryStore;
use colloquy_core::chat::store::ChatHistoryStore;
use colloquy_core::embedding::box_embedder::BoxEmbedder;
use colloquy_core::embedding::sagemaker::SagemakerEndpointEmbeddings;
use colloquy_infra::config::{load_global_config, resolve_data_dir, resolve_database_url};
use colloquy_infra::sagemaker::SagemakerRuntimeClient;
use colloquy_infra::sqlite::chat::SqliteChatHistoryStore;
use colloquy_infra::sqlite::pool::DatabasePool;
use colloquy_types::chat::{
    Chat, ChatMessage, ChatMessageSource, ListMessagesOptions, MessagePage, MessageType,
    SourceInput,
};
use colloquy_types::config::{GlobalConfig, StorageBackend};
use colloquy_types::error::RepositoryError;
use uuid::Uuid;

/// Embedding adapter pinned to the SageMaker Runtime client.
pub type ConcreteEmbeddings = SagemakerEndpointEmbeddings<SagemakerRuntimeClient>;

/// The chat history backend selected by `storage.backend`.
pub enum ChatStore {
    Sqlite(SqliteChatHistoryStore),
    Memory(InMemoryChatHistoryStore),
}

impl ChatHistoryStore for ChatStore {
    async fn create_chat(&self, user_id: &str, title: &str) -> Result<Chat, RepositoryError> {
        match self {
            ChatStore::Sqlite(store) => store.create_chat(user_id, title).await,
            ChatStore::Memory(store) => store.create_chat(user_id, title).await,
        }
    }

    async fn update_chat(
        &self,
        user_id: &str,
        chat_id: &Uuid,
        title: &str,
    ) -> Result<Chat, RepositoryError> {
        match self {
            ChatStore::Sqlite(store) => store.update_chat(user_id, chat_id, title).await,
            ChatStore::Memory(store) => store.update_chat(user_id, chat_id, title).await,
        }
    }

    async fn delete_chat(&self, user_id: &str, chat_id: &Uuid) -> Result<(), RepositoryError> {
        match self {
            ChatStore::Sqlite(store) => store.delete_chat(user_id, chat_id).await,
            ChatStore::Memory(store) => store.delete_chat(user_id, chat_id).await,
        }
    }

    async fn list_chats(&self, user_id: &str) -> Result<Vec<Chat>, RepositoryError> {
        match self {
            ChatStore::Sqlite(store) => store.list_chats(user_id).await,
            ChatStore::Memory(store) => store.list_chats(user_id).await,
        }
    }

    async fn create_chat_message(
        &self,
        user_id: &str,
        chat_id: &Uuid,
        message_type: MessageType,
        content: &str,
        sources: Option<Vec<SourceInput>>,
    ) -> Result<ChatMessage, RepositoryError> {
        match self {
            ChatStore::Sqlite(store) => {
                store
                    .create_chat_message(user_id, chat_id, message_type, content, sources)
                    .await
            }
            ChatStore::Memory(store) => {
                store
                    .create_chat_message(user_id, chat_id, message_type, content, sources)
                    .await
            }
        }
    }

    async fn delete_chat_message(
        &self,
        user_id: &str,
        message_id: &Uuid,
    ) -> Result<(), RepositoryError> {
        match self {
            ChatStore::Sqlite(store) => store.delete_chat_message(user_id, message_id).await,
            ChatStore::Memory(store) => store.delete_chat_message(user_id, message_id).await,
        }
    }

    async fn list_chat_messages(
        &self,
        user_id: &str,
        chat_id: &Uuid,
        options: &ListMessagesOptions,
    ) -> Result<MessagePage, RepositoryError> {
        match self {
            ChatStore::Sqlite(store) => store.list_chat_messages(user_id, chat_id, options).await,
            ChatStore::Memory(store) => store.list_chat_messages(user_id, chat_id, options).await,
        }
    }

    async fn list_chat_message_sources(
        &self,
        user_id: &str,
        message_id: &Uuid,
    ) -> Result<Vec<ChatMessageSource>, RepositoryError> {
        match self {
            ChatStore::Sqlite(store) => store.list_chat_message_sources(user_id, message_id).await,
            ChatStore::Memory(store) => store.list_chat_message_sources(user_id, message_id).await,
        }
    }
}

/// Shared application state for CLI commands.
pub struct AppState {
    pub store: ChatStore,
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config from the data directory and open the configured store.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;
        Self::from_config(config, data_dir).await
    }

    pub async fn from_config(config: GlobalConfig, data_dir: PathBuf) -> anyhow::Result<Self> {
        let store = match config.storage.backend {
            StorageBackend::Sqlite => {
                let db_url = resolve_database_url(&config, &data_dir);
                let pool = DatabasePool::new(&db_url)
                    .await
                    .with_context(|| format!("failed to open database {db_url}"))?;
                ChatStore::Sqlite(SqliteChatHistoryStore::new(pool))
            }
            StorageBackend::Memory => {
                tracing::debug!("Using in-memory chat storage");
                ChatStore::Memory(InMemoryChatHistoryStore::new())
            }
        };

        Ok(Self {
            store,
            config,
            data_dir,
        })
    }

    /// Chat history commands need a store that outlives the process.
    pub fn require_persistent_store(&self) -> anyhow::Result<()> {
        if let ChatStore::Memory(_) = self.store {
            bail!(
                "storage.backend = \"memory\" keeps no history between commands; \
                 use the sqlite backend in {}",
                self.data_dir.join("config.toml").display()
            );
        }
        Ok(())
    }

    /// The acting user: explicit flag or env, then `default_user` from config.
    pub fn resolve_user(&self, user: Option<String>) -> anyhow::Result<String> {
        match user.or_else(|| self.config.default_user.clone()) {
            Some(user) if !user.trim().is_empty() => Ok(user),
            _ => bail!("no user given; pass --user, set COLLOQUY_USER, or set default_user in config.toml"),
        }
    }

    /// Build the embedding adapter from the `[embeddings]` config section.
    pub async fn embeddings(&self) -> anyhow::Result<ConcreteEmbeddings> {
        let Some(config) = &self.config.embeddings else {
            bail!(
                "no [embeddings] section in {}",
                self.data_dir.join("config.toml").display()
            );
        };

        let client = SagemakerRuntimeClient::from_config(config).await?;
        Ok(SagemakerEndpointEmbeddings::new(client, config.endpoint_name.clone())
            .with_model_kwargs(config.model_kwargs.clone())
            .with_endpoint_kwargs(config.endpoint_kwargs.clone())
            .with_chunk_size(config.chunk_size))
    }

    /// The configured embedding adapter behind the backend-agnostic port.
    pub async fn embedder(&self) -> anyhow::Result<BoxEmbedder> {
        Ok(BoxEmbedder::new(self.embeddings().await?))
    }
}
