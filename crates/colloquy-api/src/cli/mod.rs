//! CLI command definitions for the `colloquy` binary.
//!
//! Uses clap derive macros. Commands are grouped by noun
//! (e.g., `colloquy chat create`, `colloquy message list`).

pub mod chat;
pub mod embed;
pub mod message;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use colloquy_types::chat::{DEFAULT_MESSAGE_PAGE_LIMIT, MessageType};
use colloquy_types::error::RepositoryError;
use uuid::Uuid;

/// Chat history storage and embedding endpoint client.
#[derive(Parser)]
#[command(name = "colloquy", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all log output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Acting user id. Falls back to `default_user` in config.toml.
    #[arg(long, global = true, env = "COLLOQUY_USER")]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage chats (create, list, rename, delete).
    Chat {
        #[command(subcommand)]
        action: ChatCommand,
    },

    /// Manage chat messages and their sources.
    #[command(alias = "msg")]
    Message {
        #[command(subcommand)]
        action: MessageCommand,
    },

    /// Compute embeddings with the configured inference endpoint.
    Embed {
        #[command(subcommand)]
        action: EmbedCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ChatCommand {
    /// Start a new chat.
    Create {
        /// Chat title.
        title: String,
    },

    /// List your chats, most recently updated first.
    #[command(alias = "ls")]
    List,

    /// Change a chat's title.
    Rename {
        chat_id: Uuid,
        /// New title.
        title: String,
    },

    /// Delete a chat with all of its messages.
    #[command(alias = "rm")]
    Delete {
        chat_id: Uuid,
        /// Skip the confirmation prompt.
        #[arg(long, short)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum MessageCommand {
    /// Append a message to a chat.
    Add {
        chat_id: Uuid,
        /// Message text.
        content: String,
        /// Turn type: human, ai, system or any other tag (e.g. tool).
        #[arg(
            long = "type",
            short = 't',
            default_value = "human",
            value_parser = parse_message_type
        )]
        message_type: MessageType,
        /// JSON file with a list of `{"pageContent", "metadata"}` sources.
        #[arg(long)]
        sources: Option<PathBuf>,
    },

    /// List a page of messages in a chat.
    #[command(alias = "ls")]
    List {
        chat_id: Uuid,
        /// Page size.
        #[arg(long, default_value_t = DEFAULT_MESSAGE_PAGE_LIMIT)]
        limit: u32,
        /// Newest first.
        #[arg(long)]
        desc: bool,
        /// Continue from a `next_token` printed by a previous page.
        #[arg(long)]
        after: Option<String>,
        /// Follow next tokens until the chat is exhausted.
        #[arg(long, conflicts_with = "after")]
        all: bool,
    },

    /// Delete one message and its sources.
    #[command(alias = "rm")]
    Delete { message_id: Uuid },

    /// Show the sources attached to a message.
    Sources { message_id: Uuid },
}

#[derive(Subcommand)]
pub enum EmbedCommand {
    /// Embed documents, batching them into endpoint calls.
    Documents {
        /// Texts to embed.
        texts: Vec<String>,
        /// Read additional texts from a file, one per line.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Texts per endpoint call. Defaults to `embeddings.chunk_size`.
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Embed a single query text.
    Query {
        /// Text to embed.
        text: String,
    },
}

/// Parse `--type`, taking `user` and `assistant` as aliases for human and ai.
fn parse_message_type(s: &str) -> Result<MessageType, String> {
    match s.trim().to_lowercase().as_str() {
        "user" => Ok(MessageType::Human),
        "assistant" => Ok(MessageType::Ai),
        tag => tag.parse(),
    }
}

/// Name the missing chat or message instead of the store's generic error.
pub(crate) fn describe_not_found(err: RepositoryError, what: &str, id: &Uuid) -> anyhow::Error {
    if err.is_not_found() {
        anyhow::anyhow!("{what} {id} not found")
    } else {
        err.into()
    }
}

/// Default log filter for the given verbosity flags.
pub fn log_filter(verbose: u8, quiet: bool) -> &'static str {
    match verbose {
        0 if quiet => "error",
        0 => "warn",
        1 => "info,colloquy=debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_message_add() {
        let chat_id = Uuid::now_v7();
        let cli = Cli::try_parse_from([
            "colloquy",
            "--user",
            "alice",
            "message",
            "add",
            &chat_id.to_string(),
            "hello there",
            "--type",
            "assistant",
        ])
        .unwrap();

        assert_eq!(cli.user.as_deref(), Some("alice"));
        match cli.command {
            Commands::Message {
                action:
                    MessageCommand::Add {
                        chat_id: parsed,
                        content,
                        message_type,
                        sources,
                    },
            } => {
                assert_eq!(parsed, chat_id);
                assert_eq!(content, "hello there");
                assert_eq!(message_type, MessageType::Ai);
                assert!(sources.is_none());
            }
            _ => panic!("expected message add"),
        }
    }

    #[test]
    fn test_parse_message_list_defaults() {
        let chat_id = Uuid::now_v7();
        let cli =
            Cli::try_parse_from(["colloquy", "msg", "ls", &chat_id.to_string(), "--json"]).unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Message {
                action:
                    MessageCommand::List {
                        limit, desc, after, all, ..
                    },
            } => {
                assert_eq!(limit, DEFAULT_MESSAGE_PAGE_LIMIT);
                assert!(!desc);
                assert!(after.is_none());
                assert!(!all);
            }
            _ => panic!("expected message list"),
        }
    }

    #[test]
    fn test_rejects_invalid_ids_and_types() {
        assert!(Cli::try_parse_from(["colloquy", "chat", "delete", "not-a-uuid"]).is_err());
        let chat_id = Uuid::now_v7().to_string();
        assert!(
            Cli::try_parse_from(["colloquy", "message", "add", &chat_id, "x", "--type", ""])
                .is_err()
        );
        assert!(
            Cli::try_parse_from(["colloquy", "message", "list", &chat_id, "--all", "--after", "t"])
                .is_err()
        );
    }

    #[test]
    fn test_parse_message_type_aliases_and_open_tags() {
        assert_eq!(parse_message_type("User").unwrap(), MessageType::Human);
        assert_eq!(parse_message_type("assistant").unwrap(), MessageType::Ai);
        assert_eq!(parse_message_type("SYSTEM").unwrap(), MessageType::System);
        assert_eq!(
            parse_message_type("tool").unwrap(),
            MessageType::Other("tool".to_string())
        );
        assert!(parse_message_type(" ").is_err());
    }

    #[test]
    fn test_describe_not_found() {
        let id = Uuid::nil();
        let err = describe_not_found(RepositoryError::NotFound, "chat", &id);
        assert_eq!(err.to_string(), format!("chat {id} not found"));

        let err = describe_not_found(RepositoryError::Query("disk full".to_string()), "chat", &id);
        assert_eq!(err.to_string(), "query error: disk full");
    }

    #[test]
    fn test_log_filter_levels() {
        assert_eq!(log_filter(0, true), "error");
        assert_eq!(log_filter(0, false), "warn");
        assert_eq!(log_filter(1, false), "info,colloquy=debug");
        assert_eq!(log_filter(3, false), "trace");
    }
}
