//! Colloquy CLI entry point.
//!
//! Binary name: `colloquy`
//!
//! Parses CLI arguments, sets up tracing, opens the configured chat store,
//! then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;
use colloquy_types::chat::ListMessagesOptions;

use cli::{ChatCommand, Cli, Commands, EmbedCommand, MessageCommand};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    colloquy_observe::tracing_setup::init_tracing(cli::log_filter(cli.verbose, cli.quiet), cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    colloquy_observe::tracing_setup::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "colloquy", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let json = cli.json;

    match cli.command {
        Commands::Chat { action } => {
            state.require_persistent_store()?;
            let user_id = state.resolve_user(cli.user)?;
            match action {
                ChatCommand::Create { title } => {
                    cli::chat::create_chat(&state, &user_id, &title, json).await?;
                }
                ChatCommand::List => {
                    cli::chat::list_chats(&state, &user_id, json).await?;
                }
                ChatCommand::Rename { chat_id, title } => {
                    cli::chat::rename_chat(&state, &user_id, &chat_id, &title, json).await?;
                }
                ChatCommand::Delete { chat_id, force } => {
                    cli::chat::delete_chat(&state, &user_id, &chat_id, force, json).await?;
                }
            }
        }

        Commands::Message { action } => {
            state.require_persistent_store()?;
            let user_id = state.resolve_user(cli.user)?;
            match action {
                MessageCommand::Add {
                    chat_id,
                    content,
                    message_type,
                    sources,
                } => {
                    cli::message::add_message(
                        &state,
                        &user_id,
                        &chat_id,
                        message_type,
                        &content,
                        sources.as_deref(),
                        json,
                    )
                    .await?;
                }
                MessageCommand::List {
                    chat_id,
                    limit,
                    desc,
                    after,
                    all,
                } => {
                    let options = ListMessagesOptions {
                        next_token: after,
                        limit,
                        ascending: !desc,
                    };
                    cli::message::list_messages(&state, &user_id, &chat_id, options, all, json)
                        .await?;
                }
                MessageCommand::Delete { message_id } => {
                    cli::message::delete_message(&state, &user_id, &message_id, json).await?;
                }
                MessageCommand::Sources { message_id } => {
                    cli::message::list_sources(&state, &user_id, &message_id, json).await?;
                }
            }
        }

        Commands::Embed { action } => match action {
            EmbedCommand::Documents {
                texts,
                file,
                chunk_size,
            } => {
                cli::embed::embed_documents(&state, texts, file.as_deref(), chunk_size, json)
                    .await?;
            }
            EmbedCommand::Query { text } => {
                cli::embed::embed_query(&state, &text, json).await?;
            }
        },

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
