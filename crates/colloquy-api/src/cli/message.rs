//! Chat message CLI commands: add, list, delete, sources.

use std::path::Path;

use anyhow::{Context, Result, bail};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use serde_json::Value;
use uuid::Uuid;

use colloquy_core::chat::store::ChatHistoryStore;
use colloquy_types::chat::{ChatMessage, ListMessagesOptions, MessageType, SourceInput};

use super::describe_not_found;
use crate::state::AppState;

/// Longest content preview shown in message tables.
const PREVIEW_CHARS: usize = 80;

/// Append a message, optionally with sources read from a JSON file.
pub async fn add_message(
    state: &AppState,
    user_id: &str,
    chat_id: &Uuid,
    message_type: MessageType,
    content: &str,
    sources_path: Option<&Path>,
    json: bool,
) -> Result<()> {
    let sources = match sources_path {
        Some(path) => Some(read_sources(path).await?),
        None => None,
    };

    let message = state
        .store
        .create_chat_message(user_id, chat_id, message_type, content, sources)
        .await
        .map_err(|e| describe_not_found(e, "chat", chat_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
        return Ok(());
    }

    let source_count = message.sources.as_ref().map_or(0, Vec::len);
    println!(
        "  {} {} message added ({} source(s)).",
        style("✓").green().bold(),
        message.message_type,
        source_count
    );
    println!("  {}  {}", style("ID:").bold(), style(message.message_id).dim());

    Ok(())
}

/// Parse a sources file: a JSON list of `{"pageContent", "metadata"}` objects.
pub async fn read_sources(path: &Path) -> Result<Vec<SourceInput>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_sources(&raw).with_context(|| format!("invalid sources file {}", path.display()))
}

fn parse_sources(raw: &str) -> Result<Vec<SourceInput>> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Array(items) = value else {
        bail!("expected a JSON list of sources");
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            SourceInput::from_value(item).map_err(|e| anyhow::anyhow!("source {index}: {e}"))
        })
        .collect()
}

/// List one page of messages, or every page with `all`.
pub async fn list_messages(
    state: &AppState,
    user_id: &str,
    chat_id: &Uuid,
    options: ListMessagesOptions,
    all: bool,
    json: bool,
) -> Result<()> {
    let mut options = options;
    let mut messages = Vec::new();
    let next_token = loop {
        let page = state
            .store
            .list_chat_messages(user_id, chat_id, &options)
            .await
            .map_err(|e| describe_not_found(e, "chat", chat_id))?;
        messages.extend(page.messages);

        match page.next_token {
            Some(token) if all => options.next_token = Some(token),
            other => break other,
        }
    };

    if json {
        let out = serde_json::json!({ "messages": messages, "nextToken": next_token });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!();
        println!("  {} No messages.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    println!();
    println!("{}", message_table(&messages));
    if let Some(token) = next_token {
        println!();
        println!(
            "  More messages: {}",
            style(format!("colloquy message list {chat_id} --after {token}")).yellow()
        );
    }
    println!();

    Ok(())
}

fn message_table(messages: &[ChatMessage]) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Time").fg(Color::White),
        Cell::new("Type").fg(Color::White),
        Cell::new("Content").fg(Color::White),
        Cell::new("ID").fg(Color::White),
    ]);

    for message in messages {
        let color = match message.message_type {
            MessageType::Human => Color::Green,
            MessageType::Ai => Color::Cyan,
            MessageType::System => Color::Yellow,
            MessageType::Other(_) => Color::Magenta,
        };
        table.add_row(vec![
            Cell::new(message.created_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&message.message_type).fg(color),
            Cell::new(preview(&message.content)),
            Cell::new(message.message_id).fg(Color::DarkGrey),
        ]);
    }

    table
}

fn preview(content: &str) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS - 1).collect();
        format!("{cut}…")
    }
}

pub async fn delete_message(
    state: &AppState,
    user_id: &str,
    message_id: &Uuid,
    json: bool,
) -> Result<()> {
    state
        .store
        .delete_chat_message(user_id, message_id)
        .await
        .map_err(|e| describe_not_found(e, "message", message_id))?;

    if json {
        println!(
            "{}",
            serde_json::json!({"deleted": true, "messageId": message_id})
        );
    } else {
        println!("  {} Message {} deleted.", style("✓").red().bold(), message_id);
    }

    Ok(())
}

/// Print the sources attached to a message.
pub async fn list_sources(
    state: &AppState,
    user_id: &str,
    message_id: &Uuid,
    json: bool,
) -> Result<()> {
    let sources = state
        .store
        .list_chat_message_sources(user_id, message_id)
        .await
        .map_err(|e| describe_not_found(e, "message", message_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&sources)?);
        return Ok(());
    }

    if sources.is_empty() {
        println!("  {} Message has no sources.", style("i").blue().bold());
        return Ok(());
    }

    println!();
    for (index, source) in sources.iter().enumerate() {
        println!(
            "  {} {}",
            style(format!("[{}]", index + 1)).cyan().bold(),
            preview(&source.page_content)
        );
        if !source.metadata.is_empty() {
            println!("      {}", style(Value::Object(source.metadata.clone())).dim());
        }
    }
    println!();

    Ok(())
}
