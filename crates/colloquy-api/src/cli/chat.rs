//! Chat CLI commands: create, list, rename, delete.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use dialoguer::Confirm;
use uuid::Uuid;

use colloquy_core::chat::store::ChatHistoryStore;

use super::describe_not_found;
use crate::state::AppState;

/// Start a new chat owned by `user_id`.
pub async fn create_chat(state: &AppState, user_id: &str, title: &str, json: bool) -> Result<()> {
    let chat = state.store.create_chat(user_id, title).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chat)?);
        return Ok(());
    }

    println!();
    println!("  {} Chat created!", style("✓").green().bold());
    println!();
    println!("  {}  {}", style("Title:").bold(), style(&chat.title).cyan());
    println!("  {}  {}", style("ID:").bold(), style(chat.chat_id).dim());
    println!();
    println!(
        "  Add a message: {}",
        style(format!("colloquy message add {} \"...\"", chat.chat_id)).yellow()
    );
    println!();

    Ok(())
}

/// List the user's chats in a table.
pub async fn list_chats(state: &AppState, user_id: &str, json: bool) -> Result<()> {
    let chats = state.store.list_chats(user_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chats)?);
        return Ok(());
    }

    if chats.is_empty() {
        println!();
        println!(
            "  {} No chats yet. Start one with: {}",
            style("i").blue().bold(),
            style("colloquy chat create \"<title>\"").yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Title").fg(Color::White),
        Cell::new("ID").fg(Color::White),
        Cell::new("Created").fg(Color::White),
        Cell::new("Updated").fg(Color::White),
    ]);

    for chat in &chats {
        table.add_row(vec![
            Cell::new(&chat.title).fg(Color::Cyan),
            Cell::new(chat.chat_id).fg(Color::DarkGrey),
            Cell::new(chat.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(format_relative_time(&chat.updated_at)),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!("  {} chat(s)", chats.len());
    println!();

    Ok(())
}

/// Change a chat's title.
pub async fn rename_chat(
    state: &AppState,
    user_id: &str,
    chat_id: &Uuid,
    title: &str,
    json: bool,
) -> Result<()> {
    let chat = state
        .store
        .update_chat(user_id, chat_id, title)
        .await
        .map_err(|e| describe_not_found(e, "chat", chat_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chat)?);
    } else {
        println!(
            "  {} Chat renamed to '{}'.",
            style("✓").green().bold(),
            style(&chat.title).cyan()
        );
    }

    Ok(())
}

/// Delete a chat and everything in it, after confirmation unless `force`.
pub async fn delete_chat(
    state: &AppState,
    user_id: &str,
    chat_id: &Uuid,
    force: bool,
    json: bool,
) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Permanently delete chat {} and all its messages?",
                style(chat_id).red().bold()
            ))
            .default(false)
            .interact()?;

        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    state
        .store
        .delete_chat(user_id, chat_id)
        .await
        .map_err(|e| describe_not_found(e, "chat", chat_id))?;

    if json {
        println!("{}", serde_json::json!({"deleted": true, "chatId": chat_id}));
    } else {
        println!("  {} Chat {} deleted.", style("✓").red().bold(), chat_id);
    }

    Ok(())
}

pub(crate) fn format_relative_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    let diff = chrono::Utc::now() - *dt;

    if diff.num_minutes() < 1 {
        "just now".to_string()
    } else if diff.num_hours() < 1 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_days() < 1 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 30 {
        format!("{}d ago", diff.num_days())
    } else {
        dt.format("%Y-%m-%d").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_format_relative_time() {
        let now = Utc::now();
        assert_eq!(format_relative_time(&now), "just now");
        assert_eq!(format_relative_time(&(now - Duration::minutes(5))), "5m ago");
        assert_eq!(format_relative_time(&(now - Duration::hours(3))), "3h ago");
        assert_eq!(format_relative_time(&(now - Duration::days(2))), "2d ago");

        let old = now - Duration::days(90);
        assert_eq!(format_relative_time(&old), old.format("%Y-%m-%d").to_string());
    }
}
