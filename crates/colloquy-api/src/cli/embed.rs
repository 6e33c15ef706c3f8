//! Embedding CLI commands: documents, query.

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result, bail};
use colloquy_core::embedding::box_embedder::BoxEmbedder;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::state::AppState;

/// Leading vector components shown in text output.
const SHOWN_COMPONENTS: usize = 4;

/// Embed `texts` plus any lines from `file`.
///
/// An explicit `chunk_size` drives the SageMaker adapter directly; otherwise
/// the configured embedder batches with `embeddings.chunk_size`.
pub async fn embed_documents(
    state: &AppState,
    texts: Vec<String>,
    file: Option<&Path>,
    chunk_size: Option<usize>,
    json: bool,
) -> Result<()> {
    let mut texts = texts;
    if let Some(path) = file {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        texts.extend(raw.lines().filter(|l| !l.trim().is_empty()).map(str::to_string));
    }
    if texts.is_empty() {
        bail!("nothing to embed; pass texts or --file");
    }

    let vectors = match chunk_size {
        Some(chunk_size) => {
            let embeddings = state.embeddings().await?;
            with_spinner(
                progress_message(texts.len(), embeddings.endpoint_name()),
                json,
                embeddings.embed_documents(&texts, chunk_size),
            )
            .await?
        }
        None => {
            let embedder = state.embedder().await?;
            embed_all(&embedder, &texts, json).await?
        }
    };

    if json {
        println!("{}", serde_json::to_string(&vectors)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("#").fg(Color::White),
        Cell::new("Text").fg(Color::White),
        Cell::new("Dims").fg(Color::White),
        Cell::new("Vector").fg(Color::White),
    ]);
    for (index, (text, vector)) in texts.iter().zip(&vectors).enumerate() {
        table.add_row(vec![
            Cell::new(index),
            Cell::new(text),
            Cell::new(vector.len()),
            Cell::new(format_vector(vector)).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!("{table}");
    println!();

    Ok(())
}

/// Embed one query text.
pub async fn embed_query(state: &AppState, text: &str, json: bool) -> Result<()> {
    let embeddings = state.embeddings().await?;

    let vector = with_spinner(
        format!("Embedding query with {}...", embeddings.endpoint_name()),
        json,
        embeddings.embed_query(text),
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string(&vector)?);
    } else {
        println!(
            "  {} {} dimensions: {}",
            style("✓").green().bold(),
            vector.len(),
            style(format_vector(&vector)).dim()
        );
    }

    Ok(())
}

/// Run `texts` through `embedder`, checking one vector comes back per text.
async fn embed_all(
    embedder: &BoxEmbedder,
    texts: &[String],
    hidden: bool,
) -> Result<Vec<Vec<f32>>> {
    let vectors = with_spinner(
        progress_message(texts.len(), embedder.model_name()),
        hidden,
        embedder.embed(texts),
    )
    .await?;
    if vectors.len() != texts.len() {
        bail!(
            "{} returned {} vector(s) for {} text(s)",
            embedder.model_name(),
            vectors.len(),
            texts.len()
        );
    }
    Ok(vectors)
}

fn progress_message(count: usize, endpoint: &str) -> String {
    format!("Embedding {count} text(s) with {endpoint}...")
}

async fn with_spinner<F: Future>(message: String, hidden: bool, work: F) -> F::Output {
    let spinner = spinner(message, hidden);
    let output = work.await;
    spinner.finish_and_clear();
    output
}

fn spinner(message: String, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

fn format_vector(vector: &[f32]) -> String {
    let head: Vec<String> = vector
        .iter()
        .take(SHOWN_COMPONENTS)
        .map(|v| format!("{v:.4}"))
        .collect();
    if vector.len() > SHOWN_COMPONENTS {
        format!("[{}, …]", head.join(", "))
    } else {
        format!("[{}]", head.join(", "))
    }
}
