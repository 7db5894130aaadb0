//! One-shot CLI commands.
//!
//! Each `run_*` function loads what it needs from the config, performs a
//! single pipeline call, and prints a human-readable result to stdout.

use anyhow::{Context, Result};
use std::path::Path;

use crate::assistant::{preview_with_ellipsis, Assistant, AssistantError, IngestReport};
use crate::config::Config;
use crate::store::VectorStore;

/// Create the index and metadata files if they do not exist yet.
///
/// Idempotent: existing chunks are loaded and written back unchanged.
pub fn run_init(config: &Config) -> Result<()> {
    let store = VectorStore::open(&config.store, config.embedding.dims)?;
    store.persist()?;
    println!(
        "Vector store ready: {} chunks ({}, {})",
        store.len()?,
        config.store.index_path.display(),
        config.store.metadata_path.display()
    );
    Ok(())
}

/// Embed a text snippet or a file and append it to the store.
pub async fn run_ingest(config: &Config, text: Option<String>, file: Option<&Path>) -> Result<()> {
    let report = match (text, file) {
        (Some(text), _) if !text.trim().is_empty() => {
            let assistant = Assistant::from_config(config)?;
            assistant.ingest_text(&text).await?
        }
        (_, Some(path)) => {
            let bytes =
                std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let assistant = Assistant::from_config(config)?;
            assistant.ingest_file(&name, bytes).await?
        }
        _ => return Err(AssistantError::MissingInput.into()),
    };
    print_ingest_report(&report);
    Ok(())
}

fn print_ingest_report(report: &IngestReport) {
    println!("{}", report.msg);
    if let Some(extracted) = &report.extracted {
        println!("Extracted: {}", extracted);
    }
    println!("Most recent chunks:");
    for text in &report.last_texts {
        println!("  - {}", text.replace('\n', " "));
    }
}

/// Print the nearest stored chunk for `query`.
pub async fn run_chat(config: &Config, query: &str) -> Result<()> {
    let assistant = Assistant::from_config(config)?;
    println!("{}", assistant.chat(query).await?);
    Ok(())
}

/// Answer `query` through the full RAG pipeline.
pub async fn run_ask(config: &Config, query: &str, show_context: bool) -> Result<()> {
    let assistant = Assistant::from_config(config)?;
    let answer = assistant.answer(query).await?;

    if show_context {
        println!("Intent: {}", answer.intent);
        if answer.context.is_empty() {
            println!("Context: (none)");
        } else {
            println!("Context:\n{}\n", answer.context);
        }
    }
    println!("{}", answer.answer);
    Ok(())
}

/// Print the stored chunk count and previews. Contacts no external service.
pub fn run_inspect(config: &Config) -> Result<()> {
    let store = VectorStore::open(&config.store, config.embedding.dims)?;
    let texts = store.texts()?;
    println!("{} chunks", texts.len());
    for (i, text) in texts.iter().enumerate() {
        let preview = preview_with_ellipsis(text, config.retrieval.preview_chars);
        println!("[{}] {}", i, preview.replace('\n', " "));
    }
    Ok(())
}
