//! `carebridge ingest` — Build the knowledge index from a reference text.

use carebridge_config::AppConfig;
use carebridge_knowledge::KnowledgeIndex;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::bootstrap;

pub async fn run(
    source: &Path,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let output = output.unwrap_or_else(|| config.knowledge.index_path.clone());

    let text = tokio::fs::read_to_string(source)
        .await
        .map_err(|e| format!("Cannot read {}: {e}", source.display()))?;
    if text.trim().is_empty() {
        return Err(format!("{} is empty", source.display()).into());
    }

    let source_name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.display().to_string());

    let mut index = KnowledgeIndex::build(
        source_name,
        &text,
        config.knowledge.chunk_size,
        config.knowledge.chunk_overlap,
    );
    info!(chunks = index.len(), "Reference text split");

    if let Some(model) = &config.knowledge.embedding_model {
        let embedder = bootstrap::providers(&config)
            .embedder
            .ok_or("An embedding model is configured but its provider has no API key")?;
        println!(
            "  Embedding {} chunks with {model} via {}...",
            index.len(),
            embedder.name()
        );
        index.embed_with(embedder.as_ref(), model).await?;
    }

    index.save(&output).await?;

    println!("✅ Indexed {} chunks from {}", index.len(), source.display());
    println!("   Index written to {}", output.display());
    if !index.has_embeddings() {
        println!("   (keyword scoring; set [knowledge] embedding_model for semantic search)");
    }
    Ok(())
}
