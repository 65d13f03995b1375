//! Persisted knowledge index.

use carebridge_core::provider::{EmbeddingRequest, Provider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::KnowledgeError;
use crate::chunker::split_text;

const INDEX_VERSION: u32 = 1;

/// Inputs per embedding request.
const EMBED_BATCH: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk_index: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Chunks of one reference document, optionally with embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeIndex {
    pub version: u32,
    /// Reference document name, carried into passage metadata
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub created_at: DateTime<Utc>,
    pub chunks: Vec<IndexedChunk>,
}

impl KnowledgeIndex {
    /// An index with no chunks; every query against it comes back empty.
    pub fn empty() -> Self {
        Self {
            version: INDEX_VERSION,
            source: String::new(),
            embedding_model: None,
            chunk_size: 0,
            chunk_overlap: 0,
            created_at: Utc::now(),
            chunks: Vec::new(),
        }
    }

    /// Chunk a reference text.
    pub fn build(source: impl Into<String>, text: &str, chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunks = split_text(text, chunk_size, chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| IndexedChunk {
                chunk_index,
                text,
                embedding: None,
            })
            .collect::<Vec<_>>();

        let source = source.into();
        info!(source = %source, chunks = chunks.len(), "Built knowledge index");

        Self {
            version: INDEX_VERSION,
            source,
            embedding_model: None,
            chunk_size,
            chunk_overlap,
            created_at: Utc::now(),
            chunks,
        }
    }

    /// Attach embeddings to every chunk using `provider`.
    pub async fn embed_with(&mut self, provider: &dyn Provider, model: &str) -> Result<(), KnowledgeError> {
        for batch in self.chunks.chunks_mut(EMBED_BATCH) {
            let response = provider
                .embed(EmbeddingRequest {
                    model: model.to_string(),
                    inputs: batch.iter().map(|c| c.text.clone()).collect(),
                })
                .await?;

            if response.embeddings.len() != batch.len() {
                return Err(KnowledgeError::InvalidIndex(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    response.embeddings.len()
                )));
            }

            for (chunk, embedding) in batch.iter_mut().zip(response.embeddings) {
                chunk.embedding = Some(embedding);
            }
            debug!(count = batch.len(), "Embedded chunk batch");
        }

        self.embedding_model = Some(model.to_string());
        Ok(())
    }

    /// True when every chunk carries an embedding.
    pub fn has_embeddings(&self) -> bool {
        !self.chunks.is_empty() && self.chunks.iter().all(|c| c.embedding.is_some())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub async fn save(&self, path: &Path) -> Result<(), KnowledgeError> {
        let io_err = |e: std::io::Error| KnowledgeError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let json = serde_json::to_string(self)
            .map_err(|e| KnowledgeError::InvalidIndex(e.to_string()))?;
        tokio::fs::write(path, json).await.map_err(io_err)?;
        info!(path = %path.display(), chunks = self.chunks.len(), "Saved knowledge index");
        Ok(())
    }

    pub async fn load(path: &Path) -> Result<Self, KnowledgeError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| KnowledgeError::Io {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let index: Self = serde_json::from_str(&content)
            .map_err(|e| KnowledgeError::InvalidIndex(e.to_string()))?;

        if index.version != INDEX_VERSION {
            return Err(KnowledgeError::InvalidIndex(format!(
                "unsupported index version {}",
                index.version
            )));
        }

        Ok(index)
    }
}
