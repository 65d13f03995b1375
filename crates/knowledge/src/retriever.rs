//! Top-K retrieval over a [`KnowledgeIndex`].

use async_trait::async_trait;
use carebridge_core::error::ToolError;
use carebridge_core::provider::{EmbeddingRequest, Provider};
use carebridge_core::tool::{KnowledgeRetriever, Passage};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::KnowledgeError;
use crate::index::KnowledgeIndex;
use crate::scoring::{cosine_similarity, keyword_coverage};

pub(crate) const TOOL_NAME: &str = "knowledge_retriever";

struct Embedder {
    provider: Arc<dyn Provider>,
    model: String,
}

/// Scores every chunk against the query.
///
/// With an embedder and an embedded index, scores are cosine similarities
/// clamped to 0..=1; otherwise they are query-term coverage. Chunks scoring
/// zero are never returned.
pub struct IndexedRetriever {
    index: Arc<KnowledgeIndex>,
    embedder: Option<Embedder>,
}

impl IndexedRetriever {
    pub fn new(index: KnowledgeIndex) -> Self {
        Self {
            index: Arc::new(index),
            embedder: None,
        }
    }

    /// Load an index file written by `carebridge ingest`.
    pub async fn open(path: &Path) -> Result<Self, KnowledgeError> {
        Ok(Self::new(KnowledgeIndex::load(path).await?))
    }

    pub fn with_embedder(mut self, provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        self.embedder = Some(Embedder {
            provider,
            model: model.into(),
        });
        self
    }

    pub fn index(&self) -> &KnowledgeIndex {
        &self.index
    }

    async fn semantic_scores(&self, embedder: &Embedder, text: &str) -> Result<Vec<f32>, ToolError> {
        let response = embedder
            .provider
            .embed(EmbeddingRequest {
                model: embedder.model.clone(),
                inputs: vec![text.to_string()],
            })
            .await
            .map_err(|e| ToolError::Unavailable {
                tool_name: TOOL_NAME.into(),
                reason: e.to_string(),
            })?;

        let query = response.embeddings.into_iter().next().ok_or_else(|| {
            ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: "empty embedding response".into(),
            }
        })?;

        Ok(self
            .index
            .chunks
            .iter()
            .map(|c| {
                c.embedding
                    .as_deref()
                    .map_or(0.0, |e| cosine_similarity(e, &query).clamp(0.0, 1.0))
            })
            .collect())
    }

    fn passage(&self, chunk_pos: usize, score: f32) -> Passage {
        let chunk = &self.index.chunks[chunk_pos];
        let mut passage = Passage::new(chunk.text.clone(), score);
        if !self.index.source.is_empty() {
            passage
                .metadata
                .insert("source".into(), self.index.source.clone().into());
        }
        passage
            .metadata
            .insert("chunk_index".into(), chunk.chunk_index.into());
        passage
    }
}

#[async_trait]
impl KnowledgeRetriever for IndexedRetriever {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<Passage>, ToolError> {
        if text.trim().is_empty() || k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let scores = match &self.embedder {
            Some(embedder) if self.index.has_embeddings() => {
                self.semantic_scores(embedder, text).await?
            }
            Some(_) => {
                warn!("Index has no embeddings; falling back to keyword scoring");
                self.keyword_scores(text)
            }
            None => self.keyword_scores(text),
        };

        let mut ranked: Vec<(usize, f32)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        debug!(
            hits = ranked.len(),
            best = ranked.first().map(|r| r.1),
            "Knowledge query scored"
        );

        Ok(ranked
            .into_iter()
            .map(|(pos, score)| self.passage(pos, score))
            .collect())
    }
}

impl IndexedRetriever {
    fn keyword_scores(&self, text: &str) -> Vec<f32> {
        self.index
            .chunks
            .iter()
            .map(|c| keyword_coverage(text, &c.text))
            .collect()
    }
}
