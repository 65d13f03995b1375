//! Tool contracts — the collaborators an agent may invoke.
//!
//! Agents reach the outside world through three tools: the record store
//! (see [`crate::patient::RecordStore`]), the knowledge retriever and the
//! web search fallback. Every invocation is reported back to the agent as
//! a [`ToolInvocationResult`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ToolError;

/// The result of invoking a tool, as seen by the calling agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocationResult<T> {
    /// Whether the tool found anything usable
    pub found: bool,

    /// Passages, search text or patient record, depending on tool
    pub payload: T,

    /// Relevance of the best hit (knowledge retriever only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl ToolInvocationResult<Vec<Passage>> {
    /// Wrap retriever output; confidence is the best passage score.
    pub fn from_passages(passages: Vec<Passage>) -> Self {
        let confidence = passages
            .iter()
            .map(|p| p.score)
            .fold(None, |best: Option<f32>, s| Some(best.map_or(s, |b| b.max(s))));
        Self {
            found: !passages.is_empty(),
            payload: passages,
            confidence,
        }
    }

    /// Whether the retrieval is strong enough to answer from alone.
    pub fn exceeds(&self, threshold: f32) -> bool {
        self.found && self.confidence.is_some_and(|c| c > threshold)
    }
}

impl ToolInvocationResult<String> {
    /// Wrap a free-text search summary.
    pub fn from_summary(summary: String) -> Self {
        Self {
            found: !summary.trim().is_empty(),
            payload: summary,
            confidence: None,
        }
    }
}

/// A passage retrieved from the reference corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,

    /// Relevance in 0.0..=1.0, higher is better
    pub score: f32,

    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Passage {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            text: text.into(),
            score,
            metadata: serde_json::Map::new(),
        }
    }

    /// A short human-readable origin, e.g. "nephrology_reference.txt#12".
    pub fn source(&self) -> Option<String> {
        let source = self.metadata.get("source")?.as_str()?;
        match self.metadata.get("chunk_index").and_then(|v| v.as_u64()) {
            Some(idx) => Some(format!("{source}#{idx}")),
            None => Some(source.to_string()),
        }
    }
}

/// Top-K retrieval over the pre-indexed reference corpus.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    fn name(&self) -> &str;

    /// Return up to `k` passages ordered by descending score.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<Passage>, ToolError>;
}

/// Free-text web search used when the reference corpus is insufficient.
#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;

    /// Return a search-engine summary; empty when nothing was found.
    async fn search(&self, query: &str) -> Result<String, ToolError>;
}
