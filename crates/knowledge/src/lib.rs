//! Reference corpus for the clinical agent.
//!
//! `carebridge ingest` splits a reference text into overlapping chunks and
//! persists them as a JSON [`KnowledgeIndex`]; at runtime an
//! [`IndexedRetriever`] answers top-K queries against it.

pub mod chunker;
pub mod index;
pub mod retriever;
pub mod scoring;

pub use chunker::split_text;
pub use index::{IndexedChunk, KnowledgeIndex};
pub use retriever::IndexedRetriever;
pub use scoring::{cosine_similarity, keyword_coverage};

use carebridge_core::error::{ProviderError, ToolError};
use std::path::PathBuf;

/// Errors building, loading or querying the knowledge index.
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    #[error("I/O error at {path}: {reason}")]
    Io { path: PathBuf, reason: String },

    #[error("Invalid knowledge index: {0}")]
    InvalidIndex(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] ProviderError),
}

impl From<KnowledgeError> for ToolError {
    fn from(err: KnowledgeError) -> Self {
        ToolError::Unavailable {
            tool_name: retriever::TOOL_NAME.into(),
            reason: err.to_string(),
        }
    }
}
