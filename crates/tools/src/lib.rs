//! Web search fallback implementations for carebridge.
//!
//! The clinical agent consults web search only when the reference corpus
//! is insufficient. Two backends implement `carebridge_core::WebSearch`:
//! the DuckDuckGo instant-answer API and an offline canned search.

pub mod duckduckgo;
pub mod offline;

pub use duckduckgo::DuckDuckGoSearch;
pub use offline::StaticWebSearch;

use carebridge_config::{WebSearchBackend, WebSearchConfig};
use carebridge_core::tool::WebSearch;
use std::sync::Arc;

/// Create the web search backend selected in configuration.
pub fn from_config(config: &WebSearchConfig) -> Arc<dyn WebSearch> {
    match config.backend {
        WebSearchBackend::Duckduckgo => Arc::new(DuckDuckGoSearch::with_endpoint(&config.endpoint)),
        WebSearchBackend::Offline => Arc::new(StaticWebSearch::nephrology()),
    }
}
