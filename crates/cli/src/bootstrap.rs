//! Build the collaborators and the `Assistant` from configuration.

use carebridge_agent::{Assistant, Collaborators, build_assistant};
use carebridge_config::{AppConfig, RecordsBackend};
use carebridge_core::event::{DomainEvent, EventBus};
use carebridge_core::patient::RecordStore;
use carebridge_core::provider::Provider;
use carebridge_core::tool::KnowledgeRetriever;
use carebridge_knowledge::{IndexedRetriever, KnowledgeIndex};
use carebridge_records::{InMemoryRecordStore, SqliteRecordStore};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

type BoxError = Box<dyn std::error::Error>;

/// The language-model roles, each `None` when its provider has no credentials.
pub struct Providers {
    pub synthesizer: Option<Arc<dyn Provider>>,
    pub embedder: Option<Arc<dyn Provider>>,
}

fn has_credentials(config: &AppConfig, name: &str) -> bool {
    name == "ollama"
        || config.has_api_key()
        || config
            .providers
            .get(name)
            .is_some_and(|p| p.api_key.is_some())
}

pub fn providers(config: &AppConfig) -> Providers {
    let router = carebridge_providers::build_from_config(config);

    let synthesizer = if has_credentials(config, &config.default_provider) {
        router.default()
    } else {
        warn!("No API key configured; answers will be extractive");
        None
    };

    let embedding_provider = config.knowledge.embedding_provider.as_deref();
    let embedder_name = embedding_provider.unwrap_or(&config.default_provider);
    let embedder = match &config.knowledge.embedding_model {
        None => None,
        Some(_) if has_credentials(config, embedder_name) => router.select(embedding_provider),
        Some(model) => {
            warn!(%model, "No API key for the embedding provider; retrieval uses keyword scoring");
            None
        }
    };

    Providers {
        synthesizer,
        embedder,
    }
}

pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.display())
}

pub async fn records(config: &AppConfig) -> Result<Arc<dyn RecordStore>, BoxError> {
    let path = &config.records.path;
    let store: Arc<dyn RecordStore> = match config.records.backend {
        RecordsBackend::Json if !path.exists() => {
            warn!(path = %path.display(), "Patient records file not found; starting with no records");
            Arc::new(InMemoryRecordStore::new())
        }
        RecordsBackend::Json => Arc::new(InMemoryRecordStore::load_json(path).await?),
        RecordsBackend::Sqlite => Arc::new(SqliteRecordStore::new(&sqlite_url(path)).await?),
    };
    Ok(store)
}

pub async fn retriever(
    config: &AppConfig,
    embedder: Option<&Arc<dyn Provider>>,
) -> Result<Arc<dyn KnowledgeRetriever>, BoxError> {
    let path = &config.knowledge.index_path;
    let retriever = if path.exists() {
        IndexedRetriever::open(path).await?
    } else {
        warn!(
            path = %path.display(),
            "Knowledge index not found; run `carebridge ingest` first. Every question will go to web search"
        );
        IndexedRetriever::new(KnowledgeIndex::empty())
    };

    let retriever = match (&config.knowledge.embedding_model, embedder) {
        (Some(model), Some(embedder)) if retriever.index().has_embeddings() => {
            retriever.with_embedder(embedder.clone(), model.clone())
        }
        _ => retriever,
    };
    info!(chunks = retriever.index().len(), "Knowledge index ready");
    Ok(Arc::new(retriever))
}

/// Wire the whole assistant and start a background task that mirrors
/// domain events into the log.
pub async fn assistant(config: &AppConfig) -> Result<Arc<Assistant>, BoxError> {
    let Providers {
        synthesizer,
        embedder,
    } = providers(config);
    let records = records(config).await?;
    let retriever = retriever(config, embedder.as_ref()).await?;
    let web = carebridge_tools::from_config(&config.web_search);

    let event_bus = Arc::new(EventBus::default());
    spawn_event_logger(&event_bus);

    let assistant = build_assistant(
        config,
        Collaborators {
            records,
            retriever,
            web,
            provider: synthesizer,
        },
        event_bus,
    );
    Ok(Arc::new(assistant))
}

fn spawn_event_logger(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Audit log lagging behind events");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            match &*event {
                DomainEvent::TurnAppended {
                    session_id,
                    role,
                    source_agent,
                    content_preview,
                    ..
                } => debug!(
                    target: "carebridge::audit",
                    session_id = %session_id, ?role, ?source_agent, content = %content_preview,
                    "interaction"
                ),
                DomainEvent::ToolInvoked {
                    agent,
                    tool_name,
                    success,
                    duration_ms,
                    ..
                } => debug!(
                    target: "carebridge::audit",
                    %agent, tool = %tool_name, success, duration_ms,
                    "tool invoked"
                ),
                DomainEvent::DispatchFailed {
                    session_id,
                    agent,
                    error_message,
                    ..
                } => warn!(
                    target: "carebridge::audit",
                    session_id = %session_id, %agent, error = %error_message,
                    "dispatch failed"
                ),
                DomainEvent::HandoffCompleted { .. } | DomainEvent::RetrievalAttempted { .. } => {}
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_key_means_extractive_and_keyword_only() {
        let mut config = AppConfig::default();
        config.knowledge.embedding_model = Some("text-embedding-004".into());

        let providers = providers(&config);
        assert!(providers.synthesizer.is_none());
        assert!(providers.embedder.is_none());
    }

    #[test]
    fn embedder_can_come_from_a_local_provider() {
        let mut config = AppConfig::default();
        config.knowledge.embedding_model = Some("nomic-embed-text".into());
        config.knowledge.embedding_provider = Some("ollama".into());

        let providers = providers(&config);
        assert!(providers.synthesizer.is_none());
        assert_eq!(providers.embedder.unwrap().name(), "ollama");
    }

    #[test]
    fn shared_key_serves_both_roles() {
        let mut config = AppConfig::default();
        config.api_key = Some("key".into());
        config.knowledge.embedding_model = Some("text-embedding-004".into());

        let providers = providers(&config);
        assert_eq!(providers.synthesizer.unwrap().name(), "gemini");
        assert_eq!(providers.embedder.unwrap().name(), "gemini");
    }

    #[test]
    fn no_embedding_model_means_no_embedder() {
        let mut config = AppConfig::default();
        config.api_key = Some("key".into());
        assert!(providers(&config).embedder.is_none());
    }
}
