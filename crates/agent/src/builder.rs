//! Wire agents, router and registry from configuration.

use carebridge_config::AppConfig;
use carebridge_core::event::EventBus;
use carebridge_core::patient::RecordStore;
use carebridge_core::provider::Provider;
use carebridge_core::tool::{KnowledgeRetriever, WebSearch};
use std::sync::Arc;
use tracing::info;

use crate::clinical::{ClinicalAgent, ClinicalPolicy};
use crate::receptionist::ReceptionistAgent;
use crate::registry::Assistant;
use crate::router::ConversationRouter;
use crate::synthesizer::AnswerSynthesizer;

/// The external collaborators an [`Assistant`] needs.
pub struct Collaborators {
    pub records: Arc<dyn RecordStore>,
    pub retriever: Arc<dyn KnowledgeRetriever>,
    pub web: Arc<dyn WebSearch>,
    /// `None` makes every answer extractive.
    pub provider: Option<Arc<dyn Provider>>,
}

/// Build a ready-to-use assistant. All components share `event_bus`.
pub fn build_assistant(
    config: &AppConfig,
    collaborators: Collaborators,
    event_bus: Arc<EventBus>,
) -> Assistant {
    let Collaborators {
        records,
        retriever,
        web,
        provider,
    } = collaborators;
    let timeouts = &config.timeouts;

    let synthesizer = match provider {
        Some(provider) => AnswerSynthesizer::new(provider, config.default_model.clone())
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens),
        None => AnswerSynthesizer::offline(),
    }
    .with_timeout(timeouts.synthesizer());

    info!(
        records = records.name(),
        retriever = retriever.name(),
        web_search = web.name(),
        synthesizer = if synthesizer.is_offline() { "extractive" } else { config.default_provider.as_str() },
        "Assembling assistant"
    );

    let receptionist = ReceptionistAgent::new(records)
        .with_config(&config.receptionist)
        .with_timeout(timeouts.record_store())
        .with_event_bus(event_bus.clone());

    let clinical = ClinicalAgent::new(retriever, web, synthesizer)
        .with_policy(ClinicalPolicy::from_config(&config.clinical, &config.web_search))
        .with_timeouts(timeouts.retriever(), timeouts.web_search())
        .with_event_bus(event_bus.clone());

    let router = ConversationRouter::new(Arc::new(receptionist), Arc::new(clinical))
        .with_dispatch_timeout(timeouts.dispatch())
        .with_event_bus(event_bus);

    Assistant::new(router)
}
