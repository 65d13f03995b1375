//! Clinical Agent — retrieval-first answers with a web-search fallback.
//!
//! Decision order for each question:
//!
//! 1. Sensitive-query policy (when enabled): professional-referral message,
//!    no tool calls.
//! 2. Exit phrase: farewell and hand control back to the receptionist.
//! 3. Reference materials: answer from passages when the best score
//!    exceeds the confidence threshold.
//! 4. Web search (one retry on transient failure): answer from the
//!    summary, stating that reference material was insufficient.
//! 5. Neither source usable: professional-referral message.

use async_trait::async_trait;
use carebridge_config::{ClinicalConfig, WebSearchConfig};
use carebridge_core::agent::{Agent, AgentReply, AgentRole, HandoffSignal, Provenance};
use carebridge_core::error::{AgentError, ToolError};
use carebridge_core::event::{DomainEvent, EventBus, preview};
use carebridge_core::session::{Session, Turn};
use carebridge_core::tool::{KnowledgeRetriever, Passage, ToolInvocationResult, WebSearch};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::guard::{call_with_retry, call_with_timeout, elapsed_ms};
use crate::intent;
use crate::synthesizer::AnswerSynthesizer;

pub const PROFESSIONAL_REFERRAL: &str = "I couldn't find this in our reference materials or \
through a web search. This specific clinical information requires consultation with a licensed \
medical professional. Please contact your care team or nephrologist.";

pub const SENSITIVE_REFERRAL: &str = "This question needs individual medical judgement, which I \
can't provide. Please consult a licensed medical professional, such as your nephrologist or care \
team. If this is an emergency, call your local emergency number.";

const INSUFFICIENT_NOTE: &str = "Note: our reference materials did not contain sufficient \
information to answer this question, so the answer below comes from a web search.";

/// Thresholds and phrase lists that drive the clinical decision procedure.
#[derive(Debug, Clone)]
pub struct ClinicalPolicy {
    pub confidence_threshold: f32,
    pub top_k: usize,
    pub refuse_sensitive: bool,
    pub sensitive_terms: Vec<String>,
    pub exit_phrases: Vec<String>,
    pub web_max_retries: u32,
}

impl Default for ClinicalPolicy {
    fn default() -> Self {
        Self::from_config(&ClinicalConfig::default(), &WebSearchConfig::default())
    }
}

impl ClinicalPolicy {
    pub fn from_config(clinical: &ClinicalConfig, web: &WebSearchConfig) -> Self {
        Self {
            confidence_threshold: clinical.confidence_threshold,
            top_k: clinical.top_k,
            refuse_sensitive: clinical.refuse_sensitive,
            sensitive_terms: clinical.sensitive_terms.clone(),
            exit_phrases: clinical.exit_phrases.clone(),
            web_max_retries: web.max_retries,
        }
    }

    /// Case-insensitive containment of any sensitive term.
    pub fn is_sensitive(&self, question: &str) -> bool {
        if !self.refuse_sensitive {
            return false;
        }
        let q = question.to_lowercase();
        self.sensitive_terms
            .iter()
            .any(|t| !t.trim().is_empty() && q.contains(&t.to_lowercase()))
    }

    pub fn wants_exit(&self, question: &str) -> bool {
        intent::contains_phrase(question, &self.exit_phrases)
    }
}

pub struct ClinicalAgent {
    retriever: Arc<dyn KnowledgeRetriever>,
    web: Arc<dyn WebSearch>,
    synthesizer: AnswerSynthesizer,
    policy: ClinicalPolicy,
    retriever_timeout: Duration,
    web_timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl ClinicalAgent {
    pub fn new(
        retriever: Arc<dyn KnowledgeRetriever>,
        web: Arc<dyn WebSearch>,
        synthesizer: AnswerSynthesizer,
    ) -> Self {
        Self {
            retriever,
            web,
            synthesizer,
            policy: ClinicalPolicy::default(),
            retriever_timeout: Duration::from_secs(10),
            web_timeout: Duration::from_secs(10),
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_policy(mut self, policy: ClinicalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeouts(mut self, retriever: Duration, web: Duration) -> Self {
        self.retriever_timeout = retriever;
        self.web_timeout = web;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn policy(&self) -> &ClinicalPolicy {
        &self.policy
    }

    fn report(&self, tool_name: &str, success: bool, start: Instant) {
        self.event_bus.publish(DomainEvent::ToolInvoked {
            agent: AgentRole::Clinical,
            tool_name: tool_name.to_string(),
            success,
            duration_ms: elapsed_ms(start),
            timestamp: Utc::now(),
        });
    }

    async fn retrieve(&self, question: &str) -> Result<ToolInvocationResult<Vec<Passage>>, ToolError> {
        let start = Instant::now();
        let result = call_with_timeout(
            self.retriever.name(),
            self.retriever_timeout,
            self.retriever.query(question, self.policy.top_k),
        )
        .await;
        self.report(self.retriever.name(), result.is_ok(), start);

        let retrieval = result.map(ToolInvocationResult::from_passages);
        let (found, confidence) = match &retrieval {
            Ok(r) => (r.found, r.confidence),
            Err(_) => (false, None),
        };
        info!(found, confidence, "Knowledge retrieval attempted");
        self.event_bus.publish(DomainEvent::RetrievalAttempted {
            query_preview: preview(question, 80),
            found,
            confidence,
            timestamp: Utc::now(),
        });
        retrieval
    }

    async fn search(&self, question: &str) -> Result<ToolInvocationResult<String>, ToolError> {
        let start = Instant::now();
        let result = call_with_retry(
            self.web.name(),
            self.web_timeout,
            self.policy.web_max_retries,
            || self.web.search(question),
        )
        .await;
        self.report(self.web.name(), result.is_ok(), start);
        result.map(ToolInvocationResult::from_summary)
    }

    fn farewell(&self, session: &Session) -> Result<AgentReply, AgentError> {
        let name = session
            .verified_patient()
            .map(|p| format!(", {}", p.patient_name))
            .unwrap_or_default();
        let handoff = HandoffSignal::new(AgentRole::Clinical, AgentRole::Receptionist)?
            .with_reason("patient ended the clinical consultation");
        Ok(AgentReply::text(format!(
            "Thank you for your questions{name}. I'll hand you back to reception. \
             Take care, and follow the instructions in your discharge report."
        ))
        .with_handoff(handoff))
    }

    async fn answer(&self, session: &Session, question: &str) -> AgentReply {
        let patient = session.verified_patient();

        let reference_failed = match self.retrieve(question).await {
            Ok(retrieval) if retrieval.exceeds(self.policy.confidence_threshold) => {
                debug!(confidence = retrieval.confidence, "Answering from reference materials");
                let answer = self
                    .synthesizer
                    .from_passages(question, &retrieval.payload, patient)
                    .await;
                return AgentReply::text(format!(
                    "From {}: {answer}",
                    Provenance::ReferenceMaterials.label()
                ))
                .with_provenance(vec![Provenance::ReferenceMaterials]);
            }
            Ok(retrieval) => {
                debug!(
                    confidence = retrieval.confidence,
                    threshold = self.policy.confidence_threshold,
                    "Reference materials insufficient; using web search"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "Knowledge retriever failed; using web search");
                true
            }
        };

        match self.search(question).await {
            Ok(search) if search.found => {
                let answer = self
                    .synthesizer
                    .from_search(question, &search.payload, patient)
                    .await;
                let note = if reference_failed {
                    "Note: our reference materials were unavailable, so the answer below comes \
                     from a web search."
                } else {
                    INSUFFICIENT_NOTE
                };
                AgentReply::text(format!(
                    "{note}\n\nFrom {}: {answer}",
                    Provenance::WebSearch.label()
                ))
                .with_provenance(vec![Provenance::WebSearch])
            }
            Ok(_) => {
                info!("Web search returned nothing; referring to a professional");
                AgentReply::text(PROFESSIONAL_REFERRAL)
            }
            Err(e) => {
                warn!(error = %e, "Web search failed; referring to a professional");
                AgentReply::text(PROFESSIONAL_REFERRAL)
            }
        }
    }
}

#[async_trait]
impl Agent for ClinicalAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Clinical
    }

    async fn handle(&self, session: &Session, turn: &Turn) -> Result<AgentReply, AgentError> {
        let question = turn.content.trim();

        if self.policy.is_sensitive(question) {
            info!("Sensitive question; referring to a professional");
            return Ok(AgentReply::text(SENSITIVE_REFERRAL));
        }

        if self.policy.wants_exit(question) {
            return self.farewell(session);
        }

        Ok(self.answer(session, question).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockRetriever, MockWebSearch, ScriptedProvider, john_smith};
    use carebridge_core::agent::SessionEffect;
    use carebridge_core::session::SessionId;

    fn session() -> Session {
        let mut s = Session::new(SessionId::new(), AgentRole::Clinical);
        s.apply(SessionEffect::IdentityConfirmed(john_smith()));
        s
    }

    fn agent(retriever: Arc<MockRetriever>, web: Arc<MockWebSearch>) -> ClinicalAgent {
        ClinicalAgent::new(retriever, web, AnswerSynthesizer::offline())
    }

    #[tokio::test]
    async fn confident_retrieval_skips_web_search() {
        let retriever = Arc::new(MockRetriever::confident(
            "CKD symptoms include fatigue, swelling and itching.",
            0.9,
        ));
        let web = Arc::new(MockWebSearch::returning("should not be used"));
        let reply = agent(retriever.clone(), web.clone())
            .handle(&session(), &Turn::user("What are symptoms of CKD?"))
            .await
            .unwrap();

        assert!(reply.content.starts_with("From Reference Materials:"));
        assert!(reply.content.contains("fatigue"));
        assert_eq!(reply.provenance, vec![Provenance::ReferenceMaterials]);
        assert!(reply.handoff.is_none());
        assert_eq!(retriever.calls(), 1);
        assert_eq!(web.calls(), 0);
    }

    #[tokio::test]
    async fn weak_retrieval_falls_back_to_web_once() {
        let retriever = Arc::new(MockRetriever::confident("loosely related", 0.1));
        let web = Arc::new(MockWebSearch::returning("KDIGO 2024 updated CKD staging."));
        let reply = agent(retriever, web.clone())
            .handle(&session(), &Turn::user("2024 KDIGO guidelines?"))
            .await
            .unwrap();

        assert!(reply.content.contains("did not contain sufficient information"));
        assert!(reply.content.contains("From Web Search: KDIGO 2024"));
        assert!(!reply.content.contains("From Reference Materials"));
        assert_eq!(reply.provenance, vec![Provenance::WebSearch]);
        assert_eq!(web.calls(), 1);
    }

    #[tokio::test]
    async fn threshold_is_exclusive() {
        let retriever = Arc::new(MockRetriever::confident("exactly at threshold", 0.5));
        let web = Arc::new(MockWebSearch::returning("web answer"));
        let reply = agent(retriever, web.clone())
            .handle(&session(), &Turn::user("question"))
            .await
            .unwrap();
        assert_eq!(reply.provenance, vec![Provenance::WebSearch]);
        assert_eq!(web.calls(), 1);
    }

    #[tokio::test]
    async fn empty_retrieval_falls_back_to_web() {
        let web = Arc::new(MockWebSearch::returning("web answer"));
        let reply = agent(Arc::new(MockRetriever::empty()), web.clone())
            .handle(&session(), &Turn::user("question"))
            .await
            .unwrap();
        assert_eq!(reply.provenance, vec![Provenance::WebSearch]);
        assert_eq!(web.calls(), 1);
    }

    #[tokio::test]
    async fn retriever_failure_falls_back_to_web() {
        let web = Arc::new(MockWebSearch::returning("web answer"));
        let reply = agent(Arc::new(MockRetriever::failing()), web.clone())
            .handle(&session(), &Turn::user("question"))
            .await
            .unwrap();
        assert!(reply.content.contains("unavailable"));
        assert_eq!(reply.provenance, vec![Provenance::WebSearch]);
    }

    #[tokio::test]
    async fn both_sources_failing_refers_to_professional() {
        let web = Arc::new(MockWebSearch::failing());
        let reply = agent(Arc::new(MockRetriever::failing()), web.clone())
            .handle(&session(), &Turn::user("question"))
            .await
            .unwrap();

        assert_eq!(reply.content, PROFESSIONAL_REFERRAL);
        assert!(reply.provenance.is_empty());
        assert!(reply.handoff.is_none());
        // one retry for the transient failure, then give up
        assert_eq!(web.calls(), 2);
    }

    #[tokio::test]
    async fn empty_web_summary_refers_to_professional() {
        let reply = agent(
            Arc::new(MockRetriever::empty()),
            Arc::new(MockWebSearch::returning("")),
        )
        .handle(&session(), &Turn::user("question"))
        .await
        .unwrap();
        assert_eq!(reply.content, PROFESSIONAL_REFERRAL);
    }

    #[tokio::test]
    async fn transient_web_failure_retried_once() {
        let web = Arc::new(MockWebSearch::failing_first(1, "second try worked"));
        let reply = agent(Arc::new(MockRetriever::empty()), web.clone())
            .handle(&session(), &Turn::user("question"))
            .await
            .unwrap();
        assert!(reply.content.contains("second try worked"));
        assert_eq!(web.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_tools_time_out() {
        let reply = agent(
            Arc::new(MockRetriever::stalled()),
            Arc::new(MockWebSearch::stalled()),
        )
        .with_timeouts(Duration::from_millis(100), Duration::from_millis(100))
        .handle(&session(), &Turn::user("question"))
        .await
        .unwrap();
        assert_eq!(reply.content, PROFESSIONAL_REFERRAL);
    }

    #[tokio::test]
    async fn exit_phrase_hands_back_without_lookups() {
        let retriever = Arc::new(MockRetriever::empty());
        let web = Arc::new(MockWebSearch::returning("x"));
        let reply = agent(retriever.clone(), web.clone())
            .handle(&session(), &Turn::user("No more questions, goodbye."))
            .await
            .unwrap();

        let handoff = reply.handoff.expect("handoff");
        assert_eq!(handoff.from, AgentRole::Clinical);
        assert_eq!(handoff.to, AgentRole::Receptionist);
        assert!(!handoff.forward_turn);
        assert!(reply.content.contains("John Smith"));
        assert_eq!(retriever.calls() + web.calls(), 0);
    }

    #[tokio::test]
    async fn sensitive_policy_off_by_default() {
        let retriever = Arc::new(MockRetriever::confident("dose guidance", 0.9));
        let reply = agent(retriever.clone(), Arc::new(MockWebSearch::returning("x")))
            .handle(&session(), &Turn::user("Can I double my dose of lisinopril?"))
            .await
            .unwrap();
        assert_eq!(reply.provenance, vec![Provenance::ReferenceMaterials]);
        assert_eq!(retriever.calls(), 1);
    }

    #[tokio::test]
    async fn sensitive_policy_refuses_without_tools() {
        let retriever = Arc::new(MockRetriever::confident("dose guidance", 0.9));
        let web = Arc::new(MockWebSearch::returning("x"));
        let policy = ClinicalPolicy {
            refuse_sensitive: true,
            sensitive_terms: vec!["double my dose".into()],
            ..ClinicalPolicy::default()
        };
        let reply = agent(retriever.clone(), web.clone())
            .with_policy(policy)
            .handle(&session(), &Turn::user("Can I DOUBLE MY DOSE of lisinopril?"))
            .await
            .unwrap();

        assert_eq!(reply.content, SENSITIVE_REFERRAL);
        assert_eq!(retriever.calls() + web.calls(), 0);
    }

    #[tokio::test]
    async fn model_phrases_the_reference_answer() {
        let provider = Arc::new(ScriptedProvider::answers(&["Fatigue and swelling are common."]));
        let agent = ClinicalAgent::new(
            Arc::new(MockRetriever::confident("CKD symptoms include fatigue.", 0.8)),
            Arc::new(MockWebSearch::returning("x")),
            AnswerSynthesizer::new(provider, "mock-model"),
        );
        let reply = agent
            .handle(&session(), &Turn::user("What are symptoms of CKD?"))
            .await
            .unwrap();
        assert_eq!(
            reply.content,
            "From Reference Materials: Fatigue and swelling are common."
        );
    }

    #[tokio::test]
    async fn retrieval_is_published() {
        let bus = Arc::new(EventBus::default());
        let mut events = bus.subscribe();
        agent(
            Arc::new(MockRetriever::confident("CKD text", 0.9)),
            Arc::new(MockWebSearch::returning("x")),
        )
        .with_event_bus(bus)
        .handle(&session(), &Turn::user("What are symptoms of CKD?"))
        .await
        .unwrap();

        let mut saw_retrieval = false;
        while let Ok(event) = events.try_recv() {
            if let DomainEvent::RetrievalAttempted { found, confidence, .. } = &*event {
                assert!(*found);
                assert_eq!(*confidence, Some(0.9));
                saw_retrieval = true;
            }
        }
        assert!(saw_retrieval);
    }
}
