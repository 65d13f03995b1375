//! End-to-end conversations through a fully wired `Assistant`.
//!
//! Only the outermost collaborators (record store, retriever, web search)
//! are replaced; agents, router, registry and event bus are the real ones.

use async_trait::async_trait;
use carebridge_agent::{Assistant, Collaborators, build_assistant};
use carebridge_config::AppConfig;
use carebridge_core::agent::{AgentRole, Provenance};
use carebridge_core::error::{RecordError, ToolError};
use carebridge_core::event::{DomainEvent, EventBus};
use carebridge_core::patient::{NameLookup, Patient, RecordStore};
use carebridge_core::session::{SessionId, TurnRole};
use carebridge_core::tool::{KnowledgeRetriever, Passage, WebSearch};
use carebridge_records::{InMemoryRecordStore, parse_patients};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

const PATIENTS: &str = r#"[
    {"patient_id": "P001", "patient_name": "John Smith",
     "primary_diagnosis": "Chronic Kidney Disease Stage 3",
     "medications": ["Lisinopril 10mg daily", "Furosemide 20mg twice daily"],
     "dietary_restrictions": "Low sodium (2g/day), fluid restriction 1.5L/day",
     "follow_up": "Nephrology clinic in 2 weeks"},
    {"patient_id": "P002", "patient_name": "Jane Doe",
     "primary_diagnosis": "Acute Kidney Injury",
     "medications": [],
     "dietary_restrictions": "Low potassium"}
]"#;

// ── Collaborators ─────────────────────────────────────────────────────────

struct FixedRetriever {
    passages: Vec<Passage>,
    calls: AtomicUsize,
}

impl FixedRetriever {
    fn scoring(score: f32) -> Arc<Self> {
        Arc::new(Self {
            passages: vec![Passage::new(
                "Common symptoms of CKD include fatigue, swelling in the ankles and changes in urination.",
                score,
            )],
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl KnowledgeRetriever for FixedRetriever {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn query(&self, _text: &str, k: usize) -> Result<Vec<Passage>, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.passages.iter().take(k).cloned().collect())
    }
}

struct CountingWeb {
    summary: Option<String>,
    calls: AtomicUsize,
}

impl CountingWeb {
    fn answering(summary: &str) -> Arc<Self> {
        Arc::new(Self {
            summary: Some(summary.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn down() -> Arc<Self> {
        Arc::new(Self {
            summary: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebSearch for CountingWeb {
    fn name(&self) -> &str {
        "counting"
    }

    async fn search(&self, _query: &str) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.summary.clone().ok_or_else(|| ToolError::Unavailable {
            tool_name: "web_search".into(),
            reason: "connection refused".into(),
        })
    }
}

/// A record store whose every lookup hangs forever.
struct HangingRecords;

#[async_trait]
impl RecordStore for HangingRecords {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn find_by_name(&self, _name: &str) -> Result<NameLookup, RecordError> {
        std::future::pending().await
    }

    async fn find_by_id(&self, _patient_id: &str) -> Result<Option<Patient>, RecordError> {
        std::future::pending().await
    }
}

fn records() -> Arc<dyn RecordStore> {
    Arc::new(InMemoryRecordStore::from_patients(
        parse_patients(PATIENTS).unwrap(),
    ))
}

fn assistant_with(
    records: Arc<dyn RecordStore>,
    retriever: Arc<dyn KnowledgeRetriever>,
    web: Arc<dyn WebSearch>,
) -> (Assistant, Arc<EventBus>) {
    let bus = Arc::new(EventBus::default());
    let assistant = build_assistant(
        &AppConfig::default(),
        Collaborators {
            records,
            retriever,
            web,
            provider: None,
        },
        bus.clone(),
    );
    (assistant, bus)
}

/// Walk a fresh session through verification as John Smith.
async fn verified_session(assistant: &Assistant) -> SessionId {
    let id = assistant.new_session();
    assistant.send_message(&id, "John Smith").await.unwrap();
    let confirmed = assistant.send_message(&id, "P001").await.unwrap();
    assert!(confirmed.contains("identity is confirmed"));
    id
}

// ── Scenarios ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn unique_name_asks_for_id_and_stays_with_receptionist() {
    let (assistant, _) = assistant_with(
        records(),
        FixedRetriever::scoring(0.9),
        CountingWeb::answering("unused"),
    );
    let id = assistant.new_session();

    let exchange = assistant.exchange(&id, "John Smith").await.unwrap();

    assert!(exchange.turn.content.contains("Patient found: John Smith"));
    assert!(exchange.turn.content.contains("patient ID"));
    assert_eq!(exchange.turn.source_agent, Some(AgentRole::Receptionist));
    assert_eq!(exchange.active_agent, AgentRole::Receptionist);

    let session = assistant.snapshot(&id).await.unwrap();
    assert!(!session.identity_confirmed());
}

#[tokio::test]
async fn confident_retrieval_answers_from_reference_only() {
    let retriever = FixedRetriever::scoring(0.9);
    let web = CountingWeb::answering("should not be used");
    let (assistant, _) = assistant_with(records(), retriever.clone(), web.clone());
    let id = verified_session(&assistant).await;

    let exchange = assistant
        .exchange(&id, "What are symptoms of CKD?")
        .await
        .unwrap();

    assert_eq!(exchange.active_agent, AgentRole::Clinical);
    assert_eq!(exchange.turn.source_agent, Some(AgentRole::Clinical));
    assert_eq!(exchange.turn.provenance, vec![Provenance::ReferenceMaterials]);
    assert!(exchange.turn.content.starts_with("From Reference Materials:"));
    assert!(exchange.turn.content.contains("fatigue"));
    assert_eq!(retriever.calls.load(Ordering::SeqCst), 1);
    assert_eq!(web.calls(), 0);
}

#[tokio::test]
async fn weak_retrieval_falls_back_to_web_with_note() {
    let web = CountingWeb::answering("The 2024 KDIGO update refines CKD staging.");
    let (assistant, _) = assistant_with(records(), FixedRetriever::scoring(0.1), web.clone());
    let id = verified_session(&assistant).await;

    let exchange = assistant
        .exchange(&id, "2024 KDIGO guidelines?")
        .await
        .unwrap();

    assert_eq!(exchange.turn.provenance, vec![Provenance::WebSearch]);
    assert!(exchange.turn.content.starts_with("Note:"));
    assert!(exchange.turn.content.contains("did not contain sufficient"));
    assert!(exchange.turn.content.contains("From Web Search:"));
    assert!(!exchange.turn.content.contains("From Reference Materials"));
    assert_eq!(web.calls(), 1);
}

#[tokio::test]
async fn both_sources_failing_refers_to_a_professional() {
    let web = CountingWeb::down();
    let (assistant, _) = assistant_with(records(), FixedRetriever::scoring(0.1), web.clone());
    let id = verified_session(&assistant).await;

    let exchange = assistant
        .exchange(&id, "Can I take ibuprofen with my medication?")
        .await
        .unwrap();

    assert!(exchange.turn.content.contains("licensed medical professional"));
    assert!(exchange.turn.provenance.is_empty());
    assert_eq!(exchange.active_agent, AgentRole::Clinical);
    // one attempt plus one retry for a transient failure
    assert_eq!(web.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn stalled_record_store_gets_an_apology_not_an_error() {
    let (assistant, bus) = assistant_with(
        Arc::new(HangingRecords),
        FixedRetriever::scoring(0.9),
        CountingWeb::answering("unused"),
    );
    let mut events = bus.subscribe();
    let id = assistant.new_session();

    let exchange = assistant.exchange(&id, "John Smith").await.unwrap();

    assert!(exchange.turn.content.contains("trouble accessing patient records"));
    assert_eq!(exchange.turn.role, TurnRole::Agent);
    assert_eq!(exchange.active_agent, AgentRole::Receptionist);

    let mut saw_failed_lookup = false;
    while let Ok(event) = events.try_recv() {
        if let DomainEvent::ToolInvoked { success: false, tool_name, .. } = &*event {
            saw_failed_lookup |= tool_name == "record_store";
        }
    }
    assert!(saw_failed_lookup);
}

#[tokio::test]
async fn full_visit_hands_off_and_back() {
    let (assistant, bus) = assistant_with(
        records(),
        FixedRetriever::scoring(0.9),
        CountingWeb::answering("unused"),
    );
    let mut events = bus.subscribe();
    let id = assistant.new_session();

    let welcome = assistant.send_message(&id, "Hello").await.unwrap();
    assert!(welcome.contains("full name"));

    assistant.send_message(&id, "My name is John Smith").await.unwrap();
    let confirmed = assistant.exchange(&id, "P001").await.unwrap();
    assert!(confirmed.turn.content.contains("Lisinopril 10mg daily"));
    assert_eq!(confirmed.active_agent, AgentRole::Receptionist);

    let answer = assistant
        .exchange(&id, "What are symptoms of CKD?")
        .await
        .unwrap();
    assert_eq!(answer.active_agent, AgentRole::Clinical);

    let follow_up = assistant
        .exchange(&id, "And what about swelling?")
        .await
        .unwrap();
    assert_eq!(follow_up.turn.source_agent, Some(AgentRole::Clinical));

    let goodbye = assistant.exchange(&id, "That's all, goodbye").await.unwrap();
    assert_eq!(goodbye.turn.source_agent, Some(AgentRole::Clinical));
    assert_eq!(goodbye.active_agent, AgentRole::Receptionist);

    let session = assistant.snapshot(&id).await.unwrap();
    let handoffs: Vec<_> = session.handoffs().iter().map(|h| (h.from, h.to)).collect();
    assert_eq!(
        handoffs,
        vec![
            (AgentRole::Receptionist, AgentRole::Clinical),
            (AgentRole::Clinical, AgentRole::Receptionist),
        ]
    );
    // every user turn is answered by exactly one outgoing turn
    assert_eq!(session.transcript().len(), 12);
    assert!(session.transcript().iter().all(|t| t.role != TurnRole::System));

    let mut completed = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(&*event, DomainEvent::HandoffCompleted { .. }) {
            completed += 1;
        }
    }
    assert_eq!(completed, 2);
}

#[tokio::test]
async fn sessions_do_not_share_verification() {
    let (assistant, _) = assistant_with(
        records(),
        FixedRetriever::scoring(0.9),
        CountingWeb::answering("unused"),
    );
    let verified = verified_session(&assistant).await;
    let fresh = assistant.new_session();

    let reply = assistant
        .exchange(&fresh, "What are symptoms of CKD?")
        .await
        .unwrap();
    assert_eq!(reply.active_agent, AgentRole::Receptionist);
    assert!(!assistant.snapshot(&fresh).await.unwrap().identity_confirmed());
    assert!(assistant.snapshot(&verified).await.unwrap().identity_confirmed());
}
