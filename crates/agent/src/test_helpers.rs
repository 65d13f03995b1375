//! Shared mock collaborators for agent, router and registry tests.
//!
//! Every mock counts its calls and can be told to fail or to stall
//! forever (pair with `#[tokio::test(start_paused = true)]`).

use async_trait::async_trait;
use carebridge_core::agent::{Agent, AgentReply, AgentRole};
use carebridge_core::error::{AgentError, ProviderError, RecordError, ToolError};
use carebridge_core::patient::{NameLookup, Patient, RecordStore, names_match};
use carebridge_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use carebridge_core::session::{Session, Turn};
use carebridge_core::tool::{KnowledgeRetriever, Passage, WebSearch};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behaviour {
    Answer,
    Fail,
    Stall,
}

async fn stall() {
    std::future::pending::<()>().await;
}

fn bump(counter: &Mutex<usize>) -> usize {
    let mut count = counter.lock().unwrap();
    *count += 1;
    *count
}

// ── Fixtures ────────────────────────────────────────────────────────────

pub fn patient(id: &str, name: &str, diagnosis: &str) -> Patient {
    Patient {
        patient_id: id.into(),
        patient_name: name.into(),
        primary_diagnosis: diagnosis.into(),
        medications: vec!["Lisinopril 10mg daily".into(), "Furosemide 20mg twice daily".into()],
        dietary_restrictions: "Low sodium (2g/day), fluid restriction (1.5L/day)".into(),
        follow_up: Some("Nephrology clinic in 2 weeks".into()),
        extra: serde_json::Map::new(),
    }
}

pub fn john_smith() -> Patient {
    patient("P001", "John Smith", "Chronic Kidney Disease Stage 3")
}

pub fn jane_doe() -> Patient {
    patient("P002", "Jane Doe", "Acute Kidney Injury")
}

/// Two distinct patients sharing one name.
pub fn maria_garcia_pair() -> Vec<Patient> {
    vec![
        patient("P003", "Maria Garcia", "Nephrotic Syndrome"),
        patient("P004", "Maria Garcia", "Chronic Kidney Disease Stage 4"),
    ]
}

// ── Record store ────────────────────────────────────────────────────────

pub struct MockRecordStore {
    patients: Vec<Patient>,
    behaviour: Behaviour,
    name_calls: Mutex<usize>,
    id_calls: Mutex<usize>,
}

impl MockRecordStore {
    pub fn new(patients: Vec<Patient>) -> Self {
        Self {
            patients,
            behaviour: Behaviour::Answer,
            name_calls: Mutex::new(0),
            id_calls: Mutex::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Self::new(vec![])
        }
    }

    pub fn stalled() -> Self {
        Self {
            behaviour: Behaviour::Stall,
            ..Self::new(vec![])
        }
    }

    pub fn name_calls(&self) -> usize {
        *self.name_calls.lock().unwrap()
    }

    pub fn id_calls(&self) -> usize {
        *self.id_calls.lock().unwrap()
    }

    async fn gate(&self) -> Result<(), RecordError> {
        match self.behaviour {
            Behaviour::Answer => Ok(()),
            Behaviour::Fail => Err(RecordError::Unavailable("connection refused".into())),
            Behaviour::Stall => {
                stall().await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl RecordStore for MockRecordStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn find_by_name(&self, name: &str) -> Result<NameLookup, RecordError> {
        bump(&self.name_calls);
        self.gate().await?;
        Ok(NameLookup::from_matches(
            self.patients
                .iter()
                .filter(|p| names_match(&p.patient_name, name))
                .cloned()
                .collect(),
        ))
    }

    async fn find_by_id(&self, patient_id: &str) -> Result<Option<Patient>, RecordError> {
        bump(&self.id_calls);
        self.gate().await?;
        Ok(self.patients.iter().find(|p| p.patient_id == patient_id).cloned())
    }
}

// ── Knowledge retriever ─────────────────────────────────────────────────

pub struct MockRetriever {
    passages: Vec<Passage>,
    behaviour: Behaviour,
    calls: Mutex<usize>,
}

impl MockRetriever {
    pub fn returning(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            behaviour: Behaviour::Answer,
            calls: Mutex::new(0),
        }
    }

    /// A single passage with the given score.
    pub fn confident(text: &str, score: f32) -> Self {
        Self::returning(vec![Passage::new(text, score)])
    }

    pub fn empty() -> Self {
        Self::returning(vec![])
    }

    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Self::empty()
        }
    }

    pub fn stalled() -> Self {
        Self {
            behaviour: Behaviour::Stall,
            ..Self::empty()
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl KnowledgeRetriever for MockRetriever {
    fn name(&self) -> &str {
        "knowledge_retriever"
    }

    async fn query(&self, _text: &str, k: usize) -> Result<Vec<Passage>, ToolError> {
        bump(&self.calls);
        match self.behaviour {
            Behaviour::Answer => Ok(self.passages.iter().take(k).cloned().collect()),
            Behaviour::Fail => Err(ToolError::Unavailable {
                tool_name: "knowledge_retriever".into(),
                reason: "index offline".into(),
            }),
            Behaviour::Stall => {
                stall().await;
                Ok(vec![])
            }
        }
    }
}

// ── Web search ──────────────────────────────────────────────────────────

pub struct MockWebSearch {
    summary: String,
    behaviour: Behaviour,
    fail_first: usize,
    calls: Mutex<usize>,
}

impl MockWebSearch {
    pub fn returning(summary: &str) -> Self {
        Self {
            summary: summary.into(),
            behaviour: Behaviour::Answer,
            fail_first: 0,
            calls: Mutex::new(0),
        }
    }

    /// Transient failure on every call.
    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Self::returning("")
        }
    }

    /// Transient failure on the first `n` calls, then `summary`.
    pub fn failing_first(n: usize, summary: &str) -> Self {
        Self {
            fail_first: n,
            ..Self::returning(summary)
        }
    }

    pub fn stalled() -> Self {
        Self {
            behaviour: Behaviour::Stall,
            ..Self::returning("")
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl WebSearch for MockWebSearch {
    fn name(&self) -> &str {
        "web_search"
    }

    async fn search(&self, _query: &str) -> Result<String, ToolError> {
        let call = bump(&self.calls);
        let unavailable = || ToolError::Unavailable {
            tool_name: "web_search".into(),
            reason: "connection reset".into(),
        };
        match self.behaviour {
            Behaviour::Fail => Err(unavailable()),
            Behaviour::Stall => {
                stall().await;
                Ok(String::new())
            }
            Behaviour::Answer if call <= self.fail_first => Err(unavailable()),
            Behaviour::Answer => Ok(self.summary.clone()),
        }
    }
}

// ── Provider ────────────────────────────────────────────────────────────

/// Returns scripted answers in order, repeating the last one.
pub struct ScriptedProvider {
    answers: Vec<String>,
    behaviour: Behaviour,
    calls: Mutex<usize>,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedProvider {
    pub fn answers(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            behaviour: Behaviour::Answer,
            calls: Mutex::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            behaviour: Behaviour::Fail,
            ..Self::answers(&[])
        }
    }

    pub fn stalled() -> Self {
        Self {
            behaviour: Behaviour::Stall,
            ..Self::answers(&[])
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    /// Content of the last user message sent.
    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = bump(&self.calls);
        *self.last_prompt.lock().unwrap() = request.messages.last().map(|m| m.content.clone());

        match self.behaviour {
            Behaviour::Fail => Err(ProviderError::Network("provider down".into())),
            Behaviour::Stall => {
                stall().await;
                Err(ProviderError::Timeout("unreachable".into()))
            }
            Behaviour::Answer => {
                let content = self
                    .answers
                    .get(call - 1)
                    .or_else(|| self.answers.last())
                    .cloned()
                    .unwrap_or_default();
                Ok(ProviderResponse {
                    content,
                    model: request.model,
                    usage: Some(Usage {
                        prompt_tokens: 10,
                        completion_tokens: 5,
                        total_tokens: 15,
                    }),
                })
            }
        }
    }
}

// ── Agent ───────────────────────────────────────────────────────────────

/// An agent that replays scripted replies, for router tests.
pub struct ScriptedAgent {
    role: AgentRole,
    replies: Mutex<VecDeque<Result<AgentReply, AgentError>>>,
    behaviour: Behaviour,
    delay: Option<Duration>,
    calls: Mutex<usize>,
}

impl ScriptedAgent {
    fn new(role: AgentRole, replies: Vec<Result<AgentReply, AgentError>>) -> Self {
        Self {
            role,
            replies: Mutex::new(replies.into()),
            behaviour: Behaviour::Answer,
            delay: None,
            calls: Mutex::new(0),
        }
    }

    pub fn receptionist(replies: Vec<Result<AgentReply, AgentError>>) -> Self {
        Self::new(AgentRole::Receptionist, replies)
    }

    pub fn clinical(replies: Vec<Result<AgentReply, AgentError>>) -> Self {
        Self::new(AgentRole::Clinical, replies)
    }

    pub fn stalled(role: AgentRole) -> Self {
        Self {
            behaviour: Behaviour::Stall,
            ..Self::new(role, vec![])
        }
    }

    /// Sleep before answering, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn role(&self) -> AgentRole {
        self.role
    }

    async fn handle(&self, _session: &Session, _turn: &Turn) -> Result<AgentReply, AgentError> {
        bump(&self.calls);
        if self.behaviour == Behaviour::Stall {
            stall().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| {
            panic!("ScriptedAgent({}): no more replies", self.role);
        })
    }
}
