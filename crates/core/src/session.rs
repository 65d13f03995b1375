//! Session and Turn domain types.
//!
//! A [`Session`] is one patient's conversation: which agent currently owns
//! it, the append-only transcript, and the identity verified so far.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::{AgentRole, Provenance, SessionEffect};
use crate::patient::Patient;

/// Opaque identifier for a session, caller-supplied or generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Agent,
    System,
}

/// One message exchanged in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub role: TurnRole,
    pub content: String,

    /// Which agent produced it (None for user and system turns)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_agent: Option<AgentRole>,

    /// Provenance tags of the answer segments, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provenance: Vec<Provenance>,

    pub timestamp: DateTime<Utc>,
}

impl Turn {
    fn build(role: TurnRole, content: String, source_agent: Option<AgentRole>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            source_agent,
            provenance: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::build(TurnRole::User, content.into(), None)
    }

    pub fn agent(agent: AgentRole, content: impl Into<String>) -> Self {
        Self::build(TurnRole::Agent, content.into(), Some(agent))
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::build(TurnRole::System, content.into(), None)
    }

    pub fn with_provenance(mut self, provenance: Vec<Provenance>) -> Self {
        self.provenance = provenance;
        self
    }
}

/// Audit entry for a completed handoff.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffRecord {
    pub from: AgentRole,
    pub to: AgentRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// One ongoing conversation.
///
/// The transcript is append-only and `active_agent` is always set. Both are
/// mutated only by the conversation router; agents see `&Session`.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: SessionId,
    active_agent: AgentRole,
    transcript: Vec<Turn>,
    verified_patient: Option<Patient>,
    identity_confirmed: bool,
    handoffs: Vec<HandoffRecord>,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session with an empty transcript and no verified patient.
    pub fn new(id: SessionId, initial_agent: AgentRole) -> Self {
        Self {
            id,
            active_agent: initial_agent,
            transcript: Vec::new(),
            verified_patient: None,
            identity_confirmed: false,
            handoffs: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn active_agent(&self) -> AgentRole {
        self.active_agent
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn verified_patient(&self) -> Option<&Patient> {
        self.verified_patient.as_ref()
    }

    /// True once the patient has confirmed identity (ID matched the record).
    pub fn identity_confirmed(&self) -> bool {
        self.identity_confirmed && self.verified_patient.is_some()
    }

    pub fn handoffs(&self) -> &[HandoffRecord] {
        &self.handoffs
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Append a turn, clamping its timestamp so the transcript never goes
    /// backwards in time.
    pub fn append(&mut self, mut turn: Turn) -> &Turn {
        if let Some(last) = self.transcript.last() {
            if turn.timestamp < last.timestamp {
                turn.timestamp = last.timestamp;
            }
        }
        self.transcript.push(turn);
        &self.transcript[self.transcript.len() - 1]
    }

    /// Move control to another agent and record the handoff.
    pub fn transfer_to(&mut self, to: AgentRole, reason: Option<String>) {
        let from = self.active_agent;
        self.active_agent = to;
        self.handoffs.push(HandoffRecord {
            from,
            to,
            reason,
            at: Utc::now(),
        });
    }

    /// Apply a state change requested by an agent reply.
    pub fn apply(&mut self, effect: SessionEffect) {
        match effect {
            SessionEffect::PatientMatched(patient) => {
                self.verified_patient = Some(patient);
                self.identity_confirmed = false;
            }
            SessionEffect::IdentityConfirmed(patient) => {
                self.verified_patient = Some(patient);
                self.identity_confirmed = true;
            }
        }
    }

    /// The most recent turn of the given role, if any.
    pub fn last_turn(&self, role: TurnRole) -> Option<&Turn> {
        self.transcript.iter().rev().find(|t| t.role == role)
    }
}
