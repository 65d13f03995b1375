//! Agent contract — roles, replies and the handoff signal.
//!
//! An agent reads the session, answers the incoming turn, and may ask the
//! router to transfer control. It never mutates the session itself: state
//! changes travel back in the [`AgentReply`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::patient::Patient;
use crate::session::{Session, Turn};

/// The agent roles that can own a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Identity verification (default for new sessions)
    #[default]
    Receptionist,
    /// Medical questions and answers
    Clinical,
}

impl AgentRole {
    /// Label shown to patients next to a reply.
    pub fn label(&self) -> &'static str {
        match self {
            AgentRole::Receptionist => "Receptionist",
            AgentRole::Clinical => "Clinical Specialist",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Receptionist => write!(f, "receptionist"),
            AgentRole::Clinical => write!(f, "clinical"),
        }
    }
}

/// Where an answer segment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    ReferenceMaterials,
    WebSearch,
}

impl Provenance {
    pub fn label(&self) -> &'static str {
        match self {
            Provenance::ReferenceMaterials => "Reference Materials",
            Provenance::WebSearch => "Web Search",
        }
    }
}

/// A request from the active agent to transfer control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffSignal {
    pub from: AgentRole,
    pub to: AgentRole,

    /// Audit only; never affects routing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Hand the incoming turn to the target agent within the same dispatch
    #[serde(default)]
    pub forward_turn: bool,
}

impl HandoffSignal {
    /// Build a handoff. `from` and `to` must differ.
    pub fn new(from: AgentRole, to: AgentRole) -> Result<Self, AgentError> {
        if from == to {
            return Err(AgentError::Protocol(format!("{from} cannot hand off to itself")));
        }
        Ok(Self {
            from,
            to,
            reason: None,
            forward_turn: false,
        })
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn forwarding(mut self) -> Self {
        self.forward_turn = true;
        self
    }
}

/// A session change requested by an agent and applied by the router.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    /// Exactly one record matched the supplied name.
    PatientMatched(Patient),
    /// The patient proved identity (ID matched); full access granted.
    IdentityConfirmed(Patient),
}

/// What an agent returns for one incoming turn.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub content: String,
    pub provenance: Vec<Provenance>,
    pub handoff: Option<HandoffSignal>,
    pub effect: Option<SessionEffect>,
}

impl AgentReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            provenance: Vec::new(),
            handoff: None,
            effect: None,
        }
    }

    pub fn with_provenance(mut self, provenance: Vec<Provenance>) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn with_handoff(mut self, handoff: HandoffSignal) -> Self {
        self.handoff = Some(handoff);
        self
    }

    pub fn with_effect(mut self, effect: SessionEffect) -> Self {
        self.effect = Some(effect);
        self
    }
}

/// An agent that can own a conversation.
///
/// Implementations convert tool failures into answer text; an `Err` here
/// means the agent itself could not produce a reply.
#[async_trait]
pub trait Agent: Send + Sync {
    fn role(&self) -> AgentRole;

    async fn handle(&self, session: &Session, turn: &Turn) -> Result<AgentReply, AgentError>;
}
