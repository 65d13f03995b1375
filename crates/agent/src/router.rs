//! Conversation Router — the only code that mutates a session.
//!
//! One `dispatch` appends exactly two turns (incoming and outgoing) and
//! moves `active_agent` at most once. Agent failures, protocol violations
//! and timeouts become a SYSTEM turn with `active_agent` left where it was.

use carebridge_core::agent::{Agent, AgentReply, AgentRole, HandoffSignal, SessionEffect};
use carebridge_core::error::AgentError;
use carebridge_core::event::{DomainEvent, EventBus, preview};
use carebridge_core::session::{Session, SessionId, Turn};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

const FAILURE_TURN: &str = "The assistant could not complete this request";

/// What a successful dispatch resolved to, before it touches the session.
struct Resolution {
    turn: Turn,
    effects: Vec<SessionEffect>,
    handoff: Option<HandoffSignal>,
}

pub struct ConversationRouter {
    receptionist: Arc<dyn Agent>,
    clinical: Arc<dyn Agent>,
    dispatch_timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl ConversationRouter {
    pub fn new(receptionist: Arc<dyn Agent>, clinical: Arc<dyn Agent>) -> Self {
        Self {
            receptionist,
            clinical,
            dispatch_timeout: Duration::from_secs(90),
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = timeout;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// A fresh session owned by the receptionist.
    pub fn new_session(&self, id: SessionId) -> Session {
        self.new_session_with(id, AgentRole::Receptionist)
    }

    pub fn new_session_with(&self, id: SessionId, initial_agent: AgentRole) -> Session {
        debug!(session_id = %id, agent = %initial_agent, "Session created");
        Session::new(id, initial_agent)
    }

    fn agent(&self, role: AgentRole) -> &Arc<dyn Agent> {
        match role {
            AgentRole::Receptionist => &self.receptionist,
            AgentRole::Clinical => &self.clinical,
        }
    }

    /// Handle one incoming turn and return the outgoing one.
    pub async fn dispatch(&self, session: &mut Session, incoming: Turn) -> Turn {
        let active = session.active_agent();
        self.append(session, incoming.clone());

        let outcome = match tokio::time::timeout(
            self.dispatch_timeout,
            self.resolve(session, active, &incoming),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AgentError::Timeout {
                timeout_ms: self.dispatch_timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(resolution) => self.commit(session, resolution),
            Err(e) => self.fail(session, active, e),
        }
    }

    async fn resolve(
        &self,
        session: &Session,
        active: AgentRole,
        incoming: &Turn,
    ) -> Result<Resolution, AgentError> {
        let first = self.agent(active).handle(session, incoming).await?;
        let AgentReply {
            content,
            provenance,
            handoff,
            effect,
        } = first;

        let Some(handoff) = handoff else {
            return Ok(Resolution {
                turn: Turn::agent(active, content).with_provenance(provenance),
                effects: effect.into_iter().collect(),
                handoff: None,
            });
        };

        if handoff.from != active || handoff.to == active {
            return Err(AgentError::Protocol(format!(
                "{active} requested a handoff from {} to {}",
                handoff.from, handoff.to
            )));
        }

        if !handoff.forward_turn {
            return Ok(Resolution {
                turn: Turn::agent(active, content).with_provenance(provenance),
                effects: effect.into_iter().collect(),
                handoff: Some(handoff),
            });
        }

        debug!(from = %handoff.from, to = %handoff.to, "Forwarding turn to target agent");
        let second = self.agent(handoff.to).handle(session, incoming).await?;
        if let Some(again) = second.handoff {
            return Err(AgentError::HandoffLoop {
                first: format!("{} -> {}", handoff.from, handoff.to),
                second: format!("{} -> {}", again.from, again.to),
            });
        }

        Ok(Resolution {
            turn: Turn::agent(handoff.to, second.content).with_provenance(second.provenance),
            effects: effect.into_iter().chain(second.effect).collect(),
            handoff: Some(handoff),
        })
    }

    fn commit(&self, session: &mut Session, resolution: Resolution) -> Turn {
        let Resolution {
            turn,
            effects,
            handoff,
        } = resolution;

        let outgoing = self.append(session, turn);
        for effect in effects {
            session.apply(effect);
        }

        if let Some(handoff) = handoff {
            info!(
                session_id = %session.id(),
                "Agent handoff from {} to {}. Reason: {}",
                handoff.from,
                handoff.to,
                handoff.reason.as_deref().unwrap_or("unspecified")
            );
            session.transfer_to(handoff.to, handoff.reason.clone());
            self.event_bus.publish(DomainEvent::HandoffCompleted {
                session_id: session.id().to_string(),
                from: handoff.from,
                to: handoff.to,
                reason: handoff.reason,
                timestamp: Utc::now(),
            });
        }
        outgoing
    }

    fn fail(&self, session: &mut Session, active: AgentRole, err: AgentError) -> Turn {
        error!(session_id = %session.id(), agent = %active, error = %err, "Dispatch failed");
        self.event_bus.publish(DomainEvent::DispatchFailed {
            session_id: session.id().to_string(),
            agent: active,
            error_message: err.to_string(),
            timestamp: Utc::now(),
        });
        self.append(
            session,
            Turn::system(format!("{FAILURE_TURN}: {err}. Please try again.")),
        )
    }

    fn append(&self, session: &mut Session, turn: Turn) -> Turn {
        let appended = session.append(turn).clone();
        self.event_bus.publish(DomainEvent::TurnAppended {
            session_id: session.id().to_string(),
            role: appended.role,
            source_agent: appended.source_agent,
            content_preview: preview(&appended.content, 80),
            timestamp: appended.timestamp,
        });
        appended
    }
}
