//! Session registry and the `Assistant` facade callers talk to.
//!
//! Sessions are keyed by an opaque caller-supplied (or generated) handle.
//! Each session sits behind its own async mutex, so dispatches for one
//! session are serialised while different sessions run in parallel.

use carebridge_core::agent::AgentRole;
use carebridge_core::error::SessionError;
use carebridge_core::session::{Session, SessionId, Turn, TurnRole};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::router::ConversationRouter;

pub type SessionHandle = Arc<Mutex<Session>>;

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session; an existing session under the same id is kept.
    pub fn insert(&self, session: Session) -> SessionHandle {
        let id = session.id().clone();
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(session)))
            .clone()
    }

    pub fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        sessions.get(id).cloned()
    }

    pub fn remove(&self, id: &SessionId) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        sessions.remove(id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The result of one `exchange`: the outgoing turn and who owns the
/// conversation afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    pub turn: Turn,
    pub active_agent: AgentRole,
}

impl Exchange {
    /// Reply text as shown to the patient, prefixed with the agent label.
    pub fn labelled(&self) -> String {
        match (self.turn.role, self.turn.source_agent) {
            (TurnRole::Agent, Some(agent)) => format!("{}: {}", agent.label(), self.turn.content),
            _ => format!("System: {}", self.turn.content),
        }
    }
}

/// Entry point for every front end: CLI, REST gateway and tests.
pub struct Assistant {
    router: ConversationRouter,
    sessions: SessionRegistry,
}

impl Assistant {
    pub fn new(router: ConversationRouter) -> Self {
        Self {
            router,
            sessions: SessionRegistry::new(),
        }
    }

    pub fn router(&self) -> &ConversationRouter {
        &self.router
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Start a conversation with the receptionist and return its handle.
    pub fn new_session(&self) -> SessionId {
        self.new_session_with_id(SessionId::new())
    }

    /// Start a conversation under a caller-chosen handle. An existing
    /// session with that handle is left untouched.
    pub fn new_session_with_id(&self, id: SessionId) -> SessionId {
        if !self.sessions.contains(&id) {
            self.sessions.insert(self.router.new_session(id.clone()));
            info!(session_id = %id, "New session");
        }
        id
    }

    /// Send one user message and return the reply text.
    pub async fn send_message(&self, id: &SessionId, text: &str) -> Result<String, SessionError> {
        Ok(self.exchange(id, text).await?.turn.content)
    }

    /// Send one user message and return the full outgoing turn.
    pub async fn exchange(&self, id: &SessionId, text: &str) -> Result<Exchange, SessionError> {
        let handle = self
            .sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let mut session = handle.lock().await;
        debug!(session_id = %id, agent = %session.active_agent(), "Dispatching message");
        let turn = self.router.dispatch(&mut session, Turn::user(text)).await;

        Ok(Exchange {
            turn,
            active_agent: session.active_agent(),
        })
    }

    /// A point-in-time copy of a session.
    pub async fn snapshot(&self, id: &SessionId) -> Result<Session, SessionError> {
        let handle = self
            .sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    pub fn end_session(&self, id: &SessionId) -> Result<(), SessionError> {
        self.sessions
            .remove(id)
            .map(|_| info!(session_id = %id, "Session ended"))
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }
}
