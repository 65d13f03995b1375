//! Domain event system — the audit trail of a conversation.
//!
//! The router and agents publish events when turns are appended, tools are
//! invoked and control changes hands. Subscribers (loggers, the gateway,
//! tests) react without coupling to the routing code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::agent::AgentRole;
use crate::session::TurnRole;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A turn was appended to a session transcript
    TurnAppended {
        session_id: String,
        role: TurnRole,
        source_agent: Option<AgentRole>,
        content_preview: String,
        timestamp: DateTime<Utc>,
    },

    /// Control moved from one agent to another
    HandoffCompleted {
        session_id: String,
        from: AgentRole,
        to: AgentRole,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// An agent invoked one of its tools
    ToolInvoked {
        agent: AgentRole,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The clinical agent consulted the reference corpus
    RetrievalAttempted {
        query_preview: String,
        found: bool,
        confidence: Option<f32>,
        timestamp: DateTime<Utc>,
    },

    /// A dispatch ended in a SYSTEM turn instead of an agent answer
    DispatchFailed {
        session_id: String,
        agent: AgentRole,
        error_message: String,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Truncate text for event previews and log lines.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}
