//! # carebridge core
//!
//! Domain types, collaborator traits, and error definitions for the
//! post-discharge patient assistant. This crate has **no framework
//! dependencies**: it defines the model every other crate implements
//! against.
//!
//! Every external collaborator (record store, knowledge retriever, web
//! search, language model) is a trait here so implementations can be
//! swapped by configuration and replaced by mocks in tests.

pub mod agent;
pub mod error;
pub mod event;
pub mod message;
pub mod patient;
pub mod provider;
pub mod session;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{Agent, AgentReply, AgentRole, HandoffSignal, Provenance, SessionEffect};
pub use error::{AgentError, Error, ProviderError, RecordError, Result, SessionError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{Message, Role};
pub use patient::{NameLookup, Patient, RecordStore};
pub use provider::{Provider, ProviderRequest, ProviderResponse};
pub use session::{HandoffRecord, Session, SessionId, Turn, TurnRole};
pub use tool::{KnowledgeRetriever, Passage, ToolInvocationResult, WebSearch};
