//! Agents and conversation routing for carebridge.
//!
//! A conversation is owned by one of two agents at a time:
//!
//! 1. The **receptionist** verifies the patient's identity against the
//!    record store and shows their discharge summary.
//! 2. The **clinical** agent answers medical questions from the reference
//!    materials, falling back to a web search when they are insufficient.
//!
//! The [`ConversationRouter`] is the only component that mutates a
//! session; the [`Assistant`] keeps a registry of sessions and serialises
//! messages per session.

pub mod builder;
pub mod clinical;
pub mod guard;
pub mod intent;
pub mod receptionist;
pub mod registry;
pub mod router;
pub mod synthesizer;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use builder::{Collaborators, build_assistant};
pub use clinical::{ClinicalAgent, ClinicalPolicy};
pub use receptionist::ReceptionistAgent;
pub use registry::{Assistant, Exchange, SessionHandle, SessionRegistry};
pub use router::ConversationRouter;
pub use synthesizer::AnswerSynthesizer;
