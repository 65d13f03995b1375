//! Receptionist Agent — verifies identity before clinical content is released.
//!
//! Verification is two-step by default: a unique name match asks for the
//! patient ID, and the matching ID confirms identity and releases the
//! discharge summary. Once confirmed, every further turn is forwarded to
//! the clinical agent.

use async_trait::async_trait;
use carebridge_config::ReceptionistConfig;
use carebridge_core::agent::{Agent, AgentReply, AgentRole, HandoffSignal, SessionEffect};
use carebridge_core::error::{AgentError, RecordError, ToolError};
use carebridge_core::event::{DomainEvent, EventBus};
use carebridge_core::patient::{NameLookup, Patient, RecordStore};
use carebridge_core::session::{Session, Turn};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::guard::{call_with_timeout, elapsed_ms};
use crate::intent;

const TOOL_NAME: &str = "record_store";

const WELCOME: &str = "Hello! I'm your post-discharge care assistant. \
To get started, please tell me your full name.";

const ASK_NAME: &str = "Please tell me your full name so I can find your discharge record.";

const RECORDS_UNAVAILABLE: &str = "I'm sorry, I'm having trouble accessing patient records \
right now. Please try again in a moment.";

pub struct ReceptionistAgent {
    records: Arc<dyn RecordStore>,
    require_id_confirmation: bool,
    timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl ReceptionistAgent {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            records,
            require_id_confirmation: true,
            timeout: Duration::from_secs(5),
            event_bus: Arc::new(EventBus::default()),
        }
    }

    pub fn with_config(mut self, config: &ReceptionistConfig) -> Self {
        self.require_id_confirmation = config.require_id_confirmation;
        self
    }

    /// Confirm identity on a unique name match, without asking for the ID.
    pub fn single_step(mut self) -> Self {
        self.require_id_confirmation = false;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    /// Run one record-store call under the timeout and report it.
    async fn lookup<T, Fut>(&self, fut: Fut) -> Result<T, ToolError>
    where
        Fut: Future<Output = Result<T, RecordError>>,
    {
        let start = Instant::now();
        let result = call_with_timeout(TOOL_NAME, self.timeout, async {
            fut.await.map_err(ToolError::from)
        })
        .await;

        self.event_bus.publish(DomainEvent::ToolInvoked {
            agent: AgentRole::Receptionist,
            tool_name: TOOL_NAME.into(),
            success: result.is_ok(),
            duration_ms: elapsed_ms(start),
            timestamp: Utc::now(),
        });
        if let Err(e) = &result {
            warn!(backend = self.records.name(), error = %e, "Record store lookup failed");
        }
        result
    }

    fn confirmed(&self, patient: Patient) -> AgentReply {
        info!(patient_id = %patient.patient_id, "Patient identity confirmed");
        let content = format!(
            "Thank you, {}. Your identity is confirmed. Here is a summary of your discharge report:\n\n{}\n\n\
             How are you feeling today? If you have any questions about your recovery, \
             medications or diet, just ask and I'll connect you with our clinical specialist.",
            patient.patient_name,
            patient.discharge_summary()
        );
        AgentReply::text(content).with_effect(SessionEffect::IdentityConfirmed(patient))
    }

    fn matched(&self, patient: Patient) -> AgentReply {
        if !self.require_id_confirmation {
            return self.confirmed(patient);
        }
        debug!(patient_id = %patient.patient_id, "Name matched; requesting patient ID");
        let content = format!(
            "Patient found: {}. Please enter your patient ID to confirm your identity.",
            patient.patient_name
        );
        AgentReply::text(content).with_effect(SessionEffect::PatientMatched(patient))
    }

    async fn by_name(&self, name: &str) -> Result<AgentReply, ToolError> {
        let reply = match self.lookup(self.records.find_by_name(name)).await? {
            NameLookup::NotFound => {
                info!(candidate = name, "No patient record matched");
                AgentReply::text(format!(
                    "I couldn't find a discharge record for \"{name}\". Please check the spelling \
                     of your full name, or give me your patient ID."
                ))
            }
            NameLookup::Multiple(count) => {
                info!(candidate = name, count, "Multiple patient records matched");
                AgentReply::text(format!(
                    "I found {count} patients named \"{name}\". To make sure I have the right \
                     record, please provide your patient ID."
                ))
            }
            NameLookup::Unique(patient) => self.matched(patient),
        };
        Ok(reply)
    }

    /// An ID given while unverified: a hit verifies at once, a miss falls
    /// back to treating the text as a name.
    async fn by_id(&self, candidate: &str) -> Result<AgentReply, ToolError> {
        match self.lookup(self.records.find_by_id(candidate)).await? {
            Some(patient) => Ok(self.confirmed(patient)),
            None => self.by_name(candidate).await,
        }
    }

    /// An ID given after a name match must belong to the matched record.
    async fn confirm_id(&self, matched: &Patient, candidate: &str) -> Result<AgentReply, ToolError> {
        match self.lookup(self.records.find_by_id(candidate)).await? {
            Some(patient) if patient.patient_id == matched.patient_id => Ok(self.confirmed(patient)),
            Some(_) | None => {
                info!(candidate, "Patient ID did not match the name on record");
                Ok(AgentReply::text(format!(
                    "That patient ID doesn't match our record for {}. Please check the ID on your \
                     discharge papers and try again.",
                    matched.patient_name
                )))
            }
        }
    }

    async fn verify(&self, session: &Session, content: &str) -> Result<AgentReply, ToolError> {
        if intent::is_greeting(content) {
            return Ok(AgentReply::text(WELCOME));
        }

        let candidate = intent::extract_candidate(content);
        if candidate.is_empty() {
            return Ok(AgentReply::text(ASK_NAME));
        }

        match (session.verified_patient(), intent::looks_like_patient_id(&candidate)) {
            (Some(matched), true) => self.confirm_id(matched, &candidate).await,
            (None, true) => self.by_id(&candidate).await,
            (_, false) => self.by_name(&candidate).await,
        }
    }
}

#[async_trait]
impl Agent for ReceptionistAgent {
    fn role(&self) -> AgentRole {
        AgentRole::Receptionist
    }

    async fn handle(&self, session: &Session, turn: &Turn) -> Result<AgentReply, AgentError> {
        if session.identity_confirmed() {
            let name = session
                .verified_patient()
                .map(|p| p.patient_name.as_str())
                .unwrap_or("there");

            if intent::is_farewell(&turn.content) {
                return Ok(AgentReply::text(format!(
                    "You're welcome, {name}. Take care, and come back any time you have questions \
                     about your recovery."
                )));
            }

            let handoff = HandoffSignal::new(AgentRole::Receptionist, AgentRole::Clinical)?
                .with_reason("identity confirmed; forwarding medical question")
                .forwarding();
            return Ok(AgentReply::text(format!(
                "Let me connect you with our clinical specialist, {name}."
            ))
            .with_handoff(handoff));
        }

        match self.verify(session, &turn.content).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                debug!(error = %e, "Answering with records-unavailable message");
                Ok(AgentReply::text(RECORDS_UNAVAILABLE))
            }
        }
    }
}
