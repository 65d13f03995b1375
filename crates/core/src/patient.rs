//! Patient records and the Record Store Accessor contract.
//!
//! Patients are owned by the external record store (batch loaded). The
//! conversational core only ever reads them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::RecordError;

/// A discharged patient as stored in the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub patient_id: String,
    pub patient_name: String,
    #[serde(default)]
    pub primary_diagnosis: String,
    #[serde(default)]
    pub medications: Vec<String>,
    #[serde(default)]
    pub dietary_restrictions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<String>,

    /// Any other discharge-report fields, carried through untouched.
    #[serde(flatten, default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Patient {
    /// Render the discharge summary shown once identity is confirmed.
    pub fn discharge_summary(&self) -> String {
        let medications = if self.medications.is_empty() {
            "None listed".to_string()
        } else {
            self.medications.join(", ")
        };
        format!(
            "Diagnosis: {}\nMedications: {}\nDietary Restrictions: {}\nFollow-up: {}",
            self.primary_diagnosis,
            medications,
            self.dietary_restrictions,
            self.follow_up.as_deref().unwrap_or("N/A"),
        )
    }
}

/// Outcome of a name lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum NameLookup {
    NotFound,
    Unique(Patient),
    /// More than one record shares the name; carries the match count.
    Multiple(usize),
}

impl NameLookup {
    /// Classify a list of matches the way every backend must.
    pub fn from_matches(mut matches: Vec<Patient>) -> Self {
        match matches.len() {
            0 => NameLookup::NotFound,
            1 => NameLookup::Unique(matches.remove(0)),
            n => NameLookup::Multiple(n),
        }
    }
}

/// Read-only access to patient records.
///
/// Name lookup is a case-insensitive exact match (never substring);
/// ID lookup is an exact match.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The backend name (e.g., "json", "sqlite").
    fn name(&self) -> &str;

    async fn find_by_name(&self, name: &str) -> Result<NameLookup, RecordError>;

    async fn find_by_id(&self, patient_id: &str) -> Result<Option<Patient>, RecordError>;
}

/// Case-insensitive exact name comparison shared by store implementations.
pub fn names_match(stored: &str, candidate: &str) -> bool {
    stored.trim().to_lowercase() == candidate.trim().to_lowercase()
}
