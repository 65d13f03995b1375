//! In-memory record store, loaded from a discharge-report JSON file.
//! Also the store used by tests.

use async_trait::async_trait;
use carebridge_core::error::RecordError;
use carebridge_core::patient::{NameLookup, Patient, RecordStore, names_match};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::parse_patients;

pub struct InMemoryRecordStore {
    patients: Arc<RwLock<Vec<Patient>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::from_patients(Vec::new())
    }

    pub fn from_patients(patients: Vec<Patient>) -> Self {
        Self {
            patients: Arc::new(RwLock::new(patients)),
        }
    }

    /// Load a JSON list (or single object) of patients from disk.
    pub async fn load_json(path: &Path) -> Result<Self, RecordError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            RecordError::Unavailable(format!("Cannot read {}: {e}", path.display()))
        })?;
        let patients = parse_patients(&content)?;
        info!(count = patients.len(), path = %path.display(), "Loaded patient records");
        Ok(Self::from_patients(patients))
    }

    pub async fn insert(&self, patient: Patient) {
        self.patients.write().await.push(patient);
    }

    pub async fn count(&self) -> usize {
        self.patients.read().await.len()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn name(&self) -> &str {
        "json"
    }

    async fn find_by_name(&self, name: &str) -> Result<NameLookup, RecordError> {
        let patients = self.patients.read().await;
        let matches = patients
            .iter()
            .filter(|p| names_match(&p.patient_name, name))
            .cloned()
            .collect();
        Ok(NameLookup::from_matches(matches))
    }

    async fn find_by_id(&self, patient_id: &str) -> Result<Option<Patient>, RecordError> {
        let patients = self.patients.read().await;
        Ok(patients
            .iter()
            .find(|p| p.patient_id == patient_id.trim())
            .cloned())
    }
}
