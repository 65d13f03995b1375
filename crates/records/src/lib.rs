//! Patient record store implementations for carebridge.
//!
//! Both backends implement `carebridge_core::RecordStore` with the same
//! lookup rules: names match case-insensitively and exactly, IDs exactly.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryRecordStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRecordStore;

use carebridge_core::error::RecordError;
use carebridge_core::patient::Patient;

/// Parse a discharge-report document: a JSON list of patients or a single
/// patient object.
pub fn parse_patients(json: &str) -> Result<Vec<Patient>, RecordError> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| RecordError::InvalidRecord(format!("Invalid JSON: {e}")))?;

    let patients = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Patient>, _>>(),
        other => serde_json::from_value(other).map(|p| vec![p]),
    }
    .map_err(|e| RecordError::InvalidRecord(e.to_string()))?;

    if let Some(p) = patients.iter().find(|p| p.patient_id.trim().is_empty()) {
        return Err(RecordError::InvalidRecord(format!(
            "record for '{}' has an empty patient_id",
            p.patient_name
        )));
    }

    Ok(patients)
}
