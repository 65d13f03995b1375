//! SQLite record store.
//!
//! One `patients` table keyed by `patient_id`; the full record is kept as
//! JSON in `record` so extra discharge-report fields survive a round trip.
//! Name lookups go through `name_lower`, folded in Rust: SQLite's own
//! `lower()` only folds ASCII.
//! Writes happen only through [`SqliteRecordStore::import`] (batch loading),
//! never from the agents.

use async_trait::async_trait;
use carebridge_core::error::RecordError;
use carebridge_core::patient::{NameLookup, Patient, RecordStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if missing) a SQLite record store.
    ///
    /// Pass `":memory:"` for an ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, RecordError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| RecordError::Unavailable(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| RecordError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite record store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, RecordError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), RecordError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS patients (
                patient_id    TEXT PRIMARY KEY NOT NULL,
                patient_name  TEXT NOT NULL,
                name_lower    TEXT NOT NULL,
                record        TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RecordError::Unavailable(format!("patients table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_patients_name_lower ON patients(name_lower)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RecordError::Unavailable(format!("name index: {e}")))?;

        debug!("SQLite record migrations complete");
        Ok(())
    }

    /// Insert or replace patients by `patient_id`. Returns the number written.
    pub async fn import(&self, patients: &[Patient]) -> Result<usize, RecordError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RecordError::QueryFailed(format!("BEGIN failed: {e}")))?;

        for patient in patients {
            let record = serde_json::to_string(patient)
                .map_err(|e| RecordError::InvalidRecord(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO patients (patient_id, patient_name, name_lower, record)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(patient_id) DO UPDATE SET
                    patient_name = excluded.patient_name,
                    name_lower = excluded.name_lower,
                    record = excluded.record
                "#,
            )
            .bind(&patient.patient_id)
            .bind(patient.patient_name.trim())
            .bind(name_key(&patient.patient_name))
            .bind(&record)
            .execute(&mut *tx)
            .await
            .map_err(|e| RecordError::QueryFailed(format!("INSERT failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| RecordError::QueryFailed(format!("COMMIT failed: {e}")))?;

        info!(count = patients.len(), "Imported patient records");
        Ok(patients.len())
    }

    pub async fn count(&self) -> Result<usize, RecordError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM patients")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RecordError::QueryFailed(format!("COUNT failed: {e}")))?;
        let n: i64 = row
            .try_get("n")
            .map_err(|e| RecordError::QueryFailed(format!("n column: {e}")))?;
        Ok(n as usize)
    }

    fn row_to_patient(row: &sqlx::sqlite::SqliteRow) -> Result<Patient, RecordError> {
        let record: String = row
            .try_get("record")
            .map_err(|e| RecordError::QueryFailed(format!("record column: {e}")))?;
        serde_json::from_str(&record).map_err(|e| RecordError::InvalidRecord(e.to_string()))
    }
}

/// Lookup key with the same folding as [`carebridge_core::patient::names_match`].
fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find_by_name(&self, name: &str) -> Result<NameLookup, RecordError> {
        // Bound parameter, so regex/LIKE metacharacters in names are inert.
        let rows = sqlx::query("SELECT record FROM patients WHERE name_lower = ?1")
            .bind(name_key(name))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RecordError::QueryFailed(format!("name lookup: {e}")))?;

        let matches = rows
            .iter()
            .map(Self::row_to_patient)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NameLookup::from_matches(matches))
    }

    async fn find_by_id(&self, patient_id: &str) -> Result<Option<Patient>, RecordError> {
        let row = sqlx::query("SELECT record FROM patients WHERE patient_id = ?1")
            .bind(patient_id.trim())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RecordError::QueryFailed(format!("id lookup: {e}")))?;

        row.as_ref().map(Self::row_to_patient).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteRecordStore {
        SqliteRecordStore::new("sqlite::memory:").await.unwrap()
    }

    fn patient(id: &str, name: &str) -> Patient {
        serde_json::from_value(serde_json::json!({
            "patient_id": id,
            "patient_name": name,
            "primary_diagnosis": "Chronic Kidney Disease Stage 3",
            "medications": ["Lisinopril 10mg", "Furosemide 20mg"],
            "dietary_restrictions": "Low sodium",
            "follow_up": "Nephrology in 2 weeks",
            "discharge_date": "2024-05-01"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn import_and_find_by_id() {
        let db = test_store().await;
        db.import(&[patient("P001", "John Smith")]).await.unwrap();

        let found = db.find_by_id("P001").await.unwrap().unwrap();
        assert_eq!(found.patient_name, "John Smith");
        assert_eq!(found.medications.len(), 2);
        assert_eq!(found.extra["discharge_date"], "2024-05-01");
        assert!(db.find_by_id("P404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn name_lookup_outcomes() {
        let db = test_store().await;
        db.import(&[
            patient("P001", "John Smith"),
            patient("P002", "Maria Garcia"),
            patient("P003", "maria garcia"),
        ])
        .await
        .unwrap();

        assert!(matches!(
            db.find_by_name("john SMITH").await.unwrap(),
            NameLookup::Unique(p) if p.patient_id == "P001"
        ));
        assert_eq!(
            db.find_by_name("Maria Garcia").await.unwrap(),
            NameLookup::Multiple(2)
        );
        assert_eq!(db.find_by_name("Smith").await.unwrap(), NameLookup::NotFound);
        assert_eq!(db.find_by_name("J%").await.unwrap(), NameLookup::NotFound);
    }

    #[tokio::test]
    async fn name_lookup_folds_non_ascii_case() {
        let db = test_store().await;
        db.import(&[patient("P010", "José Núñez"), patient("P011", "Ærin Østergaard")])
            .await
            .unwrap();

        assert!(matches!(
            db.find_by_name("JOSÉ NÚÑEZ").await.unwrap(),
            NameLookup::Unique(p) if p.patient_id == "P010"
        ));
        assert!(matches!(
            db.find_by_name("  ærin østergaard ").await.unwrap(),
            NameLookup::Unique(p) if p.patient_id == "P011"
        ));
        assert_eq!(db.find_by_name("Jose Nunez").await.unwrap(), NameLookup::NotFound);
    }

    #[tokio::test]
    async fn reimport_upserts_by_id() {
        let db = test_store().await;
        db.import(&[patient("P001", "John Smith")]).await.unwrap();
        db.import(&[patient("P001", "Jon Smith")]).await.unwrap();

        assert_eq!(db.count().await.unwrap(), 1);
        let p = db.find_by_id("P001").await.unwrap().unwrap();
        assert_eq!(p.patient_name, "Jon Smith");
    }

    #[tokio::test]
    async fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patients.db");
        let url = format!("sqlite://{}", path.display());

        {
            let db = SqliteRecordStore::new(&url).await.unwrap();
            db.import(&[patient("P001", "John Smith")]).await.unwrap();
        }

        let reopened = SqliteRecordStore::new(&url).await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
