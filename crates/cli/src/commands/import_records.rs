//! `carebridge import-records` — Load discharge reports into the record store.

use carebridge_config::{AppConfig, RecordsBackend};
use carebridge_records::{SqliteRecordStore, parse_patients};
use std::path::Path;

use crate::bootstrap;

pub async fn run(file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let content = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("Cannot read {}: {e}", file.display()))?;
    let patients = parse_patients(&content)?;

    match config.records.backend {
        RecordsBackend::Sqlite => {
            let db = &config.records.path;
            if let Some(parent) = db.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let store = SqliteRecordStore::new(&bootstrap::sqlite_url(db)).await?;
            let written = store.import(&patients).await?;
            println!("✅ Imported {written} patient records into {}", db.display());
            println!("   Store now holds {} records", store.count().await?);
        }
        RecordsBackend::Json => {
            println!("✅ {} valid patient records in {}", patients.len(), file.display());
            println!(
                "   The JSON backend reads {} directly; set [records] backend = \"sqlite\" to import.",
                config.records.path.display()
            );
        }
    }
    Ok(())
}
