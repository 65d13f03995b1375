pub mod chat;
pub mod import_records;
pub mod ingest;
pub mod onboard;
pub mod serve;
pub mod status;
