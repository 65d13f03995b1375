//! Configuration loading, validation, and management for carebridge.
//!
//! Loads configuration from `~/.carebridge/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The root configuration structure.
///
/// Maps directly to `~/.carebridge/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider used by the answer synthesizer
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Patient record store
    #[serde(default)]
    pub records: RecordsConfig,

    /// Reference corpus index
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Clinical agent policy
    #[serde(default)]
    pub clinical: ClinicalConfig,

    /// Receptionist agent policy
    #[serde(default)]
    pub receptionist: ReceptionistConfig,

    /// Web search fallback
    #[serde(default)]
    pub web_search: WebSearchConfig,

    /// Per-collaborator timeouts
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Log file configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("records", &self.records)
            .field("knowledge", &self.knowledge)
            .field("clinical", &self.clinical)
            .field("receptionist", &self.receptionist)
            .field("web_search", &self.web_search)
            .field("timeouts", &self.timeouts)
            .field("gateway", &self.gateway)
            .field("logging", &self.logging)
            .field("providers", &self.providers)
            .finish()
    }
}

/// Per-provider overrides.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Which record store backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordsBackend {
    /// A JSON file loaded into memory at startup
    Json,
    /// A SQLite database file
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    #[serde(default = "default_records_backend")]
    pub backend: RecordsBackend,

    /// JSON file or SQLite database path; relative paths resolve against
    /// the working directory
    #[serde(default = "default_records_path")]
    pub path: PathBuf,
}

fn default_records_backend() -> RecordsBackend {
    RecordsBackend::Json
}
fn default_records_path() -> PathBuf {
    PathBuf::from("data/patient_reports.json")
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            backend: default_records_backend(),
            path: default_records_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Where `carebridge ingest` writes and the retriever reads the index
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Embedding model; keyword scoring is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,

    /// Provider that serves `embedding_model`; the default provider when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_provider: Option<String>,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/knowledge_index.json")
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            embedding_model: None,
            embedding_provider: None,
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalConfig {
    /// Retrieval confidence must exceed this to answer from reference only
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Passages requested from the retriever
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Refuse queries containing any of `sensitive_terms`
    #[serde(default)]
    pub refuse_sensitive: bool,

    #[serde(default = "default_sensitive_terms")]
    pub sensitive_terms: Vec<String>,

    /// Phrases that end the clinical consultation
    #[serde(default = "default_exit_phrases")]
    pub exit_phrases: Vec<String>,
}

fn default_confidence_threshold() -> f32 {
    0.5
}
fn default_top_k() -> usize {
    4
}
fn default_sensitive_terms() -> Vec<String> {
    [
        "overdose",
        "lethal dose",
        "suicide",
        "self-harm",
        "stop taking all",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_exit_phrases() -> Vec<String> {
    [
        "back to reception",
        "talk to the receptionist",
        "end consultation",
        "no more questions",
        "that's all",
        "thats all",
        "goodbye",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for ClinicalConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            top_k: default_top_k(),
            refuse_sensitive: false,
            sensitive_terms: default_sensitive_terms(),
            exit_phrases: default_exit_phrases(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceptionistConfig {
    /// Ask for the patient ID after a name match before granting access
    #[serde(default = "default_true")]
    pub require_id_confirmation: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReceptionistConfig {
    fn default() -> Self {
        Self {
            require_id_confirmation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebSearchBackend {
    /// DuckDuckGo instant-answer API
    Duckduckgo,
    /// Canned, network-free results
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_web_backend")]
    pub backend: WebSearchBackend,

    #[serde(default = "default_web_endpoint")]
    pub endpoint: String,

    /// Retries for transient failures; at most 1
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_web_backend() -> WebSearchBackend {
    WebSearchBackend::Duckduckgo
}
fn default_web_endpoint() -> String {
    "https://api.duckduckgo.com/".into()
}
fn default_max_retries() -> u32 {
    1
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            backend: default_web_backend(),
            endpoint: default_web_endpoint(),
            max_retries: default_max_retries(),
        }
    }
}

/// Timeouts in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_record_store_ms")]
    pub record_store: u64,

    #[serde(default = "default_retriever_ms")]
    pub retriever: u64,

    #[serde(default = "default_web_search_ms")]
    pub web_search: u64,

    #[serde(default = "default_synthesizer_ms")]
    pub synthesizer: u64,

    /// Upper bound for a whole dispatch, including all tool calls
    #[serde(default = "default_dispatch_ms")]
    pub dispatch: u64,
}

fn default_record_store_ms() -> u64 {
    5_000
}
fn default_retriever_ms() -> u64 {
    10_000
}
fn default_web_search_ms() -> u64 {
    10_000
}
fn default_synthesizer_ms() -> u64 {
    30_000
}
fn default_dispatch_ms() -> u64 {
    90_000
}

impl TimeoutsConfig {
    pub fn record_store(&self) -> Duration {
        Duration::from_millis(self.record_store)
    }
    pub fn retriever(&self) -> Duration {
        Duration::from_millis(self.retriever)
    }
    pub fn web_search(&self) -> Duration {
        Duration::from_millis(self.web_search)
    }
    pub fn synthesizer(&self) -> Duration {
        Duration::from_millis(self.synthesizer)
    }
    pub fn dispatch(&self) -> Duration {
        Duration::from_millis(self.dispatch)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            record_store: default_record_store_ms(),
            retriever: default_retriever_ms(),
            web_search: default_web_search_ms(),
            synthesizer: default_synthesizer_ms(),
            dispatch: default_dispatch_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for per-run log files; console only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.carebridge/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `CAREBRIDGE_API_KEY` (highest priority)
    /// - `GOOGLE_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("CAREBRIDGE_API_KEY")
                .ok()
                .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("CAREBRIDGE_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("CAREBRIDGE_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".carebridge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.clinical.confidence_threshold) {
            return Err(ConfigError::ValidationError(
                "clinical.confidence_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.clinical.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "clinical.top_k must be > 0".into(),
            ));
        }

        if self.knowledge.chunk_size == 0
            || self.knowledge.chunk_overlap >= self.knowledge.chunk_size
        {
            return Err(ConfigError::ValidationError(
                "knowledge.chunk_overlap must be smaller than a non-zero chunk_size".into(),
            ));
        }

        let t = &self.timeouts;
        for (name, ms) in [
            ("record_store", t.record_store),
            ("retriever", t.retriever),
            ("web_search", t.web_search),
            ("synthesizer", t.synthesizer),
            ("dispatch", t.dispatch),
        ] {
            if ms == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "timeouts.{name} must be > 0"
                )));
            }
        }

        if self.web_search.max_retries > 1 {
            return Err(ConfigError::ValidationError(
                "web_search.max_retries must be 0 or 1".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            records: RecordsConfig::default(),
            knowledge: KnowledgeConfig::default(),
            clinical: ClinicalConfig::default(),
            receptionist: ReceptionistConfig::default(),
            web_search: WebSearchConfig::default(),
            timeouts: TimeoutsConfig::default(),
            gateway: GatewayConfig::default(),
            logging: LoggingConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for carebridge_core::Error {
    fn from(e: ConfigError) -> Self {
        carebridge_core::Error::Config {
            message: e.to_string(),
        }
    }
}
