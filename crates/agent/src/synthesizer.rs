//! Answer Synthesizer — turns retrieved material into patient-facing text.
//!
//! The language model only phrases answers; it never decides where they
//! come from. When the model is missing, failing or slow, the synthesizer
//! degrades to an extractive answer built from the same material.

use carebridge_core::error::ProviderError;
use carebridge_core::message::Message;
use carebridge_core::patient::Patient;
use carebridge_core::provider::{Provider, ProviderRequest};
use carebridge_core::tool::Passage;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Passages quoted verbatim in the extractive fallback.
const EXTRACTIVE_PASSAGES: usize = 2;

/// Characters of a search summary kept in the extractive fallback.
const EXTRACTIVE_SUMMARY_CHARS: usize = 1200;

const SYSTEM_PROMPT: &str = "You are a clinical assistant for patients recently discharged \
from a nephrology ward. Answer the question using ONLY the material provided. Be concise \
and plain-spoken. Do not add facts that are not in the material. Do not give individual \
dosing changes; tell the patient to contact their care team for those.";

pub struct AnswerSynthesizer {
    provider: Option<Arc<dyn Provider>>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl AnswerSynthesizer {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider: Some(provider),
            model: model.into(),
            temperature: 0.2,
            max_tokens: Some(1024),
            timeout: Duration::from_secs(30),
        }
    }

    /// A synthesizer with no model; every answer is extractive.
    pub fn offline() -> Self {
        Self {
            provider: None,
            model: String::new(),
            temperature: 0.0,
            max_tokens: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_offline(&self) -> bool {
        self.provider.is_none()
    }

    /// Answer from reference passages only.
    pub async fn from_passages(
        &self,
        question: &str,
        passages: &[Passage],
        patient: Option<&Patient>,
    ) -> String {
        let material = passages
            .iter()
            .enumerate()
            .map(|(i, p)| format!("[{}] {}", i + 1, p.text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n");

        match self.generate(question, "Reference passages", &material, patient).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Synthesizer unavailable; answering extractively from passages");
                extract_passages(passages)
            }
        }
    }

    /// Answer from a web search summary only.
    pub async fn from_search(
        &self,
        question: &str,
        summary: &str,
        patient: Option<&Patient>,
    ) -> String {
        match self.generate(question, "Web search results", summary, patient).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Synthesizer unavailable; answering extractively from search");
                extract_summary(summary)
            }
        }
    }

    async fn generate(
        &self,
        question: &str,
        material_label: &str,
        material: &str,
        patient: Option<&Patient>,
    ) -> Result<String, ProviderError> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured("no synthesizer model".into()))?;

        let mut context = format!("{material_label}:\n{material}");
        if let Some(patient) = patient {
            context.push_str(&format!(
                "\n\nPatient context (for tailoring only):\n{}",
                patient.discharge_summary()
            ));
        }

        let request = ProviderRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(format!("{context}\n\nQuestion: {question}")),
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(provider = provider.name(), model = %self.model, "Synthesizing answer");

        let response = tokio::time::timeout(self.timeout, provider.complete(request))
            .await
            .map_err(|_| {
                ProviderError::Timeout(format!("no answer within {}ms", self.timeout.as_millis()))
            })??;

        let text = response.content.trim();
        if text.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: "empty completion".into(),
            });
        }
        Ok(text.to_string())
    }
}

fn extract_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .take(EXTRACTIVE_PASSAGES)
        .map(|p| p.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn extract_summary(summary: &str) -> String {
    let summary = summary.trim();
    match summary.char_indices().nth(EXTRACTIVE_SUMMARY_CHARS) {
        Some((cut, _)) => format!("{}…", &summary[..cut]),
        None => summary.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedProvider, john_smith};

    fn passages() -> Vec<Passage> {
        vec![
            Passage::new("CKD symptoms include fatigue.", 0.9),
            Passage::new("Swelling of the ankles is common.", 0.7),
            Passage::new("Unrelated third passage.", 0.2),
        ]
    }

    #[tokio::test]
    async fn model_answer_is_used() {
        let provider = Arc::new(ScriptedProvider::answers(&["Fatigue and swelling."]));
        let synth = AnswerSynthesizer::new(provider.clone(), "mock-model");
        let answer = synth.from_passages("symptoms?", &passages(), None).await;
        assert_eq!(answer, "Fatigue and swelling.");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn prompt_carries_material_and_patient() {
        let provider = Arc::new(ScriptedProvider::answers(&["ok"]));
        let synth = AnswerSynthesizer::new(provider.clone(), "mock-model");
        synth
            .from_passages("symptoms?", &passages(), Some(&john_smith()))
            .await;

        let prompt = provider.last_prompt().unwrap();
        assert!(prompt.contains("[1] CKD symptoms include fatigue."));
        assert!(prompt.contains("Lisinopril"));
        assert!(prompt.ends_with("Question: symptoms?"));
    }

    #[tokio::test]
    async fn offline_is_extractive() {
        let synth = AnswerSynthesizer::offline();
        let answer = synth.from_passages("symptoms?", &passages(), None).await;
        assert!(answer.contains("fatigue"));
        assert!(answer.contains("ankles"));
        assert!(!answer.contains("Unrelated"));
    }

    #[tokio::test]
    async fn provider_failure_degrades_to_extract() {
        let provider = Arc::new(ScriptedProvider::failing());
        let synth = AnswerSynthesizer::new(provider, "mock-model");
        let answer = synth.from_search("kdigo?", "KDIGO 2024 guideline text.", None).await;
        assert_eq!(answer, "KDIGO 2024 guideline text.");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_degrades_to_extract() {
        let provider = Arc::new(ScriptedProvider::stalled());
        let synth = AnswerSynthesizer::new(provider, "mock-model")
            .with_timeout(Duration::from_millis(100));
        let answer = synth.from_passages("symptoms?", &passages(), None).await;
        assert!(answer.starts_with("CKD symptoms"));
    }

    #[test]
    fn long_summary_is_truncated_on_char_boundary() {
        let long = "é".repeat(EXTRACTIVE_SUMMARY_CHARS + 10);
        let cut = extract_summary(&long);
        assert_eq!(cut.chars().count(), EXTRACTIVE_SUMMARY_CHARS + 1);
        assert!(cut.ends_with('…'));
    }
}
