//! DuckDuckGo instant-answer search.
//!
//! Calls `https://api.duckduckgo.com/?q=…&format=json&no_html=1` and flattens
//! the abstract, direct answer, definition and related topics into one
//! free-text summary.

use async_trait::async_trait;
use carebridge_core::error::ToolError;
use carebridge_core::tool::WebSearch;
use serde::Deserialize;
use tracing::{debug, warn};

const TOOL_NAME: &str = "web_search";
const DEFAULT_ENDPOINT: &str = "https://api.duckduckgo.com/";

/// Related topics folded into the summary.
const MAX_TOPICS: usize = 5;

pub struct DuckDuckGoSearch {
    endpoint: String,
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("carebridge/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    fn unavailable(reason: impl Into<String>) -> ToolError {
        ToolError::Unavailable {
            tool_name: TOOL_NAME.into(),
            reason: reason.into(),
        }
    }

    fn failed(reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: reason.into(),
        }
    }
}

impl Default for DuckDuckGoSearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    async fn search(&self, query: &str) -> Result<String, ToolError> {
        if query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("empty search query".into()));
        }

        debug!(query, "Querying DuckDuckGo");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| Self::unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() || status.as_u16() == 429 {
            warn!(status = status.as_u16(), "Web search backend unavailable");
            return Err(Self::unavailable(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(Self::failed(format!("HTTP {status}")));
        }

        // The API sometimes labels JSON as javascript; parse the text directly.
        let body = response
            .text()
            .await
            .map_err(|e| Self::unavailable(e.to_string()))?;
        let parsed: InstantAnswer =
            serde_json::from_str(&body).map_err(|e| Self::failed(format!("Bad response: {e}")))?;

        Ok(parsed.summary())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    abstract_text: String,
    #[serde(default)]
    abstract_source: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    definition: String,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a topic with text, or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RelatedTopic {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    topics: Vec<RelatedTopic>,
}

impl InstantAnswer {
    fn summary(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !self.abstract_text.trim().is_empty() {
            if self.abstract_source.is_empty() {
                parts.push(self.abstract_text.trim().to_string());
            } else {
                parts.push(format!(
                    "{} (source: {})",
                    self.abstract_text.trim(),
                    self.abstract_source
                ));
            }
        }
        for extra in [&self.answer, &self.definition] {
            if !extra.trim().is_empty() {
                parts.push(extra.trim().to_string());
            }
        }

        let mut topics = Vec::new();
        collect_topics(&self.related_topics, &mut topics);
        parts.extend(topics.into_iter().take(MAX_TOPICS).map(|t| format!("- {t}")));

        parts.join("\n")
    }
}

fn collect_topics(topics: &[RelatedTopic], out: &mut Vec<String>) {
    for topic in topics {
        if let Some(text) = topic.text.as_deref().filter(|t| !t.trim().is_empty()) {
            out.push(text.trim().to_string());
        }
        collect_topics(&topic.topics, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_flattens_abstract_and_topics() {
        let json = r#"{
            "AbstractText": "Chronic kidney disease is a progressive loss of kidney function.",
            "AbstractSource": "Wikipedia",
            "Answer": "",
            "Definition": "",
            "RelatedTopics": [
                {"Text": "KDIGO - Kidney Disease: Improving Global Outcomes", "FirstURL": "https://duckduckgo.com/KDIGO"},
                {"Name": "Guidelines", "Topics": [
                    {"Text": "2024 CKD guideline update", "FirstURL": "https://duckduckgo.com/x"}
                ]}
            ]
        }"#;
        let parsed: InstantAnswer = serde_json::from_str(json).unwrap();
        let summary = parsed.summary();
        assert!(summary.starts_with("Chronic kidney disease"));
        assert!(summary.contains("(source: Wikipedia)"));
        assert!(summary.contains("- KDIGO"));
        assert!(summary.contains("- 2024 CKD guideline update"));
    }

    #[test]
    fn empty_answer_gives_empty_summary() {
        let parsed: InstantAnswer = serde_json::from_str(r#"{"RelatedTopics": []}"#).unwrap();
        assert!(parsed.summary().is_empty());
    }

    #[test]
    fn topics_are_capped() {
        let topics: Vec<String> = (0..10)
            .map(|i| format!(r#"{{"Text": "topic {i}"}}"#))
            .collect();
        let json = format!(r#"{{"RelatedTopics": [{}]}}"#, topics.join(","));
        let parsed: InstantAnswer = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.summary().lines().count(), MAX_TOPICS);
    }

    #[tokio::test]
    async fn blank_query_rejected() {
        let search = DuckDuckGoSearch::new();
        assert!(matches!(
            search.search("   ").await,
            Err(ToolError::InvalidArguments(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transient() {
        // Port 9 (discard) on localhost refuses connections in test sandboxes.
        let search = DuckDuckGoSearch::with_endpoint("http://127.0.0.1:9/");
        let err = search.search("kdigo").await.unwrap_err();
        assert!(err.is_transient());
    }
}
