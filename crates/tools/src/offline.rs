//! Offline web search — canned summaries, no network.
//!
//! Used with `[web_search] backend = "offline"` for demos and air-gapped
//! deployments. Queries matching no keyword return an empty summary, which
//! the clinical agent treats as "nothing found".

use async_trait::async_trait;
use carebridge_core::error::ToolError;
use carebridge_core::tool::WebSearch;

pub struct StaticWebSearch {
    entries: Vec<(String, String)>,
}

impl StaticWebSearch {
    /// An empty search; add entries with [`StaticWebSearch::with_entry`].
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// A small built-in set of nephrology summaries.
    pub fn nephrology() -> Self {
        Self::new()
            .with_entry(
                "kdigo",
                "KDIGO (Kidney Disease: Improving Global Outcomes) publishes clinical practice \
                 guidelines for CKD evaluation and management; the 2024 update covers staging by \
                 eGFR and albuminuria, SGLT2 inhibitor use and blood pressure targets.",
            )
            .with_entry(
                "potassium",
                "Patients with reduced kidney function are often advised to limit high-potassium \
                 foods such as bananas, oranges, potatoes and tomatoes.",
            )
            .with_entry(
                "dialysis",
                "Dialysis removes waste and excess fluid from the blood when the kidneys can no \
                 longer do so; hemodialysis and peritoneal dialysis are the two main types.",
            )
            .with_entry(
                "egfr",
                "eGFR (estimated glomerular filtration rate) estimates kidney function from a blood \
                 creatinine test; values below 60 for three months suggest chronic kidney disease.",
            )
    }

    /// Return `summary` for queries containing `keyword` (case-insensitive).
    pub fn with_entry(mut self, keyword: impl Into<String>, summary: impl Into<String>) -> Self {
        self.entries.push((keyword.into().to_lowercase(), summary.into()));
        self
    }
}

impl Default for StaticWebSearch {
    fn default() -> Self {
        Self::nephrology()
    }
}

#[async_trait]
impl WebSearch for StaticWebSearch {
    fn name(&self) -> &str {
        "web_search_offline"
    }

    async fn search(&self, query: &str) -> Result<String, ToolError> {
        if query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("empty search query".into()));
        }

        let q = query.to_lowercase();
        let hits: Vec<&str> = self
            .entries
            .iter()
            .filter(|(keyword, _)| q.contains(keyword.as_str()))
            .map(|(_, summary)| summary.as_str())
            .collect();

        Ok(hits.join("\n"))
    }
}
