//! Relevance scoring.
//!
//! - Cosine similarity over embeddings
//! - Query-term coverage when the index has no embeddings

use std::collections::HashSet;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if the lengths differ or either vector is empty or zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

const STOPWORDS: &[&str] = &[
    "the", "and", "are", "for", "with", "what", "which", "who", "how", "does", "can", "should",
    "about", "from", "that", "this", "have", "has", "was", "were", "will", "would", "could",
    "there", "their", "they", "them", "you", "your", "any", "all", "into", "when", "why",
    "tell", "please", "more", "some", "its", "not", "but",
];

/// Lowercased content terms: alphanumeric runs of 3+ chars, minus stopwords.
/// Short medical acronyms ("ckd", "egfr") survive the length cut.
pub fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Fraction of distinct query terms present in `passage`, in 0.0..=1.0.
pub fn keyword_coverage(query: &str, passage: &str) -> f32 {
    let query_terms: HashSet<String> = terms(query).into_iter().collect();
    if query_terms.is_empty() {
        return 0.0;
    }
    let passage_terms: HashSet<String> = terms(passage).into_iter().collect();
    let hits = query_terms
        .iter()
        .filter(|t| passage_terms.contains(*t) || passage_terms.iter().any(|p| is_inflection(t, p)))
        .count();
    hits as f32 / query_terms.len() as f32
}

/// "symptom" vs "symptoms", "diet" vs "dietary".
fn is_inflection(query_term: &str, passage_term: &str) -> bool {
    query_term.len() >= 4
        && passage_term.len() >= 4
        && (passage_term.starts_with(query_term) || query_term.starts_with(passage_term))
        && query_term.len().abs_diff(passage_term.len()) <= 3
}
