//! Language-model capability seam.
//!
//! The space pipeline and the borderline-result validator call an external
//! model through [`LanguageModel`]. The capability is always present: when no
//! model is configured, [`NoopLanguageModel`] stands in with rule-based
//! keyword extraction, an extractive summary, and a passthrough validator,
//! so pipeline code never branches on "is a model configured".

use async_trait::async_trait;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;

use crate::constants::{KEYWORD_MIN_TOKEN_LEN, SPACE_KEYWORD_COUNT};
use crate::types::{RecalledEpisode, Space};

/// External language-model capability used by the space pipeline and the
/// optional borderline validator.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate topic keywords for a space from its candidate fact texts.
    async fn generate_keywords(&self, space: &Space, facts: &[String]) -> anyhow::Result<Vec<String>>;

    /// Generate a free-text summary for a space from its assigned fact texts.
    async fn summarize(&self, space: &Space, facts: &[String]) -> anyhow::Result<String>;

    /// Validate borderline recall results against the query; returns the
    /// episodes judged relevant, preserving order.
    async fn validate(
        &self,
        query: &str,
        episodes: Vec<RecalledEpisode>,
    ) -> anyhow::Result<Vec<RecalledEpisode>>;
}

/// Null-object model: rule-based keywords, extractive summary, passthrough
/// validation. Never fails.
#[derive(Debug, Default)]
pub struct NoopLanguageModel;

#[async_trait]
impl LanguageModel for NoopLanguageModel {
    async fn generate_keywords(&self, space: &Space, facts: &[String]) -> anyhow::Result<Vec<String>> {
        let mut keywords = extract_keywords(facts, SPACE_KEYWORD_COUNT);
        if keywords.is_empty() {
            // Fall back to the space name so a freshly created space can
            // still advance to ready_for_clustering.
            keywords = space
                .name
                .split_whitespace()
                .map(|w| w.to_lowercase())
                .collect();
        }
        Ok(keywords)
    }

    async fn summarize(&self, space: &Space, facts: &[String]) -> anyhow::Result<String> {
        if facts.is_empty() {
            return Ok(format!("{}: no statements assigned yet.", space.name));
        }
        let sample: Vec<&str> = facts.iter().take(5).map(|s| s.as_str()).collect();
        Ok(format!(
            "{} ({} statements). Representative facts: {}",
            space.name,
            facts.len(),
            sample.join("; ")
        ))
    }

    async fn validate(
        &self,
        _query: &str,
        episodes: Vec<RecalledEpisode>,
    ) -> anyhow::Result<Vec<RecalledEpisode>> {
        Ok(episodes)
    }
}

/// Frequency-based keyword extraction over stemmed tokens.
///
/// Approximates the topic keywords an LLM or c-TF-IDF pass would produce:
/// tokens are lowercased, stop words and short tokens dropped, stems counted,
/// and the most frequent surface form per stem wins.
pub fn extract_keywords(facts: &[String], count: usize) -> Vec<String> {
    let stemmer = Stemmer::create(Algorithm::English);

    // stem -> (total count, surface form counts)
    let mut stem_counts: HashMap<String, (usize, HashMap<String, usize>)> = HashMap::new();

    for fact in facts {
        for raw in fact.split(|c: char| !c.is_alphanumeric()) {
            let token = raw.to_lowercase();
            if token.len() < KEYWORD_MIN_TOKEN_LEN || is_stop_word(&token) {
                continue;
            }
            let stem = stemmer.stem(&token).to_string();
            let entry = stem_counts.entry(stem).or_default();
            entry.0 += 1;
            *entry.1.entry(token).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = stem_counts
        .into_values()
        .filter_map(|(total, forms)| {
            forms
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
                .map(|(form, _)| (form, total))
        })
        .collect();

    // Ties broken alphabetically for deterministic output
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    ranked.into_iter().take(count).map(|(form, _)| form).collect()
}

fn is_stop_word(token: &str) -> bool {
    matches!(
        token,
        "the" | "and" | "for" | "that" | "this" | "with" | "was" | "are" | "has" | "had"
            | "have" | "his" | "her" | "its" | "they" | "them" | "from" | "not" | "but"
            | "all" | "can" | "will" | "would" | "there" | "their" | "about" | "into"
            | "when" | "what" | "where" | "who" | "how" | "been" | "were" | "than"
    )
}
