//! Token-budget trimmer, the last pipeline stage before the response ships.
//!
//! Cost is estimated from the serialized size of each episode at roughly
//! four characters per token. Episodes are admitted best-first; the top
//! episode is never dropped outright, only truncated, so a recall that found
//! something always returns something.

use tracing::debug;

use crate::constants::APPROX_CHARS_PER_TOKEN;
use crate::types::RecalledEpisode;

/// Estimated token cost of one serialized episode.
fn episode_cost(recalled: &RecalledEpisode) -> usize {
    let chars = serde_json::to_string(recalled)
        .map(|s| s.len())
        // Serialization of these types cannot fail; fall back to content
        // length if it somehow does.
        .unwrap_or_else(|_| recalled.episode.content.len());
    chars.div_ceil(APPROX_CHARS_PER_TOKEN)
}

/// Trim a ranked result set to the token budget.
///
/// Returns the kept episodes and whether any truncation happened (episodes
/// dropped or content cut).
pub fn trim_to_budget(
    episodes: Vec<RecalledEpisode>,
    token_budget: usize,
) -> (Vec<RecalledEpisode>, bool) {
    if episodes.is_empty() {
        return (episodes, false);
    }

    let total = episodes.len();
    let mut kept: Vec<RecalledEpisode> = Vec::with_capacity(total);
    let mut spent = 0usize;
    let mut truncated = false;

    for (i, mut recalled) in episodes.into_iter().enumerate() {
        let cost = episode_cost(&recalled);

        if spent + cost <= token_budget {
            spent += cost;
            kept.push(recalled);
            continue;
        }

        if i == 0 {
            // The best episode must survive even when it alone blows the
            // budget: cut its content down to the budget instead.
            let keep_chars = token_budget.saturating_mul(APPROX_CHARS_PER_TOKEN);
            truncate_content(&mut recalled.episode.content, keep_chars);
            recalled.statements.clear();
            truncated = true;
            kept.push(recalled);
            break;
        }

        truncated = true;
        break;
    }

    if kept.len() < total {
        truncated = true;
    }

    debug!(kept = kept.len(), total, spent, truncated, "Budget trim applied");
    (kept, truncated)
}

/// Cut a string to at most `max_chars`, respecting char boundaries.
fn truncate_content(content: &mut String, max_chars: usize) {
    if content.chars().count() <= max_chars {
        return;
    }
    let cut: String = content.chars().take(max_chars).collect();
    *content = cut;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recall::fusion::{RetrievalSource, SourceHits, SourceScores};
    use crate::types::Episode;

    fn recalled_with_content(content: String, score: f32) -> RecalledEpisode {
        RecalledEpisode {
            episode: Episode::new(content, "chat", "owner"),
            statements: Vec::new(),
            score,
            primary_source: RetrievalSource::Keyword,
            source_scores: SourceScores::default(),
            source_hits: SourceHits::default(),
            rerank_score: None,
        }
    }

    #[test]
    fn test_equal_cost_episodes_fill_until_budget() {
        // Each episode serializes to roughly the same size; pick a budget
        // that admits exactly two of three.
        let episodes: Vec<RecalledEpisode> = (0..3)
            .map(|i| recalled_with_content("x".repeat(400), 10.0 - i as f32))
            .collect();
        let per_episode = episode_cost(&episodes[0]);
        let budget = per_episode * 2 + per_episode / 2;

        let (kept, truncated) = trim_to_budget(episodes, budget);
        assert_eq!(kept.len(), 2);
        assert!(truncated);
    }

    #[test]
    fn test_everything_fits_no_truncation() {
        let episodes = vec![
            recalled_with_content("short".to_string(), 10.0),
            recalled_with_content("also short".to_string(), 9.0),
        ];
        let (kept, truncated) = trim_to_budget(episodes, 10_000);
        assert_eq!(kept.len(), 2);
        assert!(!truncated);
    }

    #[test]
    fn test_oversized_top_episode_is_kept_truncated() {
        let episodes = vec![recalled_with_content("y".repeat(4_000), 10.0)];
        let budget = 100; // ~400 chars, far below the episode's cost

        let (kept, truncated) = trim_to_budget(episodes, budget);
        assert_eq!(kept.len(), 1, "the top episode must never be dropped");
        assert!(truncated);
        assert!(kept[0].episode.content.len() <= budget * APPROX_CHARS_PER_TOKEN);
    }

    #[test]
    fn test_empty_input() {
        let (kept, truncated) = trim_to_budget(Vec::new(), 100);
        assert!(kept.is_empty());
        assert!(!truncated);
    }
}
