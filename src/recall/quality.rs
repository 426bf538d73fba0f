//! Adaptive quality filter: per-source score floors, gap truncation, and a
//! blended confidence that decides whether the result set ships, gets
//! validated, or comes back empty.
//!
//! Scores from the different strategies live on different scales (BM25 and
//! hop-decayed graph scores are unbounded, cosine similarity is not), so the
//! floor an episode must clear depends on which strategy dominated it. The
//! confidence blend rewards score headroom above those floors, corroborating
//! result counts, and a gap cut that separated survivors from a weaker tail.

use tracing::debug;

use crate::config::QualityThresholds;
use crate::constants::{
    CONFIDENCE_COUNT_SATURATION, CONFIDENCE_COUNT_WEIGHT, CONFIDENCE_GAP_BONUS,
    CONFIDENCE_SCORE_HEADROOM, CONFIDENCE_SCORE_WEIGHT,
};
use crate::recall::fusion::{FusedEpisode, RetrievalSource};

/// Disposition of a filtered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityDecision {
    /// Return as-is, no validation needed
    Confident,
    /// Borderline; run the optional validation step
    NeedsValidation,
    /// Too weak to return; the caller gets an empty set with a message
    NoMatch,
}

/// Output of the quality filter.
#[derive(Debug)]
pub struct FilterOutcome {
    pub survivors: Vec<FusedEpisode>,
    pub confidence: f32,
    pub decision: QualityDecision,
    pub message: String,
}

impl FilterOutcome {
    fn no_match(confidence: f32) -> Self {
        Self {
            survivors: Vec::new(),
            confidence,
            decision: QualityDecision::NoMatch,
            message: "no relevant memory found".to_string(),
        }
    }
}

/// Floor an episode must clear, chosen by its dominant strategy.
fn floor_for(source: RetrievalSource, thresholds: &QualityThresholds) -> f32 {
    match source {
        RetrievalSource::GraphMatch | RetrievalSource::Bfs => thresholds.graph_floor,
        RetrievalSource::Vector => thresholds.vector_floor,
        RetrievalSource::Keyword => thresholds.keyword_floor,
    }
}

/// Apply floors, gap truncation, and the confidence decision to fused
/// candidates (already ranked best-first).
pub fn apply(
    candidates: Vec<FusedEpisode>,
    thresholds: &QualityThresholds,
    adaptive: bool,
    min_results: Option<usize>,
    score_threshold: Option<f32>,
) -> FilterOutcome {
    if candidates.is_empty() {
        return FilterOutcome::no_match(0.0);
    }

    // All-zero fusions carry no signal; skip the floor and gap machinery.
    if candidates.iter().all(|c| c.fused_score() == 0.0) {
        return FilterOutcome::no_match(0.0);
    }

    // Per-source floors plus the caller's absolute threshold.
    let floored: Vec<FusedEpisode> = candidates
        .into_iter()
        .filter(|c| {
            let score = c.fused_score();
            if score < floor_for(c.primary_source(), thresholds) {
                return false;
            }
            score_threshold.map(|t| score >= t).unwrap_or(true)
        })
        .collect();

    if floored.is_empty() {
        return FilterOutcome::no_match(0.0);
    }

    // Gap truncation: cut where the ranked scores fall off a cliff, unless
    // the caller asked for a minimum count that the cut would violate.
    let mut gap_cut = false;
    let survivors: Vec<FusedEpisode> = if adaptive {
        let mut keep = floored.len();
        for i in 0..floored.len() - 1 {
            let current = floored[i].fused_score();
            let next = floored[i + 1].fused_score();
            if current > 0.0 && next < current * thresholds.min_gap_ratio {
                keep = i + 1;
                gap_cut = true;
                break;
            }
        }
        if let Some(min) = min_results {
            if gap_cut && keep < min {
                keep = min.min(floored.len());
            }
        }
        floored.into_iter().take(keep).collect()
    } else {
        floored
    };

    // Confidence blend: score headroom above the floors, corroboration
    // count, and a bonus when a gap cut separated the survivors from a
    // weaker tail. Every survivor already clears its floor, so the score
    // component measures how far above the floor it sits, not whether it
    // passed.
    let score_component: f32 = survivors
        .iter()
        .map(|c| {
            let floor = floor_for(c.primary_source(), thresholds);
            ((c.fused_score() / floor - 1.0) / CONFIDENCE_SCORE_HEADROOM).clamp(0.0, 1.0)
        })
        .sum::<f32>()
        / survivors.len() as f32;

    let count_component =
        (survivors.len() as f32 / CONFIDENCE_COUNT_SATURATION as f32).min(1.0);

    let gap_component = if gap_cut { 1.0 } else { 0.0 };

    let confidence = CONFIDENCE_SCORE_WEIGHT * score_component
        + CONFIDENCE_COUNT_WEIGHT * count_component
        + CONFIDENCE_GAP_BONUS * gap_component;

    debug!(
        survivors = survivors.len(),
        confidence, gap_cut, "Quality filter applied"
    );

    if confidence < thresholds.uncertain_threshold {
        return FilterOutcome::no_match(confidence);
    }

    let (decision, message) = if confidence >= thresholds.confident_threshold {
        (QualityDecision::Confident, "high-confidence match".to_string())
    } else {
        (
            QualityDecision::NeedsValidation,
            "uncertain match, validation recommended".to_string(),
        )
    };

    FilterOutcome {
        survivors,
        confidence,
        decision,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recall::fusion::{SourceHits, SourceScores};
    use crate::types::EpisodeId;

    fn graph_candidate(score: f32) -> FusedEpisode {
        FusedEpisode {
            episode_id: EpisodeId::new(),
            statements: Vec::new(),
            scores: SourceScores {
                graph_keyword: Some(score),
                ..Default::default()
            },
            hits: SourceHits::default(),
        }
    }

    fn keyword_candidate(rank_score: f32) -> FusedEpisode {
        FusedEpisode {
            episode_id: EpisodeId::new(),
            statements: Vec::new(),
            scores: SourceScores {
                keyword_rank: Some(rank_score),
                ..Default::default()
            },
            hits: SourceHits::default(),
        }
    }

    #[test]
    fn test_gap_truncation() {
        let candidates = vec![
            graph_candidate(9.0),
            graph_candidate(8.5),
            graph_candidate(3.0),
            graph_candidate(2.9),
        ];
        let outcome = apply(candidates, &QualityThresholds::default(), true, None, None);
        assert_eq!(outcome.survivors.len(), 2, "3.0 < 0.5 * 8.5 must cut the list");
        assert_eq!(outcome.decision, QualityDecision::Confident);
    }

    #[test]
    fn test_min_results_overrides_gap_cut() {
        let candidates = vec![
            graph_candidate(20.0),
            graph_candidate(18.0),
            graph_candidate(8.0),
            graph_candidate(7.5),
        ];
        let outcome = apply(
            candidates,
            &QualityThresholds::default(),
            true,
            Some(3),
            None,
        );
        assert_eq!(outcome.survivors.len(), 3, "the gap cut at two must stretch to min_results");
    }

    #[test]
    fn test_keyword_floor() {
        let outcome = apply(
            vec![keyword_candidate(0.2)],
            &QualityThresholds::default(),
            true,
            None,
            None,
        );
        assert!(outcome.survivors.is_empty(), "0.2 is below the keyword floor");
        assert_eq!(outcome.decision, QualityDecision::NoMatch);

        let outcome = apply(
            vec![keyword_candidate(0.4)],
            &QualityThresholds::default(),
            true,
            None,
            None,
        );
        assert_eq!(outcome.survivors.len(), 1, "0.4 clears the keyword floor");
    }

    #[test]
    fn test_empty_and_zero_score_inputs() {
        let outcome = apply(Vec::new(), &QualityThresholds::default(), true, None, None);
        assert_eq!(outcome.decision, QualityDecision::NoMatch);
        assert_eq!(outcome.confidence, 0.0);

        let outcome = apply(
            vec![graph_candidate(0.0)],
            &QualityThresholds::default(),
            true,
            None,
            None,
        );
        assert_eq!(outcome.decision, QualityDecision::NoMatch);
        assert_eq!(outcome.confidence, 0.0);
    }

    #[test]
    fn test_non_adaptive_keeps_floored_tail() {
        let candidates = vec![
            graph_candidate(9.0),
            graph_candidate(8.5),
            graph_candidate(6.0),
            graph_candidate(5.1),
        ];
        let outcome = apply(candidates, &QualityThresholds::default(), false, None, None);
        assert_eq!(outcome.survivors.len(), 4);
    }

    #[test]
    fn test_strong_graph_matches_are_confident() {
        let candidates = vec![
            graph_candidate(12.0),
            graph_candidate(10.0),
            graph_candidate(9.0),
        ];
        let outcome = apply(candidates, &QualityThresholds::default(), true, None, None);
        assert_eq!(outcome.decision, QualityDecision::Confident);
        assert!(outcome.confidence >= 0.7);
        assert_eq!(outcome.message, "high-confidence match");
    }

    #[test]
    fn test_at_floor_survivor_is_low_confidence() {
        // Exactly at the floor: zero headroom, one result, no gap. The set
        // carries too little signal to return.
        let outcome = apply(
            vec![graph_candidate(5.0)],
            &QualityThresholds::default(),
            true,
            None,
            None,
        );
        assert_eq!(outcome.decision, QualityDecision::NoMatch);
        assert!(outcome.confidence > 0.0);
        assert!(outcome.confidence < 0.3);
    }

    #[test]
    fn test_borderline_match_needs_validation() {
        let outcome = apply(
            vec![keyword_candidate(0.4)],
            &QualityThresholds::default(),
            true,
            None,
            None,
        );
        assert_eq!(outcome.survivors.len(), 1);
        assert_eq!(outcome.decision, QualityDecision::NeedsValidation);
        assert!(outcome.confidence >= 0.3 && outcome.confidence < 0.7);
        assert_eq!(outcome.message, "uncertain match, validation recommended");
    }

    #[test]
    fn test_gap_bonus_requires_a_cut() {
        let thresholds = QualityThresholds::default();

        let solo = apply(vec![graph_candidate(12.0)], &thresholds, true, None, None);
        assert_eq!(solo.decision, QualityDecision::NeedsValidation);

        // Same survivor, but a weak tail got cut away: the separation earns
        // the bonus and lifts the set into the confident band.
        let separated = apply(
            vec![graph_candidate(12.0), graph_candidate(5.5)],
            &thresholds,
            true,
            None,
            None,
        );
        assert_eq!(separated.survivors.len(), 1);
        assert!(separated.confidence > solo.confidence);
        assert_eq!(separated.decision, QualityDecision::Confident);
    }

    #[test]
    fn test_caller_score_threshold() {
        let candidates = vec![graph_candidate(12.0), graph_candidate(6.0)];
        let outcome = apply(
            candidates,
            &QualityThresholds::default(),
            true,
            None,
            Some(10.0),
        );
        assert_eq!(outcome.survivors.len(), 1);
    }
}
