//! Provenance-preserving fusion of the four retrieval strategies.
//!
//! Results are grouped by originating episode; each episode keeps the best
//! score per source and the fused score is the sum of those contributions,
//! so an episode found by several strategies outranks one found by a single
//! strategy at the same level. Fusion is pure and deterministic: same
//! runner output, same fused ranking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::{BFS_HOP_DECAY, GRAPH_SEED_MATCH_SCORE};
use crate::types::{Episode, EpisodeId, Statement};

/// Which retrieval strategy found an episode.
///
/// Ordering doubles as the tie-break priority when two sources contribute
/// the same score: a direct graph match beats a traversal hit beats a
/// semantic hit beats a keyword-rank hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalSource {
    GraphMatch,
    Bfs,
    Vector,
    Keyword,
}

impl RetrievalSource {
    /// Lower is stronger.
    fn priority(&self) -> u8 {
        match self {
            Self::GraphMatch => 0,
            Self::Bfs => 1,
            Self::Vector => 2,
            Self::Keyword => 3,
        }
    }
}

impl std::fmt::Display for RetrievalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::GraphMatch => "graph_match",
            Self::Bfs => "bfs",
            Self::Vector => "vector",
            Self::Keyword => "keyword",
        };
        write!(f, "{s}")
    }
}

/// Per-source score breakdown for one episode. Each slot holds the best
/// score that source produced for the episode, `None` when the source did
/// not surface it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SourceScores {
    /// Direct entity/keyword relevance: best of raw BM25 and hop-0 graph
    /// seed matches. Unbounded above.
    pub graph_keyword: Option<f32>,

    /// Statement-embedding cosine similarity
    pub vector: Option<f32>,

    /// Hop-decayed graph traversal score (hops >= 1)
    pub bfs: Option<f32>,

    /// Whole-episode embedding cosine similarity
    pub episode_vector: Option<f32>,

    /// Reciprocal keyword rank (1/rank)
    pub keyword_rank: Option<f32>,
}

impl SourceScores {
    /// Fused score: sum of every contributing source.
    pub fn fused(&self) -> f32 {
        self.graph_keyword.unwrap_or(0.0)
            + self.vector.unwrap_or(0.0)
            + self.bfs.unwrap_or(0.0)
            + self.episode_vector.unwrap_or(0.0)
            + self.keyword_rank.unwrap_or(0.0)
    }

    /// The strategy that contributed the largest score, ties broken by
    /// source priority.
    pub fn primary_source(&self) -> RetrievalSource {
        let slots = [
            (self.graph_keyword, RetrievalSource::GraphMatch),
            (self.bfs, RetrievalSource::Bfs),
            (self.vector, RetrievalSource::Vector),
            (self.episode_vector, RetrievalSource::Vector),
            (self.keyword_rank, RetrievalSource::Keyword),
        ];

        let mut best: Option<(f32, RetrievalSource)> = None;
        for (slot, source) in slots {
            let Some(score) = slot else { continue };
            best = match best {
                None => Some((score, source)),
                Some((b_score, b_source)) => {
                    if score > b_score
                        || (score == b_score && source.priority() < b_source.priority())
                    {
                        Some((score, source))
                    } else {
                        Some((b_score, b_source))
                    }
                }
            };
        }

        // Unreachable for fused episodes: at least one source put it here.
        best.map(|(_, s)| s).unwrap_or(RetrievalSource::Keyword)
    }

    fn max_keyword(&mut self, score: f32) {
        match &mut self.graph_keyword {
            Some(existing) if *existing >= score => {}
            slot => *slot = Some(score),
        }
    }
}

/// How many hits each strategy contributed to one episode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceHits {
    pub keyword: usize,
    pub vector: usize,
    pub bfs: usize,
    pub episode_vector: usize,
}

/// One episode as it leaves fusion: matched statements, score breakdown,
/// and the fused relevance the filter ranks by.
#[derive(Debug, Clone)]
pub struct FusedEpisode {
    pub episode_id: EpisodeId,
    pub statements: Vec<Statement>,
    pub scores: SourceScores,
    pub hits: SourceHits,
}

impl FusedEpisode {
    pub fn fused_score(&self) -> f32 {
        self.scores.fused()
    }

    pub fn primary_source(&self) -> RetrievalSource {
        self.scores.primary_source()
    }

    fn add_statement(&mut self, statement: &Statement) {
        if !self.statements.iter().any(|s| s.id == statement.id) {
            self.statements.push(statement.clone());
        }
    }
}

/// Raw output of the four strategy runners.
#[derive(Debug, Default)]
pub struct RunnerResults {
    /// BM25 keyword hits, best first
    pub keyword: Vec<(Statement, f32)>,

    /// Statement-embedding similarity hits
    pub vector: Vec<(Statement, f32)>,

    /// Graph BFS hits with hop distance
    pub bfs: Vec<(Statement, usize)>,

    /// Whole-episode embedding similarity hits
    pub episode_vector: Vec<(Episode, f32)>,
}

/// Score a BFS hit: seed relevance decayed per hop.
pub fn bfs_score(hop: usize) -> f32 {
    GRAPH_SEED_MATCH_SCORE * BFS_HOP_DECAY.powi(hop as i32)
}

/// Fuse runner results into per-episode candidates, best-fused first.
///
/// Grouping runs over a BTreeMap keyed by episode id, and ties on fused
/// score fall back to id order, so the ranking is stable across runs.
pub fn fuse(results: RunnerResults) -> Vec<FusedEpisode> {
    let mut by_episode: BTreeMap<EpisodeId, FusedEpisode> = BTreeMap::new();

    fn entry(
        id: EpisodeId,
        by_episode: &mut BTreeMap<EpisodeId, FusedEpisode>,
    ) -> &mut FusedEpisode {
        by_episode.entry(id).or_insert_with(|| FusedEpisode {
            episode_id: id,
            statements: Vec::new(),
            scores: SourceScores::default(),
            hits: SourceHits::default(),
        })
    }

    for (rank, (statement, bm25)) in results.keyword.iter().enumerate() {
        let fused = entry(statement.episode_id, &mut by_episode);
        fused.add_statement(statement);
        fused.hits.keyword += 1;
        fused.scores.max_keyword(*bm25);

        let reciprocal = 1.0 / (rank as f32 + 1.0);
        if fused.scores.keyword_rank.map(|r| reciprocal > r).unwrap_or(true) {
            fused.scores.keyword_rank = Some(reciprocal);
        }
    }

    for (statement, similarity) in &results.vector {
        let fused = entry(statement.episode_id, &mut by_episode);
        fused.add_statement(statement);
        fused.hits.vector += 1;
        if fused.scores.vector.map(|v| *similarity > v).unwrap_or(true) {
            fused.scores.vector = Some(*similarity);
        }
    }

    for (statement, hop) in &results.bfs {
        let fused = entry(statement.episode_id, &mut by_episode);
        fused.add_statement(statement);
        fused.hits.bfs += 1;
        let score = bfs_score(*hop);
        if *hop == 0 {
            // Direct entity matches share the lexical slot with BM25.
            fused.scores.max_keyword(score);
        } else if fused.scores.bfs.map(|b| score > b).unwrap_or(true) {
            fused.scores.bfs = Some(score);
        }
    }

    for (episode, similarity) in &results.episode_vector {
        let fused = entry(episode.id, &mut by_episode);
        fused.hits.episode_vector += 1;
        if fused
            .scores
            .episode_vector
            .map(|e| *similarity > e)
            .unwrap_or(true)
        {
            fused.scores.episode_vector = Some(*similarity);
        }
    }

    let mut candidates: Vec<FusedEpisode> = by_episode.into_values().collect();
    candidates.sort_by(|a, b| {
        b.fused_score()
            .partial_cmp(&a.fused_score())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.episode_id.cmp(&b.episode_id))
    });
    candidates
}

/// Order the matched statements of a fused episode by id so response
/// payloads are stable.
pub fn sort_statements(statements: &mut [Statement]) {
    statements.sort_by_key(|s| s.id);
}
