//! Core domain types: episodes, statements, spaces, and the recall
//! request/response surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::constants::{
    RECENCY_FULL_DAYS, RECENCY_HIGH_DAYS, RECENCY_HIGH_WEIGHT, RECENCY_LOW_WEIGHT,
    RECENCY_MEDIUM_DAYS, RECENCY_MEDIUM_WEIGHT,
};

/// Unique identifier for episodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)] // Serialize as plain UUID string, not array
pub struct EpisodeId(pub Uuid);

/// Unique identifier for statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementId(pub Uuid);

/// Unique identifier for spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(pub Uuid);

impl EpisodeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EpisodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StatementId {
    fn default() -> Self {
        Self::new()
    }
}

impl SpaceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SpaceId {
    fn default() -> Self {
        Self::new()
    }
}

/// One ingested observation.
///
/// Immutable after ingestion except for metadata enrichment. Deleting an
/// episode cascades to the statements derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: EpisodeId,

    /// Raw content as stored
    pub content: String,

    /// Pre-extraction original content, when the ingestion path rewrote it
    #[serde(default)]
    pub original_content: Option<String>,

    /// Source label ("chat", "email", "document", ...)
    pub source: String,

    /// Ingestion time
    pub created_at: DateTime<Utc>,

    /// Event time - when the observed content became true
    pub valid_at: DateTime<Utc>,

    /// Content embedding, supplied by the ingestion collaborator
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,

    /// Optional session/grouping id
    #[serde(default)]
    pub session_id: Option<String>,

    /// Free-form metadata, enrichable after creation
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Owner scope (user or workspace id)
    pub owner_id: String,
}

impl Episode {
    pub fn new(content: impl Into<String>, source: impl Into<String>, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EpisodeId::new(),
            content: content.into(),
            original_content: None,
            source: source.into(),
            created_at: now,
            valid_at: now,
            embedding: None,
            session_id: None,
            metadata: HashMap::new(),
            owner_id: owner_id.into(),
        }
    }

    /// Recency weight bucket for recency-sorted recall.
    ///
    /// 0-7 days: 1.0, 8-30: 0.7, 31-90: 0.4, older: 0.1.
    pub fn recency_weight(&self, now: DateTime<Utc>) -> f32 {
        let age_days = (now - self.valid_at).num_days();
        if age_days <= RECENCY_FULL_DAYS {
            1.0
        } else if age_days <= RECENCY_HIGH_DAYS {
            RECENCY_HIGH_WEIGHT
        } else if age_days <= RECENCY_MEDIUM_DAYS {
            RECENCY_MEDIUM_WEIGHT
        } else {
            RECENCY_LOW_WEIGHT
        }
    }
}

/// An atomic fact derived from one or more episodes.
///
/// Produced by the extraction collaborator. The recall path never mutates a
/// statement; only `invalid_at` (ingestion) and `space_id` (lifecycle
/// controller) change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementId,

    /// Textual rendition of the fact
    pub fact: String,

    /// Subject entity name (graph node)
    pub subject: String,

    /// Object entity name (graph node), empty for unary facts
    #[serde(default)]
    pub object: String,

    pub created_at: DateTime<Utc>,

    /// When the fact became true
    pub valid_at: DateTime<Utc>,

    /// When the fact was superseded; None while the fact is current.
    /// Invariant: when set, `invalid_at > valid_at`.
    #[serde(default)]
    pub invalid_at: Option<DateTime<Utc>>,

    /// Free-form attributes
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Episode this statement was extracted from
    pub episode_id: EpisodeId,

    /// Fact-text embedding
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,

    /// Topical space assignment, nullable
    #[serde(default)]
    pub space_id: Option<SpaceId>,

    pub owner_id: String,
}

impl Statement {
    pub fn new(
        fact: impl Into<String>,
        subject: impl Into<String>,
        episode_id: EpisodeId,
        owner_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: StatementId::new(),
            fact: fact.into(),
            subject: subject.into(),
            object: String::new(),
            created_at: now,
            valid_at: now,
            invalid_at: None,
            attributes: HashMap::new(),
            episode_id,
            embedding: None,
            space_id: None,
            owner_id: owner_id.into(),
        }
    }

    /// Whether the statement is current (not superseded).
    pub fn is_active(&self) -> bool {
        self.invalid_at.is_none()
    }

    /// Whether the statement was true at the given instant.
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.valid_at <= at && self.invalid_at.map(|inv| inv > at).unwrap_or(true)
    }
}

/// Space classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceType {
    Classification,
    Persona,
    Evolution,
}

/// A named topical cluster of statements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    pub space_type: SpaceType,

    /// Generated free-text summary of the space's contents
    #[serde(default)]
    pub summary: String,

    /// Optional template steering summary generation
    #[serde(default)]
    pub summary_template: Option<String>,

    /// Topic keywords generated at creation and refreshed by the pipeline
    #[serde(default)]
    pub topic_keywords: Vec<String>,

    pub status: crate::spaces::SpaceStatus,

    /// Number of statements currently assigned. Always recomputed from
    /// actual assignments at the end of a successful transition.
    #[serde(default)]
    pub context_count: usize,

    pub owner_id: String,

    /// Space embedding for space-to-space similarity
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Space {
    pub fn new(name: impl Into<String>, space_type: SpaceType, owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SpaceId::new(),
            name: name.into(),
            description: None,
            space_type,
            summary: String::new(),
            summary_template: None,
            topic_keywords: Vec::new(),
            status: crate::spaces::SpaceStatus::Created,
            context_count: 0,
            owner_id: owner_id.into(),
            embedding: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Sort order for recall results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Relevance,
    Recency,
}

/// Inclusive time window filter over statement validity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// A recall request as received from the caller.
///
/// Only `query` and `owner_id` are required; everything else defaults
/// through [`crate::config::RecallOptions`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallRequest {
    pub query: String,
    pub owner_id: String,

    #[serde(default)]
    pub time_window: Option<TimeWindow>,

    /// Restrict results to statements assigned to this space
    #[serde(default)]
    pub space_id: Option<SpaceId>,

    /// Restrict graph seeding to these entity names/types
    #[serde(default)]
    pub entity_filter: Vec<String>,

    /// Drop episodes whose fused score is below this value
    #[serde(default)]
    pub score_threshold: Option<f32>,

    /// Prefer returning at least this many results over a gap cut
    #[serde(default)]
    pub min_results: Option<usize>,

    /// When false, the quality filter returns everything that clears the
    /// per-source floors without gap truncation
    #[serde(default = "default_adaptive")]
    pub adaptive_filtering: bool,

    #[serde(default)]
    pub sort_by: SortBy,

    #[serde(default)]
    pub token_budget: Option<usize>,

    #[serde(default)]
    pub include_invalidated: bool,

    /// Query embedding, supplied by the caller's embedding collaborator.
    /// Vector runners contribute nothing when absent.
    #[serde(default)]
    pub query_embedding: Option<Vec<f32>>,
}

fn default_adaptive() -> bool {
    true
}

impl RecallRequest {
    pub fn new(query: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            owner_id: owner_id.into(),
            time_window: None,
            space_id: None,
            entity_filter: Vec::new(),
            score_threshold: None,
            min_results: None,
            adaptive_filtering: true,
            sort_by: SortBy::default(),
            token_budget: None,
            include_invalidated: false,
            query_embedding: None,
        }
    }
}

/// Per-runner timing and hit counts, reported on the response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecallStats {
    pub keyword_hits: usize,
    pub vector_hits: usize,
    pub bfs_hits: usize,
    pub episode_vector_hits: usize,
    pub fused_episodes: usize,
    pub survivors: usize,
    pub elapsed_ms: u64,
    /// Runners that errored or timed out and contributed nothing
    pub degraded_sources: Vec<String>,
}

/// One episode in a recall response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecalledEpisode {
    pub episode: Episode,

    /// Statements that matched, with the fact text preserved
    pub statements: Vec<Statement>,

    /// Fused relevance score
    pub score: f32,

    /// Which strategy dominated for this episode
    pub primary_source: crate::recall::fusion::RetrievalSource,

    /// Per-source score breakdown
    pub source_scores: crate::recall::fusion::SourceScores,

    /// Per-source hit counts
    #[serde(default)]
    pub source_hits: crate::recall::fusion::SourceHits,

    /// Reranker relevance, when a reranker ran
    #[serde(default)]
    pub rerank_score: Option<f32>,
}

/// Ordered recall result with confidence and status message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallResponse {
    pub episodes: Vec<RecalledEpisode>,

    /// Derived [0, 1] trustworthiness of the result set
    pub confidence: f32,

    /// Human-readable status ("high-confidence match", ...)
    pub message: String,

    /// Set when the budget trimmer had to truncate content
    pub truncated: bool,

    pub stats: RecallStats,
}

impl RecallResponse {
    /// The empty-with-message result for legitimate no-match recalls.
    pub fn no_match(message: impl Into<String>, stats: RecallStats) -> Self {
        Self {
            episodes: Vec::new(),
            confidence: 0.0,
            message: message.into(),
            truncated: false,
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_statement_point_in_time_validity() {
        let t1 = Utc::now() - Duration::days(10);
        let t2 = Utc::now() - Duration::days(2);

        let mut stmt = Statement::new("likes tea", "alice", EpisodeId::new(), "owner");
        stmt.valid_at = t1;
        stmt.invalid_at = Some(t2);

        assert!(stmt.is_valid_at(t1 + Duration::days(1)));
        assert!(!stmt.is_valid_at(t2 + Duration::days(1)));
        assert!(!stmt.is_valid_at(t1 - Duration::days(1)));
        assert!(!stmt.is_active());
    }

    #[test]
    fn test_recency_weight_buckets() {
        let now = Utc::now();
        let mut ep = Episode::new("x", "test", "owner");

        ep.valid_at = now - Duration::days(1);
        assert_eq!(ep.recency_weight(now), 1.0);

        ep.valid_at = now - Duration::days(20);
        assert_eq!(ep.recency_weight(now), RECENCY_HIGH_WEIGHT);

        ep.valid_at = now - Duration::days(60);
        assert_eq!(ep.recency_weight(now), RECENCY_MEDIUM_WEIGHT);

        ep.valid_at = now - Duration::days(400);
        assert_eq!(ep.recency_weight(now), RECENCY_LOW_WEIGHT);
    }
}
