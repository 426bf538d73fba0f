//! Configuration for the recall pipeline and the space lifecycle.
//!
//! One explicit, fully-defaulted options structure is passed by value into
//! the fusion/filter pipeline; every default is a named constant in
//! `constants.rs`, never a literal repeated at call sites. Environment
//! overrides use the `SMRITI_*` prefix.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

use crate::constants::{
    CLUSTER_ASSIGN_MIN_SIMILARITY, CLUSTER_LEASE_TTL_SECS, CLUSTER_TRIGGER_THRESHOLD,
    CONFIDENT_THRESHOLD, DEFAULT_MAX_BFS_DEPTH, DEFAULT_RECALL_DEADLINE_MS, DEFAULT_RESULT_LIMIT,
    DEFAULT_TOKEN_BUDGET, GRAPH_SOURCE_FLOOR, KEYWORD_SOURCE_FLOOR, MIN_SCORE_GAP_RATIO,
    SPACE_KEYWORD_COUNT, UNCERTAIN_THRESHOLD, VECTOR_SOURCE_FLOOR,
};

/// Quality filter thresholds, all caller-overridable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Floor for graph-match / BFS dominant episodes
    #[serde(default = "default_graph_floor")]
    pub graph_floor: f32,

    /// Floor for vector-only episodes
    #[serde(default = "default_vector_floor")]
    pub vector_floor: f32,

    /// Floor for keyword-only episodes
    #[serde(default = "default_keyword_floor")]
    pub keyword_floor: f32,

    /// Confidence at or above which validation is skipped
    #[serde(default = "default_confident")]
    pub confident_threshold: f32,

    /// Confidence below which the result set is returned empty
    #[serde(default = "default_uncertain")]
    pub uncertain_threshold: f32,

    /// Adjacent-score ratio below which the ranked list is truncated
    #[serde(default = "default_gap_ratio")]
    pub min_gap_ratio: f32,
}

fn default_graph_floor() -> f32 {
    GRAPH_SOURCE_FLOOR
}
fn default_vector_floor() -> f32 {
    VECTOR_SOURCE_FLOOR
}
fn default_keyword_floor() -> f32 {
    KEYWORD_SOURCE_FLOOR
}
fn default_confident() -> f32 {
    CONFIDENT_THRESHOLD
}
fn default_uncertain() -> f32 {
    UNCERTAIN_THRESHOLD
}
fn default_gap_ratio() -> f32 {
    MIN_SCORE_GAP_RATIO
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            graph_floor: default_graph_floor(),
            vector_floor: default_vector_floor(),
            keyword_floor: default_keyword_floor(),
            confident_threshold: default_confident(),
            uncertain_threshold: default_uncertain(),
            min_gap_ratio: default_gap_ratio(),
        }
    }
}

/// Shared option bag handed to every strategy runner and pipeline stage.
/// Passed by value; construct once per request from the caller's
/// `RecallRequest` plus these defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecallOptions {
    /// Result limit each runner requests from the store
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Maximum hop distance for the graph BFS runner
    #[serde(default = "default_bfs_depth")]
    pub max_bfs_depth: usize,

    /// Per-request wall-clock deadline in milliseconds
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,

    /// Serialized-output budget in tokens
    #[serde(default = "default_token_budget")]
    pub token_budget: usize,

    /// Quality filter thresholds
    #[serde(default)]
    pub thresholds: QualityThresholds,
}

fn default_limit() -> usize {
    DEFAULT_RESULT_LIMIT
}
fn default_bfs_depth() -> usize {
    DEFAULT_MAX_BFS_DEPTH
}
fn default_deadline_ms() -> u64 {
    DEFAULT_RECALL_DEADLINE_MS
}
fn default_token_budget() -> usize {
    DEFAULT_TOKEN_BUDGET
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            max_bfs_depth: default_bfs_depth(),
            deadline_ms: default_deadline_ms(),
            token_budget: default_token_budget(),
            thresholds: QualityThresholds::default(),
        }
    }
}

impl RecallOptions {
    /// Load defaults with environment overrides.
    ///
    /// - SMRITI_RESULT_LIMIT
    /// - SMRITI_MAX_BFS_DEPTH
    /// - SMRITI_RECALL_DEADLINE_MS
    /// - SMRITI_TOKEN_BUDGET
    pub fn from_env() -> Self {
        let mut opts = Self::default();

        if let Some(n) = env_parse::<usize>("SMRITI_RESULT_LIMIT") {
            opts.limit = n;
        }
        if let Some(n) = env_parse::<usize>("SMRITI_MAX_BFS_DEPTH") {
            opts.max_bfs_depth = n;
        }
        if let Some(n) = env_parse::<u64>("SMRITI_RECALL_DEADLINE_MS") {
            opts.deadline_ms = n;
        }
        if let Some(n) = env_parse::<usize>("SMRITI_TOKEN_BUDGET") {
            opts.token_budget = n;
        }

        info!(
            limit = opts.limit,
            max_bfs_depth = opts.max_bfs_depth,
            deadline_ms = opts.deadline_ms,
            token_budget = opts.token_budget,
            "Recall options loaded"
        );

        opts
    }
}

/// Space lifecycle tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceConfig {
    /// Unclustered-episode count per owner that triggers clustering
    #[serde(default = "default_cluster_threshold")]
    pub cluster_trigger_threshold: usize,

    /// Minimum centroid similarity for statement assignment
    #[serde(default = "default_assign_similarity")]
    pub assign_min_similarity: f32,

    /// Per-owner clustering lease lifetime in seconds
    #[serde(default = "default_lease_ttl")]
    pub lease_ttl_secs: i64,

    /// Topic keywords generated per space
    #[serde(default = "default_keyword_count")]
    pub keyword_count: usize,
}

fn default_cluster_threshold() -> usize {
    CLUSTER_TRIGGER_THRESHOLD
}
fn default_assign_similarity() -> f32 {
    CLUSTER_ASSIGN_MIN_SIMILARITY
}
fn default_lease_ttl() -> i64 {
    CLUSTER_LEASE_TTL_SECS
}
fn default_keyword_count() -> usize {
    SPACE_KEYWORD_COUNT
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            cluster_trigger_threshold: default_cluster_threshold(),
            assign_min_similarity: default_assign_similarity(),
            lease_ttl_secs: default_lease_ttl(),
            keyword_count: default_keyword_count(),
        }
    }
}

impl SpaceConfig {
    /// Load defaults with environment overrides.
    ///
    /// - SMRITI_CLUSTER_THRESHOLD
    /// - SMRITI_CLUSTER_LEASE_TTL_SECS
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_parse::<usize>("SMRITI_CLUSTER_THRESHOLD") {
            cfg.cluster_trigger_threshold = n;
        }
        if let Some(n) = env_parse::<i64>("SMRITI_CLUSTER_LEASE_TTL_SECS") {
            cfg.lease_ttl_secs = n;
        }

        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_come_from_constants() {
        let opts = RecallOptions::default();
        assert_eq!(opts.limit, DEFAULT_RESULT_LIMIT);
        assert_eq!(opts.token_budget, DEFAULT_TOKEN_BUDGET);
        assert_eq!(opts.thresholds.graph_floor, GRAPH_SOURCE_FLOOR);
        assert_eq!(opts.thresholds.keyword_floor, KEYWORD_SOURCE_FLOOR);
        assert_eq!(opts.thresholds.min_gap_ratio, MIN_SCORE_GAP_RATIO);

        let cfg = SpaceConfig::default();
        assert_eq!(cfg.cluster_trigger_threshold, CLUSTER_TRIGGER_THRESHOLD);
        assert_eq!(cfg.keyword_count, SPACE_KEYWORD_COUNT);
    }
}
