//! The recall pipeline: validation, four concurrent strategy runners,
//! provenance fusion, adaptive quality filtering, optional validation and
//! reranking, then budget trimming.
//!
//! Stage order is fixed; stages after the runners are pure functions over
//! the fused candidates, so every recall with the same store contents and
//! request produces the same response.

pub mod budget;
pub mod fusion;
pub mod quality;
pub mod rerank;
pub mod runners;

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ordered_float::OrderedFloat;
use tracing::{info, warn};

use crate::config::RecallOptions;
use crate::errors::Result;
use crate::llm::{LanguageModel, NoopLanguageModel};
use crate::store::{MemoryStore, SearchFilters};
use crate::types::{RecallRequest, RecallResponse, RecallStats, RecalledEpisode, SortBy};
use crate::validation::{validate_bfs_depth, validate_recall_request};

use fusion::{fuse, sort_statements, FusedEpisode};
use quality::QualityDecision;
use rerank::{rerank_or_passthrough, NoopReranker, Reranker};

/// Recall orchestrator. Cheap to clone per request via the inner Arcs.
pub struct RecallEngine {
    store: Arc<dyn MemoryStore>,
    model: Arc<dyn LanguageModel>,
    reranker: Arc<dyn Reranker>,
    options: RecallOptions,
}

impl RecallEngine {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            model: Arc::new(NoopLanguageModel),
            reranker: Arc::new(NoopReranker),
            options: RecallOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RecallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = model;
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    /// Select one of the built-in rerankers.
    pub fn with_reranker_kind(self, kind: rerank::RerankerKind) -> Self {
        match kind {
            rerank::RerankerKind::None => self.with_reranker(Arc::new(NoopReranker)),
            rerank::RerankerKind::Embedding => {
                self.with_reranker(Arc::new(rerank::EmbeddingReranker::default()))
            }
        }
    }

    /// Execute one recall end to end.
    pub async fn recall(&self, request: RecallRequest) -> Result<RecallResponse> {
        let started = Instant::now();

        validate_recall_request(&request)?;

        let mut options = self.options.clone();
        if let Some(budget) = request.token_budget {
            options.token_budget = budget;
        }
        validate_bfs_depth(options.max_bfs_depth)?;

        let filters = SearchFilters::from_request(&request);

        let outcome =
            runners::run_all(Arc::clone(&self.store), &request, &filters, &options).await;

        let mut stats = RecallStats {
            keyword_hits: outcome.results.keyword.len(),
            vector_hits: outcome.results.vector.len(),
            bfs_hits: outcome.results.bfs.len(),
            episode_vector_hits: outcome.results.episode_vector.len(),
            degraded_sources: outcome.degraded,
            ..Default::default()
        };

        let candidates = fuse(outcome.results);
        stats.fused_episodes = candidates.len();

        let filtered = quality::apply(
            candidates,
            &options.thresholds,
            request.adaptive_filtering,
            request.min_results,
            request.score_threshold,
        );

        if filtered.decision == QualityDecision::NoMatch {
            stats.elapsed_ms = started.elapsed().as_millis() as u64;
            info!(
                owner_id = %request.owner_id,
                confidence = filtered.confidence,
                "Recall found no relevant memory"
            );
            let mut response = RecallResponse::no_match(filtered.message, stats);
            response.confidence = filtered.confidence;
            return Ok(response);
        }

        let mut episodes = self.hydrate(filtered.survivors, options.limit);

        if filtered.decision == QualityDecision::NeedsValidation {
            episodes = match self.model.validate(&request.query, episodes.clone()).await {
                Ok(validated) => validated,
                Err(e) => {
                    warn!("Borderline validation failed, keeping filtered set: {e}");
                    episodes
                }
            };
        }

        episodes = rerank_or_passthrough(
            self.reranker.as_ref(),
            &request.query,
            request.query_embedding.as_deref(),
            episodes,
        )
        .await;

        if request.sort_by == SortBy::Recency {
            let now = Utc::now();
            episodes.sort_by_key(|r| {
                std::cmp::Reverse(OrderedFloat(r.score * r.episode.recency_weight(now)))
            });
        }

        let (episodes, truncated) = budget::trim_to_budget(episodes, options.token_budget);

        stats.survivors = episodes.len();
        stats.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            owner_id = %request.owner_id,
            survivors = stats.survivors,
            confidence = filtered.confidence,
            elapsed_ms = stats.elapsed_ms,
            "Recall complete"
        );

        Ok(RecallResponse {
            episodes,
            confidence: filtered.confidence,
            message: filtered.message,
            truncated,
            stats,
        })
    }

    /// Resolve fused candidates into response episodes. A candidate whose
    /// episode vanished between fusion and hydration is skipped, not fatal.
    fn hydrate(&self, survivors: Vec<FusedEpisode>, limit: usize) -> Vec<RecalledEpisode> {
        let mut episodes = Vec::with_capacity(survivors.len().min(limit));

        for candidate in survivors.into_iter().take(limit) {
            let episode = match self.store.get_episode(&candidate.episode_id) {
                Ok(episode) => episode,
                Err(_) => {
                    warn!(episode_id = %candidate.episode_id.0, "Fused episode no longer in store");
                    continue;
                }
            };

            let mut statements = candidate.statements;
            sort_statements(&mut statements);

            episodes.push(RecalledEpisode {
                score: candidate.scores.fused(),
                primary_source: candidate.scores.primary_source(),
                source_scores: candidate.scores,
                source_hits: candidate.hits,
                episode,
                statements,
                rerank_score: None,
            });
        }

        episodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EmbeddedStore;
    use crate::types::{Episode, Space, Statement};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Passthrough validator that counts how often it is consulted.
    #[derive(Default)]
    struct CountingValidator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl LanguageModel for CountingValidator {
        async fn generate_keywords(
            &self,
            _space: &Space,
            _facts: &[String],
        ) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn summarize(&self, _space: &Space, _facts: &[String]) -> anyhow::Result<String> {
            Ok(String::new())
        }

        async fn validate(
            &self,
            _query: &str,
            episodes: Vec<RecalledEpisode>,
        ) -> anyhow::Result<Vec<RecalledEpisode>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(episodes)
        }
    }

    struct FailingValidator;

    #[async_trait]
    impl LanguageModel for FailingValidator {
        async fn generate_keywords(
            &self,
            _space: &Space,
            _facts: &[String],
        ) -> anyhow::Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn summarize(&self, _space: &Space, _facts: &[String]) -> anyhow::Result<String> {
            Ok(String::new())
        }

        async fn validate(
            &self,
            _query: &str,
            _episodes: Vec<RecalledEpisode>,
        ) -> anyhow::Result<Vec<RecalledEpisode>> {
            Err(anyhow::anyhow!("model offline"))
        }
    }

    async fn seeded_engine() -> (RecallEngine, Arc<EmbeddedStore>) {
        let store = Arc::new(EmbeddedStore::in_memory().unwrap());

        let episode = Episode::new("alice moved the billing service to kubernetes", "chat", "owner");
        let ep_id = store.add_episode(episode).unwrap();

        let mut stmt = Statement::new(
            "billing service runs on kubernetes",
            "billing service",
            ep_id,
            "owner",
        );
        stmt.object = "kubernetes".to_string();
        store.add_statement(stmt).unwrap();

        let engine = RecallEngine::new(Arc::clone(&store) as Arc<dyn MemoryStore>);
        (engine, store)
    }

    #[tokio::test]
    async fn test_recall_finds_keyword_and_graph_match() {
        let (engine, _store) = seeded_engine().await;

        let request = RecallRequest::new("where does the billing service run", "owner");
        let response = engine.recall(request).await.unwrap();

        assert_eq!(response.episodes.len(), 1);
        assert!(response.confidence > 0.0);
        assert!(!response.episodes[0].statements.is_empty());
    }

    #[tokio::test]
    async fn test_recall_unrelated_query_returns_no_match() {
        let (engine, _store) = seeded_engine().await;

        let request = RecallRequest::new("quantum chromodynamics lecture notes", "owner");
        let response = engine.recall(request).await.unwrap();

        assert!(response.episodes.is_empty());
        assert_eq!(response.confidence, 0.0);
        assert_eq!(response.message, "no relevant memory found");
    }

    #[tokio::test]
    async fn test_borderline_recall_routes_through_validator() {
        let (engine, _store) = seeded_engine().await;
        let validator = Arc::new(CountingValidator::default());
        let engine = engine.with_model(Arc::clone(&validator) as Arc<dyn LanguageModel>);

        // A single uncorroborated match is borderline, so the model must be
        // consulted before the set ships.
        let request = RecallRequest::new("where does the billing service run", "owner");
        let response = engine.recall(request).await.unwrap();

        assert_eq!(response.message, "uncertain match, validation recommended");
        assert_eq!(validator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(response.episodes.len(), 1);
    }

    #[tokio::test]
    async fn test_validator_failure_degrades_to_filtered_set() {
        let (engine, _store) = seeded_engine().await;
        let engine = engine.with_model(Arc::new(FailingValidator));

        let request = RecallRequest::new("where does the billing service run", "owner");
        let response = engine.recall(request).await.unwrap();
        assert_eq!(
            response.episodes.len(),
            1,
            "a validator outage must not drop results"
        );
    }

    #[tokio::test]
    async fn test_recall_rejects_invalid_request() {
        let (engine, _store) = seeded_engine().await;

        let request = RecallRequest::new("", "owner");
        assert!(engine.recall(request).await.is_err());
    }

    #[tokio::test]
    async fn test_owner_isolation_in_recall() {
        let (engine, _store) = seeded_engine().await;

        let request = RecallRequest::new("billing service kubernetes", "other-owner");
        let response = engine.recall(request).await.unwrap();
        assert!(response.episodes.is_empty());
    }
}
