//! Optional reranking stage.
//!
//! Reranking refines the order of the surviving episodes; it never decides
//! whether the set ships. A failing reranker degrades to the fused order
//! with a warning, the same policy the strategy runners follow.

use async_trait::async_trait;
use ordered_float::OrderedFloat;
use tracing::warn;

use crate::similarity::cosine_similarity;
use crate::types::RecalledEpisode;

/// Which reranker the engine runs after the quality filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RerankerKind {
    /// Fused order ships untouched
    #[default]
    None,
    /// Cosine of the query embedding against whole-episode embeddings
    Embedding,
}

#[async_trait]
pub trait Reranker: Send + Sync {
    /// Reorder survivors by refined relevance. Implementations may drop
    /// episodes they judge irrelevant but must preserve the rest.
    async fn rerank(
        &self,
        query: &str,
        query_embedding: Option<&[f32]>,
        episodes: Vec<RecalledEpisode>,
    ) -> anyhow::Result<Vec<RecalledEpisode>>;
}

/// Passthrough reranker.
#[derive(Debug, Default)]
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(
        &self,
        _query: &str,
        _query_embedding: Option<&[f32]>,
        episodes: Vec<RecalledEpisode>,
    ) -> anyhow::Result<Vec<RecalledEpisode>> {
        Ok(episodes)
    }
}

/// Reranks by query-to-episode embedding similarity. Episodes without an
/// embedding keep their fused position via a neutral rerank score of zero;
/// episodes below `min_relevance` are dropped.
#[derive(Debug)]
pub struct EmbeddingReranker {
    pub min_relevance: f32,
}

impl Default for EmbeddingReranker {
    fn default() -> Self {
        Self { min_relevance: 0.0 }
    }
}

#[async_trait]
impl Reranker for EmbeddingReranker {
    async fn rerank(
        &self,
        _query: &str,
        query_embedding: Option<&[f32]>,
        mut episodes: Vec<RecalledEpisode>,
    ) -> anyhow::Result<Vec<RecalledEpisode>> {
        let Some(query_embedding) = query_embedding else {
            // Nothing to rerank against; keep the fused order.
            return Ok(episodes);
        };

        for recalled in episodes.iter_mut() {
            let score = recalled
                .episode
                .embedding
                .as_deref()
                .map(|emb| cosine_similarity(query_embedding, emb))
                .unwrap_or(0.0);
            recalled.rerank_score = Some(score);
        }

        episodes.retain(|r| r.rerank_score.unwrap_or(0.0) >= self.min_relevance);
        episodes.sort_by_key(|r| std::cmp::Reverse(OrderedFloat(r.rerank_score.unwrap_or(0.0))));
        Ok(episodes)
    }
}

/// Run a reranker with the degrade-don't-fail policy: on error the fused
/// order ships and the failure is logged.
pub async fn rerank_or_passthrough(
    reranker: &dyn Reranker,
    query: &str,
    query_embedding: Option<&[f32]>,
    episodes: Vec<RecalledEpisode>,
) -> Vec<RecalledEpisode> {
    let fallback = episodes.clone();
    match reranker.rerank(query, query_embedding, episodes).await {
        Ok(reranked) => reranked,
        Err(e) => {
            warn!("Reranker failed, keeping fused order: {e}");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recall::fusion::{RetrievalSource, SourceHits, SourceScores};
    use crate::types::Episode;

    fn recalled(embedding: Option<Vec<f32>>, score: f32) -> RecalledEpisode {
        let mut episode = Episode::new("content", "chat", "owner");
        episode.embedding = embedding;
        RecalledEpisode {
            episode,
            statements: Vec::new(),
            score,
            primary_source: RetrievalSource::Vector,
            source_scores: SourceScores::default(),
            source_hits: SourceHits::default(),
            rerank_score: None,
        }
    }

    #[tokio::test]
    async fn test_embedding_reranker_reorders() {
        let survivors = vec![
            recalled(Some(vec![0.0, 1.0]), 9.0),
            recalled(Some(vec![1.0, 0.0]), 8.0),
        ];

        let reranker = EmbeddingReranker::default();
        let reranked = reranker
            .rerank("q", Some(&[1.0, 0.0]), survivors)
            .await
            .unwrap();

        assert_eq!(reranked[0].score, 8.0, "the aligned episode must move up");
        assert!(reranked[0].rerank_score.unwrap() > reranked[1].rerank_score.unwrap());
    }

    #[tokio::test]
    async fn test_embedding_reranker_without_query_embedding_is_noop() {
        let survivors = vec![recalled(Some(vec![1.0, 0.0]), 9.0)];
        let reranker = EmbeddingReranker::default();
        let reranked = reranker.rerank("q", None, survivors).await.unwrap();
        assert_eq!(reranked.len(), 1);
        assert!(reranked[0].rerank_score.is_none());
    }

    #[tokio::test]
    async fn test_min_relevance_drops_episodes() {
        let survivors = vec![
            recalled(Some(vec![1.0, 0.0]), 9.0),
            recalled(Some(vec![-1.0, 0.0]), 8.0),
        ];
        let reranker = EmbeddingReranker { min_relevance: 0.2 };
        let reranked = reranker
            .rerank("q", Some(&[1.0, 0.0]), survivors)
            .await
            .unwrap();
        assert_eq!(reranked.len(), 1);
    }

    struct FailingReranker;

    #[async_trait]
    impl Reranker for FailingReranker {
        async fn rerank(
            &self,
            _query: &str,
            _query_embedding: Option<&[f32]>,
            _episodes: Vec<RecalledEpisode>,
        ) -> anyhow::Result<Vec<RecalledEpisode>> {
            anyhow::bail!("model unavailable")
        }
    }

    #[tokio::test]
    async fn test_failure_degrades_to_fused_order() {
        let survivors = vec![recalled(None, 9.0), recalled(None, 8.0)];
        let out = rerank_or_passthrough(&FailingReranker, "q", None, survivors).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].score, 9.0);
    }
}
