//! The four strategy runners, executed concurrently under one deadline.
//!
//! Runners never fail the recall: a store error, panic, or deadline expiry
//! turns into an empty contribution and a `degraded_sources` entry on the
//! response stats, logged with a warning. The pipeline after fusion is
//! indifferent to which sources actually ran.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::warn;

use crate::config::RecallOptions;
use crate::errors::Result;
use crate::recall::fusion::RunnerResults;
use crate::store::{MemoryStore, SearchFilters};
use crate::types::RecallRequest;

/// Fused runner output plus which sources contributed nothing due to
/// failure or timeout.
#[derive(Debug, Default)]
pub struct RunnerOutcome {
    pub results: RunnerResults,
    pub degraded: Vec<String>,
}

/// Run one store call on the blocking pool under the shared deadline.
/// Returns the hits, or empty plus the runner name on any failure.
async fn run_one<T, F>(
    name: &'static str,
    deadline: Duration,
    work: F,
) -> (Vec<T>, Option<&'static str>)
where
    T: Send + 'static,
    F: FnOnce() -> Result<Vec<T>> + Send + 'static,
{
    match timeout(deadline, spawn_blocking(work)).await {
        Ok(Ok(Ok(hits))) => (hits, None),
        Ok(Ok(Err(e))) => {
            warn!(runner = name, "Runner failed: {e}");
            (Vec::new(), Some(name))
        }
        Ok(Err(join_err)) => {
            warn!(runner = name, "Runner task panicked: {join_err}");
            (Vec::new(), Some(name))
        }
        Err(_) => {
            warn!(runner = name, deadline_ms = deadline.as_millis() as u64, "Runner timed out");
            (Vec::new(), Some(name))
        }
    }
}

/// Execute all four strategies concurrently and collect their output.
///
/// The vector runners contribute nothing (and are not counted degraded)
/// when the request carries no query embedding.
pub async fn run_all(
    store: Arc<dyn MemoryStore>,
    request: &RecallRequest,
    filters: &SearchFilters,
    options: &RecallOptions,
) -> RunnerOutcome {
    let deadline = Duration::from_millis(options.deadline_ms);
    let limit = options.limit;

    let keyword = {
        let store = Arc::clone(&store);
        let query = request.query.clone();
        let owner = request.owner_id.clone();
        let filters = filters.clone();
        run_one("keyword", deadline, move || {
            store.keyword_search(&query, &owner, &filters, limit)
        })
    };

    let bfs = {
        let store = Arc::clone(&store);
        let query = request.query.clone();
        let owner = request.owner_id.clone();
        let filters = filters.clone();
        let max_depth = options.max_bfs_depth;
        run_one("bfs", deadline, move || {
            store.graph_bfs(&query, &owner, &filters, max_depth)
        })
    };

    let vector = {
        let store = Arc::clone(&store);
        let embedding = request.query_embedding.clone();
        let owner = request.owner_id.clone();
        let filters = filters.clone();
        run_one("vector", deadline, move || match embedding {
            Some(embedding) => {
                store.vector_search_statements(&embedding, &owner, &filters, limit)
            }
            None => Ok(Vec::new()),
        })
    };

    let episode_vector = {
        let store = Arc::clone(&store);
        let embedding = request.query_embedding.clone();
        let owner = request.owner_id.clone();
        let filters = filters.clone();
        run_one("episode_vector", deadline, move || match embedding {
            Some(embedding) => store.vector_search_episodes(&embedding, &owner, &filters, limit),
            None => Ok(Vec::new()),
        })
    };

    let (keyword, bfs, vector, episode_vector) =
        tokio::join!(keyword, bfs, vector, episode_vector);

    let mut outcome = RunnerOutcome::default();
    let (hits, degraded) = keyword;
    outcome.results.keyword = hits;
    outcome.degraded.extend(degraded.map(String::from));

    let (hits, degraded) = bfs;
    outcome.results.bfs = hits;
    outcome.degraded.extend(degraded.map(String::from));

    let (hits, degraded) = vector;
    outcome.results.vector = hits;
    outcome.degraded.extend(degraded.map(String::from));

    let (hits, degraded) = episode_vector;
    outcome.results.episode_vector = hits;
    outcome.degraded.extend(degraded.map(String::from));

    outcome
}
