//! Storage layer: the [`MemoryStore`] trait the recall runners search
//! through, plus the embedded implementation backing it.

pub mod embedded;
pub mod graph;
pub mod keyword;

pub use embedded::EmbeddedStore;
pub use graph::FactGraph;
pub use keyword::StatementIndex;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::types::{
    Episode, EpisodeId, RecallRequest, Space, SpaceId, Statement, StatementId, TimeWindow,
};

/// Filters applied uniformly by every strategy runner, so the same episode
/// cannot be excluded by one source and admitted by another.
#[derive(Debug, Clone)]
pub struct SearchFilters {
    /// Restrict to statements valid inside this window
    pub time_window: Option<TimeWindow>,

    /// Restrict to statements assigned to this space
    pub space_id: Option<SpaceId>,

    /// Restrict graph seeding to these entity names
    pub entity_filter: Vec<String>,

    /// Admit superseded statements
    pub include_invalidated: bool,

    /// Point-in-time validity instant. Derived from the time window's end so
    /// historical queries see the facts that were true then.
    pub as_of: DateTime<Utc>,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            time_window: None,
            space_id: None,
            entity_filter: Vec::new(),
            include_invalidated: false,
            as_of: Utc::now(),
        }
    }
}

impl SearchFilters {
    /// Derive the runner filters from a validated recall request.
    pub fn from_request(request: &RecallRequest) -> Self {
        let as_of = request
            .time_window
            .as_ref()
            .map(|w| w.end)
            .unwrap_or_else(Utc::now);

        Self {
            time_window: request.time_window,
            space_id: request.space_id,
            entity_filter: request.entity_filter.clone(),
            include_invalidated: request.include_invalidated,
            as_of,
        }
    }

    /// Whether a statement passes the temporal and space filters.
    pub fn admits(&self, statement: &Statement) -> bool {
        if !self.include_invalidated && !statement.is_valid_at(self.as_of) {
            return false;
        }

        if let Some(window) = &self.time_window {
            if !window.contains(statement.valid_at) {
                return false;
            }
        }

        if let Some(space_id) = self.space_id {
            if statement.space_id != Some(space_id) {
                return false;
            }
        }

        true
    }
}

/// Synchronous storage surface the recall runners search through.
///
/// Implementations must be cheap to share; runners call these methods from
/// blocking tasks under a per-request deadline.
pub trait MemoryStore: Send + Sync {
    // --- retrieval -----------------------------------------------------

    /// BM25 keyword search over statement text. Scores are raw BM25.
    fn keyword_search(
        &self,
        query: &str,
        owner_id: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<(Statement, f32)>>;

    /// Cosine similarity search over statement embeddings. Scores in [-1, 1].
    fn vector_search_statements(
        &self,
        embedding: &[f32],
        owner_id: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<(Statement, f32)>>;

    /// Cosine similarity search over whole-episode embeddings.
    fn vector_search_episodes(
        &self,
        embedding: &[f32],
        owner_id: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<(Episode, f32)>>;

    /// Entity-seeded BFS through the fact graph. Returns statements with hop
    /// distance (0 = statement touches a query entity directly).
    fn graph_bfs(
        &self,
        query: &str,
        owner_id: &str,
        filters: &SearchFilters,
        max_depth: usize,
    ) -> Result<Vec<(Statement, usize)>>;

    // --- lookups -------------------------------------------------------

    fn get_episode(&self, id: &EpisodeId) -> Result<Episode>;

    fn get_statement(&self, id: &StatementId) -> Result<Statement>;

    fn get_space(&self, id: &SpaceId) -> Result<Space>;

    fn spaces_for_owner(&self, owner_id: &str) -> Vec<Space>;

    /// Active statements currently assigned to a space.
    fn statements_for_space(&self, space_id: &SpaceId) -> Vec<Statement>;

    /// Active statements of an owner with no space assignment.
    fn unassigned_statements(&self, owner_id: &str) -> Vec<Statement>;

    // --- lifecycle mutation -------------------------------------------

    /// Persist a space after a lifecycle transition.
    fn put_space(&self, space: Space) -> Result<()>;

    /// Set or clear a statement's space assignment.
    fn assign_statement_space(&self, id: &StatementId, space_id: Option<SpaceId>) -> Result<()>;

    /// Episodes ingested for this owner since the last clustering run.
    fn unclustered_episode_count(&self, owner_id: &str) -> usize;

    /// Deduct the episodes covered by a finished clustering run from the
    /// owner's unclustered counter. Episodes ingested while the run was in
    /// flight stay counted toward the next run.
    fn mark_owner_clustered(&self, owner_id: &str, processed: usize);
}
