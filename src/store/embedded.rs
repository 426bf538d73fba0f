//! Embedded store: concurrent maps for the primary records, a tantivy
//! keyword index and an in-memory fact graph on the side.
//!
//! Ingestion keeps the secondary structures synchronized with the primary
//! maps; the recall runners only ever read. Owner scoping is enforced at
//! every read path, never left to the caller.

use std::path::Path;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::errors::{MemoryError, Result};
use crate::similarity::top_k_similar;
use crate::store::{FactGraph, MemoryStore, SearchFilters, StatementIndex};
use crate::types::{Episode, EpisodeId, Space, SpaceId, Statement, StatementId};
use crate::validation::{validate_embedding, validate_owner_id};

pub struct EmbeddedStore {
    episodes: DashMap<EpisodeId, Episode>,
    statements: DashMap<StatementId, Statement>,
    spaces: DashMap<SpaceId, Space>,

    keyword_index: StatementIndex,
    graph: RwLock<FactGraph>,

    /// Per-owner episodes ingested since the last clustering run
    unclustered_counts: DashMap<String, usize>,
}

impl EmbeddedStore {
    /// In-memory store with a volatile keyword index. The unit of choice for
    /// tests and short-lived agents.
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            episodes: DashMap::new(),
            statements: DashMap::new(),
            spaces: DashMap::new(),
            keyword_index: StatementIndex::in_memory()?,
            graph: RwLock::new(FactGraph::new()),
            unclustered_counts: DashMap::new(),
        })
    }

    /// Store with an on-disk keyword index under `path`. Primary records are
    /// still memory-resident; durability of those is the embedder's concern.
    pub fn open(path: &Path) -> Result<Self> {
        let keyword_index = StatementIndex::open(&path.join("keyword_index"))?;
        info!(path = %path.display(), "Opened embedded store");
        Ok(Self {
            episodes: DashMap::new(),
            statements: DashMap::new(),
            spaces: DashMap::new(),
            keyword_index,
            graph: RwLock::new(FactGraph::new()),
            unclustered_counts: DashMap::new(),
        })
    }

    // --- ingestion -----------------------------------------------------

    /// Ingest an episode. Statements extracted from it are added separately
    /// through [`Self::add_statement`].
    pub fn add_episode(&self, episode: Episode) -> Result<EpisodeId> {
        validate_owner_id(&episode.owner_id)?;
        if let Some(embedding) = &episode.embedding {
            validate_embedding(embedding)?;
        }

        let id = episode.id;
        *self
            .unclustered_counts
            .entry(episode.owner_id.clone())
            .or_insert(0) += 1;
        self.episodes.insert(id, episode);
        Ok(id)
    }

    /// Ingest a statement. The parent episode must already exist; the
    /// keyword index and fact graph are updated before the primary insert
    /// becomes visible.
    pub fn add_statement(&self, statement: Statement) -> Result<StatementId> {
        validate_owner_id(&statement.owner_id)?;
        if let Some(embedding) = &statement.embedding {
            validate_embedding(embedding)?;
        }
        if !self.episodes.contains_key(&statement.episode_id) {
            return Err(MemoryError::EpisodeNotFound(
                statement.episode_id.0.to_string(),
            ));
        }
        if let Some(invalid_at) = statement.invalid_at {
            if invalid_at <= statement.valid_at {
                return Err(MemoryError::InvalidInput {
                    field: "invalid_at".to_string(),
                    reason: "invalid_at must be after valid_at".to_string(),
                });
            }
        }

        let entities = statement_entities(&statement);
        self.keyword_index
            .upsert(&statement.id, &statement.fact, &entities, &statement.owner_id)
            .map_err(|e| MemoryError::IndexError(e.to_string()))?;
        self.keyword_index
            .commit()
            .map_err(|e| MemoryError::IndexError(e.to_string()))?;
        self.graph.write().insert(&statement);

        let id = statement.id;
        self.statements.insert(id, statement);
        Ok(id)
    }

    /// Merge metadata keys into an existing episode. New keys are added,
    /// existing keys overwritten; content and timestamps never change.
    pub fn enrich_episode_metadata(
        &self,
        id: &EpisodeId,
        metadata: impl IntoIterator<Item = (String, String)>,
    ) -> Result<()> {
        let mut episode = self
            .episodes
            .get_mut(id)
            .ok_or_else(|| MemoryError::EpisodeNotFound(id.0.to_string()))?;
        episode.metadata.extend(metadata);
        debug!(episode_id = %id.0, "Episode metadata enriched");
        Ok(())
    }

    /// Mark a statement as superseded from the given instant. The statement
    /// stays queryable for historical (as-of) recalls.
    pub fn supersede_statement(
        &self,
        id: &StatementId,
        invalid_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        let mut statement = self
            .statements
            .get_mut(id)
            .ok_or_else(|| MemoryError::StatementNotFound(id.0.to_string()))?;

        if invalid_at <= statement.valid_at {
            return Err(MemoryError::InvalidInput {
                field: "invalid_at".to_string(),
                reason: "invalid_at must be after valid_at".to_string(),
            });
        }

        statement.invalid_at = Some(invalid_at);
        debug!(statement_id = %id.0, "Statement superseded");
        Ok(())
    }

    /// Delete an episode and every statement derived from it.
    pub fn delete_episode(&self, id: &EpisodeId) -> Result<()> {
        let (_, episode) = self
            .episodes
            .remove(id)
            .ok_or_else(|| MemoryError::EpisodeNotFound(id.0.to_string()))?;

        let derived: Vec<StatementId> = self
            .statements
            .iter()
            .filter(|s| s.episode_id == *id)
            .map(|s| s.id)
            .collect();

        for stmt_id in &derived {
            self.statements.remove(stmt_id);
            self.keyword_index
                .delete(stmt_id)
                .map_err(|e| MemoryError::IndexError(e.to_string()))?;
            self.graph.write().remove(&episode.owner_id, stmt_id);
        }
        self.keyword_index
            .commit()
            .map_err(|e| MemoryError::IndexError(e.to_string()))?;

        info!(episode_id = %id.0, cascaded = derived.len(), "Episode deleted");
        Ok(())
    }

    /// Create a space. Starts in the `created` lifecycle state.
    pub fn create_space(&self, space: Space) -> Result<SpaceId> {
        validate_owner_id(&space.owner_id)?;
        let id = space.id;
        self.spaces.insert(id, space);
        Ok(id)
    }

    /// Delete a space. Statements assigned to it revert to unassigned; they
    /// are never deleted with the space.
    pub fn delete_space(&self, id: &SpaceId) -> Result<()> {
        self.spaces
            .remove(id)
            .ok_or_else(|| MemoryError::SpaceNotFound(id.0.to_string()))?;

        let mut reverted = 0usize;
        for mut statement in self.statements.iter_mut() {
            if statement.space_id == Some(*id) {
                statement.space_id = None;
                reverted += 1;
            }
        }
        info!(space_id = %id.0, reverted, "Space deleted");
        Ok(())
    }

    pub fn episode_count(&self) -> usize {
        self.episodes.len()
    }

    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

/// Non-empty entity names mentioned by a statement.
fn statement_entities(statement: &Statement) -> Vec<String> {
    let mut entities = vec![statement.subject.clone()];
    if !statement.object.is_empty() {
        entities.push(statement.object.clone());
    }
    entities
}

impl MemoryStore for EmbeddedStore {
    fn keyword_search(
        &self,
        query: &str,
        owner_id: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<(Statement, f32)>> {
        // Over-fetch so post-filtering does not starve the limit.
        let hits = self
            .keyword_index
            .search(query, owner_id, limit * 4)
            .map_err(|e| MemoryError::IndexError(e.to_string()))?;

        let mut results = Vec::with_capacity(limit);
        for (stmt_id, score) in hits {
            let Some(statement) = self.statements.get(&stmt_id) else {
                continue; // index lag after a delete
            };
            if !filters.admits(&statement) {
                continue;
            }
            results.push((statement.clone(), score));
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }

    fn vector_search_statements(
        &self,
        embedding: &[f32],
        owner_id: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<(Statement, f32)>> {
        let candidates: Vec<(Vec<f32>, StatementId)> = self
            .statements
            .iter()
            .filter(|s| s.owner_id == owner_id && filters.admits(s))
            .filter_map(|s| s.embedding.clone().map(|e| (e, s.id)))
            .collect();

        let top = top_k_similar(embedding, &candidates, limit);
        Ok(top
            .into_iter()
            .filter_map(|(score, id)| self.statements.get(&id).map(|s| (s.clone(), score)))
            .collect())
    }

    fn vector_search_episodes(
        &self,
        embedding: &[f32],
        owner_id: &str,
        filters: &SearchFilters,
        limit: usize,
    ) -> Result<Vec<(Episode, f32)>> {
        let candidates: Vec<(Vec<f32>, EpisodeId)> = self
            .episodes
            .iter()
            .filter(|e| e.owner_id == owner_id)
            .filter(|e| {
                filters
                    .time_window
                    .map(|w| w.contains(e.valid_at))
                    .unwrap_or(true)
            })
            .filter_map(|e| e.embedding.clone().map(|emb| (emb, e.id)))
            .collect();

        let top = top_k_similar(embedding, &candidates, limit);
        Ok(top
            .into_iter()
            .filter_map(|(score, id)| self.episodes.get(&id).map(|e| (e.clone(), score)))
            .collect())
    }

    fn graph_bfs(
        &self,
        query: &str,
        owner_id: &str,
        filters: &SearchFilters,
        max_depth: usize,
    ) -> Result<Vec<(Statement, usize)>> {
        let graph = self.graph.read();
        let seeds = graph.match_entities(owner_id, query, &filters.entity_filter);
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let reached = graph.bfs(owner_id, &seeds, max_depth);
        drop(graph);

        let mut results = Vec::with_capacity(reached.len());
        for (stmt_id, hop) in reached {
            let Some(statement) = self.statements.get(&stmt_id) else {
                continue;
            };
            if !filters.admits(&statement) {
                continue;
            }
            results.push((statement.clone(), hop));
        }
        Ok(results)
    }

    fn get_episode(&self, id: &EpisodeId) -> Result<Episode> {
        self.episodes
            .get(id)
            .map(|e| e.clone())
            .ok_or_else(|| MemoryError::EpisodeNotFound(id.0.to_string()))
    }

    fn get_statement(&self, id: &StatementId) -> Result<Statement> {
        self.statements
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| MemoryError::StatementNotFound(id.0.to_string()))
    }

    fn get_space(&self, id: &SpaceId) -> Result<Space> {
        self.spaces
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| MemoryError::SpaceNotFound(id.0.to_string()))
    }

    fn spaces_for_owner(&self, owner_id: &str) -> Vec<Space> {
        let mut spaces: Vec<Space> = self
            .spaces
            .iter()
            .filter(|s| s.owner_id == owner_id)
            .map(|s| s.clone())
            .collect();
        spaces.sort_by_key(|s| s.id);
        spaces
    }

    fn statements_for_space(&self, space_id: &SpaceId) -> Vec<Statement> {
        self.statements
            .iter()
            .filter(|s| s.space_id == Some(*space_id) && s.is_active())
            .map(|s| s.clone())
            .collect()
    }

    fn unassigned_statements(&self, owner_id: &str) -> Vec<Statement> {
        self.statements
            .iter()
            .filter(|s| s.owner_id == owner_id && s.space_id.is_none() && s.is_active())
            .map(|s| s.clone())
            .collect()
    }

    fn put_space(&self, space: Space) -> Result<()> {
        if !self.spaces.contains_key(&space.id) {
            return Err(MemoryError::SpaceNotFound(space.id.0.to_string()));
        }
        self.spaces.insert(space.id, space);
        Ok(())
    }

    fn assign_statement_space(&self, id: &StatementId, space_id: Option<SpaceId>) -> Result<()> {
        let mut statement = self
            .statements
            .get_mut(id)
            .ok_or_else(|| MemoryError::StatementNotFound(id.0.to_string()))?;
        statement.space_id = space_id;
        Ok(())
    }

    fn unclustered_episode_count(&self, owner_id: &str) -> usize {
        self.unclustered_counts
            .get(owner_id)
            .map(|c| *c)
            .unwrap_or(0)
    }

    fn mark_owner_clustered(&self, owner_id: &str, processed: usize) {
        if let Some(mut count) = self.unclustered_counts.get_mut(owner_id) {
            *count = count.saturating_sub(processed);
        }
    }
}
