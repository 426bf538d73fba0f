//! Space lifecycle: the status state machine and the controller that
//! advances spaces through keyword generation, clustering, and summary
//! generation.
//!
//! Transitions are validated against a closed table; a space can never skip
//! a stage or leave a failure state except through the retry path. Statuses
//! are only written at transition points, so a pipeline task that dies
//! mid-run leaves the space visibly in-progress until a retry, rather than
//! silently half-done.

pub mod clustering;
pub mod summary;
pub mod trigger;

pub use trigger::{should_cluster, ClusterLeases};

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::SpaceConfig;
use crate::errors::{MemoryError, Result};
use crate::llm::LanguageModel;
use crate::store::MemoryStore;
use crate::types::{Space, SpaceId};

/// Lifecycle status of a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpaceStatus {
    Created,
    ReadyForClustering,
    Clustering,
    ReadyForSummary,
    GeneratingSummary,
    Ready,
    KeywordGenerationFailed,
    ClusteringFailed,
    SummaryGenerationFailed,
    /// Unexpected fault outside the three stage-specific failures; terminal
    /// until operator intervention
    Error,
}

impl SpaceStatus {
    /// Closed transition table. Failure states only lead back into the
    /// stage that failed; in-progress states may re-enter themselves so an
    /// abandoned run can be picked up again; nothing skips a stage.
    pub fn can_transition(self, to: SpaceStatus) -> bool {
        use SpaceStatus::*;
        matches!(
            (self, to),
            (Created, ReadyForClustering)
                | (Created, KeywordGenerationFailed)
                | (KeywordGenerationFailed, ReadyForClustering)
                | (KeywordGenerationFailed, KeywordGenerationFailed)
                | (ReadyForClustering, Clustering)
                | (Clustering, Clustering)
                | (Clustering, ReadyForSummary)
                | (Clustering, ClusteringFailed)
                | (ClusteringFailed, Clustering)
                | (ReadyForSummary, GeneratingSummary)
                | (GeneratingSummary, GeneratingSummary)
                | (GeneratingSummary, Ready)
                | (GeneratingSummary, SummaryGenerationFailed)
                | (SummaryGenerationFailed, GeneratingSummary)
                | (Ready, Clustering)
                | (Created, Error)
                | (Clustering, Error)
                | (GeneratingSummary, Error)
        )
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::KeywordGenerationFailed
                | Self::ClusteringFailed
                | Self::SummaryGenerationFailed
                | Self::Error
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::ReadyForClustering => "ready_for_clustering",
            Self::Clustering => "clustering",
            Self::ReadyForSummary => "ready_for_summary",
            Self::GeneratingSummary => "generating_summary",
            Self::Ready => "ready",
            Self::KeywordGenerationFailed => "keyword_generation_failed",
            Self::ClusteringFailed => "clustering_failed",
            Self::SummaryGenerationFailed => "summary_generation_failed",
            Self::Error => "error",
        }
    }
}

/// Drives spaces through the lifecycle. One instance per store; safe to
/// share across tasks.
pub struct SpaceLifecycleController {
    store: Arc<dyn MemoryStore>,
    model: Arc<dyn LanguageModel>,
    config: SpaceConfig,
    leases: ClusterLeases,
}

impl SpaceLifecycleController {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        model: Arc<dyn LanguageModel>,
        config: SpaceConfig,
    ) -> Self {
        Self {
            store,
            model,
            config,
            leases: ClusterLeases::new(),
        }
    }

    /// Validate and persist a status transition, returning the updated
    /// space.
    fn transition(&self, mut space: Space, to: SpaceStatus) -> Result<Space> {
        if !space.status.can_transition(to) {
            return Err(MemoryError::InvalidTransition {
                from: space.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        info!(space_id = %space.id.0, from = space.status.as_str(), to = to.as_str(), "Space transition");
        space.status = to;
        space.updated_at = Utc::now();
        self.store.put_space(space.clone())?;
        Ok(space)
    }

    /// Advance a freshly created (or keyword-failed) space to
    /// `ready_for_clustering` by generating its topic keywords.
    pub async fn initialize_space(&self, space_id: &SpaceId) -> Result<Space> {
        let space = self.store.get_space(space_id)?;
        if !matches!(
            space.status,
            SpaceStatus::Created | SpaceStatus::KeywordGenerationFailed
        ) {
            return Err(MemoryError::InvalidTransition {
                from: space.status.as_str().to_string(),
                to: SpaceStatus::ReadyForClustering.as_str().to_string(),
            });
        }

        let facts: Vec<String> = self
            .store
            .unassigned_statements(&space.owner_id)
            .into_iter()
            .map(|s| s.fact)
            .collect();

        match self.model.generate_keywords(&space, &facts).await {
            Ok(keywords) => {
                let mut space = space;
                space.topic_keywords = keywords;
                self.transition(space, SpaceStatus::ReadyForClustering)
            }
            Err(e) => {
                warn!(space_id = %space_id.0, "Keyword generation failed: {e}");
                self.transition(space, SpaceStatus::KeywordGenerationFailed)
            }
        }
    }

    /// Run one clustering pass for an owner: move every eligible space
    /// through `clustering`, assign unassigned statements to centroids, and
    /// leave the spaces in `ready_for_summary`.
    ///
    /// Exactly one run per owner at a time; a second caller gets
    /// `ClusteringInProgress`.
    pub async fn run_clustering(&self, owner_id: &str) -> Result<()> {
        if !self.leases.try_acquire(owner_id, self.config.lease_ttl_secs) {
            return Err(MemoryError::ClusteringInProgress {
                owner: owner_id.to_string(),
            });
        }

        let result = self.run_clustering_locked(owner_id).await;
        self.leases.release(owner_id);
        result
    }

    async fn run_clustering_locked(&self, owner_id: &str) -> Result<()> {
        // Episodes ingested after this point belong to the next run.
        let snapshot = self.store.unclustered_episode_count(owner_id);

        let eligible: Vec<Space> = self
            .store
            .spaces_for_owner(owner_id)
            .into_iter()
            .filter(|s| {
                matches!(
                    s.status,
                    SpaceStatus::ReadyForClustering
                        | SpaceStatus::Ready
                        | SpaceStatus::ClusteringFailed
                        // Abandoned run: holding the lease proves the
                        // previous holder is gone, so re-entry is safe.
                        | SpaceStatus::Clustering
                )
            })
            .collect();

        if eligible.is_empty() {
            self.store.mark_owner_clustered(owner_id, snapshot);
            return Ok(());
        }

        let mut in_progress = Vec::with_capacity(eligible.len());
        for space in eligible {
            in_progress.push(self.transition(space, SpaceStatus::Clustering)?);
        }

        match clustering::assign_unassigned(
            self.store.as_ref(),
            owner_id,
            &in_progress,
            &self.config,
        ) {
            Ok(_report) => {
                let mut fault: Option<MemoryError> = None;
                for space in in_progress {
                    if let Err(e) = self.finish_clustered_space(&space.id) {
                        warn!(space_id = %space.id.0, "Post-clustering bookkeeping failed, quarantining space: {e}");
                        let current = self.store.get_space(&space.id)?;
                        self.transition(current, SpaceStatus::Error)?;
                        fault.get_or_insert(e);
                    }
                }
                self.store.mark_owner_clustered(owner_id, snapshot);
                match fault {
                    None => Ok(()),
                    Some(e) => Err(e),
                }
            }
            Err(e) => {
                warn!(owner_id, "Clustering failed: {e}");
                for space in in_progress {
                    let current = self.store.get_space(&space.id)?;
                    self.transition(current, SpaceStatus::ClusteringFailed)?;
                }
                Err(e)
            }
        }
    }

    /// Recompute a clustered space's context count and hand it to the
    /// summary stage.
    fn finish_clustered_space(&self, space_id: &SpaceId) -> Result<()> {
        clustering::refresh_context_count(self.store.as_ref(), space_id)?;
        // refresh rewrote the record; transition from the current stored
        // state
        let current = self.store.get_space(space_id)?;
        self.transition(current, SpaceStatus::ReadyForSummary)?;
        Ok(())
    }

    /// Advance a `ready_for_summary` space to `ready` by generating its
    /// summary.
    pub async fn generate_summary(&self, space_id: &SpaceId) -> Result<Space> {
        let space = self.store.get_space(space_id)?;
        let space = self.transition(space, SpaceStatus::GeneratingSummary)?;

        let facts: Vec<String> = self
            .store
            .statements_for_space(space_id)
            .into_iter()
            .map(|s| s.fact)
            .collect();

        match summary::generate(self.model.as_ref(), &space, &facts).await {
            Ok(text) => {
                let mut space = space;
                space.summary = text;
                space.context_count = facts.len();
                self.transition(space, SpaceStatus::Ready)
            }
            Err(e) => {
                warn!(space_id = %space_id.0, "Summary generation failed: {e}");
                self.transition(space, SpaceStatus::SummaryGenerationFailed)
            }
        }
    }

    /// Re-run the stage a failed space is stuck in. Also recovers spaces a
    /// dead task abandoned mid-run: clustering re-entry goes through the
    /// owner lease, so a still-live run is refused rather than duplicated.
    pub async fn retry(&self, space_id: &SpaceId) -> Result<()> {
        let space = self.store.get_space(space_id)?;
        match space.status {
            SpaceStatus::KeywordGenerationFailed => {
                self.initialize_space(space_id).await?;
                Ok(())
            }
            SpaceStatus::ClusteringFailed | SpaceStatus::Clustering => {
                self.run_clustering(&space.owner_id).await
            }
            SpaceStatus::SummaryGenerationFailed | SpaceStatus::GeneratingSummary => {
                // Summary regeneration is idempotent; re-entry overwrites
                // whatever the dead run left behind.
                self.generate_summary(space_id).await?;
                Ok(())
            }
            other => Err(MemoryError::InvalidTransition {
                from: other.as_str().to_string(),
                to: "retry".to_string(),
            }),
        }
    }

    /// Run the full pipeline for an owner when enough unclustered episodes
    /// have accumulated. Returns whether a run happened.
    pub async fn maybe_trigger(&self, owner_id: &str) -> Result<bool> {
        let count = self.store.unclustered_episode_count(owner_id);
        if !should_cluster(count, &self.config) {
            return Ok(false);
        }

        match self.run_clustering(owner_id).await {
            Ok(()) => {}
            // Another trigger beat us to it; that run covers this owner.
            Err(MemoryError::ClusteringInProgress { .. }) => return Ok(false),
            Err(e) => return Err(e),
        }

        for space in self.store.spaces_for_owner(owner_id) {
            if space.status == SpaceStatus::ReadyForSummary {
                self.generate_summary(&space.id).await?;
            }
        }
        Ok(true)
    }
}
