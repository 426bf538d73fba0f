//! Nearest-centroid assignment of unassigned statements to spaces.
//!
//! Each ready space gets a centroid from the embeddings of its currently
//! assigned statements (falling back to the space's own embedding for an
//! empty space). Unassigned statements join the closest centroid when the
//! similarity clears the noise threshold; everything below it stays
//! unassigned rather than polluting a space.

use tracing::{debug, info};

use crate::config::SpaceConfig;
use crate::errors::Result;
use crate::similarity::{centroid, cosine_similarity};
use crate::store::MemoryStore;
use crate::types::{Space, SpaceId};

/// Centroid of a space: mean of assigned statement embeddings, or the space
/// embedding when nothing is assigned yet.
pub fn space_centroid(store: &dyn MemoryStore, space: &Space) -> Option<Vec<f32>> {
    let assigned = store.statements_for_space(&space.id);
    let embeddings: Vec<&[f32]> = assigned
        .iter()
        .filter_map(|s| s.embedding.as_deref())
        .collect();

    if embeddings.is_empty() {
        return space.embedding.clone();
    }
    centroid(&embeddings)
}

/// Outcome of one assignment pass.
#[derive(Debug, Default)]
pub struct AssignmentReport {
    pub assigned: usize,
    pub noise: usize,
    pub skipped_no_embedding: usize,
}

/// Assign an owner's unassigned statements to the nearest space centroid.
///
/// Statements whose best similarity is below the noise threshold keep their
/// null assignment. Statements without embeddings are skipped entirely.
pub fn assign_unassigned(
    store: &dyn MemoryStore,
    owner_id: &str,
    spaces: &[Space],
    config: &SpaceConfig,
) -> Result<AssignmentReport> {
    let centroids: Vec<(SpaceId, Vec<f32>)> = spaces
        .iter()
        .filter_map(|space| space_centroid(store, space).map(|c| (space.id, c)))
        .collect();

    let mut report = AssignmentReport::default();
    if centroids.is_empty() {
        return Ok(report);
    }

    for statement in store.unassigned_statements(owner_id) {
        let Some(embedding) = statement.embedding.as_deref() else {
            report.skipped_no_embedding += 1;
            continue;
        };

        let best = centroids
            .iter()
            .map(|(space_id, c)| (*space_id, cosine_similarity(embedding, c)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        match best {
            Some((space_id, similarity)) if similarity >= config.assign_min_similarity => {
                store.assign_statement_space(&statement.id, Some(space_id))?;
                report.assigned += 1;
                debug!(
                    statement_id = %statement.id.0,
                    space_id = %space_id.0,
                    similarity,
                    "Statement assigned to space"
                );
            }
            _ => report.noise += 1,
        }
    }

    info!(
        owner_id,
        assigned = report.assigned,
        noise = report.noise,
        "Assignment pass complete"
    );
    Ok(report)
}

/// Recompute and persist a space's assigned-statement count. Always derived
/// from actual assignments, never incremented in place.
pub fn refresh_context_count(store: &dyn MemoryStore, space_id: &SpaceId) -> Result<usize> {
    let count = store.statements_for_space(space_id).len();
    let mut space = store.get_space(space_id)?;
    space.context_count = count;
    space.updated_at = chrono::Utc::now();
    store.put_space(space)?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EmbeddedStore;
    use crate::types::{Episode, SpaceType, Statement};

    fn seeded() -> (EmbeddedStore, crate::types::EpisodeId) {
        let store = EmbeddedStore::in_memory().unwrap();
        let ep = store
            .add_episode(Episode::new("episode", "chat", "owner"))
            .unwrap();
        (store, ep)
    }

    fn statement_with_embedding(
        store: &EmbeddedStore,
        ep: crate::types::EpisodeId,
        embedding: Vec<f32>,
    ) -> crate::types::StatementId {
        let mut stmt = Statement::new("fact", "subject", ep, "owner");
        stmt.embedding = Some(embedding);
        store.add_statement(stmt).unwrap()
    }

    #[test]
    fn test_assignment_to_nearest_centroid() {
        let (store, ep) = seeded();

        let mut space_a = Space::new("A", SpaceType::Classification, "owner");
        space_a.embedding = Some(vec![1.0, 0.0]);
        let mut space_b = Space::new("B", SpaceType::Classification, "owner");
        space_b.embedding = Some(vec![0.0, 1.0]);
        store.create_space(space_a.clone()).unwrap();
        store.create_space(space_b.clone()).unwrap();

        let near_a = statement_with_embedding(&store, ep, vec![0.9, 0.1]);
        let near_b = statement_with_embedding(&store, ep, vec![0.1, 0.9]);

        let report = assign_unassigned(
            &store,
            "owner",
            &[space_a.clone(), space_b.clone()],
            &SpaceConfig::default(),
        )
        .unwrap();

        assert_eq!(report.assigned, 2);
        assert_eq!(
            store.get_statement(&near_a).unwrap().space_id,
            Some(space_a.id)
        );
        assert_eq!(
            store.get_statement(&near_b).unwrap().space_id,
            Some(space_b.id)
        );
    }

    #[test]
    fn test_noise_stays_unassigned() {
        let (store, ep) = seeded();

        let mut space = Space::new("A", SpaceType::Classification, "owner");
        space.embedding = Some(vec![1.0, 0.0, 0.0]);
        store.create_space(space.clone()).unwrap();

        // Orthogonal to the centroid: similarity 0, below the threshold
        let noise = statement_with_embedding(&store, ep, vec![0.0, 0.0, 1.0]);

        let report =
            assign_unassigned(&store, "owner", &[space], &SpaceConfig::default()).unwrap();

        assert_eq!(report.assigned, 0);
        assert_eq!(report.noise, 1);
        assert!(store.get_statement(&noise).unwrap().space_id.is_none());
    }

    #[test]
    fn test_centroid_prefers_assigned_statements() {
        let (store, ep) = seeded();

        let mut space = Space::new("A", SpaceType::Classification, "owner");
        space.embedding = Some(vec![0.0, 1.0]);
        let space_id = store.create_space(space.clone()).unwrap();

        let assigned = statement_with_embedding(&store, ep, vec![1.0, 0.0]);
        store
            .assign_statement_space(&assigned, Some(space_id))
            .unwrap();

        let c = space_centroid(&store, &store.get_space(&space_id).unwrap()).unwrap();
        assert_eq!(c, vec![1.0, 0.0], "assigned statements outweigh the space embedding");
    }

    #[test]
    fn test_refresh_context_count() {
        let (store, ep) = seeded();
        let space = Space::new("A", SpaceType::Classification, "owner");
        let space_id = store.create_space(space).unwrap();

        for _ in 0..3 {
            let id = statement_with_embedding(&store, ep, vec![1.0, 0.0]);
            store.assign_statement_space(&id, Some(space_id)).unwrap();
        }

        let count = refresh_context_count(&store, &space_id).unwrap();
        assert_eq!(count, 3);
        assert_eq!(store.get_space(&space_id).unwrap().context_count, 3);
    }
}
