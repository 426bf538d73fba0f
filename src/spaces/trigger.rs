//! Clustering trigger: per-owner accumulation threshold plus a TTL lease
//! that keeps concurrent triggers mutually exclusive.
//!
//! The lease is advisory and in-process. Acquisition goes through the map's
//! entry API so two tasks racing for the same owner cannot both win; a
//! holder that dies without releasing is covered by the TTL.

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use crate::config::SpaceConfig;

/// Per-owner clustering leases.
#[derive(Debug, Default)]
pub struct ClusterLeases {
    held: DashMap<String, DateTime<Utc>>,
}

impl ClusterLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lease for an owner. Returns false while another
    /// holder's lease is still live.
    pub fn try_acquire(&self, owner_id: &str, ttl_secs: i64) -> bool {
        let now = Utc::now();

        // The entry holds the shard lock for the whole check-then-set, so
        // two racing callers cannot both observe an expired lease.
        let acquired = match self.held.entry(owner_id.to_string()) {
            Entry::Occupied(mut held) => {
                if now - *held.get() > Duration::seconds(ttl_secs) {
                    // Previous holder is gone; take over.
                    held.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        };

        debug!(owner_id, acquired, "Cluster lease attempt");
        acquired
    }

    pub fn release(&self, owner_id: &str) {
        self.held.remove(owner_id);
    }

    pub fn is_held(&self, owner_id: &str, ttl_secs: i64) -> bool {
        self.held
            .get(owner_id)
            .map(|acquired_at| Utc::now() - *acquired_at <= Duration::seconds(ttl_secs))
            .unwrap_or(false)
    }
}

/// Whether an owner has accumulated enough unclustered episodes to warrant
/// a clustering run.
pub fn should_cluster(unclustered_count: usize, config: &SpaceConfig) -> bool {
    unclustered_count >= config.cluster_trigger_threshold
}
