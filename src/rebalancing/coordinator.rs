//! Topology-driven rebalancing, executed by the coordinator only.
//!
//! On every membership view change the coordinator recomputes the bucket
//! table from the live members, redistributes all known entries over it and
//! publishes the result with a fresh change marker.

use crate::cluster::ClusterView;
use crate::error::Result;
use crate::listener::DefinitionsService;
use crate::partitioning::{calculate_partition, update_buckets, BucketTable};
use crate::rebalancing::state::PartitionState;
use crate::types::{NodeId, PartitionEntry};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// Summary of a completed rebalance.
#[derive(Debug, Clone)]
pub struct RebalanceOutcome {
    /// The bucket table now in force.
    pub buckets: BucketTable,

    /// Number of entries distributed.
    pub entries: usize,

    /// Slots whose owner changed compared to the previous table.
    pub reassigned_slots: usize,

    /// Whether the entries were seeded from the definitions service.
    pub seeded: bool,

    /// Time spent computing and publishing.
    pub duration: Duration,
}

/// Recomputes and publishes the partition when membership changes.
pub struct Rebalancer {
    /// This node's ID.
    node_id: NodeId,

    view: Arc<dyn ClusterView>,

    state: Arc<PartitionState>,

    definitions: Arc<dyn DefinitionsService>,
}

impl Rebalancer {
    pub fn new(
        view: Arc<dyn ClusterView>,
        state: Arc<PartitionState>,
        definitions: Arc<dyn DefinitionsService>,
    ) -> Self {
        Self {
            node_id: view.local_member(),
            view,
            state,
            definitions,
        }
    }

    /// Rebalance after a membership view change.
    ///
    /// Returns `None` without touching shared state when this node is not
    /// the coordinator.
    pub async fn process_topology_change(&self) -> Result<Option<RebalanceOutcome>> {
        if !self.view.is_coordinator() {
            debug!(node_id = self.node_id, "Not coordinator, skipping rebalance");
            return Ok(None);
        }

        let started = Instant::now();
        let _guard = self.state.lock().await;
        let snapshot = self.state.snapshot().await?;

        let members = self.view.members();
        let buckets = update_buckets(snapshot.buckets.as_ref(), &members)?;
        debug!(
            node_id = self.node_id,
            old = ?snapshot.buckets,
            new = ?buckets,
            "Processing topology change"
        );

        let (entries, seeded) = match &snapshot.current {
            Some(current) => (current.keys().cloned().collect::<Vec<_>>(), false),
            None => (self.initial_entries().await, true),
        };

        let partition = calculate_partition(&entries, &buckets)?;
        self.state
            .publish_rebalance(&buckets, snapshot.current.as_ref(), &partition)
            .await?;

        let reassigned_slots = snapshot
            .buckets
            .as_ref()
            .map(|old| old.reassigned_slots(&buckets))
            .unwrap_or(buckets.len());

        let outcome = RebalanceOutcome {
            buckets,
            entries: entries.len(),
            reassigned_slots,
            seeded,
            duration: started.elapsed(),
        };

        info!(
            node_id = self.node_id,
            members = members.len(),
            entries = outcome.entries,
            reassigned_slots = outcome.reassigned_slots,
            seeded = outcome.seeded,
            duration_ms = outcome.duration.as_millis() as u64,
            "Partition rebalanced"
        );

        Ok(Some(outcome))
    }

    /// Entries of the first partition ever, from the definitions service.
    ///
    /// A failing service yields an empty partition; the next rebalance after
    /// the service recovers does not reseed, so triggers reach the partition
    /// through trigger notifications from then on.
    async fn initial_entries(&self) -> Vec<PartitionEntry> {
        match self.definitions.get_all_triggers().await {
            Ok(triggers) => triggers.iter().map(PartitionEntry::from).collect(),
            Err(e) => {
                error!(
                    node_id = self.node_id,
                    error = %e,
                    "Cannot initialize partition from definitions, starting empty"
                );
                Vec::new()
            }
        }
    }
}
