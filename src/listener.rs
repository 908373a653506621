//! Contracts between the partition manager and the evaluation engine.
//!
//! The engine implements [`PartitionTriggerListener`] and
//! [`PartitionDataListener`] to learn which triggers it owns and to receive
//! telemetry posted on other nodes. [`DefinitionsService`] is consumed to
//! seed the very first partition.
//!
//! Listener methods run on the manager's event loops. They must not block
//! for long: events queued behind a slow listener can be dropped.

use crate::error::Result;
use crate::types::{Data, Event, NodePartition, Trigger, TriggerOperation};
use async_trait::async_trait;

/// Reacts to changes in trigger ownership.
pub trait PartitionTriggerListener: Send + Sync + 'static {
    /// The partition map changed after a rebalance.
    ///
    /// `partition` is everything this node owns now; `removed` and `added`
    /// are the differences against the previous partition.
    fn on_partition_change(
        &self,
        partition: &NodePartition,
        removed: &NodePartition,
        added: &NodePartition,
    );

    /// A trigger owned by this node was added, updated or removed.
    fn on_trigger_change(&self, operation: TriggerOperation, tenant_id: &str, trigger_id: &str);
}

/// Receives telemetry posted on other nodes.
pub trait PartitionDataListener: Send + Sync + 'static {
    fn on_new_data(&self, data: Data);

    fn on_new_data_batch(&self, data: Vec<Data>);

    fn on_new_event(&self, event: Event);

    fn on_new_events(&self, events: Vec<Event>);
}

/// Source of trigger definitions.
#[async_trait]
pub trait DefinitionsService: Send + Sync + 'static {
    /// Enumerate every trigger of every tenant.
    async fn get_all_triggers(&self) -> Result<Vec<Trigger>>;
}

/// Definitions service backed by a fixed list, for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticDefinitions {
    triggers: Vec<Trigger>,
}

impl StaticDefinitions {
    pub fn new(triggers: Vec<Trigger>) -> Self {
        Self { triggers }
    }
}

#[async_trait]
impl DefinitionsService for StaticDefinitions {
    async fn get_all_triggers(&self) -> Result<Vec<Trigger>> {
        Ok(self.triggers.clone())
    }
}
