//! Trigger notifications.
//!
//! Any node announcing a trigger mutation addresses the message to the
//! trigger's owner under the live bucket table. The addressee patches the
//! partition map for that single entry and republishes the current/previous
//! pair; every other node ignores the message.

use crate::error::Result;
use crate::rebalancing::PartitionState;
use crate::types::{NodeId, PartitionEntry, PartitionMap, TriggerOperation};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A trigger mutation addressed to the owner of the trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyTrigger {
    pub from_node: NodeId,
    pub to_node: NodeId,
    pub operation: TriggerOperation,
    pub tenant_id: String,
    pub trigger_id: String,
}

impl NotifyTrigger {
    pub fn new(
        from_node: NodeId,
        to_node: NodeId,
        operation: TriggerOperation,
        tenant_id: impl Into<String>,
        trigger_id: impl Into<String>,
    ) -> Self {
        Self {
            from_node,
            to_node,
            operation,
            tenant_id: tenant_id.into(),
            trigger_id: trigger_id.into(),
        }
    }

    pub fn entry(&self) -> PartitionEntry {
        PartitionEntry::new(self.tenant_id.clone(), self.trigger_id.clone())
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }

    /// Decode a message; fails on unknown operation codes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Effect of a trigger notification on the partition map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The map already reflected the operation; nothing was written.
    Unchanged,
    /// The entry now belongs to the addressee.
    Assigned,
    /// The entry left the partition.
    Removed,
}

/// Compute the partition map after applying `operation` for `entry` on `node`.
///
/// Returns `None` when the map would not change: an add or update of an entry
/// the node already owns, or a removal of an unknown entry.
pub fn patch_partition(
    current: &PartitionMap,
    entry: &PartitionEntry,
    operation: TriggerOperation,
    node: NodeId,
) -> Option<PartitionMap> {
    match operation {
        TriggerOperation::Add | TriggerOperation::Update => {
            if current.get(entry) == Some(&node) {
                return None;
            }
            let mut patched = current.clone();
            patched.insert(entry.clone(), node);
            Some(patched)
        }
        TriggerOperation::Remove => {
            if !current.contains_key(entry) {
                return None;
            }
            let mut patched = current.clone();
            patched.remove(entry);
            Some(patched)
        }
    }
}

/// Apply a notification addressed to `node_id` to the shared partition.
pub async fn apply_notification(
    state: &PartitionState,
    message: &NotifyTrigger,
    node_id: NodeId,
) -> Result<PatchOutcome> {
    let entry = message.entry();

    let _guard = state.lock().await;
    let current = state.current().await?.unwrap_or_default();

    let patched = match patch_partition(&current, &entry, message.operation, node_id) {
        Some(patched) => patched,
        None => {
            debug!(
                node_id,
                operation = %message.operation,
                entry = %entry,
                "Partition already up to date"
            );
            return Ok(PatchOutcome::Unchanged);
        }
    };

    state.publish_patch(&current, &patched).await?;
    debug!(
        node_id,
        operation = %message.operation,
        entry = %entry,
        entries = patched.len(),
        "Partition patched"
    );

    Ok(match message.operation {
        TriggerOperation::Remove => PatchOutcome::Removed,
        _ => PatchOutcome::Assigned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryRegion;
    use crate::config::PartitionConfig;
    use crate::error::Error;
    use std::sync::Arc;
    use std::time::Duration;

    fn state() -> PartitionState {
        let region = Arc::new(MemoryRegion::new("partition", &PartitionConfig::default()));
        PartitionState::new(region, Duration::from_millis(100))
    }

    #[test]
    fn test_patch_add_is_idempotent() {
        let entry = PartitionEntry::new("t", "x");
        let mut current = PartitionMap::new();
        current.insert(entry.clone(), 1);

        assert!(patch_partition(&current, &entry, TriggerOperation::Add, 1).is_none());
        assert!(patch_partition(&current, &entry, TriggerOperation::Update, 1).is_none());

        let moved = patch_partition(&current, &entry, TriggerOperation::Update, 2).unwrap();
        assert_eq!(moved[&entry], 2);
        assert_eq!(current[&entry], 1);
    }

    #[test]
    fn test_patch_remove() {
        let entry = PartitionEntry::new("t", "x");
        let other = PartitionEntry::new("t", "y");
        let mut current = PartitionMap::new();
        current.insert(entry.clone(), 3);

        assert!(patch_partition(&current, &other, TriggerOperation::Remove, 1).is_none());
        let removed = patch_partition(&current, &entry, TriggerOperation::Remove, 1).unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn test_unknown_operation_fails_to_decode() {
        let message = NotifyTrigger::new(1, 2, TriggerOperation::Remove, "t", "x");
        let bytes = message.to_bytes().unwrap();
        assert_eq!(NotifyTrigger::from_bytes(&bytes).unwrap(), message);

        // The operation byte follows the two node ids.
        let mut corrupt = bytes.to_vec();
        corrupt[16] = 7;
        assert!(matches!(
            NotifyTrigger::from_bytes(&corrupt),
            Err(Error::Codec(_))
        ));
    }

    #[tokio::test]
    async fn test_apply_publishes_only_changes() {
        let state = state();
        let add = NotifyTrigger::new(2, 1, TriggerOperation::Add, "t", "x");

        assert_eq!(
            apply_notification(&state, &add, 1).await.unwrap(),
            PatchOutcome::Assigned
        );
        let snapshot = state.snapshot().await.unwrap();
        assert_eq!(snapshot.previous, Some(PartitionMap::new()));
        assert_eq!(snapshot.current.as_ref().map(|c| c[&add.entry()]), Some(1));

        assert_eq!(
            apply_notification(&state, &add, 1).await.unwrap(),
            PatchOutcome::Unchanged
        );
        // The unchanged apply left the pair alone.
        assert_eq!(
            state.snapshot().await.unwrap().previous,
            Some(PartitionMap::new())
        );

        let remove = NotifyTrigger::new(2, 1, TriggerOperation::Remove, "t", "x");
        assert_eq!(
            apply_notification(&state, &remove, 1).await.unwrap(),
            PatchOutcome::Removed
        );
        assert_eq!(state.current().await.unwrap(), Some(PartitionMap::new()));
        assert_eq!(
            apply_notification(&state, &remove, 1).await.unwrap(),
            PatchOutcome::Unchanged
        );
    }
}
