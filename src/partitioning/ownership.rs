//! Per-node views of a partition map.
//!
//! These helpers turn a cluster-wide [`PartitionMap`] into what a single node
//! cares about: the entries it owns now, and which ones it gained or lost
//! since the previous map.

use crate::types::{NodeId, NodePartition, PartitionEntry, PartitionMap};
use std::collections::BTreeSet;

/// Entries a node gained and lost between two partition maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionDelta {
    /// Entries owned by the node before but not anymore.
    pub removed: NodePartition,
    /// Entries owned by the node now but not before.
    pub added: NodePartition,
}

impl PartitionDelta {
    /// Check if the node's ownership did not change.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Entries of a partition owned by `node`, grouped by tenant.
///
/// Trigger ids are sorted within each tenant.
pub fn node_partition(partition: Option<&PartitionMap>, node: NodeId) -> NodePartition {
    let mut out = NodePartition::new();
    if let Some(partition) = partition {
        group(&mut out, owned_by(partition, node));
    }
    out
}

/// Compute the entries `node` gained and lost from `previous` to `current`.
///
/// Without a previous map (first partition ever) every entry of `current`
/// counts as added, whoever owns it.
pub fn added_removed(
    previous: Option<&PartitionMap>,
    current: &PartitionMap,
    node: NodeId,
) -> PartitionDelta {
    let mut delta = PartitionDelta::default();
    let previous = match previous {
        Some(previous) if !previous.is_empty() => previous,
        _ => {
            let all: BTreeSet<&PartitionEntry> = current.keys().collect();
            group(&mut delta.added, all);
            return delta;
        }
    };

    let now = owned_by(current, node);
    let before = owned_by(previous, node);

    group(&mut delta.removed, before.difference(&now).copied());
    group(&mut delta.added, now.difference(&before).copied());
    delta
}

fn owned_by(partition: &PartitionMap, node: NodeId) -> BTreeSet<&PartitionEntry> {
    partition
        .iter()
        .filter(|(_, owner)| **owner == node)
        .map(|(entry, _)| entry)
        .collect()
}

fn group<'a>(out: &mut NodePartition, entries: impl IntoIterator<Item = &'a PartitionEntry>) {
    // Entries arrive sorted by (tenant, trigger), so pushes keep each list sorted.
    for entry in entries {
        out.entry(entry.tenant_id.clone())
            .or_default()
            .push(entry.trigger_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const N1: NodeId = 1;
    const N2: NodeId = 2;
    const N3: NodeId = 3;

    fn entry(tenant: &str, trigger: &str) -> PartitionEntry {
        PartitionEntry::new(tenant, trigger)
    }

    fn slice(pairs: &[(&str, &[&str])]) -> NodePartition {
        pairs
            .iter()
            .map(|(tenant, triggers)| {
                (
                    tenant.to_string(),
                    triggers.iter().map(|t| t.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn test_node_partition_groups_by_tenant() {
        let mut partition = PartitionMap::new();
        partition.insert(entry("t1", "b"), N1);
        partition.insert(entry("t1", "a"), N1);
        partition.insert(entry("t2", "c"), N1);
        partition.insert(entry("t2", "d"), N2);

        assert_eq!(
            node_partition(Some(&partition), N1),
            slice(&[("t1", &["a", "b"]), ("t2", &["c"])])
        );
        assert_eq!(node_partition(Some(&partition), N2), slice(&[("t2", &["d"])]));
        assert!(node_partition(Some(&partition), N3).is_empty());
        assert!(node_partition(None, N1).is_empty());
    }

    #[test]
    fn test_diff_between_partitions() {
        let e1 = entry("t", "e1");
        let e2 = entry("t", "e2");
        let e3 = entry("t", "e3");

        let mut previous = PartitionMap::new();
        previous.insert(e1.clone(), N1);
        previous.insert(e2.clone(), N2);

        let mut current = PartitionMap::new();
        current.insert(e1, N1);
        current.insert(e2, N3);
        current.insert(e3, N1);

        let delta = added_removed(Some(&previous), &current, N1);
        assert_eq!(delta.added, slice(&[("t", &["e3"])]));
        assert!(delta.removed.is_empty());

        let delta = added_removed(Some(&previous), &current, N2);
        assert!(delta.added.is_empty());
        assert_eq!(delta.removed, slice(&[("t", &["e2"])]));
    }

    #[test]
    fn test_first_partition_is_all_added() {
        let mut current = PartitionMap::new();
        current.insert(entry("t", "x"), N1);
        current.insert(entry("u", "y"), N1);
        current.insert(entry("u", "z"), N2);

        let all = slice(&[("t", &["x"][..]), ("u", &["y", "z"][..])]);

        let delta = added_removed(None, &current, N1);
        assert_eq!(delta.added, all);
        assert!(delta.removed.is_empty());

        // An empty previous map counts as no previous map, for any node.
        let delta = added_removed(Some(&PartitionMap::new()), &current, N2);
        assert_eq!(delta.added, all);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn test_unchanged_ownership() {
        let mut partition = PartitionMap::new();
        partition.insert(entry("t", "x"), N1);

        assert!(added_removed(Some(&partition), &partition, N1).is_empty());
    }
}
