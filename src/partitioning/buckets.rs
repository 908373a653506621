//! Bucket table: the flat slot-to-member table underlying partition assignment.
//!
//! Slot `i` of a table with `n` slots belongs to exactly one live member.
//! When membership changes, [`update_buckets`] keeps as many slots as possible
//! with their previous owner so that the consistent hash moves few entries.

use crate::error::{Error, Result};
use crate::types::NodeId;
use serde::{Deserialize, Serialize};

/// Ordered assignment of slot indices `0..n-1` to cluster members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketTable {
    slots: Vec<NodeId>,
}

impl BucketTable {
    /// Create a table assigning slot `i` to `members[i]`.
    pub fn from_members(members: &[NodeId]) -> Self {
        Self {
            slots: members.to_vec(),
        }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Member owning a slot.
    pub fn get(&self, slot: usize) -> Option<NodeId> {
        self.slots.get(slot).copied()
    }

    /// Members in slot order.
    pub fn slots(&self) -> &[NodeId] {
        &self.slots
    }

    /// Check if a member owns any slot.
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.slots.contains(&node_id)
    }

    /// Number of slots whose owner differs between two tables.
    ///
    /// Slots present in only one of the tables count as changed.
    pub fn reassigned_slots(&self, other: &BucketTable) -> usize {
        let common = self.len().min(other.len());
        let changed = (0..common)
            .filter(|&slot| self.slots[slot] != other.slots[slot])
            .count();
        changed + self.len().max(other.len()) - common
    }
}

/// Recompute a bucket table for a new member list.
///
/// Without a previous table the members are laid out in order. Otherwise each
/// target slot first tries to keep a previous owner that is still alive and
/// not placed yet, scanning old slots in ascending order and only accepting
/// the same slot or a slot that no longer exists in the new table. A slot with
/// no retainable owner goes to `members[slot]` when that member is still
/// unplaced, else to the first unplaced member.
pub fn update_buckets(old: Option<&BucketTable>, members: &[NodeId]) -> Result<BucketTable> {
    if members.is_empty() {
        return Err(Error::InvalidArgument(
            "member list must not be empty".to_string(),
        ));
    }

    let old = match old {
        Some(old) if !old.is_empty() => old,
        _ => return Ok(BucketTable::from_members(members)),
    };

    let size = members.len();
    let mut slots: Vec<NodeId> = Vec::with_capacity(size);

    for new_slot in 0..size {
        let retained = old.slots.iter().enumerate().find_map(|(old_slot, &member)| {
            let movable = old_slot == new_slot || old_slot >= size;
            (movable && members.contains(&member) && !slots.contains(&member)).then_some(member)
        });

        let owner = match retained {
            Some(member) => member,
            None if !slots.contains(&members[new_slot]) => members[new_slot],
            None => *members
                .iter()
                .find(|m| !slots.contains(m))
                .ok_or_else(|| Error::Internal("member list contains duplicates".to_string()))?,
        };
        slots.push(owner);
    }

    Ok(BucketTable { slots })
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: NodeId = 11;
    const B: NodeId = 22;
    const C: NodeId = 33;
    const D: NodeId = 44;

    #[test]
    fn test_empty_members_rejected() {
        assert!(matches!(
            update_buckets(None, &[]),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_initial_layout() {
        let table = update_buckets(None, &[A, B, C]).unwrap();
        assert_eq!(table.slots(), &[A, B, C]);

        let empty = BucketTable::default();
        let table = update_buckets(Some(&empty), &[C, A]).unwrap();
        assert_eq!(table.slots(), &[C, A]);
    }

    #[test]
    fn test_member_join_keeps_existing_slots() {
        let old = BucketTable::from_members(&[A, B, C]);
        let table = update_buckets(Some(&old), &[A, B, C, D]).unwrap();

        assert_eq!(table.slots(), &[A, B, C, D]);
        assert_eq!(old.reassigned_slots(&table), 1);
    }

    #[test]
    fn test_member_join_in_different_order() {
        // Members reported in a new order must not reshuffle surviving slots.
        let old = BucketTable::from_members(&[A, B, C]);
        let table = update_buckets(Some(&old), &[D, C, B, A]).unwrap();

        assert_eq!(&table.slots()[..3], &[A, B, C]);
        assert_eq!(table.get(3), Some(D));
    }

    #[test]
    fn test_member_removal() {
        let old = BucketTable::from_members(&[A, B, C]);
        let table = update_buckets(Some(&old), &[A, C]).unwrap();

        assert_eq!(table.len(), 2);
        assert!(!table.contains(B));
        assert!(table.contains(A) && table.contains(C));
        // A stays in place, C moves into the freed slot.
        assert_eq!(table.slots(), &[A, C]);
    }

    #[test]
    fn test_replacement_never_duplicates() {
        let old = BucketTable::from_members(&[A, B, C]);
        let table = update_buckets(Some(&old), &[D, C]).unwrap();

        assert_eq!(table.len(), 2);
        assert!(table.contains(C) && table.contains(D));
    }

    #[test]
    fn test_churn_lower_than_rebuild() {
        let old = BucketTable::from_members(&[A, B, C, D]);
        let members = [D, C, A];
        let table = update_buckets(Some(&old), &members).unwrap();
        let rebuilt = BucketTable::from_members(&members);

        assert!(old.reassigned_slots(&table) <= old.reassigned_slots(&rebuilt));
        let mut sorted = table.slots().to_vec();
        sorted.sort();
        assert_eq!(sorted, vec![A, C, D]);
    }
}
