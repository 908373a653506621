//! Consistent hashing of partition entries onto bucket table slots.
//!
//! Entries are hashed with SHA-256 and placed with a jump consistent hash, so
//! growing a table from `n` to `n + 1` slots moves about `1 / (n + 1)` of the
//! entries, all of them into the new slot.

use crate::error::{Error, Result};
use crate::partitioning::buckets::BucketTable;
use crate::types::{NodeId, PartitionEntry, PartitionMap};
use sha2::{Digest, Sha256};

/// Multiplier of the linear congruential generator driving the jumps.
const LCG_MULTIPLIER: u64 = 2_862_933_555_777_941_757;

/// Stable 64-bit hash of an entry.
///
/// Depends only on the tenant and trigger ids, never on process state or
/// insertion order.
pub fn entry_hash(entry: &PartitionEntry) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(entry.tenant_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(entry.trigger_id.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Map a hash onto `[0, buckets)`.
///
/// `buckets` must be positive.
pub fn jump_consistent_hash(input: u64, buckets: usize) -> usize {
    debug_assert!(buckets > 0);
    let buckets = buckets.min(i32::MAX as usize) as i64;
    let mut state = input;
    let mut candidate: i64 = 0;

    loop {
        state = state.wrapping_mul(LCG_MULTIPLIER).wrapping_add(1);
        let step = ((state >> 33) as i32).wrapping_add(1) as f64 / (1u64 << 31) as f64;
        let next = ((candidate + 1) as f64 / step) as i32 as i64;
        if next >= 0 && next < buckets {
            candidate = next;
        } else {
            return candidate as usize;
        }
    }
}

/// Owner of a single entry under the given bucket table.
pub fn calculate_new_entry(entry: &PartitionEntry, buckets: &BucketTable) -> Result<NodeId> {
    if buckets.is_empty() {
        return Err(Error::InvalidArgument(
            "bucket table must not be empty".to_string(),
        ));
    }
    owner_of(entry, buckets)
}

/// Distribute entries across the members of a bucket table.
pub fn calculate_partition(
    entries: &[PartitionEntry],
    buckets: &BucketTable,
) -> Result<PartitionMap> {
    if buckets.is_empty() {
        return Err(Error::InvalidArgument(
            "bucket table must not be empty".to_string(),
        ));
    }

    let mut partition = PartitionMap::with_capacity(entries.len());
    for entry in entries {
        partition.insert(entry.clone(), owner_of(entry, buckets)?);
    }
    Ok(partition)
}

fn owner_of(entry: &PartitionEntry, buckets: &BucketTable) -> Result<NodeId> {
    let slot = jump_consistent_hash(entry_hash(entry), buckets.len());
    buckets
        .get(slot)
        .ok_or_else(|| Error::Internal(format!("slot {} outside bucket table", slot)))
}
