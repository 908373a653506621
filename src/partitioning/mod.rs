//! Partitioning module for distributing triggers across cluster nodes.
//!
//! This module implements the pure algorithms of the partition manager:
//! - A bucket table assigning slots to members, updated with minimal churn
//! - Consistent hashing of (tenant, trigger) entries onto the bucket table
//! - Per-node slices and diffs of the resulting partition map
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      BucketTable                             │
//! │        slot 0 → node A   slot 1 → node B   slot 2 → node C  │
//! └─────────────────────────────────────────────────────────────┘
//!                              ▲
//!                              │ jump consistent hash
//!                              │
//!   ("acme", "cpu-high") → SHA-256 → u64 ──────────┘
//!
//!   PartitionMap { entry → owner }  ──►  node_partition / added_removed
//! ```
//!
//! # Example
//!
//! ```rust
//! use alert_partition::partitioning::{calculate_partition, node_partition, update_buckets};
//! use alert_partition::PartitionEntry;
//!
//! let buckets = update_buckets(None, &[1, 2, 3]).unwrap();
//! let entries = vec![PartitionEntry::new("acme", "cpu-high")];
//! let partition = calculate_partition(&entries, &buckets).unwrap();
//!
//! let owner = partition[&entries[0]];
//! assert_eq!(node_partition(Some(&partition), owner)["acme"], vec!["cpu-high"]);
//! ```

mod buckets;
mod hashring;
mod ownership;

pub use buckets::{update_buckets, BucketTable};
pub use hashring::{calculate_new_entry, calculate_partition, entry_hash, jump_consistent_hash};
pub use ownership::{added_removed, node_partition, PartitionDelta};
