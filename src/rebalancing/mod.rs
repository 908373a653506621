//! Rebalancing of the partition on membership changes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Rebalancer (coordinator only)                │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  Step 1: Read shared state                            │  │
//! │  │  - Bucket table, current partition                    │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                          ↓                                   │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  Step 2: Recompute                                    │  │
//! │  │  - update_buckets over live members                   │  │
//! │  │  - calculate_partition over known entries             │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! │                          ↓                                   │
//! │  ┌──────────────────────────────────────────────────────┐  │
//! │  │  Step 3: Publish                                      │  │
//! │  │  - buckets, previous, current in one batch            │  │
//! │  │  - then the TTL'd change marker                       │  │
//! │  └──────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every node, coordinator included, reacts to the creation of the change
//! marker by recomputing its own slice and diff from the published maps.
//!
//! The very first partition is seeded from the definitions service. After
//! that, entries only enter or leave the partition through trigger
//! notifications, and rebalances redistribute the entries already known.

mod coordinator;
pub(crate) mod state;

pub use coordinator::{RebalanceOutcome, Rebalancer};
pub use state::{PartitionSnapshot, PartitionState};
