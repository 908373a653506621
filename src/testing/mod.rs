//! Multi-node tests of the partition manager.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TestCluster                             │
//! │                                                                 │
//! │   LocalCluster ──views──►  PartitionManager × N                 │
//! │                                 │        ▲                      │
//! │                                 ▼        │                      │
//! │                      Regions::in_memory (shared)                │
//! │                                                                 │
//! │   RecordingListener per node: partitions, trigger changes,      │
//! │   data and events as delivered                                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Assertions poll with [`utils::wait_for`] since every reaction runs on the
//! managers' event loops.

mod utils;
