//! Cluster partitioning of alert triggers.
//!
//! This crate distributes the triggers of an alerting engine over the members
//! of a cluster and keeps every member informed of what it owns. It uses:
//! - **Jump consistent hashing** over a churn-minimizing bucket table
//! - **Replicated regions** with TTL entries as a pub/sub substrate
//! - **Moka** for the in-process region implementation
//!
//! # Features
//!
//! - Coordinator-only rebalancing on membership changes
//! - Per-node partition slices with added/removed diffs
//! - Addressed trigger notifications patching a single entry
//! - Broadcast of data and events to non-originating nodes
//! - Degenerate standalone mode where every call is a no-op
//!
//! # Example
//!
//! ```rust,no_run
//! use alert_partition::cache::Regions;
//! use alert_partition::cluster::LocalCluster;
//! use alert_partition::listener::StaticDefinitions;
//! use alert_partition::{ClusterTransport, PartitionConfig, PartitionManager, Trigger};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PartitionConfig::from_env()?;
//!     let regions = Regions::in_memory(&config);
//!     let cluster = LocalCluster::new();
//!
//!     let definitions = Arc::new(StaticDefinitions::new(vec![
//!         Trigger::new("acme", "cpu-high"),
//!         Trigger::new("acme", "disk-full"),
//!     ]));
//!
//!     let manager = PartitionManager::new(
//!         config,
//!         definitions,
//!         Some(ClusterTransport {
//!             view: Arc::new(cluster.join(1)),
//!             regions,
//!         }),
//!     );
//!     manager.start().await?;
//!
//!     println!("owned: {:?}", manager.local_partition().await?);
//!     manager.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Evaluation engine               │
//! └─────────────────────────────────────────────┘
//!          │ notify_*            ▲ listeners
//!          ▼                     │
//! ┌─────────────────────────────────────────────┐
//! │             PartitionManager                 │
//! └─────────────────────────────────────────────┘
//!                     │
//!     ┌───────────────┼───────────────┐
//!     ▼               ▼               ▼
//! ┌─────────┐   ┌────────────┐   ┌──────────┐
//! │ Cluster │   │ Rebalancer │   │ Regions  │
//! │  View   │   │ + hashing  │   │ (TTL kv) │
//! └─────────┘   └────────────┘   └──────────┘
//! ```
//!
//! # Consistency Model
//!
//! - **Partition**: written by the coordinator, or by the owner of a single
//!   entry; converges at the next rebalance after a race
//! - **Notifications**: at-most-once per live key, expire after the lifespan

pub mod cache;
pub mod cluster;
pub mod config;
pub mod error;
pub mod listener;
pub mod manager;
pub mod notify;
pub mod partitioning;
pub mod rebalancing;
#[cfg(test)]
mod testing;
pub mod types;

// Re-export main types for convenience
pub use config::PartitionConfig;
pub use error::{Error, Result};
pub use manager::{ClusterTransport, PartitionManager};
pub use types::{
    Data, Event, NodeId, NodePartition, PartitionEntry, PartitionMap, Trigger, TriggerOperation,
};

// Re-export collaborator contracts
pub use cache::{ReplicatedRegion, Regions};
pub use cluster::{ClusterView, MemberEvent};
pub use listener::{DefinitionsService, PartitionDataListener, PartitionTriggerListener};
