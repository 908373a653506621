//! Replicated key-value medium used as a cluster-wide pub/sub substrate.
//!
//! The partition manager needs three logical regions:
//! - `partition`: bucket table, current/previous partition and change marker
//! - `triggers`: ephemeral trigger notifications
//! - `data`: ephemeral data/event notifications
//!
//! Every node sharing a region observes the creation of every entry,
//! including its own writes. Entries written with a TTL expire on their own;
//! nothing in the protocol deletes a notification explicitly.
//!
//! [`ReplicatedRegion`] is the contract; [`MemoryRegion`] implements it in
//! process on top of Moka, which is enough to run several nodes in one
//! process (tests, embedded clusters). A networked store with change
//! notification can implement the same trait.

pub mod storage;

use crate::config::PartitionConfig;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub use storage::MemoryRegion;

/// Notification that a key was created in a region.
///
/// Carries the written value so observers do not race the entry's expiry.
#[derive(Debug, Clone)]
pub struct EntryCreated {
    pub key: Bytes,
    pub value: Bytes,
}

/// A region of the replicated medium.
#[async_trait]
pub trait ReplicatedRegion: Send + Sync + 'static {
    /// Region name, for logging.
    fn name(&self) -> &str;

    /// Read a live value.
    async fn get(&self, key: &[u8]) -> Option<Bytes>;

    /// Read several values as one consistent snapshot.
    ///
    /// A concurrent [`put_batch`](Self::put_batch) is observed entirely or
    /// not at all.
    async fn get_many(&self, keys: &[&[u8]]) -> Vec<Option<Bytes>>;

    /// Write several durable values atomically.
    async fn put_batch(&self, entries: Vec<(Bytes, Bytes)>) -> Result<()>;

    /// Write a value that expires after `ttl`.
    async fn put_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) -> Result<()>;

    /// Remove a value, if present.
    async fn remove(&self, key: &[u8]) -> Result<()>;

    /// Subscribe to creation events of this region.
    fn subscribe(&self) -> broadcast::Receiver<EntryCreated>;
}

/// The three regions a partition manager works on.
#[derive(Clone)]
pub struct Regions {
    pub partition: Arc<dyn ReplicatedRegion>,
    pub triggers: Arc<dyn ReplicatedRegion>,
    pub data: Arc<dyn ReplicatedRegion>,
}

impl Regions {
    /// Create in-process regions.
    ///
    /// Clones share the same regions; hand a clone to every node of a local
    /// cluster.
    pub fn in_memory(config: &PartitionConfig) -> Self {
        Self {
            partition: Arc::new(MemoryRegion::new("partition", config)),
            triggers: Arc::new(MemoryRegion::new("triggers", config)),
            data: Arc::new(MemoryRegion::new("data", config)),
        }
    }
}

impl std::fmt::Debug for Regions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Regions")
            .field("partition", &self.partition.name())
            .field("triggers", &self.triggers.name())
            .field("data", &self.data.name())
            .finish()
    }
}
