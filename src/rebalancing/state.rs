//! Typed access to the partition-state region.
//!
//! The region holds four keys: the bucket table, the current and previous
//! partition maps, and the short-lived partition change marker. Maps are
//! always written in one batch and the marker strictly afterwards, so a node
//! reacting to the marker reads a consistent pair.

use crate::cache::ReplicatedRegion;
use crate::error::Result;
use crate::partitioning::BucketTable;
use crate::types::PartitionMap;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Key of the bucket table.
pub const BUCKETS: &[u8] = b"buckets";

/// Key of the partition map before the latest change.
pub const PREVIOUS: &[u8] = b"previousPartition";

/// Key of the partition map in force.
pub const CURRENT: &[u8] = b"currentPartition";

/// Key of the change marker; only its creation is meaningful.
pub const PARTITION_CHANGE: &[u8] = b"partitionChangeFlag";

/// Everything stored in the partition-state region, read at once.
#[derive(Debug, Clone, Default)]
pub struct PartitionSnapshot {
    pub buckets: Option<BucketTable>,
    pub previous: Option<PartitionMap>,
    pub current: Option<PartitionMap>,
}

/// One node's handle on the shared partition-state region.
pub struct PartitionState {
    region: Arc<dyn ReplicatedRegion>,

    /// Serializes read-modify-write cycles issued by this node.
    write_lock: Mutex<()>,

    /// Lifespan of the change marker.
    lifespan: Duration,
}

impl PartitionState {
    pub fn new(region: Arc<dyn ReplicatedRegion>, lifespan: Duration) -> Self {
        Self {
            region,
            write_lock: Mutex::new(()),
            lifespan,
        }
    }

    /// Check if a created key is the change marker.
    pub fn is_change_marker(key: &[u8]) -> bool {
        key == PARTITION_CHANGE
    }

    /// Take the node-local write lock.
    ///
    /// Hold it from reading the current map until the patched maps are
    /// written.
    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().await
    }

    pub async fn buckets(&self) -> Result<Option<BucketTable>> {
        decode(self.region.get(BUCKETS).await)
    }

    pub async fn current(&self) -> Result<Option<PartitionMap>> {
        decode(self.region.get(CURRENT).await)
    }

    /// Read bucket table and both partition maps consistently.
    pub async fn snapshot(&self) -> Result<PartitionSnapshot> {
        let mut values = self
            .region
            .get_many(&[BUCKETS, PREVIOUS, CURRENT])
            .await
            .into_iter();

        Ok(PartitionSnapshot {
            buckets: decode(values.next().flatten())?,
            previous: decode(values.next().flatten())?,
            current: decode(values.next().flatten())?,
        })
    }

    /// Publish the result of a full rebalance, then raise the change marker.
    pub async fn publish_rebalance(
        &self,
        buckets: &BucketTable,
        previous: Option<&PartitionMap>,
        current: &PartitionMap,
    ) -> Result<()> {
        let mut batch = vec![(Bytes::from_static(BUCKETS), encode(buckets)?)];
        if let Some(previous) = previous {
            batch.push((Bytes::from_static(PREVIOUS), encode(previous)?));
        }
        batch.push((Bytes::from_static(CURRENT), encode(current)?));
        self.region.put_batch(batch).await?;

        self.mark_change().await
    }

    /// Publish a single-entry patch as the new current/previous pair.
    ///
    /// Patches raise no marker; the addressed node reports them through
    /// `on_trigger_change` instead.
    pub async fn publish_patch(&self, previous: &PartitionMap, current: &PartitionMap) -> Result<()> {
        self.region
            .put_batch(vec![
                (Bytes::from_static(PREVIOUS), encode(previous)?),
                (Bytes::from_static(CURRENT), encode(current)?),
            ])
            .await
    }

    async fn mark_change(&self) -> Result<()> {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        // A marker still alive from an earlier change would turn this write
        // into an update, and updates fire no creation event.
        self.region.remove(PARTITION_CHANGE).await?;
        self.region
            .put_with_ttl(
                Bytes::from_static(PARTITION_CHANGE),
                encode(&now_ms)?,
                self.lifespan,
            )
            .await?;
        debug!(timestamp = now_ms, "Partition change marker written");
        Ok(())
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    Ok(Bytes::from(bincode::serialize(value)?))
}

fn decode<T: DeserializeOwned>(bytes: Option<Bytes>) -> Result<Option<T>> {
    match bytes {
        Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
        None => Ok(None),
    }
}
