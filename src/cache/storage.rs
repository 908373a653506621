//! Moka-backed in-process region.

use crate::cache::{EntryCreated, ReplicatedRegion};
use crate::config::PartitionConfig;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

/// A stored value with its own time-to-live.
#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Bytes,
    ttl: Option<Duration>,
}

/// Per-entry expiration: each write decides its own lifespan.
struct EntryExpiry;

impl Expiry<Bytes, StoredValue> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &Bytes,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &Bytes,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

/// In-process region shared by reference between the nodes of a local cluster.
pub struct MemoryRegion {
    name: String,

    /// The underlying Moka cache.
    cache: Cache<Bytes, StoredValue>,

    /// Readers take the shared side, writers the exclusive side, so batches
    /// are never observed half applied.
    lock: RwLock<()>,

    /// Creation events.
    events: broadcast::Sender<EntryCreated>,
}

impl MemoryRegion {
    /// Create a new region.
    pub fn new(name: impl Into<String>, config: &PartitionConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .expire_after(EntryExpiry)
            .build();
        let (events, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            name: name.into(),
            cache,
            lock: RwLock::new(()),
            events,
        }
    }

    /// Number of entries, including expired ones not cleaned up yet.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Run pending maintenance tasks (cleanup expired entries, etc.).
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Insert under the write lock and report whether the key was new.
    async fn insert_locked(&self, key: Bytes, value: StoredValue) -> bool {
        let created = !self.cache.contains_key(&key);
        self.cache.insert(key, value).await;
        created
    }

    fn publish_created(&self, key: Bytes, value: Bytes) {
        trace!(region = %self.name, key = ?key, "Entry created");
        // No subscribers is fine: nobody is listening on this node yet.
        let _ = self.events.send(EntryCreated { key, value });
    }
}

#[async_trait]
impl ReplicatedRegion for MemoryRegion {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &[u8]) -> Option<Bytes> {
        let _guard = self.lock.read().await;
        let key = Bytes::copy_from_slice(key);
        self.cache.get(&key).await.map(|v| v.bytes)
    }

    async fn get_many(&self, keys: &[&[u8]]) -> Vec<Option<Bytes>> {
        let _guard = self.lock.read().await;
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let key = Bytes::copy_from_slice(key);
            values.push(self.cache.get(&key).await.map(|v| v.bytes));
        }
        values
    }

    async fn put_batch(&self, entries: Vec<(Bytes, Bytes)>) -> Result<()> {
        let mut created = Vec::new();
        {
            let _guard = self.lock.write().await;
            for (key, bytes) in entries {
                let value = StoredValue {
                    bytes: bytes.clone(),
                    ttl: None,
                };
                if self.insert_locked(key.clone(), value).await {
                    created.push((key, bytes));
                }
            }
        }
        for (key, value) in created {
            self.publish_created(key, value);
        }
        Ok(())
    }

    async fn put_with_ttl(&self, key: Bytes, value: Bytes, ttl: Duration) -> Result<()> {
        let stored = StoredValue {
            bytes: value.clone(),
            ttl: Some(ttl),
        };
        let created = {
            let _guard = self.lock.write().await;
            self.insert_locked(key.clone(), stored).await
        };
        if created {
            self.publish_created(key, value);
        }
        Ok(())
    }

    async fn remove(&self, key: &[u8]) -> Result<()> {
        let _guard = self.lock.write().await;
        let key = Bytes::copy_from_slice(key);
        self.cache.invalidate(&key).await;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EntryCreated> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("name", &self.name)
            .field("entry_count", &self.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> MemoryRegion {
        MemoryRegion::new("test", &PartitionConfig::default())
    }

    #[tokio::test]
    async fn test_put_batch_and_get() {
        let region = region();
        region
            .put_batch(vec![
                (Bytes::from("a"), Bytes::from("1")),
                (Bytes::from("b"), Bytes::from("2")),
            ])
            .await
            .unwrap();

        assert_eq!(region.get(b"a").await, Some(Bytes::from("1")));
        let keys: [&[u8]; 3] = [b"a", b"b", b"c"];
        let values = region.get_many(&keys).await;
        assert_eq!(
            values,
            vec![Some(Bytes::from("1")), Some(Bytes::from("2")), None]
        );
    }

    #[tokio::test]
    async fn test_created_event_only_for_new_keys() {
        let region = region();
        let mut rx = region.subscribe();

        region
            .put_batch(vec![(Bytes::from("k"), Bytes::from("v1"))])
            .await
            .unwrap();
        region
            .put_batch(vec![(Bytes::from("k"), Bytes::from("v2"))])
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.key, Bytes::from("k"));
        assert_eq!(event.value, Bytes::from("v1"));
        assert!(rx.try_recv().is_err());
        assert_eq!(region.get(b"k").await, Some(Bytes::from("v2")));
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let region = region();
        region
            .put_with_ttl(Bytes::from("tmp"), Bytes::from("x"), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(region.get(b"tmp").await.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(region.get(b"tmp").await.is_none());

        region.run_pending_tasks().await;
        assert_eq!(region.entry_count(), 0);
    }

    #[tokio::test]
    async fn test_recreated_after_remove() {
        let region = region();
        let mut rx = region.subscribe();
        let ttl = Duration::from_secs(5);

        region
            .put_with_ttl(Bytes::from("m"), Bytes::from("1"), ttl)
            .await
            .unwrap();
        region.remove(b"m").await.unwrap();
        region
            .put_with_ttl(Bytes::from("m"), Bytes::from("2"), ttl)
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().value, Bytes::from("1"));
        assert_eq!(rx.recv().await.unwrap().value, Bytes::from("2"));
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_events() {
        let region = region();
        let mut first = region.subscribe();
        let mut second = region.subscribe();

        region
            .put_with_ttl(Bytes::from("x"), Bytes::from("y"), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(first.recv().await.unwrap().key, Bytes::from("x"));
        assert_eq!(second.recv().await.unwrap().key, Bytes::from("x"));
    }
}
