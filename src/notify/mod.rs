//! Ephemeral notifications exchanged over the shared regions.
//!
//! A notification is written once with the configured lifespan and never
//! deleted; observers react to its creation event. Messages are keyed by a
//! hash of their encoded form, so an identical message published again while
//! the first is still alive coalesces with it.

pub mod data;
pub mod trigger;

pub use data::{dispatch, NotifyData, NotifyPayload};
pub use trigger::{apply_notification, patch_partition, NotifyTrigger, PatchOutcome};

use crate::cache::ReplicatedRegion;
use crate::error::Result;
use bytes::Bytes;
use std::hash::Hasher;
use std::time::Duration;
use twox_hash::XxHash64;

/// Key under which an encoded message is stored.
pub fn message_key(encoded: &[u8]) -> Bytes {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(encoded);
    Bytes::from(format!("{:016x}", hasher.finish()))
}

/// Write an encoded message to a region with a bounded lifespan.
pub(crate) async fn publish(
    region: &dyn ReplicatedRegion,
    encoded: Bytes,
    lifespan: Duration,
) -> Result<()> {
    let key = message_key(&encoded);
    region.put_with_ttl(key, encoded, lifespan).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_key_is_content_addressed() {
        let a = message_key(b"hello");
        assert_eq!(a, message_key(b"hello"));
        assert_ne!(a, message_key(b"hellp"));
        assert_eq!(a.len(), 16);
    }
}
