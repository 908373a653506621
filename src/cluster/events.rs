//! Membership view changes.

use crate::types::NodeId;

/// A change of the membership view, naming the member that caused it.
///
/// The partition manager does not distinguish between kinds: any change
/// means the bucket table may be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberEvent {
    Joined(NodeId),
    Left(NodeId),
    /// Removed by failure detection rather than by a graceful leave.
    Failed(NodeId),
}

impl MemberEvent {
    pub fn node_id(&self) -> NodeId {
        match *self {
            MemberEvent::Joined(id) | MemberEvent::Left(id) | MemberEvent::Failed(id) => id,
        }
    }
}

/// Synchronous observer of view changes, called on the thread applying them.
pub trait MemberEventListener: Send + Sync + 'static {
    fn on_event(&self, event: &MemberEvent);
}

/// Logs every view change.
pub struct LoggingEventListener;

impl MemberEventListener for LoggingEventListener {
    fn on_event(&self, event: &MemberEvent) {
        match *event {
            MemberEvent::Joined(node_id) => tracing::info!(node_id, "Member joined"),
            MemberEvent::Left(node_id) => tracing::info!(node_id, "Member left"),
            MemberEvent::Failed(node_id) => tracing::warn!(node_id, "Member failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_node_id() {
        assert_eq!(MemberEvent::Joined(3).node_id(), 3);
        assert_eq!(MemberEvent::Left(5).node_id(), 5);
        assert_eq!(MemberEvent::Failed(9).node_id(), 9);
    }
}
