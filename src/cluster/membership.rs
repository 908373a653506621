//! Membership view consumed by the partition manager.
//!
//! The partition manager does not run a membership protocol. It needs the
//! live member list, whether the local node is the coordinator, and a stream
//! of view changes; [`ClusterView`] is that capability.
//!
//! [`LocalCluster`] is an in-process implementation: members are kept in join
//! order and the oldest member is the coordinator.

use crate::cluster::events::{MemberEvent, MemberEventListener};
use crate::types::{member_id_from_addr, NodeId};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Membership capability injected into the partition manager.
pub trait ClusterView: Send + Sync + 'static {
    /// Identifier of the local member.
    fn local_member(&self) -> NodeId;

    /// Live members, in the order reported by the membership protocol.
    fn members(&self) -> Vec<NodeId>;

    /// Whether the local member is the designated coordinator.
    fn is_coordinator(&self) -> bool;

    /// Subscribe to membership view changes.
    fn subscribe(&self) -> broadcast::Receiver<MemberEvent>;
}

/// In-process cluster membership.
pub struct LocalCluster {
    /// Members in join order.
    members: RwLock<Vec<NodeId>>,

    /// Event listeners.
    listeners: RwLock<Vec<Arc<dyn MemberEventListener>>>,

    /// View change broadcast.
    events: broadcast::Sender<MemberEvent>,
}

impl LocalCluster {
    /// Create an empty cluster.
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            members: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            events,
        })
    }

    /// Add an event listener.
    pub fn add_listener(&self, listener: Arc<dyn MemberEventListener>) {
        self.listeners.write().push(listener);
    }

    /// Join a member and return its view of the cluster.
    ///
    /// Joining an existing member returns a view without emitting an event.
    pub fn join(self: &Arc<Self>, node_id: NodeId) -> LocalMember {
        let added = {
            let mut members = self.members.write();
            if members.contains(&node_id) {
                false
            } else {
                members.push(node_id);
                true
            }
        };

        if added {
            self.notify(MemberEvent::Joined(node_id));
        } else {
            debug!(node_id, "Member already joined");
        }

        LocalMember {
            cluster: self.clone(),
            node_id,
        }
    }

    /// Join a member identified by its transport address.
    pub fn join_addr(self: &Arc<Self>, addr: SocketAddr) -> LocalMember {
        self.join(member_id_from_addr(&addr))
    }

    /// Remove a member that left gracefully.
    pub fn leave(&self, node_id: NodeId) {
        if self.remove(node_id) {
            self.notify(MemberEvent::Left(node_id));
        }
    }

    /// Remove a member that failed.
    pub fn fail(&self, node_id: NodeId) {
        if self.remove(node_id) {
            self.notify(MemberEvent::Failed(node_id));
        }
    }

    /// Live members in join order.
    pub fn members(&self) -> Vec<NodeId> {
        self.members.read().clone()
    }

    /// The oldest live member.
    pub fn coordinator(&self) -> Option<NodeId> {
        self.members.read().first().copied()
    }

    fn remove(&self, node_id: NodeId) -> bool {
        let mut members = self.members.write();
        let before = members.len();
        members.retain(|&m| m != node_id);
        let removed = members.len() != before;
        if !removed {
            warn!(node_id, "Cannot remove unknown member");
        }
        removed
    }

    /// Notify all listeners of an event.
    fn notify(&self, event: MemberEvent) {
        for listener in self.listeners.read().iter() {
            listener.on_event(&event);
        }
        let _ = self.events.send(event);
    }
}

/// A member's view of a [`LocalCluster`].
#[derive(Clone)]
pub struct LocalMember {
    cluster: Arc<LocalCluster>,
    node_id: NodeId,
}

impl ClusterView for LocalMember {
    fn local_member(&self) -> NodeId {
        self.node_id
    }

    fn members(&self) -> Vec<NodeId> {
        self.cluster.members()
    }

    fn is_coordinator(&self) -> bool {
        self.cluster.coordinator() == Some(self.node_id)
    }

    fn subscribe(&self) -> broadcast::Receiver<MemberEvent> {
        self.cluster.events.subscribe()
    }
}

impl std::fmt::Debug for LocalMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMember")
            .field("node_id", &self.node_id)
            .field("members", &self.cluster.members())
            .finish()
    }
}
