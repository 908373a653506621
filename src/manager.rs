//! The partition manager: the engine-facing entry point.
//!
//! A manager is either distributed, wired to a membership view and the three
//! shared regions, or degenerate, in which case every notify and register
//! call is accepted and ignored.
//!
//! # Event loops
//!
//! ```text
//!   ClusterView ──MemberEvent──► topology loop ──► Rebalancer (coordinator)
//!                                                       │ publish
//!   partition region ──marker created──► partition loop ◄┘
//!                                             │ node_partition / added_removed
//!                                             ▼
//!                                 PartitionTriggerListener::on_partition_change
//!
//!   triggers region ──NotifyTrigger──► trigger loop ──► patch + on_trigger_change
//!   data region ──NotifyData──► data loop ──► PartitionDataListener
//! ```
//!
//! Each loop processes its channel sequentially and stops on
//! [`PartitionManager::shutdown`] or when the manager is dropped.

use crate::cache::{EntryCreated, Regions};
use crate::cluster::{ClusterView, MemberEvent};
use crate::config::PartitionConfig;
use crate::error::{Error, Result};
use crate::listener::{DefinitionsService, PartitionDataListener, PartitionTriggerListener};
use crate::notify::{self, apply_notification, dispatch, NotifyData, NotifyPayload, NotifyTrigger};
use crate::partitioning::{added_removed, calculate_new_entry, node_partition};
use crate::rebalancing::{PartitionState, Rebalancer};
use crate::types::{Data, Event, NodeId, NodePartition, PartitionEntry, PartitionMap, TriggerOperation};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a node needs to take part in a partitioned cluster.
#[derive(Clone)]
pub struct ClusterTransport {
    /// Membership view of the local node.
    pub view: Arc<dyn ClusterView>,

    /// Shared regions; every node of the cluster must use the same ones.
    pub regions: Regions,
}

/// Distributed wiring of a manager.
struct Distributed {
    node_id: NodeId,
    view: Arc<dyn ClusterView>,
    regions: Regions,
    state: Arc<PartitionState>,
    rebalancer: Rebalancer,
}

/// Partitions triggers across the cluster and relays notifications.
pub struct PartitionManager {
    config: PartitionConfig,

    /// `None` in degenerate mode.
    cluster: Option<Distributed>,

    trigger_listener: RwLock<Option<Arc<dyn PartitionTriggerListener>>>,

    data_listener: RwLock<Option<Arc<dyn PartitionDataListener>>>,

    started: AtomicBool,

    /// Stops the event loops.
    cancellation: CancellationToken,
}

impl PartitionManager {
    /// Create a manager. Without a transport the manager is degenerate.
    pub fn new(
        config: PartitionConfig,
        definitions: Arc<dyn DefinitionsService>,
        transport: Option<ClusterTransport>,
    ) -> Arc<Self> {
        let cluster = transport.map(|transport| {
            let state = Arc::new(PartitionState::new(
                transport.regions.partition.clone(),
                config.lifespan,
            ));
            Distributed {
                node_id: transport.view.local_member(),
                rebalancer: Rebalancer::new(transport.view.clone(), state.clone(), definitions),
                view: transport.view,
                regions: transport.regions,
                state,
            }
        });

        Arc::new(Self {
            config,
            cluster,
            trigger_listener: RwLock::new(None),
            data_listener: RwLock::new(None),
            started: AtomicBool::new(false),
            cancellation: CancellationToken::new(),
        })
    }

    /// Whether this manager takes part in a cluster.
    pub fn is_distributed(&self) -> bool {
        self.cluster.is_some()
    }

    /// Local member ID, if distributed.
    pub fn node_id(&self) -> Option<NodeId> {
        self.cluster.as_ref().map(|cluster| cluster.node_id)
    }

    /// Start the event loops and process the current topology once.
    ///
    /// Subscriptions are taken before anything is published, so this node
    /// observes its own first rebalance. A node that finds a partition
    /// already in place reports its slice right away. Calling `start` again
    /// is a no-op.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let cluster = match &self.cluster {
            Some(cluster) => cluster,
            None => {
                info!("Partition manager disabled, running standalone");
                return Ok(());
            }
        };

        self.spawn_loop("topology", cluster.view.subscribe(), |manager, event| async move {
            manager.on_topology_change(event).await
        });
        self.spawn_loop(
            "partition",
            cluster.regions.partition.subscribe(),
            |manager, event| async move { manager.on_partition_entry(event).await },
        );
        self.spawn_loop(
            "triggers",
            cluster.regions.triggers.subscribe(),
            |manager, event| async move { manager.on_trigger_message(event).await },
        );
        self.spawn_loop(
            "data",
            cluster.regions.data.subscribe(),
            |manager, event| async move { manager.on_data_message(event).await },
        );

        info!(
            node_id = cluster.node_id,
            members = cluster.view.members().len(),
            coordinator = cluster.view.is_coordinator(),
            lifespan_ms = self.config.lifespan.as_millis() as u64,
            "Partition manager enabled"
        );

        if cluster.rebalancer.process_topology_change().await?.is_none()
            && cluster.state.current().await?.is_some()
        {
            self.report_partition(cluster).await?;
        }
        Ok(())
    }

    /// Stop the event loops.
    pub fn shutdown(&self) {
        if !self.cancellation.is_cancelled() {
            self.cancellation.cancel();
            info!(node_id = ?self.node_id(), "Partition manager shut down");
        }
    }

    /// Set the listener told about trigger ownership. Ignored when degenerate.
    pub fn register_trigger_listener(&self, listener: Arc<dyn PartitionTriggerListener>) {
        if self.is_distributed() {
            *self.trigger_listener.write() = Some(listener);
        }
    }

    /// Set the listener receiving remote telemetry. Ignored when degenerate.
    pub fn register_data_listener(&self, listener: Arc<dyn PartitionDataListener>) {
        if self.is_distributed() {
            *self.data_listener.write() = Some(listener);
        }
    }

    /// Announce a trigger mutation to the trigger's owner.
    ///
    /// Before the first rebalance there is no bucket table to address an
    /// owner with, and the call fails with [`Error::InvalidArgument`].
    pub async fn notify_trigger(
        &self,
        operation: TriggerOperation,
        tenant_id: &str,
        trigger_id: &str,
    ) -> Result<()> {
        let cluster = match &self.cluster {
            Some(cluster) => cluster,
            None => return Ok(()),
        };

        let buckets = match cluster.state.buckets().await? {
            Some(buckets) => buckets,
            None => {
                warn!(
                    node_id = cluster.node_id,
                    tenant_id,
                    trigger_id,
                    operation = %operation,
                    "No buckets yet, cannot address trigger notification"
                );
                return Err(Error::InvalidArgument(
                    "bucket table not yet computed".to_string(),
                ));
            }
        };

        let to_node = calculate_new_entry(&PartitionEntry::new(tenant_id, trigger_id), &buckets)?;
        let message = NotifyTrigger::new(cluster.node_id, to_node, operation, tenant_id, trigger_id);
        notify::publish(
            cluster.regions.triggers.as_ref(),
            message.to_bytes()?,
            self.config.lifespan,
        )
        .await?;

        debug!(
            node_id = cluster.node_id,
            to_node,
            tenant_id,
            trigger_id,
            operation = %operation,
            "Trigger notification sent"
        );
        Ok(())
    }

    pub async fn notify_data(&self, data: Data) -> Result<()> {
        self.notify_payload(NotifyPayload::Data(data)).await
    }

    pub async fn notify_data_batch(&self, data: Vec<Data>) -> Result<()> {
        self.notify_payload(NotifyPayload::DataBatch(data)).await
    }

    pub async fn notify_event(&self, event: Event) -> Result<()> {
        self.notify_payload(NotifyPayload::Event(event)).await
    }

    pub async fn notify_events(&self, events: Vec<Event>) -> Result<()> {
        self.notify_payload(NotifyPayload::Events(events)).await
    }

    /// Triggers this node owns under the current partition.
    pub async fn local_partition(&self) -> Result<NodePartition> {
        match &self.cluster {
            Some(cluster) => {
                let current = cluster.state.current().await?;
                Ok(node_partition(current.as_ref(), cluster.node_id))
            }
            None => Ok(NodePartition::new()),
        }
    }

    /// Ownership of every entry known to the cluster.
    ///
    /// `None` before the first rebalance or when degenerate.
    pub async fn partition_map(&self) -> Result<Option<PartitionMap>> {
        match &self.cluster {
            Some(cluster) => cluster.state.current().await,
            None => Ok(None),
        }
    }

    /// Broadcast telemetry to the other nodes. Empty batches are not sent.
    async fn notify_payload(&self, payload: NotifyPayload) -> Result<()> {
        let cluster = match &self.cluster {
            Some(cluster) => cluster,
            None => return Ok(()),
        };
        if payload.is_empty() {
            return Ok(());
        }

        let items = payload.len();
        let message = NotifyData::new(cluster.node_id, payload);
        notify::publish(
            cluster.regions.data.as_ref(),
            message.to_bytes()?,
            self.config.lifespan,
        )
        .await?;

        debug!(node_id = cluster.node_id, items, "Data notification sent");
        Ok(())
    }

    async fn on_topology_change(&self, event: MemberEvent) -> Result<()> {
        let cluster = match &self.cluster {
            Some(cluster) => cluster,
            None => return Ok(()),
        };
        debug!(
            node_id = cluster.node_id,
            member = event.node_id(),
            event = ?event,
            "Membership changed"
        );
        cluster.rebalancer.process_topology_change().await?;
        Ok(())
    }

    async fn on_partition_entry(&self, event: EntryCreated) -> Result<()> {
        if !PartitionState::is_change_marker(&event.key) {
            return Ok(());
        }
        match &self.cluster {
            Some(cluster) => self.report_partition(cluster).await,
            None => Ok(()),
        }
    }

    /// Compute this node's slice and diff and hand them to the listener.
    async fn report_partition(&self, cluster: &Distributed) -> Result<()> {
        let listener = self.trigger_listener.read().clone();
        let listener = match listener {
            Some(listener) => listener,
            None => {
                debug!(node_id = cluster.node_id, "No trigger listener, partition change dropped");
                return Ok(());
            }
        };

        let snapshot = cluster.state.snapshot().await?;
        let current = snapshot.current.unwrap_or_default();
        let partition = node_partition(Some(&current), cluster.node_id);
        let delta = added_removed(snapshot.previous.as_ref(), &current, cluster.node_id);

        debug!(
            node_id = cluster.node_id,
            tenants = partition.len(),
            added = delta.added.values().map(Vec::len).sum::<usize>(),
            removed = delta.removed.values().map(Vec::len).sum::<usize>(),
            "Partition changed"
        );
        listener.on_partition_change(&partition, &delta.removed, &delta.added);
        Ok(())
    }

    async fn on_trigger_message(&self, event: EntryCreated) -> Result<()> {
        let cluster = match &self.cluster {
            Some(cluster) => cluster,
            None => return Ok(()),
        };

        let message = NotifyTrigger::from_bytes(&event.value)?;
        if message.to_node != cluster.node_id {
            return Ok(());
        }

        let outcome = apply_notification(&cluster.state, &message, cluster.node_id).await?;
        debug!(
            node_id = cluster.node_id,
            from_node = message.from_node,
            tenant_id = %message.tenant_id,
            trigger_id = %message.trigger_id,
            operation = %message.operation,
            outcome = ?outcome,
            "Trigger notification received"
        );

        let listener = self.trigger_listener.read().clone();
        if let Some(listener) = listener {
            listener.on_trigger_change(message.operation, &message.tenant_id, &message.trigger_id);
        }
        Ok(())
    }

    async fn on_data_message(&self, event: EntryCreated) -> Result<()> {
        let cluster = match &self.cluster {
            Some(cluster) => cluster,
            None => return Ok(()),
        };

        let message = NotifyData::from_bytes(&event.value)?;
        if message.from_node == cluster.node_id {
            return Ok(());
        }

        let listener = self.data_listener.read().clone();
        match listener {
            Some(listener) => dispatch(listener.as_ref(), message.payload),
            None => debug!(
                node_id = cluster.node_id,
                from_node = message.from_node,
                "No data listener, notification dropped"
            ),
        }
        Ok(())
    }

    /// Run `handler` for every event of a channel until shutdown.
    fn spawn_loop<T, F, Fut>(
        self: &Arc<Self>,
        channel: &'static str,
        mut rx: broadcast::Receiver<T>,
        handler: F,
    ) where
        T: Clone + Send + 'static,
        F: Fn(Arc<Self>, T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let manager = Arc::downgrade(self);
        let cancellation = self.cancellation.clone();

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    received = rx.recv() => received,
                    _ = cancellation.cancelled() => {
                        debug!(channel, "Event loop shutting down");
                        break;
                    }
                };

                let event = match received {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(channel, skipped, "Event loop lagging, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let manager = match manager.upgrade() {
                    Some(manager) => manager,
                    None => break,
                };
                if let Err(e) = handler(manager, event).await {
                    error!(channel, error = %e, "Event handler failed");
                }
            }
        });
    }
}

impl Drop for PartitionManager {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

impl std::fmt::Debug for PartitionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionManager")
            .field("node_id", &self.node_id())
            .field("distributed", &self.is_distributed())
            .field("started", &self.started.load(Ordering::SeqCst))
            .field("config", &self.config)
            .finish()
    }
}
