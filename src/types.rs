//! Core types used throughout the partition manager.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use twox_hash::XxHash64;

/// Member identifier in the cluster.
pub type NodeId = u64;

/// Assignment of every partition entry to the member responsible for it.
pub type PartitionMap = HashMap<PartitionEntry, NodeId>;

/// Listener-facing slice of a partition: tenant id to trigger ids.
pub type NodePartition = BTreeMap<String, Vec<String>>;

/// Derive a stable member identifier from a transport address.
///
/// Computed once per process; every node derives the same id for the same
/// address.
pub fn member_id_from_addr(addr: &SocketAddr) -> NodeId {
    let mut hasher = XxHash64::with_seed(0);
    addr.to_string().hash(&mut hasher);
    hasher.finish()
}

/// One unit of ownership: a trigger of a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionEntry {
    pub tenant_id: String,
    pub trigger_id: String,
}

impl PartitionEntry {
    pub fn new(tenant_id: impl Into<String>, trigger_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            trigger_id: trigger_id.into(),
        }
    }
}

impl fmt::Display for PartitionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.trigger_id)
    }
}

impl From<&Trigger> for PartitionEntry {
    fn from(trigger: &Trigger) -> Self {
        Self::new(trigger.tenant_id.clone(), trigger.id.clone())
    }
}

/// Lifecycle operation applied to a trigger.
///
/// Encoded on the wire as a single byte; unknown codes are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TriggerOperation {
    Add,
    Update,
    Remove,
}

impl TriggerOperation {
    pub fn code(self) -> u8 {
        match self {
            TriggerOperation::Add => 0,
            TriggerOperation::Update => 1,
            TriggerOperation::Remove => 2,
        }
    }
}

impl From<TriggerOperation> for u8 {
    fn from(op: TriggerOperation) -> Self {
        op.code()
    }
}

impl TryFrom<u8> for TriggerOperation {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(TriggerOperation::Add),
            1 => Ok(TriggerOperation::Update),
            2 => Ok(TriggerOperation::Remove),
            other => Err(Error::UnknownOperation(other)),
        }
    }
}

impl fmt::Display for TriggerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerOperation::Add => "ADD",
            TriggerOperation::Update => "UPDATE",
            TriggerOperation::Remove => "REMOVE",
        };
        f.write_str(name)
    }
}

/// Trigger definition as enumerated by the definitions service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub tenant_id: String,
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

impl Trigger {
    pub fn new(tenant_id: impl Into<String>, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            tenant_id: tenant_id.into(),
            name: id.clone(),
            id,
            enabled: true,
        }
    }
}

/// A single telemetry datum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    pub tenant_id: String,
    /// Originating agent or feed, `"_none_"` when not set.
    pub source: String,
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub value: String,
}

impl Data {
    pub fn new(
        tenant_id: impl Into<String>,
        id: impl Into<String>,
        timestamp: i64,
        value: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            source: "_none_".to_string(),
            id: id.into(),
            timestamp,
            value: value.into(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// An external event fed into the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub tenant_id: String,
    pub id: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub ctime: i64,
    pub category: Option<String>,
    pub text: Option<String>,
    /// Data id used to match the event against conditions.
    pub data_id: Option<String>,
    pub context: BTreeMap<String, String>,
}

impl Event {
    pub fn new(tenant_id: impl Into<String>, id: impl Into<String>, ctime: i64) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            id: id.into(),
            ctime,
            category: None,
            text: None,
            data_id: None,
            context: BTreeMap::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_data_id(mut self, data_id: impl Into<String>) -> Self {
        self.data_id = Some(data_id.into());
        self
    }
}
