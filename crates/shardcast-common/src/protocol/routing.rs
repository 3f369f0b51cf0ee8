//! Shard routing types.
//!
//! A [`RoutingTable`] is a versioned snapshot of which node currently holds
//! each targeted shard. Shards without a node are still listed so the
//! coordinator can account for them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cluster member identifier
pub type NodeId = String;

/// Identity of one shard: the dataset it belongs to and its ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId {
    pub dataset: String,
    pub id: u32,
}

impl ShardId {
    pub fn new(dataset: impl Into<String>, id: u32) -> Self {
        Self {
            dataset: dataset.into(),
            id,
        }
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}][{}]", self.dataset, self.id)
    }
}

/// Where a shard currently lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardRouting {
    pub shard_id: ShardId,
    pub node_id: Option<NodeId>,
}

impl ShardRouting {
    pub fn assigned(shard_id: ShardId, node_id: impl Into<NodeId>) -> Self {
        Self {
            shard_id,
            node_id: Some(node_id.into()),
        }
    }

    pub fn unassigned(shard_id: ShardId) -> Self {
        Self {
            shard_id,
            node_id: None,
        }
    }

    pub fn assigned_to_node(&self) -> bool {
        self.node_id.is_some()
    }

    pub fn current_node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn short_summary(&self) -> String {
        match &self.node_id {
            Some(node) => format!("{}, node[{}]", self.shard_id, node),
            None => format!("{}, node[null]", self.shard_id),
        }
    }
}

/// Versioned topology snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    pub version: u64,
    pub shards: Vec<ShardRouting>,
}

impl RoutingTable {
    pub fn new(version: u64, shards: Vec<ShardRouting>) -> Self {
        Self { version, shards }
    }

    pub fn len(&self) -> usize {
        self.shards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Keeps only the shards of the given datasets. An empty selector keeps everything.
    pub fn filter_datasets(&self, datasets: &[String]) -> RoutingTable {
        if datasets.is_empty() {
            return self.clone();
        }
        RoutingTable {
            version: self.version,
            shards: self
                .shards
                .iter()
                .filter(|s| datasets.iter().any(|d| d == &s.shard_id.dataset))
                .cloned()
                .collect(),
        }
    }
}
