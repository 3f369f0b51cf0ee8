//! Node-level messages.
//!
//! A broadcast sends exactly one [`NodeRequest`] to every node holding at least
//! one targeted shard. The node answers with one [`NodeResponse`] covering all
//! of its shards. On the coordinator, each node's answer (or the failure to
//! get one) is stored as a [`NodeOutcome`].

use serde::{Deserialize, Serialize};

use super::routing::{NodeId, ShardId, ShardRouting};

/// The batch of shards one node must process for a broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRequest<R> {
    pub node_id: NodeId,
    pub request: R,
    pub shards: Vec<ShardRouting>,
}

impl<R> NodeRequest<R> {
    pub fn new(node_id: impl Into<NodeId>, request: R, shards: Vec<ShardRouting>) -> Self {
        Self {
            node_id: node_id.into(),
            request,
            shards,
        }
    }
}

/// Failure of the operation on a single shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardFailure {
    pub shard_id: ShardId,
    pub reason: String,
    pub cause: String,
}

impl ShardFailure {
    pub fn new(shard_id: ShardId, reason: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            shard_id,
            reason: reason.into(),
            cause: cause.into(),
        }
    }

    /// The shard had no node at resolution time.
    pub fn unavailable(shard_id: ShardId, action: &str) -> Self {
        let reason = format!("{} no shards available while executing {}", shard_id, action);
        Self {
            shard_id,
            cause: reason.clone(),
            reason,
        }
    }

    /// The work executor failed on this shard.
    pub fn operation_failed(shard_id: ShardId, action: &str, cause: impl Into<String>) -> Self {
        Self {
            shard_id,
            reason: format!("operation {} failed", action),
            cause: cause.into(),
        }
    }

    /// The whole node holding this shard failed.
    pub fn node_failed(shard_id: ShardId, failure: &NodeFailure) -> Self {
        Self {
            shard_id,
            reason: format!("Failed node [{}]", failure.node_id),
            cause: failure.cause.clone(),
        }
    }
}

/// A node's batched answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResponse<S> {
    pub node_id: NodeId,
    pub total_shards: usize,
    pub successful_shards: usize,
    pub results: Vec<S>,
    pub failures: Vec<ShardFailure>,
}

impl<S> NodeResponse<S> {
    pub fn new(
        node_id: impl Into<NodeId>,
        total_shards: usize,
        successful_shards: usize,
        results: Vec<S>,
        failures: Vec<ShardFailure>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            total_shards,
            successful_shards,
            results,
            failures,
        }
    }

    pub fn failed_shards(&self) -> usize {
        self.failures.len()
    }
}

/// The whole node request failed: unreachable node, timeout, bad reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node_id: NodeId,
    pub cause: String,
}

impl NodeFailure {
    pub fn new(node_id: impl Into<NodeId>, cause: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            cause: cause.into(),
        }
    }
}

/// What a slot of the coordinator's slot table holds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutcome<S> {
    Response(NodeResponse<S>),
    Failed(NodeFailure),
}

impl<S> NodeOutcome<S> {
    pub fn node_id(&self) -> &str {
        match self {
            NodeOutcome::Response(r) => &r.node_id,
            NodeOutcome::Failed(f) => &f.node_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, NodeOutcome::Failed(_))
    }
}
