//! Operation hooks for a broadcast-by-node action.
//!
//! A [`BroadcastAction`] describes one operation that runs against every
//! shard of the targeted datasets. The coordinator calls the admission checks
//! and the response builder; the node-side dispatcher calls
//! [`BroadcastAction::shard_operation`] once per shard, serially. Coordinator
//! and node each hold their own instance of the same action type, so the
//! node-side instance can carry node-local state (stores, caches) that the
//! work executor needs.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::protocol::{ClusterBlockError, NodeId, NodeResponse, Result, ShardFailure, ShardRouting};

/// A client request that targets a set of datasets.
pub trait BroadcastRequest: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Datasets this request targets. An empty slice targets every dataset.
    fn datasets(&self) -> &[String];
}

pub trait BroadcastAction: Send + Sync + 'static {
    type Request: BroadcastRequest;
    type ShardResult: Serialize + DeserializeOwned + Send + 'static;
    type Response: Send + 'static;

    /// Action name, e.g. `indices:monitor/stats`.
    fn name(&self) -> &str;

    /// Method name the node-side handler is registered under.
    fn node_action_name(&self) -> String {
        format!("{}[n]", self.name())
    }

    /// Dataset names this request selects. Empty selects every dataset.
    ///
    /// The coordinator expands this selector against the current topology
    /// before the request-scope admission check runs.
    fn dataset_selector(&self, request: &Self::Request) -> Vec<String> {
        request.datasets().to_vec()
    }

    /// Is the whole operation blocked regardless of target?
    fn check_global_block(&self, request: &Self::Request) -> Option<ClusterBlockError>;

    /// Is the operation blocked for these datasets?
    ///
    /// `datasets` are the concrete datasets the run targets. An empty
    /// selector arrives here already expanded to every known dataset.
    fn check_request_block(&self, request: &Self::Request, datasets: &[String]) -> Option<ClusterBlockError>;

    /// Executes the operation on one shard held by this node.
    fn shard_operation(&self, request: &Self::Request, shard: &ShardRouting) -> Result<Self::ShardResult>;

    /// Builds the node-level answer once every shard of a node request ran.
    fn new_node_response(
        &self,
        node_id: &NodeId,
        total_shards: usize,
        successful_shards: usize,
        results: Vec<Self::ShardResult>,
        failures: Vec<ShardFailure>,
    ) -> NodeResponse<Self::ShardResult> {
        NodeResponse::new(node_id.clone(), total_shards, successful_shards, results, failures)
    }

    /// Builds the client-visible result from the coordinator's tallies.
    ///
    /// An error here fails the whole broadcast.
    fn new_response(
        &self,
        request: &Self::Request,
        total_shards: usize,
        successful_shards: usize,
        failed_shards: usize,
        results: Vec<Self::ShardResult>,
        shard_failures: Vec<ShardFailure>,
    ) -> Result<Self::Response>;
}

/// Shard tallies most responses embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub total_shards: usize,
    pub successful_shards: usize,
    pub failed_shards: usize,
    pub shard_failures: Vec<ShardFailure>,
}

impl BroadcastSummary {
    pub fn new(
        total_shards: usize,
        successful_shards: usize,
        failed_shards: usize,
        shard_failures: Vec<ShardFailure>,
    ) -> Self {
        Self {
            total_shards,
            successful_shards,
            failed_shards,
            shard_failures,
        }
    }
}
