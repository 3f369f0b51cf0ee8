use serde_json::Value;
use shardcast_common::action::BroadcastAction;
use shardcast_common::protocol::{NodeId, NodeRequest, NodeResponse, ShardFailure, ShardcastError};
use shardcast_common::transport::{NodeHandler, ReplyFuture};
use shardcast_metrics::{NodeMetricsCollector, ShardTally};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Node-side handler for one broadcast action.
///
/// Every shard of a node request runs on this node, one after the other, in
/// the order the coordinator listed them. A shard whose operation fails or
/// panics is recorded as a [`ShardFailure`] and the next shard still runs.
/// The dispatcher answers exactly once per node request.
pub struct NodeDispatcher<A: BroadcastAction> {
    node_id: NodeId,
    action: Arc<A>,
    metrics: Option<Arc<NodeMetricsCollector>>,
}

impl<A: BroadcastAction> NodeDispatcher<A> {
    pub fn new(node_id: impl Into<NodeId>, action: Arc<A>) -> Self {
        Self {
            node_id: node_id.into(),
            action,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<NodeMetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Method name this dispatcher serves.
    pub fn method(&self) -> String {
        self.action.node_action_name()
    }

    /// Runs the action on every shard of `request`, serially.
    pub fn execute(&self, request: &NodeRequest<A::Request>) -> NodeResponse<A::ShardResult> {
        let name = self.action.name();
        if request.node_id != self.node_id {
            warn!(
                "[{}] node request addressed to [{}] received by [{}]",
                name, request.node_id, self.node_id
            );
        }

        let total_shards = request.shards.len();
        let mut results = Vec::with_capacity(total_shards);
        let mut failures = Vec::new();

        for shard in &request.shards {
            trace!("[{}] executing operation for shard [{}]", name, shard.short_summary());

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.action.shard_operation(&request.request, shard)
            }));
            let cause = match outcome {
                Ok(Ok(result)) => {
                    results.push(result);
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!("panicked: {}", ShardcastError::panic_message(payload.as_ref())),
            };

            debug!(
                "[{}] failed to execute operation for shard [{}]: {}",
                name,
                shard.short_summary(),
                cause
            );
            failures.push(ShardFailure::operation_failed(shard.shard_id.clone(), name, cause));
        }

        let successful_shards = total_shards - failures.len();
        trace!(
            "[{}] completed operation on {}/{} shards",
            name,
            successful_shards,
            total_shards
        );
        self.action
            .new_node_response(&self.node_id, total_shards, successful_shards, results, failures)
    }
}

impl<A: BroadcastAction> NodeHandler for NodeDispatcher<A> {
    fn handle(self: Arc<Self>, payload: Value) -> ReplyFuture {
        Box::pin(async move {
            let start = Instant::now();
            let method = self.method();

            let request: NodeRequest<A::Request> = match serde_json::from_value(payload) {
                Ok(request) => request,
                Err(e) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_rejected(&method, start);
                    }
                    return Err(ShardcastError::InvalidRequest(format!(
                        "malformed node request for [{}]: {}",
                        method, e
                    )));
                }
            };

            let dispatcher = self.clone();
            let response = tokio::task::spawn_blocking(move || dispatcher.execute(&request))
                .await
                .map_err(|e| {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_rejected(&method, start);
                    }
                    ShardcastError::ShardOperation(format!("node operation [{}] did not complete: {}", method, e))
                })?;

            if let Some(metrics) = &self.metrics {
                let tally = ShardTally::new(
                    response.total_shards,
                    response.successful_shards,
                    response.failed_shards(),
                );
                metrics.record_node_request(&method, start, tally);
            }

            Ok(serde_json::to_value(&response)?)
        })
    }
}
