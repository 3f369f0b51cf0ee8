//! Coordinator integration tests over the in-process transport.
//!
//! Each fake node answers node requests the way a real node would: one
//! response per request, covering every shard it was sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shardcast_common::action::{BroadcastAction, BroadcastRequest, BroadcastSummary};
use shardcast_common::protocol::{
    ClusterBlockError, NodeRequest, NodeResponse, Result, RoutingTable, ShardFailure, ShardId, ShardRouting,
    ShardcastError,
};
use shardcast_common::transport::{LocalTransport, NodeHandler, ReplyFuture};
use shardcast_coordinator::{Coordinator, StaticTopology};
use shardcast_metrics::{BroadcastMetrics, MetricsCollector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CountRequest {
    datasets: Vec<String>,
}

impl BroadcastRequest for CountRequest {
    fn datasets(&self) -> &[String] {
        &self.datasets
    }
}

struct CountAction;

impl BroadcastAction for CountAction {
    type Request = CountRequest;
    type ShardResult = ShardId;
    type Response = (BroadcastSummary, Vec<ShardId>);

    fn name(&self) -> &str {
        "cluster:count"
    }

    fn check_global_block(&self, _request: &CountRequest) -> Option<ClusterBlockError> {
        None
    }

    fn check_request_block(&self, _request: &CountRequest, _datasets: &[String]) -> Option<ClusterBlockError> {
        None
    }

    fn shard_operation(&self, _request: &CountRequest, shard: &ShardRouting) -> Result<ShardId> {
        Ok(shard.shard_id.clone())
    }

    fn new_response(
        &self,
        _request: &CountRequest,
        total_shards: usize,
        successful_shards: usize,
        failed_shards: usize,
        results: Vec<ShardId>,
        shard_failures: Vec<ShardFailure>,
    ) -> Result<Self::Response> {
        Ok((
            BroadcastSummary::new(total_shards, successful_shards, failed_shards, shard_failures),
            results,
        ))
    }
}

/// Answers after `delay`, failing shards whose id is in `failing`.
struct FakeNode {
    delay: Duration,
    failing: Vec<u32>,
    requests: AtomicUsize,
}

impl FakeNode {
    fn new(delay_ms: u64, failing: Vec<u32>) -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::from_millis(delay_ms),
            failing,
            requests: AtomicUsize::new(0),
        })
    }
}

impl NodeHandler for FakeNode {
    fn handle(self: Arc<Self>, payload: Value) -> ReplyFuture {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;

            let request: NodeRequest<CountRequest> = serde_json::from_value(payload)?;
            let mut results = Vec::new();
            let mut failures = Vec::new();
            for shard in &request.shards {
                if self.failing.contains(&shard.shard_id.id) {
                    failures.push(ShardFailure::operation_failed(shard.shard_id.clone(), "cluster:count", "boom"));
                } else {
                    results.push(shard.shard_id.clone());
                }
            }
            let response = NodeResponse::new(
                request.node_id,
                request.shards.len(),
                results.len(),
                results,
                failures,
            );
            Ok::<_, ShardcastError>(serde_json::to_value(response)?)
        })
    }
}

fn table() -> RoutingTable {
    RoutingTable::new(
        3,
        vec![
            ShardRouting::assigned(ShardId::new("logs", 0), "node_0"),
            ShardRouting::assigned(ShardId::new("logs", 1), "node_1"),
            ShardRouting::assigned(ShardId::new("logs", 2), "node_0"),
            ShardRouting::assigned(ShardId::new("metrics", 0), "node_2"),
            ShardRouting::unassigned(ShardId::new("metrics", 1)),
        ],
    )
}

fn request(datasets: &[&str]) -> CountRequest {
    CountRequest {
        datasets: datasets.iter().map(|d| d.to_string()).collect(),
    }
}

#[tokio::test]
async fn test_broadcast_over_local_transport() {
    let transport = Arc::new(LocalTransport::new());
    let nodes = [FakeNode::new(30, vec![]), FakeNode::new(0, vec![]), FakeNode::new(10, vec![])];
    for (i, node) in nodes.iter().enumerate() {
        transport.register(format!("node_{}", i), "cluster:count[n]", node.clone());
    }

    let coordinator = Coordinator::new(Arc::new(CountAction), transport, Arc::new(StaticTopology::new(table())));
    let (summary, results) = coordinator.execute(request(&[])).await.unwrap();

    assert_eq!(summary.total_shards, 5);
    assert_eq!(summary.successful_shards, 4);
    assert_eq!(summary.failed_shards, 1);
    assert_eq!(summary.shard_failures[0].shard_id, ShardId::new("metrics", 1));

    // node_0 was dispatched first, so its shards lead even though it answered last.
    assert_eq!(results[0], ShardId::new("logs", 0));
    assert_eq!(results[1], ShardId::new("logs", 2));

    for node in &nodes {
        assert_eq!(node.requests.load(Ordering::SeqCst), 1);
    }
}

#[tokio::test]
async fn test_dataset_selector_limits_nodes() {
    let transport = Arc::new(LocalTransport::new());
    let nodes = [FakeNode::new(0, vec![]), FakeNode::new(0, vec![]), FakeNode::new(0, vec![])];
    for (i, node) in nodes.iter().enumerate() {
        transport.register(format!("node_{}", i), "cluster:count[n]", node.clone());
    }

    let coordinator = Coordinator::new(Arc::new(CountAction), transport, Arc::new(StaticTopology::new(table())));
    let (summary, _) = coordinator.execute(request(&["logs"])).await.unwrap();

    assert_eq!(summary.total_shards, 3);
    assert_eq!(summary.successful_shards, 3);
    assert_eq!(nodes[2].requests.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disconnected_node_and_failing_shard() {
    let transport = Arc::new(LocalTransport::new());
    transport.register("node_0", "cluster:count[n]", FakeNode::new(0, vec![2]));
    transport.register("node_2", "cluster:count[n]", FakeNode::new(0, vec![]));
    // node_1 never registered: dispatch fails synchronously.

    let metrics = Arc::new(BroadcastMetrics::new());
    let coordinator = Coordinator::new(Arc::new(CountAction), transport, Arc::new(StaticTopology::new(table())))
        .with_metrics(metrics.clone());
    let (summary, results) = coordinator.execute(request(&[])).await.unwrap();

    assert_eq!(summary.total_shards, 5);
    assert_eq!(summary.successful_shards, 2);
    assert_eq!(summary.failed_shards, 3);
    assert_eq!(summary.shard_failures.len(), 3);
    assert_eq!(results, vec![ShardId::new("logs", 0), ShardId::new("metrics", 0)]);

    let reasons: Vec<&str> = summary.shard_failures.iter().map(|f| f.reason.as_str()).collect();
    assert!(reasons.contains(&"operation cluster:count failed"));
    assert!(reasons.contains(&"Failed node [node_1]"));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.runs, 1);
    assert_eq!(snapshot.nodes.unwrap()["node_1"].failures, 1);
}

#[tokio::test]
async fn test_missing_node_action_is_node_failure() {
    let transport = Arc::new(LocalTransport::new());
    for i in 0..3 {
        transport.register(format!("node_{}", i), "other:action[n]", FakeNode::new(0, vec![]));
    }

    let coordinator = Coordinator::new(Arc::new(CountAction), transport, Arc::new(StaticTopology::new(table())));
    let (summary, results) = coordinator.execute(request(&[])).await.unwrap();

    assert!(results.is_empty());
    assert_eq!(summary.successful_shards, 0);
    assert_eq!(summary.failed_shards, 5);
    assert!(summary.shard_failures[1].cause.contains("No handler found"));
}

#[tokio::test]
async fn test_topology_update_between_runs() {
    let transport = Arc::new(LocalTransport::new());
    for i in 0..3 {
        transport.register(format!("node_{}", i), "cluster:count[n]", FakeNode::new(0, vec![]));
    }
    let topology = Arc::new(StaticTopology::new(table()));
    let coordinator = Coordinator::new(Arc::new(CountAction), transport, topology.clone());

    let (before, _) = coordinator.execute(request(&["metrics"])).await.unwrap();
    assert_eq!(before.failed_shards, 1);

    let mut updated = table();
    updated.version = 4;
    updated.shards[4] = ShardRouting::assigned(ShardId::new("metrics", 1), "node_1");
    assert!(topology.update(updated));

    let (after, _) = coordinator.execute(request(&["metrics"])).await.unwrap();
    assert_eq!(after.total_shards, 2);
    assert_eq!(after.successful_shards, 2);
}

#[tokio::test]
async fn test_unknown_dataset_rejected() {
    let transport = Arc::new(LocalTransport::new());
    let coordinator = Coordinator::new(Arc::new(CountAction), transport, Arc::new(StaticTopology::new(table())));
    let err = coordinator.execute(request(&["nope"])).await.unwrap_err();
    assert!(matches!(err, ShardcastError::Topology(_)));
}
