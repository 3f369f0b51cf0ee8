//! The broadcast-by-node coordinator.
//!
//! A run goes through three phases:
//!
//! - **Admission**: the global block check, dataset expansion, the
//!   request-scope block check and topology resolution. All of it happens
//!   synchronously inside [`Coordinator::submit`], so a blocked or
//!   unresolvable request is rejected before any node is contacted.
//! - **Dispatch**: shards are grouped by the node holding them and one
//!   [`NodeRequest`] per node is handed to the [`Transport`]. Each reply is
//!   awaited on its own task.
//! - **Collection**: every node task reports `(slot, outcome)` to the run's
//!   collector task, which owns the [`SlotTable`]. When the last slot is
//!   written the collector aggregates once and resolves the
//!   [`BroadcastFuture`].
//!
//! # Example
//!
//! ```no_run
//! # use shardcast_common::action::BroadcastAction;
//! # use shardcast_common::transport::LocalTransport;
//! # use shardcast_common::protocol::RoutingTable;
//! # use shardcast_coordinator::{Coordinator, StaticTopology};
//! # use std::sync::Arc;
//! # async fn run<A: BroadcastAction>(action: A, request: A::Request, table: RoutingTable) -> shardcast_common::Result<()> {
//! let coordinator = Coordinator::new(
//!     Arc::new(action),
//!     Arc::new(LocalTransport::new()),
//!     Arc::new(StaticTopology::new(table)),
//! );
//! let response = coordinator.execute(request).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

use serde::de::DeserializeOwned;
use serde_json::Value;
use shardcast_common::action::BroadcastAction;
use shardcast_common::protocol::{
    NodeFailure, NodeOutcome, NodeRequest, NodeResponse, Result, ShardFailure, ShardcastError,
};
use shardcast_common::transport::Transport;
use shardcast_metrics::{BroadcastMetrics, ShardTally};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use crate::group::ShardGroup;
use crate::slots::SlotTable;
use crate::topology::TopologyProvider;

type OutcomeSender<S> = mpsc::UnboundedSender<(usize, NodeOutcome<S>)>;
type OutcomeReceiver<S> = mpsc::UnboundedReceiver<(usize, NodeOutcome<S>)>;

/// Resolves to the result of one broadcast.
///
/// Returned by [`Coordinator::submit`]. Resolves to `Cancelled` if the run was
/// torn down without producing a result (e.g. the runtime shut down).
pub struct BroadcastFuture<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Future for BroadcastFuture<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(ShardcastError::Cancelled)))
    }
}

/// Broadcast-by-node coordinator.
///
/// For every submitted request the coordinator:
///
/// 1. runs the action's global and request admission checks
/// 2. resolves the targeted shards through the [`TopologyProvider`]
/// 3. groups them by node and sends one node request per node, all at once
/// 4. collects one outcome per node into a per-run [`SlotTable`]
/// 5. aggregates exactly once when every slot is filled
///
/// Shard failures and node failures never fail the run. They are counted and
/// listed in the response the action builds. Only admission blocks, topology
/// errors and failures of [`BroadcastAction::new_response`] reach the caller
/// as errors.
///
/// Whole-node failures are not retried.
pub struct Coordinator<A: BroadcastAction> {
    action: Arc<A>,
    transport: Arc<dyn Transport>,
    topology: Arc<dyn TopologyProvider<A::Request>>,
    metrics: Option<Arc<BroadcastMetrics>>,
}

impl<A: BroadcastAction> Coordinator<A> {
    pub fn new(
        action: Arc<A>,
        transport: Arc<dyn Transport>,
        topology: Arc<dyn TopologyProvider<A::Request>>,
    ) -> Self {
        Self {
            action,
            transport,
            topology,
            metrics: None,
        }
    }

    /// Records run and node outcomes into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<BroadcastMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn action(&self) -> &Arc<A> {
        &self.action
    }

    pub fn metrics(&self) -> Option<&Arc<BroadcastMetrics>> {
        self.metrics.as_ref()
    }

    /// Starts a broadcast.
    ///
    /// Admission blocks and topology errors are returned synchronously, before
    /// any node is contacted. Otherwise every node request has been handed to
    /// the transport by the time this returns, and the returned future
    /// resolves to the aggregated response.
    ///
    /// Node requests and the collector run on the current tokio runtime.
    /// Called outside one, `submit` fails with [`ShardcastError::Runtime`]
    /// before contacting any node, unless no node holds a targeted shard, in
    /// which case the run completes on the spot.
    pub fn submit(&self, request: A::Request) -> Result<BroadcastFuture<A::Response>> {
        let start = Instant::now();
        let name = self.action.name();

        if let Some(block) = self.action.check_global_block(&request) {
            debug!("[{}] rejected by global block: {}", name, block);
            if let Some(metrics) = &self.metrics {
                metrics.record_blocked(name);
            }
            return Err(block.into());
        }

        let selector = self.action.dataset_selector(&request);
        let datasets = self
            .topology
            .concrete_datasets(&request, &selector)
            .map_err(|e| self.reject(start, "failed to resolve datasets", e))?;
        if let Some(block) = self.action.check_request_block(&request, &datasets) {
            debug!("[{}] rejected by request block on {:?}: {}", name, datasets, block);
            if let Some(metrics) = &self.metrics {
                metrics.record_blocked(name);
            }
            return Err(block.into());
        }

        let table = self
            .topology
            .resolve(&request, &datasets)
            .map_err(|e| self.reject(start, "failed to resolve topology", e))?;

        let group = ShardGroup::build(&table, name);
        trace!(
            "[{}] resolved {} shards on {} nodes, {} unavailable (topology version {})",
            name,
            group.total_shards(),
            group.node_count(),
            group.unavailable().len(),
            table.version
        );

        let run = BroadcastRun {
            action: self.action.clone(),
            request,
            group,
            metrics: self.metrics.clone(),
            start,
        };
        let (reply_tx, reply_rx) = oneshot::channel();

        if run.group.is_empty() {
            let _ = reply_tx.send(run.finish(SlotTable::with_size(0)));
            return Ok(BroadcastFuture { rx: reply_rx });
        }

        let runtime = Handle::try_current().map_err(|e| {
            let err = ShardcastError::Runtime(format!(
                "[{}] cannot contact {} nodes outside a tokio runtime: {}",
                name,
                run.group.node_count(),
                e
            ));
            self.reject(start, "refused to dispatch", err)
        })?;

        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        self.dispatch(&runtime, &run, &outcome_tx);
        drop(outcome_tx);
        runtime.spawn(run.collect(outcome_rx, reply_tx));

        Ok(BroadcastFuture { rx: reply_rx })
    }

    /// Runs a broadcast to completion.
    pub async fn execute(&self, request: A::Request) -> Result<A::Response> {
        self.submit(request)?.await
    }

    /// Logs and counts a run that fails before any node is contacted.
    fn reject(&self, start: Instant, what: &str, err: ShardcastError) -> ShardcastError {
        debug!("[{}] {}: {}", self.action.name(), what, err);
        if let Some(metrics) = &self.metrics {
            metrics.record_failed(self.action.name(), start);
        }
        err
    }

    /// Sends one node request per node. Each outcome, including a failure to
    /// send at all, is reported on `outcomes` under the node's dispatch index.
    fn dispatch(&self, runtime: &Handle, run: &BroadcastRun<A>, outcomes: &OutcomeSender<A::ShardResult>) {
        let node_action = self.action.node_action_name();

        for (index, (node_id, shards)) in run.group.nodes().iter().enumerate() {
            let node_request = NodeRequest::new(node_id.clone(), run.request.clone(), shards.clone());
            trace!("[{}] sending {} shards to node [{}]", node_action, shards.len(), node_id);

            let sent = serde_json::to_value(&node_request)
                .map_err(ShardcastError::from)
                .and_then(|payload| self.transport.send_request(node_id, &node_action, payload));

            match sent {
                Ok(reply) => {
                    let outcomes = outcomes.clone();
                    let node_id = node_id.clone();
                    let expected = shards.len();
                    runtime.spawn(async move {
                        let outcome = match reply.await {
                            Ok(value) => decode_response(&node_id, expected, value),
                            Err(e) => NodeOutcome::Failed(NodeFailure::new(node_id, e.to_string())),
                        };
                        let _ = outcomes.send((index, outcome));
                    });
                }
                Err(e) => {
                    let failure = NodeFailure::new(node_id.clone(), e.to_string());
                    let _ = outcomes.send((index, NodeOutcome::Failed(failure)));
                }
            }
        }
    }
}

/// Decodes a node's reply, rejecting answers whose tallies do not cover the
/// shards that were sent.
fn decode_response<S: DeserializeOwned>(node_id: &str, expected: usize, value: Value) -> NodeOutcome<S> {
    match serde_json::from_value::<NodeResponse<S>>(value) {
        Ok(response)
            if response.total_shards != expected
                || response.successful_shards + response.failed_shards() != response.total_shards =>
        {
            NodeOutcome::Failed(NodeFailure::new(
                node_id,
                format!(
                    "inconsistent node response: sent {} shards, got total={} successful={} failed={}",
                    expected,
                    response.total_shards,
                    response.successful_shards,
                    response.failed_shards()
                ),
            ))
        }
        Ok(response) => NodeOutcome::Response(response),
        Err(e) => NodeOutcome::Failed(NodeFailure::new(
            node_id,
            format!("failed to decode node response: {}", e),
        )),
    }
}

/// State of one broadcast, created per submitted request.
struct BroadcastRun<A: BroadcastAction> {
    action: Arc<A>,
    request: A::Request,
    group: ShardGroup,
    metrics: Option<Arc<BroadcastMetrics>>,
    start: Instant,
}

impl<A: BroadcastAction> BroadcastRun<A> {
    /// Fills the slot table as outcomes arrive, then aggregates once.
    async fn collect(
        self,
        mut outcomes: OutcomeReceiver<A::ShardResult>,
        reply: oneshot::Sender<Result<A::Response>>,
    ) {
        let name = self.action.name();
        let mut slots = SlotTable::with_size(self.group.node_count());

        while !slots.is_complete() {
            let (index, outcome) = match outcomes.recv().await {
                Some(received) => received,
                None => {
                    let missing = slots.fill_missing(|index| {
                        NodeOutcome::Failed(NodeFailure::new(
                            self.group.node_id(index).unwrap_or_default(),
                            "node request was dropped before completing",
                        ))
                    });
                    warn!(
                        "[{}] {} of {} node requests ended without an outcome",
                        name,
                        missing,
                        slots.len()
                    );
                    break;
                }
            };

            match &outcome {
                NodeOutcome::Response(response) => trace!(
                    "[{}] node [{}] answered: {}/{} shards successful",
                    name,
                    response.node_id,
                    response.successful_shards,
                    response.total_shards
                ),
                NodeOutcome::Failed(failure) => debug!(
                    "[{}] failed to execute on node [{}]: {}",
                    name, failure.node_id, failure.cause
                ),
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_node_outcome(outcome.node_id(), !outcome.is_failure());
            }

            if slots.fill(index, outcome) {
                trace!("[{}] collected {}/{} node outcomes", name, slots.filled(), slots.len());
            } else {
                warn!("[{}] ignoring second outcome for slot {}", name, index);
            }
        }

        let _ = reply.send(self.finish(slots));
    }

    /// Combines every slot with the unavailable shards and builds the response.
    fn finish(self, slots: SlotTable<A::ShardResult>) -> Result<A::Response> {
        let name = self.action.name();
        let mut total = self.group.unavailable().len();
        let mut successful = 0;
        let mut results = Vec::new();
        let mut failures = self.group.unavailable().to_vec();

        for (index, outcome) in slots.into_outcomes() {
            match outcome {
                NodeOutcome::Response(response) => {
                    total += response.total_shards;
                    successful += response.successful_shards;
                    results.extend(response.results);
                    failures.extend(response.failures);
                }
                NodeOutcome::Failed(failure) => {
                    let shards = self.group.shards(index);
                    total += shards.len();
                    failures.extend(
                        shards
                            .iter()
                            .map(|shard| ShardFailure::node_failed(shard.shard_id.clone(), &failure)),
                    );
                }
            }
        }
        let failed = total.saturating_sub(successful);

        trace!(
            "[{}] aggregating: total={} successful={} failed={}",
            name,
            total,
            successful,
            failed
        );

        let built = panic::catch_unwind(AssertUnwindSafe(|| {
            self.action
                .new_response(&self.request, total, successful, failed, results, failures)
        }));
        let response = match built {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(ShardcastError::Aggregation(message))) => Err(ShardcastError::Aggregation(message)),
            Ok(Err(e)) => Err(ShardcastError::Aggregation(e.to_string())),
            Err(payload) => Err(ShardcastError::Aggregation(ShardcastError::panic_message(
                payload.as_ref(),
            ))),
        };

        if let Err(e) = &response {
            debug!("[{}] {}", name, e);
        }
        if let Some(metrics) = &self.metrics {
            match &response {
                Ok(_) => metrics.record_run(name, self.start, ShardTally::new(total, successful, failed)),
                Err(_) => metrics.record_failed(name, self.start),
            }
        }

        response
    }
}
