// Copyright 2025 Shardcast Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::registry::{MetricsConfig, MetricsRegistry, ShardTally};
use crate::snapshot::{MetricsSnapshot, ServerInfo, ServerType};
use serde_json::{json, Value};
use shardcast_common::protocol::{JsonRpcResponse, Result, ShardcastError};
use std::sync::Arc;
use std::time::Instant;

/// Method name answered with a [`MetricsSnapshot`].
pub const METRICS_METHOD: &str = "_metrics";
/// Method name answered with a [`ServerInfo`].
pub const INFO_METHOD: &str = "_info";

/// Metrics collection shared by node servers and coordinators.
///
/// Implementations answer the built-in `_metrics` and `_info` methods, which
/// are intercepted before any action handler sees them.
pub trait MetricsCollector: Send + Sync {
    /// Returns `true` for `_metrics` and `_info`.
    fn is_metrics_request(&self, method: &str) -> bool {
        method == METRICS_METHOD || method == INFO_METHOD
    }

    /// Answers a built-in method.
    ///
    /// Returns `InvalidRequest` for anything `is_metrics_request` rejects.
    fn handle_metrics_request(&self, method: &str, id: Value) -> Result<JsonRpcResponse> {
        match method {
            METRICS_METHOD => Ok(JsonRpcResponse::success(id, json!(self.snapshot()))),
            INFO_METHOD => {
                let info = ServerInfo::new(self.server_type(), self.uptime_ms());
                Ok(JsonRpcResponse::success(id, json!(info)))
            }
            other => Err(ShardcastError::InvalidRequest(format!(
                "[{}] is not a metrics method",
                other
            ))),
        }
    }

    fn server_type(&self) -> ServerType;

    fn uptime_ms(&self) -> u64;

    fn snapshot(&self) -> MetricsSnapshot;
}

/// Metrics for a node server: one run per node request handled.
pub struct NodeMetricsCollector {
    registry: Arc<MetricsRegistry>,
}

impl NodeMetricsCollector {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(MetricsRegistry::new()))
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        Self::with_registry(Arc::new(MetricsRegistry::with_config(config)))
    }

    pub fn with_registry(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }

    /// Records a node request that ran all its shards.
    pub fn record_node_request(&self, action: &str, start_time: Instant, tally: ShardTally) {
        let latency_us = start_time.elapsed().as_micros() as u64;
        self.registry.record_run(action, tally, latency_us);
    }

    /// Records a node request that could not be processed at all
    /// (undecodable payload, unknown action).
    pub fn record_rejected(&self, action: &str, start_time: Instant) {
        let latency_us = start_time.elapsed().as_micros() as u64;
        self.registry.record_failed(action, latency_us);
    }
}

impl Default for NodeMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for NodeMetricsCollector {
    fn server_type(&self) -> ServerType {
        ServerType::Node
    }

    fn uptime_ms(&self) -> u64 {
        self.registry.uptime_ms()
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.registry.snapshot(false)
    }
}

/// Metrics for a coordinator.
///
/// Tracks whole broadcast runs per action plus per-node request outcomes, so
/// the snapshot shows how node failures are distributed.
pub struct BroadcastMetrics {
    registry: Arc<MetricsRegistry>,
}

impl BroadcastMetrics {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(MetricsRegistry::new()))
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        Self::with_registry(Arc::new(MetricsRegistry::with_config(config)))
    }

    pub fn with_registry(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }

    /// Records a broadcast that delivered a response.
    pub fn record_run(&self, action: &str, start_time: Instant, tally: ShardTally) {
        let latency_us = start_time.elapsed().as_micros() as u64;
        self.registry.record_run(action, tally, latency_us);
    }

    /// Records a broadcast rejected at admission.
    pub fn record_blocked(&self, action: &str) {
        self.registry.record_blocked(action);
    }

    /// Records a broadcast that ended with an error after admission.
    pub fn record_failed(&self, action: &str, start_time: Instant) {
        let latency_us = start_time.elapsed().as_micros() as u64;
        self.registry.record_failed(action, latency_us);
    }

    /// Records the outcome of one node request.
    pub fn record_node_outcome(&self, node_id: &str, success: bool) {
        self.registry.record_node_request(node_id, success);
    }
}

impl Default for BroadcastMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for BroadcastMetrics {
    fn server_type(&self) -> ServerType {
        ServerType::Coordinator
    }

    fn uptime_ms(&self) -> u64 {
        self.registry.uptime_ms()
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.registry.snapshot(true)
    }
}
