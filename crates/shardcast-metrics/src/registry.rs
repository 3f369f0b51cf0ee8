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

use crate::snapshot::{ActionMetrics, MetricsSnapshot, NodeMetrics};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Limits on per-key tracking.
///
/// Global counters are always updated; once a map is full, new action names or
/// node ids are no longer tracked individually.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Maximum number of distinct actions to track
    pub max_actions: usize,
    /// Maximum number of distinct nodes to track
    pub max_nodes: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_actions: 1000,
            max_nodes: 1000,
        }
    }
}

/// Shard tallies of one finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShardTally {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
}

impl ShardTally {
    pub fn new(total: usize, successful: usize, failed: usize) -> Self {
        Self {
            total: total as u64,
            successful: successful as u64,
            failed: failed as u64,
        }
    }
}

#[derive(Debug, Default)]
struct ActionEntry {
    runs: AtomicU64,
    blocked: AtomicU64,
    failed: AtomicU64,
    shards_total: AtomicU64,
    shards_successful: AtomicU64,
    shards_failed: AtomicU64,
    latency_sum_us: AtomicU64,
    latency_samples: AtomicU64,
    max_latency_us: AtomicU64,
}

impl ActionEntry {
    fn record_latency(&self, latency_us: u64) {
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
        self.max_latency_us.fetch_max(latency_us, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ActionMetrics {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        let avg_latency_us = if samples == 0 {
            0
        } else {
            self.latency_sum_us.load(Ordering::Relaxed) / samples
        };
        ActionMetrics {
            runs: self.runs.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            shards_total: self.shards_total.load(Ordering::Relaxed),
            shards_successful: self.shards_successful.load(Ordering::Relaxed),
            shards_failed: self.shards_failed.load(Ordering::Relaxed),
            avg_latency_us,
            max_latency_us: self.max_latency_us.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default)]
struct NodeEntry {
    requests: AtomicU64,
    failures: AtomicU64,
}

/// Thread-safe storage for broadcast metrics.
///
/// Counters are lock-free atomics; the per-action and per-node maps sit behind
/// an `RwLock` that is only written when a new key shows up.
#[derive(Debug)]
pub struct MetricsRegistry {
    start_time: Instant,
    config: MetricsConfig,
    runs: AtomicU64,
    blocked: AtomicU64,
    failed: AtomicU64,
    shards_total: AtomicU64,
    shards_successful: AtomicU64,
    shards_failed: AtomicU64,
    actions: RwLock<HashMap<String, Arc<ActionEntry>>>,
    nodes: RwLock<HashMap<String, Arc<NodeEntry>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_config(MetricsConfig::default())
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        Self {
            start_time: Instant::now(),
            config,
            runs: AtomicU64::new(0),
            blocked: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            shards_total: AtomicU64::new(0),
            shards_successful: AtomicU64::new(0),
            shards_failed: AtomicU64::new(0),
            actions: RwLock::new(HashMap::new()),
            nodes: RwLock::new(HashMap::new()),
        }
    }

    fn action(&self, name: &str) -> Option<Arc<ActionEntry>> {
        if let Some(entry) = self.actions.read().unwrap_or_else(|e| e.into_inner()).get(name) {
            return Some(entry.clone());
        }
        let mut actions = self.actions.write().unwrap_or_else(|e| e.into_inner());
        if !actions.contains_key(name) && actions.len() >= self.config.max_actions {
            return None;
        }
        Some(actions.entry(name.to_string()).or_default().clone())
    }

    fn node(&self, node_id: &str) -> Option<Arc<NodeEntry>> {
        if let Some(entry) = self.nodes.read().unwrap_or_else(|e| e.into_inner()).get(node_id) {
            return Some(entry.clone());
        }
        let mut nodes = self.nodes.write().unwrap_or_else(|e| e.into_inner());
        if !nodes.contains_key(node_id) && nodes.len() >= self.config.max_nodes {
            return None;
        }
        Some(nodes.entry(node_id.to_string()).or_default().clone())
    }

    /// Records a run that produced a result (possibly with shard failures).
    pub fn record_run(&self, action: &str, tally: ShardTally, latency_us: u64) {
        self.runs.fetch_add(1, Ordering::Relaxed);
        self.shards_total.fetch_add(tally.total, Ordering::Relaxed);
        self.shards_successful.fetch_add(tally.successful, Ordering::Relaxed);
        self.shards_failed.fetch_add(tally.failed, Ordering::Relaxed);

        if let Some(entry) = self.action(action) {
            entry.runs.fetch_add(1, Ordering::Relaxed);
            entry.shards_total.fetch_add(tally.total, Ordering::Relaxed);
            entry.shards_successful.fetch_add(tally.successful, Ordering::Relaxed);
            entry.shards_failed.fetch_add(tally.failed, Ordering::Relaxed);
            entry.record_latency(latency_us);
        }
    }

    /// Records a run rejected by an admission check.
    pub fn record_blocked(&self, action: &str) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
        if let Some(entry) = self.action(action) {
            entry.blocked.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a run that failed as a whole.
    pub fn record_failed(&self, action: &str, latency_us: u64) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        if let Some(entry) = self.action(action) {
            entry.failed.fetch_add(1, Ordering::Relaxed);
            entry.record_latency(latency_us);
        }
    }

    pub fn record_node_request(&self, node_id: &str, success: bool) {
        if let Some(entry) = self.node(node_id) {
            entry.requests.fetch_add(1, Ordering::Relaxed);
            if !success {
                entry.failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn snapshot(&self, include_nodes: bool) -> MetricsSnapshot {
        let actions = self
            .actions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(name, entry)| (name.clone(), entry.snapshot()))
            .collect();

        let nodes = include_nodes.then(|| {
            self.nodes
                .read()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .map(|(node_id, entry)| {
                    (
                        node_id.clone(),
                        NodeMetrics {
                            node_id: node_id.clone(),
                            requests: entry.requests.load(Ordering::Relaxed),
                            failures: entry.failures.load(Ordering::Relaxed),
                        },
                    )
                })
                .collect()
        });

        MetricsSnapshot {
            uptime_ms: self.uptime_ms(),
            runs: self.runs.load(Ordering::Relaxed),
            blocked: self.blocked.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            shards_total: self.shards_total.load(Ordering::Relaxed),
            shards_successful: self.shards_successful.load(Ordering::Relaxed),
            shards_failed: self.shards_failed.load(Ordering::Relaxed),
            actions,
            nodes,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
