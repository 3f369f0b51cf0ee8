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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which side of a broadcast a server plays
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Node,
    Coordinator,
}

/// Server information returned by `_info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub server_type: ServerType,
    pub version: String,
    pub uptime_ms: u64,
}

impl ServerInfo {
    pub fn new(server_type: ServerType, uptime_ms: u64) -> Self {
        Self {
            server_type,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_ms,
        }
    }
}

/// Outcome counters for one action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMetrics {
    /// Broadcasts (coordinator) or node requests (node) handled
    pub runs: u64,
    pub blocked: u64,
    pub failed: u64,
    pub shards_total: u64,
    pub shards_successful: u64,
    pub shards_failed: u64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
}

/// Per-node request counters (coordinator only)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node_id: String,
    pub requests: u64,
    pub failures: u64,
}

/// Complete metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_ms: u64,
    pub runs: u64,
    pub blocked: u64,
    pub failed: u64,
    pub shards_total: u64,
    pub shards_successful: u64,
    pub shards_failed: u64,
    pub actions: HashMap<String, ActionMetrics>,
    pub nodes: Option<HashMap<String, NodeMetrics>>,
}
