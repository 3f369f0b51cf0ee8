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


//! The `shard-stats` demo operation.
//!
//! Every node keeps a document count per shard it holds. A broadcast asks
//! each node for the counts of its shards and sums them on the coordinator.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use shardcast_common::action::{BroadcastAction, BroadcastRequest, BroadcastSummary};
use shardcast_common::protocol::{
    ClusterBlockError, ClusterBlockLevel, ClusterBlocks, Result, ShardFailure, ShardId, ShardRouting, ShardcastError,
};
use std::collections::HashMap;

pub const SHARD_STATS_ACTION: &str = "indices:monitor/shard_stats";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsRequest {
    /// Targeted datasets. Empty targets all of them.
    #[serde(default)]
    pub datasets: Vec<String>,
}

impl BroadcastRequest for StatsRequest {
    fn datasets(&self) -> &[String] {
        &self.datasets
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    pub shard_id: ShardId,
    pub docs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub summary: BroadcastSummary,
    pub total_docs: u64,
    pub shards: Vec<ShardStats>,
}

/// Reports document counts from a node-local store.
///
/// The coordinator's instance usually has an empty store and only carries
/// the blocks; each node's instance holds the counts of its own shards.
#[derive(Debug, Default)]
pub struct ShardStatsAction {
    store: HashMap<ShardId, u64>,
    blocks: ClusterBlocks,
}

impl ShardStatsAction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shard(mut self, shard_id: ShardId, docs: u64) -> Self {
        self.store.insert(shard_id, docs);
        self
    }

    pub fn with_blocks(mut self, blocks: ClusterBlocks) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn shard_count(&self) -> usize {
        self.store.len()
    }
}

impl BroadcastAction for ShardStatsAction {
    type Request = StatsRequest;
    type ShardResult = ShardStats;
    type Response = StatsResponse;

    fn name(&self) -> &str {
        SHARD_STATS_ACTION
    }

    fn check_global_block(&self, _request: &StatsRequest) -> Option<ClusterBlockError> {
        self.blocks.global_blocked(ClusterBlockLevel::MetadataRead)
    }

    fn check_request_block(&self, _request: &StatsRequest, datasets: &[String]) -> Option<ClusterBlockError> {
        self.blocks.datasets_blocked(ClusterBlockLevel::MetadataRead, datasets)
    }

    fn shard_operation(&self, _request: &StatsRequest, shard: &ShardRouting) -> Result<ShardStats> {
        self.store
            .get(&shard.shard_id)
            .map(|docs| ShardStats {
                shard_id: shard.shard_id.clone(),
                docs: *docs,
            })
            .ok_or_else(|| ShardcastError::shard_operation(format!("shard {} is not held by this node", shard.shard_id)))
    }

    fn new_response(
        &self,
        _request: &StatsRequest,
        total_shards: usize,
        successful_shards: usize,
        failed_shards: usize,
        results: Vec<ShardStats>,
        shard_failures: Vec<ShardFailure>,
    ) -> Result<StatsResponse> {
        Ok(StatsResponse {
            summary: BroadcastSummary::new(total_shards, successful_shards, failed_shards, shard_failures),
            total_docs: results.iter().map(|s| s.docs).sum(),
            shards: results,
        })
    }
}

/// Parses a `dataset:id[:docs]` shard argument. `docs` defaults to 0.
pub fn parse_shard_arg(arg: &str) -> anyhow::Result<(ShardId, u64)> {
    let mut parts = arg.split(':');
    let (dataset, id) = match (parts.next(), parts.next()) {
        (Some(dataset), Some(id)) if !dataset.is_empty() => (dataset, id),
        _ => anyhow::bail!("Invalid shard '{}': expected dataset:id[:docs]", arg),
    };
    let id = id
        .parse::<u32>()
        .with_context(|| format!("Invalid shard id in '{}'", arg))?;
    let docs = match parts.next() {
        Some(docs) => docs
            .parse::<u64>()
            .with_context(|| format!("Invalid document count in '{}'", arg))?,
        None => 0,
    };
    if parts.next().is_some() {
        anyhow::bail!("Invalid shard '{}': expected dataset:id[:docs]", arg);
    }
    Ok((ShardId::new(dataset, id), docs))
}
