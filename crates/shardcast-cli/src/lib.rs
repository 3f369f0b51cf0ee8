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


//! # Shardcast CLI
//!
//! Command-line entry point for running Shardcast components:
//!
//! - **Nodes**: serve the shards they hold over JSON-RPC/HTTP
//! - **Broadcasts**: run one coordinator run against a topology file and
//!   print the aggregated result as JSON
//!
//! The binary ships one demo operation, [`stats::ShardStatsAction`], which
//! reports a per-shard document count from each node's local store.
//!
//! ## Key Commands
//!
//! - `shardcast node --id node_0 --shard logs:0:120 -b 127.0.0.1:9200`
//! - `shardcast broadcast -t topology.json -d logs`

pub mod stats;
pub mod topology_file;
