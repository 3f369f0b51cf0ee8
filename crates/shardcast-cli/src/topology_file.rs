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


//! Topology file loading for the `broadcast` command.
//!
//! ```json
//! {
//!   "version": 3,
//!   "nodes": { "node_0": "http://127.0.0.1:9200" },
//!   "shards": [
//!     { "dataset": "logs", "id": 0, "node": "node_0" },
//!     { "dataset": "logs", "id": 1 }
//!   ]
//! }
//! ```
//!
//! A shard without `node` is unassigned and is reported as a failure of
//! every broadcast that targets its dataset.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shardcast_common::protocol::{NodeId, RoutingTable, ShardId, ShardRouting};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Validates that a URL has the http:// prefix.
///
/// The node transport speaks plain HTTP only, so https:// is refused here
/// rather than silently sent in cleartext.
pub fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("http://") {
        Ok(())
    } else if url.starts_with("https://") {
        Err(anyhow::anyhow!(
            "Invalid {}: '{}' uses https://, which is not supported; use http://",
            description,
            url
        ))
    } else {
        Err(anyhow::anyhow!(
            "Invalid {}: '{}' must start with http://",
            description,
            url
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardEntry {
    pub dataset: String,
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyFile {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, String>,
    #[serde(default)]
    pub shards: Vec<ShardEntry>,
}

impl TopologyFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read topology file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid topology file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let file: TopologyFile = serde_json::from_str(contents)?;
        file.validate()?;
        Ok(file)
    }

    /// Checks node URLs, duplicate shards and shards routed to undeclared nodes.
    pub fn validate(&self) -> Result<()> {
        for (node_id, url) in &self.nodes {
            validate_http_url(url, &format!("url for node [{}]", node_id))?;
        }

        let mut seen = HashSet::new();
        for shard in &self.shards {
            let shard_id = ShardId::new(shard.dataset.clone(), shard.id);
            if let Some(node_id) = &shard.node {
                if !self.nodes.contains_key(node_id) {
                    anyhow::bail!("shard {} is assigned to undeclared node [{}]", shard_id, node_id);
                }
            }
            if !seen.insert(shard_id.clone()) {
                anyhow::bail!("shard {} is listed more than once", shard_id);
            }
        }
        Ok(())
    }

    pub fn routing_table(&self) -> RoutingTable {
        let shards = self
            .shards
            .iter()
            .map(|entry| {
                let shard_id = ShardId::new(entry.dataset.clone(), entry.id);
                match &entry.node {
                    Some(node_id) => ShardRouting::assigned(shard_id, node_id.clone()),
                    None => ShardRouting::unassigned(shard_id),
                }
            })
            .collect();
        RoutingTable::new(self.version, shards)
    }

    pub fn node_urls(&self) -> HashMap<NodeId, String> {
        self.nodes.iter().map(|(id, url)| (id.clone(), url.clone())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TOPOLOGY: &str = r#"{
        "version": 3,
        "nodes": {
            "node_0": "http://127.0.0.1:9200",
            "node_1": "http://127.0.0.1:9201"
        },
        "shards": [
            { "dataset": "logs", "id": 0, "node": "node_0" },
            { "dataset": "logs", "id": 1, "node": "node_1" },
            { "dataset": "logs", "id": 2 }
        ]
    }"#;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TOPOLOGY.as_bytes()).unwrap();

        let topology = TopologyFile::load(file.path()).unwrap();
        assert_eq!(topology.version, 3);
        assert_eq!(topology.nodes.len(), 2);

        let table = topology.routing_table();
        assert_eq!(table.version, 3);
        assert_eq!(table.len(), 3);
        assert_eq!(table.shards[0], ShardRouting::assigned(ShardId::new("logs", 0), "node_0"));
        assert!(!table.shards[2].assigned_to_node());

        let urls = topology.node_urls();
        assert_eq!(urls["node_1"], "http://127.0.0.1:9201");
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TopologyFile::load(dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read topology file"));
    }

    #[test]
    fn test_empty_object_is_empty_topology() {
        let topology = TopologyFile::parse("{}").unwrap();
        assert!(topology.routing_table().is_empty());
        assert!(topology.node_urls().is_empty());
    }

    #[test]
    fn test_rejects_url_without_scheme() {
        let err = TopologyFile::parse(r#"{"nodes": {"node_0": "127.0.0.1:9200"}}"#).unwrap_err();
        assert!(err.to_string().contains("must start with http://"));
    }

    #[test]
    fn test_rejects_https_node() {
        let err = TopologyFile::parse(r#"{"nodes": {"node_0": "https://127.0.0.1:9200"}}"#).unwrap_err();
        assert!(err.to_string().contains("https://, which is not supported"));
    }

    #[test]
    fn test_rejects_undeclared_node() {
        let err = TopologyFile::parse(r#"{"shards": [{"dataset": "logs", "id": 0, "node": "node_9"}]}"#).unwrap_err();
        assert!(err.to_string().contains("undeclared node [node_9]"));
    }

    #[test]
    fn test_rejects_duplicate_shard() {
        let err = TopologyFile::parse(
            r#"{"shards": [{"dataset": "logs", "id": 0}, {"dataset": "logs", "id": 0}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("[logs][0] is listed more than once"));
    }

    #[test]
    fn test_validate_http_url() {
        assert!(validate_http_url("http://127.0.0.1:8080", "node url").is_ok());
        assert!(validate_http_url("https://example.com", "node url").is_err());
        assert!(validate_http_url("ftp://example.com", "node url").is_err());
    }
}
