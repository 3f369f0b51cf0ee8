//! Grouping of resolved shards by the node that holds them.

use shardcast_common::protocol::{NodeId, RoutingTable, ShardFailure, ShardRouting};
use std::collections::HashMap;

/// Shards of one run, grouped by node in first-seen order.
///
/// The position of a node in [`ShardGroup::nodes`] is its dispatch index and
/// therefore its slot in the run's [`SlotTable`](crate::SlotTable).
#[derive(Debug, Clone, Default)]
pub struct ShardGroup {
    nodes: Vec<(NodeId, Vec<ShardRouting>)>,
    unavailable: Vec<ShardFailure>,
}

impl ShardGroup {
    /// Groups `table` by node. Unassigned shards become unavailable failures
    /// attributed to `action`.
    pub fn build(table: &RoutingTable, action: &str) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut nodes: Vec<(NodeId, Vec<ShardRouting>)> = Vec::new();
        let mut unavailable = Vec::new();

        for shard in &table.shards {
            match shard.current_node_id() {
                Some(node_id) => {
                    let slot = *index.entry(node_id).or_insert_with(|| {
                        nodes.push((node_id.to_string(), Vec::new()));
                        nodes.len() - 1
                    });
                    nodes[slot].1.push(shard.clone());
                }
                None => unavailable.push(ShardFailure::unavailable(shard.shard_id.clone(), action)),
            }
        }

        Self { nodes, unavailable }
    }

    pub fn nodes(&self) -> &[(NodeId, Vec<ShardRouting>)] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// No node holds any targeted shard.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_id(&self, index: usize) -> Option<&str> {
        self.nodes.get(index).map(|(node_id, _)| node_id.as_str())
    }

    /// Shards dispatched to the node at `index`.
    pub fn shards(&self, index: usize) -> &[ShardRouting] {
        self.nodes
            .get(index)
            .map(|(_, shards)| shards.as_slice())
            .unwrap_or(&[])
    }

    pub fn unavailable(&self) -> &[ShardFailure] {
        &self.unavailable
    }

    /// Every targeted shard, assigned or not.
    pub fn total_shards(&self) -> usize {
        self.unavailable.len() + self.nodes.iter().map(|(_, s)| s.len()).sum::<usize>()
    }
}
