//! Topology resolution.
//!
//! The coordinator never computes shard placement itself. For each run it
//! asks a [`TopologyProvider`] twice: first to expand the request's dataset
//! selector into concrete dataset names, which the request-scope admission
//! check sees, then for a [`RoutingTable`] restricted to exactly those
//! datasets.

use shardcast_common::protocol::{Result, RoutingTable, ShardcastError};
use std::sync::RwLock;

pub trait TopologyProvider<R>: Send + Sync {
    /// Expands `selector` into the concrete datasets it targets.
    ///
    /// An empty selector targets every dataset the provider knows about, so
    /// the result is only empty when the provider holds no shards at all.
    fn concrete_datasets(&self, request: &R, selector: &[String]) -> Result<Vec<String>>;

    /// Resolves the shards of `datasets` (empty = all) for `request`.
    fn resolve(&self, request: &R, datasets: &[String]) -> Result<RoutingTable>;
}

/// A topology that only changes when someone calls [`StaticTopology::update`].
#[derive(Debug, Default)]
pub struct StaticTopology {
    table: RwLock<RoutingTable>,
}

impl StaticTopology {
    pub fn new(table: RoutingTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// Replaces the routing table. Tables older than the current one are ignored.
    ///
    /// Returns `true` if the table was applied.
    pub fn update(&self, table: RoutingTable) -> bool {
        let mut current = self.table.write().unwrap_or_else(|e| e.into_inner());
        if table.version < current.version {
            return false;
        }
        *current = table;
        true
    }
}

fn unknown_dataset<'a>(table: &RoutingTable, datasets: &'a [String]) -> Option<&'a String> {
    datasets
        .iter()
        .find(|d| !table.shards.iter().any(|s| &s.shard_id.dataset == *d))
}

impl<R> TopologyProvider<R> for StaticTopology {
    fn concrete_datasets(&self, _request: &R, selector: &[String]) -> Result<Vec<String>> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        if selector.is_empty() {
            let mut datasets: Vec<String> = Vec::new();
            for shard in &table.shards {
                if !datasets.contains(&shard.shard_id.dataset) {
                    datasets.push(shard.shard_id.dataset.clone());
                }
            }
            return Ok(datasets);
        }
        if let Some(missing) = unknown_dataset(&table, selector) {
            return Err(ShardcastError::Topology(format!("no such dataset [{}]", missing)));
        }
        Ok(selector.to_vec())
    }

    fn resolve(&self, _request: &R, datasets: &[String]) -> Result<RoutingTable> {
        let table = self.table.read().unwrap_or_else(|e| e.into_inner());
        if let Some(missing) = unknown_dataset(&table, datasets) {
            return Err(ShardcastError::Topology(format!("no such dataset [{}]", missing)));
        }
        Ok(table.filter_datasets(datasets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardcast_common::protocol::{ShardId, ShardRouting};

    fn table(version: u64) -> RoutingTable {
        RoutingTable::new(
            version,
            vec![
                ShardRouting::assigned(ShardId::new("logs", 0), "node_0"),
                ShardRouting::assigned(ShardId::new("logs", 1), "node_1"),
                ShardRouting::unassigned(ShardId::new("metrics", 0)),
            ],
        )
    }

    #[test]
    fn test_resolve_filters_datasets() {
        let topology = StaticTopology::new(table(1));
        let resolved = TopologyProvider::<()>::resolve(&topology, &(), &["metrics".to_string()]).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(!resolved.shards[0].assigned_to_node());
        assert_eq!(resolved.version, 1);
    }

    #[test]
    fn test_resolve_empty_selector_returns_all() {
        let topology = StaticTopology::new(table(1));
        let resolved = TopologyProvider::<()>::resolve(&topology, &(), &[]).unwrap();
        assert_eq!(resolved.len(), 3);
    }

    #[test]
    fn test_resolve_unknown_dataset() {
        let topology = StaticTopology::new(table(1));
        let err = TopologyProvider::<()>::resolve(&topology, &(), &["nope".to_string()]).unwrap_err();
        assert!(matches!(err, ShardcastError::Topology(_)));
        assert!(err.to_string().contains("[nope]"));
    }

    #[test]
    fn test_update_rejects_stale_table() {
        let topology = StaticTopology::new(table(5));
        let version = |t: &StaticTopology| TopologyProvider::<()>::resolve(t, &(), &[]).unwrap().version;

        assert!(!topology.update(table(4)));
        assert_eq!(version(&topology), 5);
        assert!(topology.update(table(6)));
        assert_eq!(version(&topology), 6);
    }

    #[test]
    fn test_empty_selector_expands_to_every_dataset() {
        let topology = StaticTopology::new(table(1));
        let datasets = TopologyProvider::<()>::concrete_datasets(&topology, &(), &[]).unwrap();
        assert_eq!(datasets, vec!["logs".to_string(), "metrics".to_string()]);
    }

    #[test]
    fn test_named_selector_is_kept() {
        let topology = StaticTopology::new(table(1));
        let selector = vec!["metrics".to_string()];
        let datasets = TopologyProvider::<()>::concrete_datasets(&topology, &(), &selector).unwrap();
        assert_eq!(datasets, selector);

        let err = TopologyProvider::<()>::concrete_datasets(&topology, &(), &["nope".to_string()]).unwrap_err();
        assert!(matches!(err, ShardcastError::Topology(_)));
    }

    #[test]
    fn test_empty_topology_has_no_datasets() {
        let topology = StaticTopology::default();
        assert!(TopologyProvider::<()>::concrete_datasets(&topology, &(), &[]).unwrap().is_empty());
    }
}
