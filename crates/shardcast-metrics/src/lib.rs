//! Shardcast metrics collection
//!
//! Thread-safe counters for coordinators and node servers. A coordinator
//! records whole broadcast runs (with their shard tallies) and the outcome of
//! each node request; a node server records the node requests it handled.
//!
//! - [`MetricsRegistry`]: atomic counters plus per-action and per-node maps
//! - [`MetricsCollector`]: answers the built-in `_metrics` and `_info` methods
//! - [`MetricsSnapshot`]: serializable view of the registry
//!
//! ```rust
//! use shardcast_metrics::{BroadcastMetrics, MetricsCollector, ShardTally};
//! use std::time::Instant;
//!
//! let metrics = BroadcastMetrics::new();
//! let start = Instant::now();
//! metrics.record_node_outcome("node_0", true);
//! metrics.record_run("indices:monitor/stats", start, ShardTally::new(3, 3, 0));
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.runs, 1);
//! assert_eq!(snapshot.shards_total, 3);
//! ```

mod collector;
mod registry;
mod snapshot;

pub use collector::{BroadcastMetrics, MetricsCollector, NodeMetricsCollector, INFO_METHOD, METRICS_METHOD};
pub use registry::{MetricsConfig, MetricsRegistry, ShardTally};
pub use snapshot::{ActionMetrics, MetricsSnapshot, NodeMetrics, ServerInfo, ServerType};
