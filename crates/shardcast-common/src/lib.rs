//! Shardcast common types and transport
//!
//! This crate holds everything coordinators and nodes share:
//!
//! - **Protocol**: shard routing, node requests/responses, per-shard and
//!   per-node failures, admission blocks, the error type and the JSON-RPC
//!   envelope used on the wire
//! - **Action hooks**: the [`BroadcastAction`] trait an operation implements
//!   to be broadcast by node
//! - **Transport**: the [`transport::Transport`] seam with in-process and
//!   HTTP implementations
//!
//! # Example
//!
//! ```
//! use shardcast_common::{NodeRequest, ShardId, ShardRouting};
//! use serde_json::json;
//!
//! let shards = vec![
//!     ShardRouting::assigned(ShardId::new("logs", 0), "node_0"),
//!     ShardRouting::assigned(ShardId::new("logs", 3), "node_0"),
//! ];
//! let request = NodeRequest::new("node_0", json!({"datasets": ["logs"]}), shards);
//! assert_eq!(request.shards.len(), 2);
//! ```

pub mod action;
pub mod protocol;
pub mod transport;

pub use action::{BroadcastAction, BroadcastRequest, BroadcastSummary};
pub use protocol::*;
