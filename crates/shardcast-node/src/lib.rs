//! Shardcast Node
//!
//! The node side of a broadcast: a [`NodeDispatcher`] runs every shard of a
//! node request serially, a [`NodeRouter`] maps JSON-RPC method names to
//! dispatchers (plus the `_metrics` and `_info` built-ins), and a
//! [`NodeServer`] serves the router over HTTP.

pub mod dispatcher;
pub mod router;
pub mod server;

pub use dispatcher::NodeDispatcher;
pub use router::NodeRouter;
pub use server::{NodeServer, NodeServerConfig};
