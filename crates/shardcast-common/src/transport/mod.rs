//! Shardcast transport layer.
//!
//! The coordinator talks to nodes through the [`Transport`] trait: one
//! unicast request per node, answered by a single reply or a failure. Payloads
//! are JSON values; typed encoding and decoding belongs to the coordinator and
//! to the node-side [`NodeHandler`].
//!
//! # Implementations
//!
//! - **[`LocalTransport`]**: in-process routing to registered handlers
//! - **[`HttpTransport`]**: JSON-RPC 2.0 over HTTP/1.1 with a per-request timeout
//!
//! Neither implementation orders messages sent to different nodes.

pub mod http;
pub mod local;

pub use http::{HttpTransport, HttpTransportConfig, HyperRequest, HyperResponse};
pub use local::LocalTransport;

use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use crate::protocol::{NodeId, Result};

/// Future resolving to a node's reply.
pub type ReplyFuture = BoxFuture<'static, Result<Value>>;

pub trait Transport: Send + Sync {
    /// Sends `payload` to the `action` handler on `node_id`.
    ///
    /// An `Err` means the request never left (e.g. no route to the node).
    /// Otherwise the returned future resolves once, with the node's reply or
    /// the remote/transport failure.
    fn send_request(&self, node_id: &NodeId, action: &str, payload: Value) -> Result<ReplyFuture>;
}

/// Receives node requests for one action.
pub trait NodeHandler: Send + Sync {
    fn handle(self: Arc<Self>, payload: Value) -> ReplyFuture;
}
