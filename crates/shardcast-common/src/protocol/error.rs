use std::any::Any;
use thiserror::Error;

use super::blocks::ClusterBlockError;
use super::routing::NodeId;

/// Errors raised anywhere in Shardcast.
///
/// Shard and node failures inside a broadcast are not surfaced as errors of
/// the run; they are recovered, counted and listed in the response. Errors
/// that reach a caller of `Coordinator::submit` are admission blocks,
/// topology errors, a missing runtime and aggregation failures.
#[derive(Error, Debug)]
pub enum ShardcastError {
    /// An admission check vetoed the broadcast.
    #[error("{0}")]
    Blocked(#[from] ClusterBlockError),

    /// The topology provider could not resolve the targeted datasets.
    #[error("Topology resolution failed: {0}")]
    Topology(String),

    /// Connection, HTTP or body-read failure talking to a node.
    #[error("Transport error: {0}")]
    Transport(String),

    /// No reply within the transport's request timeout, in milliseconds.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// The transport has no address for this node.
    #[error("No route to node [{0}]")]
    NoRoute(NodeId),

    /// The node answered, but with an error instead of a node response.
    #[error("Failed node [{node_id}]: {message}")]
    NodeFailed { node_id: NodeId, message: String },

    /// A work executor failed on one shard.
    #[error("Shard operation failed: {0}")]
    ShardOperation(String),

    /// Building the client-visible response failed or panicked.
    #[error("Failed to combine responses from nodes: {0}")]
    Aggregation(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// A request could not be decoded or carried invalid parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A reply could not be decoded or was incomplete.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Node requests need a tokio runtime and none was running.
    #[error("No async runtime: {0}")]
    Runtime(String),

    #[error("Broadcast was cancelled before completion")]
    Cancelled,
}

impl ShardcastError {
    /// Convenience constructor for work executors.
    pub fn shard_operation(message: impl Into<String>) -> Self {
        ShardcastError::ShardOperation(message.into())
    }

    /// Whether this error is an admission block rather than an execution failure.
    pub fn is_blocked(&self) -> bool {
        matches!(self, ShardcastError::Blocked(_))
    }

    /// Extracts a readable message from a caught panic payload.
    pub fn panic_message(payload: &(dyn Any + Send)) -> String {
        if let Some(message) = payload.downcast_ref::<&str>() {
            message.to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic".to_string()
        }
    }
}

impl From<hyper::Error> for ShardcastError {
    fn from(err: hyper::Error) -> Self {
        ShardcastError::Transport(err.to_string())
    }
}

impl From<hyper::http::Error> for ShardcastError {
    fn from(err: hyper::http::Error) -> Self {
        ShardcastError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ShardcastError>;
