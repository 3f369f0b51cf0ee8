pub mod blocks;
pub mod error;
pub mod jsonrpc;
pub mod messages;
pub mod routing;

pub use blocks::{ClusterBlock, ClusterBlockError, ClusterBlockLevel, ClusterBlocks};
pub use error::{Result, ShardcastError};
pub use jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use messages::{NodeFailure, NodeOutcome, NodeRequest, NodeResponse, ShardFailure};
pub use routing::{NodeId, RoutingTable, ShardId, ShardRouting};
