//! JSON-RPC method routing for a node.
//!
//! The router answers the built-in methods (`_metrics`, `_info`) itself and
//! hands every other method to the [`NodeHandler`] registered under that
//! name. Broadcast actions are registered under their node action name
//! (`<action>[n]`).

use shardcast_common::action::BroadcastAction;
use shardcast_common::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, NodeId, ShardcastError};
use shardcast_common::transport::NodeHandler;
use shardcast_metrics::{MetricsCollector, NodeMetricsCollector};
use std::collections::HashMap;
use std::sync::Arc;

use crate::dispatcher::NodeDispatcher;

/// Maps JSON-RPC method names to the handlers a node serves.
///
/// Shared behind an `Arc` by all connections of a [`NodeServer`](crate::NodeServer).
/// Handlers are registered before serving starts.
pub struct NodeRouter {
    node_id: NodeId,
    handlers: HashMap<String, Arc<dyn NodeHandler>>,
    metrics: Arc<NodeMetricsCollector>,
}

impl NodeRouter {
    /// Creates an empty router for `node_id` with its own metrics collector.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self::with_metrics(node_id, Arc::new(NodeMetricsCollector::new()))
    }

    /// Creates an empty router that records into `metrics`.
    pub fn with_metrics(node_id: impl Into<NodeId>, metrics: Arc<NodeMetricsCollector>) -> Self {
        Self {
            node_id: node_id.into(),
            handlers: HashMap::new(),
            metrics,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Collector reported by the `_metrics` method.
    pub fn metrics(&self) -> &Arc<NodeMetricsCollector> {
        &self.metrics
    }

    /// Registers `handler` under `method`, replacing any previous handler.
    pub fn register(&mut self, method: impl Into<String>, handler: Arc<dyn NodeHandler>) -> &mut Self {
        self.handlers.insert(method.into(), handler);
        self
    }

    /// Serves `action` on this node under its node action name.
    pub fn register_action<A: BroadcastAction>(&mut self, action: Arc<A>) -> &mut Self {
        let dispatcher = NodeDispatcher::new(self.node_id.clone(), action).with_metrics(self.metrics.clone());
        let method = dispatcher.method();
        self.register(method, Arc::new(dispatcher))
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    /// Routes one JSON-RPC request. Failures are reported in the response.
    pub async fn handle_request(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let id = req.id.clone();

        if self.metrics.is_metrics_request(&req.method) {
            return match self.metrics.handle_metrics_request(&req.method, id.clone()) {
                Ok(response) => response,
                Err(e) => JsonRpcResponse::error(id, JsonRpcError::internal_error(&e.to_string())),
            };
        }

        let handler = match self.handlers.get(&req.method) {
            Some(handler) => handler.clone(),
            None => {
                tracing::debug!("No handler for method [{}]", req.method);
                return JsonRpcResponse::error(id, JsonRpcError::method_not_found());
            }
        };

        match handler.handle(req.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(ShardcastError::InvalidRequest(msg)) => JsonRpcResponse::error(id, JsonRpcError::invalid_params(&msg)),
            Err(e) => JsonRpcResponse::error(id, JsonRpcError::server_error(&e.to_string())),
        }
    }
}
