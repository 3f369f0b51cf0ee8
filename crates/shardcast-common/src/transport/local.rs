use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{NodeHandler, ReplyFuture, Transport};
use crate::protocol::{NodeId, Result, ShardcastError};

type HandlerTable = HashMap<NodeId, HashMap<String, Arc<dyn NodeHandler>>>;

/// In-process transport.
///
/// Nodes are registered by id together with the handlers they serve. Sending
/// to an unknown node fails synchronously with [`ShardcastError::NoRoute`];
/// sending an action the node does not serve fails when the reply is awaited,
/// as a remote failure would.
#[derive(Default)]
pub struct LocalTransport {
    handlers: RwLock<HandlerTable>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, node_id: impl Into<NodeId>, action: impl Into<String>, handler: Arc<dyn NodeHandler>) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers
            .entry(node_id.into())
            .or_default()
            .insert(action.into(), handler);
    }

    /// Removes a node and every handler it served.
    pub fn disconnect(&self, node_id: &str) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.remove(node_id).is_some()
    }

    pub fn node_count(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Transport for LocalTransport {
    fn send_request(&self, node_id: &NodeId, action: &str, payload: Value) -> Result<ReplyFuture> {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let node = handlers
            .get(node_id)
            .ok_or_else(|| ShardcastError::NoRoute(node_id.clone()))?;

        match node.get(action) {
            Some(handler) => Ok(handler.clone().handle(payload)),
            None => {
                let err = ShardcastError::NodeFailed {
                    node_id: node_id.clone(),
                    message: format!("No handler found for action [{}]", action),
                };
                Ok(Box::pin(async move { Err(err) }))
            }
        }
    }
}
