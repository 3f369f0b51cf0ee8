//! HTTP transport.
//!
//! Node requests are JSON-RPC 2.0 POSTs. The client half is [`HttpTransport`];
//! the server half uses [`parse_jsonrpc`], [`to_http_response`] and
//! [`to_http_error`] to translate between hyper and the JSON-RPC envelope.
//!
//! # Example
//!
//! ```no_run
//! use shardcast_common::transport::{HttpTransport, HttpTransportConfig, Transport};
//! use serde_json::json;
//!
//! # async fn demo() -> shardcast_common::Result<()> {
//! let transport = HttpTransport::new(HttpTransportConfig::default());
//! transport.add_node("node_0", "http://127.0.0.1:9001");
//! let reply = transport
//!     .send_request(&"node_0".to_string(), "indices:stats[n]", json!({}))?
//!     .await?;
//! # Ok(())
//! # }
//! ```

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use super::{ReplyFuture, Transport};
use crate::protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, NodeId, Result, ShardcastError};

/// Type alias for Hyper incoming requests
pub type HyperRequest = Request<Incoming>;

/// Type alias for Hyper responses with full body
pub type HyperResponse = Response<Full<Bytes>>;

/// Configuration for [`HttpTransport`].
///
/// # Example
///
/// ```
/// use shardcast_common::transport::HttpTransportConfig;
/// use std::time::Duration;
///
/// let config = HttpTransportConfig {
///     request_timeout: Duration::from_secs(5),
/// };
/// assert_eq!(config.request_timeout.as_secs(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Upper bound on one node request, connect to last body byte.
    ///
    /// A node that does not answer in time fails every shard it was sent.
    ///
    /// Default: 30 seconds
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// JSON-RPC over HTTP client transport.
///
/// Node ids are mapped to base URLs (`http://host:port`). A node without an
/// address is unroutable and fails synchronously, and so does a node whose
/// address is not plain `http://`: the client has no TLS connector.
///
/// One pooled hyper client is shared by every node request; request ids are
/// unique per transport.
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    nodes: RwLock<HashMap<NodeId, String>>,
    config: HttpTransportConfig,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            nodes: RwLock::new(HashMap::new()),
            config,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_nodes(config: HttpTransportConfig, nodes: HashMap<NodeId, String>) -> Self {
        let transport = Self::new(config);
        for (node_id, url) in nodes {
            transport.add_node(node_id, url);
        }
        transport
    }

    pub fn add_node(&self, node_id: impl Into<NodeId>, url: impl Into<String>) {
        let url = url.into();
        let url = url.trim_end_matches('/').to_string();
        self.nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(node_id.into(), url);
    }

    pub fn remove_node(&self, node_id: &str) -> bool {
        self.nodes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(node_id)
            .is_some()
    }

    pub fn node_url(&self, node_id: &str) -> Option<String> {
        self.nodes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(node_id)
            .cloned()
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }
}

impl Transport for HttpTransport {
    fn send_request(&self, node_id: &NodeId, action: &str, payload: Value) -> Result<ReplyFuture> {
        let url = self
            .node_url(node_id)
            .ok_or_else(|| ShardcastError::NoRoute(node_id.clone()))?;
        if !url.starts_with("http://") {
            return Err(ShardcastError::Transport(format!(
                "node [{}] has unsupported address {}: only http:// is supported",
                node_id, url
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_vec(&JsonRpcRequest::new(action, payload, json!(id)))?;
        let http_request = Request::builder()
            .method("POST")
            .uri(format!("{}/", url))
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))?;

        let client = self.client.clone();
        let timeout = self.config.request_timeout;
        let node_id = node_id.clone();

        Ok(Box::pin(async move {
            let exchange = async {
                let response = client
                    .request(http_request)
                    .await
                    .map_err(|e| ShardcastError::Transport(format!("HTTP request failed: {}", e)))?;
                let status = response.status();
                let body = response.into_body().collect().await?.to_bytes();
                Ok::<_, ShardcastError>((status, body))
            };

            let (status, body) = tokio::time::timeout(timeout, exchange)
                .await
                .map_err(|_| ShardcastError::Timeout(timeout.as_millis() as u64))??;

            if !status.is_success() {
                return Err(ShardcastError::Transport(format!(
                    "node [{}] answered with HTTP {}",
                    node_id, status
                )));
            }

            let reply: JsonRpcResponse = serde_json::from_slice(&body)?;
            match reply.into_result() {
                Ok(Some(result)) => Ok(result),
                Ok(None) => Err(ShardcastError::InvalidResponse(format!(
                    "node [{}] answered without a result",
                    node_id
                ))),
                Err(error) => Err(ShardcastError::NodeFailed {
                    node_id,
                    message: error.message,
                }),
            }
        }))
    }
}

/// Parses a JSON-RPC request from an HTTP body.
pub fn parse_jsonrpc(body: Bytes) -> Result<JsonRpcRequest> {
    Ok(serde_json::from_slice(&body)?)
}

/// Wraps a JSON-RPC response into a 200 HTTP response.
pub fn to_http_response(jsonrpc: JsonRpcResponse) -> HyperResponse {
    to_http_response_with_status(jsonrpc, StatusCode::OK)
}

/// Wraps a JSON-RPC error into an HTTP response.
pub fn to_http_error(id: Value, error: JsonRpcError) -> HyperResponse {
    to_http_response(JsonRpcResponse::error(id, error))
}

pub fn to_http_response_with_status(jsonrpc: JsonRpcResponse, status: StatusCode) -> HyperResponse {
    let body = serde_json::to_vec(&jsonrpc).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
