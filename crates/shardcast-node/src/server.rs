//! HTTP server for a Shardcast node
//!
//! Accepts JSON-RPC 2.0 requests as HTTP/1.1 POSTs and hands them to the
//! [`NodeRouter`]. Each connection is served on its own tokio task.
//!
//! # Example
//!
//! ```no_run
//! use shardcast_node::{NodeRouter, NodeServer};
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = NodeRouter::new("node_0");
//!     let server = NodeServer::new(router);
//!     server.run("127.0.0.1:9200".parse().unwrap()).await.unwrap();
//! }
//! ```

use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use shardcast_common::protocol::{JsonRpcError, JsonRpcResponse, Result, ShardcastError};
use shardcast_common::transport::http::{parse_jsonrpc, to_http_error, to_http_response, to_http_response_with_status};
use shardcast_common::transport::{HyperRequest, HyperResponse};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::router::NodeRouter;

/// Limits applied by a [`NodeServer`] to incoming requests.
#[derive(Debug, Clone)]
pub struct NodeServerConfig {
    /// Largest accepted request body
    ///
    /// Default: 16 MiB
    pub max_body_bytes: usize,
}

impl Default for NodeServerConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Serves a [`NodeRouter`] over HTTP/1.1.
///
/// Every POST body is decoded as one JSON-RPC request. Bodies larger than
/// [`NodeServerConfig::max_body_bytes`] are refused before decoding.
pub struct NodeServer {
    router: Arc<NodeRouter>,
    config: NodeServerConfig,
}

impl NodeServer {
    /// Creates a server with the default [`NodeServerConfig`].
    pub fn new(router: NodeRouter) -> Self {
        Self::with_config(router, NodeServerConfig::default())
    }

    pub fn with_config(router: NodeRouter, config: NodeServerConfig) -> Self {
        Self {
            router: Arc::new(router),
            config,
        }
    }

    /// The router shared by every connection.
    pub fn router(&self) -> &Arc<NodeRouter> {
        &self.router
    }

    /// Binds `addr` and serves until the process exits.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ShardcastError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve(listener, std::future::pending()).await
    }

    /// Serves connections from `listener` until `shutdown` resolves.
    ///
    /// Connections already accepted keep running on their own tasks.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            "Node [{}] listening on {} (methods: {:?})",
            self.router.node_id(),
            listener.local_addr()?,
            self.router.methods()
        );
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    tracing::info!("Node [{}] shutting down", self.router.node_id());
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let router = self.router.clone();
            let max_body_bytes = self.config.max_body_bytes;

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let router = router.clone();
                    async move { Self::handle_request(router, max_body_bytes, req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::error!("Error serving connection from {}: {}", peer, err);
                }
            });
        }
    }

    async fn handle_request(
        router: Arc<NodeRouter>,
        max_body_bytes: usize,
        req: HyperRequest,
    ) -> Result<HyperResponse> {
        if req.method() != Method::POST {
            return Ok(to_http_response_with_status(
                JsonRpcResponse::error(json!(null), JsonRpcError::invalid_request()),
                StatusCode::METHOD_NOT_ALLOWED,
            ));
        }

        let body = match Limited::new(req.into_body(), max_body_bytes).collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.is::<LengthLimitError>() => {
                tracing::warn!("Rejected request body over {} bytes", max_body_bytes);
                return Ok(to_http_response_with_status(
                    JsonRpcResponse::error(json!(null), JsonRpcError::request_too_large(max_body_bytes)),
                    StatusCode::PAYLOAD_TOO_LARGE,
                ));
            }
            Err(e) => {
                return Err(ShardcastError::Transport(format!("Failed to read request body: {}", e)));
            }
        };

        let jsonrpc_req = match parse_jsonrpc(body) {
            Ok(req) => req,
            Err(e) => {
                tracing::debug!("Failed to parse JSON-RPC request: {}", e);
                return Ok(to_http_error(json!(null), JsonRpcError::parse_error()));
            }
        };

        Ok(to_http_response(router.handle_request(jsonrpc_req).await))
    }
}
