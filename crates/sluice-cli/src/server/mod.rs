//! HTTP front end for the asset server.
//!
//! Every `GET` path is treated as a logical asset path and handed to
//! [`AssetServer::serve`]; validators come from the request headers and the
//! response is written back as-is.

pub mod assets;
pub mod cache;
pub mod http;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::error::{CliError, Result};

pub use assets::{AssetRequest, AssetResponse, AssetServer};
pub use cache::{CacheEntry, CacheStore};

/// Router serving every path through `server`.
pub fn router(server: Arc<AssetServer>) -> Router {
    Router::new()
        .route("/{*path}", get(handle_asset))
        .with_state(server)
}

async fn handle_asset(
    State(server): State<Arc<AssetServer>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let validator = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    let request = AssetRequest {
        logical_path: format!("/{}", path.trim_start_matches('/')),
        if_modified_since: validator(header::IF_MODIFIED_SINCE),
        if_none_match: validator(header::IF_NONE_MATCH),
    };

    let response = server.serve(&request).await;
    tracing::debug!("GET {} -> {}", request.logical_path, response.status);
    (response.status, response.headers, response.body).into_response()
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn start(addr: SocketAddr, server: Arc<AssetServer>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CliError::Server(format!("Failed to bind to {}: {}", addr, e)))?;
    let local = listener.local_addr()?;
    tracing::info!(
        "Serving assets at http://{} ({:?} mode)",
        local,
        server.mode()
    );

    axum::serve(listener, router(server))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CliError::Server(format!("Server error: {}", e)))?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
