//! HTTP management API
//!
//! A thin adapter exposing the registry's operations as HTTP endpoints. Ids
//! arrive as query-string text and are parsed here; every reply is the JSON
//! envelope `{"success": bool, "message": ...}`.

pub mod handlers;
pub mod response;
pub mod routes;

use std::io;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::broker::Registry;

pub use response::{ApiResponse, Payload};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
}

/// The management router with CORS and request tracing applied.
pub fn router(registry: Arc<Registry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::management_routes()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { registry })
}

/// Serve the management API on `addr` until the task is dropped.
pub async fn serve(addr: &str, registry: Arc<Registry>) -> io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Management API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(registry)).await
}
