//! HTTP surface for the Prometheus remote storage protocol

pub mod error;
pub mod handler;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use opentsdb::Client;

pub use error::AdapterError;
pub use handler::{handle_remote_read, handle_remote_write};

/// Shared state for the remote storage handlers
#[derive(Clone)]
pub struct AdapterState {
    pub client: Arc<Client>,
}

impl AdapterState {
    pub fn new(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

/// Create the router with the remote_write, remote_read and health endpoints
pub fn create_router(state: AdapterState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/write", post(handle_remote_write))
        .route("/read", post(handle_remote_read))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
