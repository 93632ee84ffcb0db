//! Gateway HTTP server

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::routes::{self, GatewayState};

/// Axum server bound to the configured address
pub struct GatewayServer {
    bind_addr: String,
    state: GatewayState,
}

impl GatewayServer {
    pub fn new(bind_addr: impl Into<String>, state: GatewayState) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            state,
        }
    }

    /// Build the router with all routes and a permissive CORS layer
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/test-users", get(routes::test_users))
            .route("/active-connections", get(routes::active_connections))
            .route("/test/register", post(routes::register))
            .route("/test/login", post(routes::login))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Serve until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(&self.bind_addr)
            .await
            .with_context(|| format!("Failed to bind gateway to {}", self.bind_addr))?;
        info!("Gateway listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await
            .context("Gateway server error")?;

        info!("Gateway stopped");
        Ok(())
    }
}
