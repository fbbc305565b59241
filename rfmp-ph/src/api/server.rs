//! HTTP server setup and routing

use crate::error::{Error, Result};
use crate::supervisor::PlaybackSupervisor;
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub supervisor: PlaybackSupervisor,
}

impl AppContext {
    pub fn new(supervisor: PlaybackSupervisor) -> Self {
        Self { supervisor }
    }
}

/// Build the playback host router
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/status", get(super::handlers::get_status))
        .route("/play", post(super::handlers::play))
        .route("/stop", post(super::handlers::stop))
        .route("/events", get(super::sse::event_stream))
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve the API until `shutdown` resolves
pub async fn run<F>(addr: SocketAddr, ctx: AppContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(ctx);

    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Http(format!("Failed to bind to {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;

    #[tokio::test]
    async fn test_port_in_use_is_http_error() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let music = tempfile::tempdir().unwrap();
        let supervisor = PlaybackSupervisor::new(music.path().to_path_buf(), PlayerConfig::default());

        let result = run(addr, AppContext::new(supervisor), std::future::pending()).await;
        match result {
            Err(Error::Http(message)) => assert!(message.contains("Failed to bind"), "{}", message),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
