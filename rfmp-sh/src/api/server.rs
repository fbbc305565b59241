//! HTTP server setup and routing

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::store::SqliteMappingStore;
use axum::{
    routing::{delete, get, post},
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
    pub pipeline: Pipeline<SqliteMappingStore>,
}

impl AppContext {
    pub fn new(pipeline: Pipeline<SqliteMappingStore>) -> Self {
        Self { pipeline }
    }
}

/// Build the scan host router
pub fn build_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(super::handlers::health))
        .route("/scan", post(super::handlers::scan))
        .route("/pending", get(super::handlers::list_pending))
        .route("/pending/:card_id", delete(super::handlers::remove_pending))
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
    use crate::config::DispatchConfig;
    use crate::dispatch::DispatchClient;
    use crate::resolver::MappingResolver;

    #[tokio::test]
    async fn test_port_in_use_is_http_error() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let db = tempfile::tempdir().unwrap();
        let store = SqliteMappingStore::open(db.path()).await.unwrap();
        let dispatcher = DispatchClient::new(&DispatchConfig::default()).unwrap();
        let ctx = AppContext::new(Pipeline::new(MappingResolver::new(store), dispatcher));

        let result = run(addr, ctx, std::future::pending()).await;
        match result {
            Err(Error::Http(message)) => assert!(message.contains("Failed to bind"), "{}", message),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
