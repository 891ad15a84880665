//! HTTP server implementation using Axum.

use crate::handler::{
    handle_describe_unit, handle_execute, handle_health, handle_list_units, handle_resource,
    rate_limit,
};
use aima_core::{AimaApi, CancellationToken};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    pub api: Arc<AimaApi>,
    /// Global request limiter; `None` when rate limiting is off
    pub limiter: Option<DefaultDirectRateLimiter>,
}

impl AppState {
    pub fn new(api: Arc<AimaApi>, rate_limit: u32) -> Self {
        Self {
            api,
            limiter: NonZeroU32::new(rate_limit).map(|n| RateLimiter::direct(Quota::per_second(n))),
        }
    }
}

/// Listener and middleware settings.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub rate_limit: u32,
    pub max_concurrency: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            rate_limit: 0,
            max_concurrency: 256,
        }
    }
}

/// Build the router with every route and layer attached.
pub fn build_router(state: Arc<AppState>, max_concurrency: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/v2/execute", post(handle_execute))
        .route("/api/v2/units", get(handle_list_units))
        .route("/api/v2/units/:name", get(handle_describe_unit))
        .route("/api/v2/resources", get(handle_resource))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(ConcurrencyLimitLayer::new(max_concurrency.max(1)))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server.
///
/// Returns the bound address (useful when port=0) and the serve task, which
/// finishes once `shutdown` fires and in-flight requests complete.
pub async fn start_server(
    api: Arc<AimaApi>,
    options: &ServerOptions,
    shutdown: CancellationToken,
) -> anyhow::Result<(SocketAddr, JoinHandle<()>)> {
    let state = Arc::new(AppState::new(api, options.rate_limit));
    let app = build_router(state, options.max_concurrency);

    let addr: SocketAddr = format!("{}:{}", options.host, options.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    let handle = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, handle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_starts_and_stops() {
        let api = Arc::new(AimaApi::builder().with_ollama(false).build().await.unwrap());
        let shutdown = CancellationToken::new();

        let (addr, handle) = start_server(api.clone(), &ServerOptions::default(), shutdown.clone())
            .await
            .unwrap();
        assert!(addr.port() > 0);

        shutdown.cancel();
        handle.await.unwrap();
        api.shutdown().await;
    }
}
