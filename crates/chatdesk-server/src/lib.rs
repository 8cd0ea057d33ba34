//! HTTP API for the support chat backend.

pub mod error;
pub mod rate_limit;
pub mod routes;

pub use error::{ApiError, ErrorResponse};
pub use rate_limit::{RateDecision, RateLimiter};
pub use routes::{ApiResponse, AppState, HealthResponse};

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use chatdesk_agent::SupportAgent;
use chatdesk_config::{AppConfig, CorsSettings};
use chatdesk_core::{ChatdeskError, Result};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

fn cors_layer(settings: &CorsSettings) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let origin = settings.allowed_origin.trim();
    if origin == "*" {
        return Ok(cors.allow_origin(Any));
    }
    let origin = HeaderValue::from_str(origin).map_err(|e| {
        ChatdeskError::Config(format!("Invalid allowed origin '{origin}': {e}"))
    })?;
    Ok(cors.allow_origin(origin))
}

/// Build the router with every endpoint and middleware.
pub fn build_router(agent: Arc<SupportAgent>, config: &AppConfig) -> Result<Router> {
    let state = AppState { agent };
    let limiter = Arc::new(RateLimiter::from_settings(&config.rate_limit));

    let limited = Router::new()
        .route("/api/chat/message", post(routes::post_message))
        .route("/api/message", post(routes::post_message))
        .route("/api/conversation/:session_id", get(routes::get_conversation))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit::rate_limit));

    Ok(Router::new()
        .merge(limited)
        .route("/api/health", get(routes::health))
        .with_state(state)
        .layer(cors_layer(&config.cors)?)
        .layer(TraceLayer::new_for_http()))
}

/// Bind and serve until ctrl-c.
pub async fn start_server(agent: Arc<SupportAgent>, config: &AppConfig) -> Result<()> {
    let host: IpAddr = config.server.host.parse().map_err(|e| {
        ChatdeskError::Config(format!("Invalid server host '{}': {}", config.server.host, e))
    })?;
    let addr = SocketAddr::from((host, config.server.port));

    let router = build_router(agent, config)?;

    info!("Starting chatdesk server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
