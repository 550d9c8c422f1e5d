//! HTTP surface for knowledge-weaver
//!
//! Axum router exposing `POST /api/generate`, the static frontend at `/`, and
//! `/health`. CORS and per-client rate limiting depend on the server environment.

use crate::config::ServerConfig;
use crate::error::{Result, WeaverError};
use crate::orchestrator::ArticleGenerator;
use crate::rate_limit::{ClientRateLimiter, rate_limit_middleware};
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, Method},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowHeaders, Any, CorsLayer};
use tower_http::services::ServeFile;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Shared state for HTTP server
#[derive(Clone)]
pub struct HttpState {
    pub generator: Arc<ArticleGenerator>,
}

#[derive(Debug, Deserialize)]
pub struct TopicRequest {
    pub topic: String,
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    "ok"
}

/// Generates the long-form article about a topic
pub async fn generate_handler(
    State(state): State<HttpState>,
    Json(request): Json<TopicRequest>,
) -> Response {
    match state.generator.generate(&request.topic).await {
        Ok(article) => Json(article).into_response(),
        Err(e) => e.into_response(),
    }
}

fn cors_layer(server: &ServerConfig) -> Result<CorsLayer> {
    if !server.is_production() {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origin = server.frontend_origin();
    let origin = HeaderValue::from_str(&origin).map_err(|e| WeaverError::Config {
        message: format!("Invalid FRONTEND_ORIGIN '{}': {}", origin, e),
    })?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request()))
}

/// Assemble the router; the limiter is returned so the caller can prune it.
pub fn build_router(
    generator: Arc<ArticleGenerator>,
    server: &ServerConfig,
) -> Result<(Router, Option<Arc<ClientRateLimiter>>)> {
    let state = HttpState { generator };

    let mut app = Router::new()
        .route("/api/generate", post(generate_handler))
        .route("/health", get(health_handler))
        .route_service("/", ServeFile::new(&server.frontend_path))
        .with_state(state);

    let limiter = if server.is_production() {
        let limiter = Arc::new(ClientRateLimiter::new(
            server.rate_limit,
            Duration::from_secs(server.rate_window_secs),
            &server.rate_limit_exempt,
        ));
        app = app.layer(middleware::from_fn_with_state(
            limiter.clone(),
            rate_limit_middleware,
        ));
        Some(limiter)
    } else {
        None
    };

    let app = app
        .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs)))
        .layer(cors_layer(server)?)
        .layer(TraceLayer::new_for_http());

    Ok((app, limiter))
}

/// Start the HTTP server
pub async fn start_http_server(generator: Arc<ArticleGenerator>, server: &ServerConfig) -> Result<()> {
    let (app, limiter) = build_router(generator, server)?;

    if let Some(limiter) = limiter {
        let window = Duration::from_secs(server.rate_window_secs);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(window);
            loop {
                ticker.tick().await;
                limiter.prune();
            }
        });
    }

    let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port))
        .await
        .map_err(|e| WeaverError::Internal {
            message: format!("Failed to bind HTTP listener: {}", e),
        })?;

    tracing::info!(
        "Starting HTTP server on {}:{} ({} mode)",
        server.host,
        server.port,
        server.environment
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| WeaverError::Internal {
        message: format!("HTTP server error: {}", e),
    })?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
