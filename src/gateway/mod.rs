//! HTTP trigger surface.
//!
//! ```text
//! POST /api/code-agent              trigger a run for an existing project
//! POST /api/projects                create a project and run its first prompt
//! POST /api/projects/{id}/messages  follow-up prompt on a project
//! GET  /api/projects[/{id}[/messages]]
//! GET  /api/usage/{key}             premium credit status
//! GET  /metrics                     prometheus text format
//! GET  /health
//! ```

pub mod api;

use crate::jobs::Dispatcher;
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
}

pub fn router(state: AppState) -> Router {
    let gateway = &state.dispatcher.services().config.gateway;
    let body_limit = gateway.body_limit_bytes;
    let timeout = Duration::from_secs(gateway.request_timeout_secs);

    Router::new()
        .route("/api/code-agent", post(api::trigger_code_agent))
        .route("/api/projects", get(api::list_projects).post(api::create_project))
        .route("/api/projects/{id}", get(api::get_project))
        .route(
            "/api/projects/{id}/messages",
            get(api::list_messages).post(api::create_message),
        )
        .route("/api/usage/{key}", get(api::usage_status))
        .route("/metrics", get(api::metrics))
        .route("/health", get(api::health))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C, then drain in-flight runs.
pub async fn serve(dispatcher: Dispatcher) -> Result<()> {
    let config = &dispatcher.services().config.gateway;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid gateway address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "Gateway listening");

    let app = router(AppState {
        dispatcher: dispatcher.clone(),
    });
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server error")?;

    dispatcher.shutdown().await;
    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
