//! Swarm gateway.
//!
//! Serves the feed file, the artifacts currently seeded in the
//! [`LocalSwarm`], and a server-sent event stream of pipeline events.

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use magnetcast_common::EventBus;
use magnetcast_content::LocalSwarm;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod routes_sse;
pub mod routes_swarm;

/// Shared gateway context
#[derive(Clone)]
pub struct AppContext {
    pub swarm: Arc<LocalSwarm>,
    pub events: Arc<EventBus>,
    /// Feed file written by the publisher
    pub feed_path: PathBuf,
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers([header::CONTENT_TYPE]);

    let feed_route = format!(
        "/{}",
        ctx.feed_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );

    Router::new()
        .route("/health", get(health_check))
        .route(&feed_route, get(feed_handler))
        .merge(routes_swarm::swarm_routes())
        .merge(routes_sse::sse_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

async fn feed_handler(State(ctx): State<AppContext>) -> impl IntoResponse {
    match tokio::fs::read_to_string(&ctx.feed_path).await {
        Ok(text) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            text,
        )
            .into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "feed not published yet").into_response()
        }
        Err(e) => {
            tracing::warn!("Failed to read feed {:?}: {}", ctx.feed_path, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Serve the gateway until `cancel` fires.
pub async fn start_server(
    host: &str,
    port: u16,
    ctx: AppContext,
    cancel: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    serve(listener, ctx, cancel).await
}

/// Serve the gateway on an already-bound listener until `cancel` fires.
pub async fn serve(
    listener: tokio::net::TcpListener,
    ctx: AppContext,
    cancel: CancellationToken,
) -> Result<()> {
    let app = create_router(ctx);

    tracing::info!("Starting gateway on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;

    tracing::info!("Gateway shutdown complete");
    Ok(())
}

/// Resolve once Ctrl+C or SIGTERM arrives.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
