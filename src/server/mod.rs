use crate::catalog::DescriptorStore;
use crate::config::Config;
use crate::resolve::{FallbackProber, SourceResolver};
use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod routes_api;
pub mod routes_stream;
pub mod streaming_helpers;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    /// Read-only per-video backend descriptors.
    pub catalog: Arc<DescriptorStore>,
    pub resolver: Arc<SourceResolver>,
    pub prober: Arc<FallbackProber>,
    /// Shared client for upstream proxy fetches.
    pub http: reqwest::Client,
}

impl AppContext {
    /// Build a context from configuration and a descriptor catalog.
    pub fn new(config: Config, catalog: DescriptorStore) -> Self {
        let resolver = SourceResolver::new(
            config.transform.clone(),
            config.cloud_transform.clone(),
        );
        let prober = FallbackProber::new(config.file_share.clone());

        Self {
            config: Arc::new(config),
            catalog: Arc::new(catalog),
            resolver: Arc::new(resolver),
            prober: Arc::new(prober),
            http: reqwest::Client::new(),
        }
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    // Media elements issue cross-origin range probes; expose the range
    // headers so buffered-seek logic can read them.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD])
        .allow_headers(Any)
        .expose_headers([
            header::ACCEPT_RANGES,
            header::CONTENT_RANGE,
            header::CONTENT_LENGTH,
            header::ETAG,
        ]);

    Router::new()
        .route("/health", get(health_check))
        .route("/stream/:video_id", get(routes_stream::stream_video))
        .route("/api/videos", get(routes_api::list_videos))
        .route(
            "/api/videos/:video_id/source",
            get(routes_api::get_video_source),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server
pub async fn start_server(config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let catalog = DescriptorStore::load_or_empty(&config.media.catalog)?;
    let ctx = AppContext::new(config, catalog);
    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
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
