//! HTTP front-end for the forecast pipeline.
//!
//! The pipeline itself is synchronous; every request runs it on tokio's
//! blocking pool so the async workers stay free.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domain::ForecastConfig;
use crate::error::AppError;

pub mod routes;
pub mod store;

pub use store::ArtifactStore;

/// Largest accepted request body (uploads included).
pub const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Runtime settings of the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Base of the links handed out by `POST /forecast`, e.g. `https://example.com`.
    pub public_base_url: String,
    pub fetch_timeout: Duration,
    pub forecast: ForecastConfig,
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<ArtifactStore>,
}

impl AppState {
    pub fn new(config: ServerConfig, store: ArtifactStore) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
        }
    }

    /// Public download link for a stored artifact.
    pub fn download_url(&self, name: &str) -> String {
        format!("{}/files/{name}", self.config.public_base_url.trim_end_matches('/'))
    }
}

/// Build the router with middleware.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/forecast", post(routes::forecast))
        .route("/forecast/upload", post(routes::forecast_upload))
        .route("/files/:filename", get(routes::get_file))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: ServerConfig, store: ArtifactStore) -> Result<(), AppError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::new(2, format!("Invalid HOST:PORT '{}:{}': {e}", config.host, config.port)))?;

    let files_dir = store.dir().display().to_string();
    let app = router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::new(4, format!("Failed to bind {addr}: {e}")))?;

    tracing::info!(%addr, files_dir = %files_dir, "storecast v{} listening", env!("CARGO_PKG_VERSION"));

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .map_err(|e| AppError::new(4, format!("Server error: {e}")))
}
