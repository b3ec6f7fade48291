//! # API REST
//!
//! REST API implementation for the clinic backend.
//!
//! Handles:
//! - HTTP endpoints with axum, nested under `/apis`
//! - Uploaded files served statically under `/Images`
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON errors, CORS, API key, client IP, tracing)
//!
//! Uses `api-shared` for common types and `core` for everything else.

#![warn(rust_2018_idioms)]

pub mod docs;
pub mod error;
pub mod middleware;
pub mod reports;
pub mod resources;

use axum::extract::{DefaultBodyLimit, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use clinic_api_shared::{HealthRes, HealthService};
use clinic_core::{CoreConfig, DocumentStore};
use clinic_files::{UploadStore, PUBLIC_PREFIX};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use docs::ApiDoc;
pub use error::ApiError;

/// Application state for the REST API server
///
/// Contains shared state that needs to be accessible to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
    pub store: Arc<DocumentStore>,
    pub uploads: Arc<UploadStore>,
    /// When set, `/apis` requests must carry this key.
    pub api_key: Option<Arc<str>>,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Opens the document and upload stores named by `cfg`.
    ///
    /// # Errors
    ///
    /// Returns an error if either directory cannot be created.
    pub fn open(
        cfg: Arc<CoreConfig>,
        api_key: Option<String>,
        max_upload_bytes: usize,
    ) -> anyhow::Result<Self> {
        let store = DocumentStore::open(cfg.data_dir())?;
        let uploads = UploadStore::open(cfg.upload_dir())?;
        Ok(Self {
            cfg,
            store: Arc::new(store),
            uploads: Arc::new(uploads),
            api_key: api_key.filter(|k| !k.trim().is_empty()).map(Arc::from),
            max_upload_bytes,
        })
    }
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let apis = resources::all_resources()
        .merge(reports::report_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_api_key,
        ))
        .layer(DefaultBodyLimit::max(state.max_upload_bytes));

    Router::new()
        .route("/health", get(health))
        .nest("/apis", apis)
        .nest_service(PUBLIC_PREFIX, ServeDir::new(state.uploads.root_directory()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn(middleware::track_client_ip))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("-- Starting clinic REST API on {}", addr);

    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("-- Clinic REST API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks; not behind the API key.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}
