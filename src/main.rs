use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use clinic_api_rest::AppState;
use clinic_core::config::{byte_limit_from_env_value, page_size_from_env_value};
use clinic_core::constants::DEFAULT_DATA_DIR;
use clinic_core::CoreConfig;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Main entry point for the clinic backend
///
/// Resolves configuration from the environment (and `.env`), opens the
/// document and upload stores, then serves the REST API until Ctrl-C.
///
/// # Environment Variables
/// - `CLINIC_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `CLINIC_DATA_DIR`: Directory for documents (default: "clinic_data")
/// - `CLINIC_UPLOAD_DIR`: Directory for uploads (default: "<data dir>/uploads")
/// - `CLINIC_MAX_UPLOAD_BYTES`: Request body limit for `/apis` (default: 10 MiB)
/// - `CLINIC_PAGE_SIZE`: Default list page size (default: 10)
/// - `CLINIC_API_KEY`: When set, `/apis` requests must send it as `x-api-key`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clinic_run=info".parse()?)
                .add_directive("clinic_core=info".parse()?)
                .add_directive("clinic_api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("CLINIC_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let data_dir = std::env::var("CLINIC_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.into());
    let upload_dir = std::env::var("CLINIC_UPLOAD_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    let page_size = page_size_from_env_value(std::env::var("CLINIC_PAGE_SIZE").ok())?;
    let max_upload_bytes = byte_limit_from_env_value(
        std::env::var("CLINIC_MAX_UPLOAD_BYTES").ok(),
        DEFAULT_MAX_UPLOAD_BYTES,
    )?;
    let api_key = std::env::var("CLINIC_API_KEY").ok();

    let cfg = CoreConfig::new(PathBuf::from(data_dir), upload_dir, page_size)?;
    tracing::info!(
        "++ Data in {}, uploads in {}",
        cfg.data_dir().display(),
        cfg.upload_dir().display()
    );
    if api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        tracing::warn!("CLINIC_API_KEY is not set; /apis is open");
    }

    let state = AppState::open(Arc::new(cfg), api_key, max_upload_bytes)?;
    clinic_api_rest::serve(&rest_addr, state).await
}
