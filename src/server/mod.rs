//! HTTP API consumed by the reader frontend.
//!
//! Every JSON endpoint answers with the `{success, message, data}` envelope
//! ([`crate::model::ApiEnvelope`]); failures carry `success: false` and a
//! 400/403/404/500 status.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | GET  | `/api/health` | [`handlers::health`] |
//! | POST | `/api/upload` | [`handlers::parse::upload`] |
//! | POST | `/api/parse-pdf` | [`handlers::parse::parse_pdf`] |
//! | GET  | `/api/task/{id}` | [`handlers::parse::task_status`] |
//! | GET  | `/api/batch/{id}` | [`handlers::parse::batch_status`] |
//! | POST | `/api/layout` | [`handlers::parse::layout`] |
//! | POST | `/api/translate-layout` | [`handlers::translate::translate_layout`] |
//! | POST | `/api/translate` | [`handlers::translate::translate_file`] |
//! | GET  | `/api/full-text/{id}` | [`handlers::files::full_text`] |
//! | GET  | `/api/images/{id}/{*name}` | [`handlers::files::image`] |
//! | GET  | `/api/mineru/{*path}` | [`handlers::files::mineru_file`] |
//! | GET  | `/api/files/{*name}` | static, upload folder |

pub mod error;
pub mod handlers;
pub mod state;
pub mod upload;

use crate::cache::spawn_sweeper;
use crate::config::ReaderConfig;
use crate::error::ReaderError;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tracing::{info, warn};

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let config = state.config.clone();

    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/upload", post(handlers::parse::upload))
        .route("/parse-pdf", post(handlers::parse::parse_pdf))
        .route("/task/{id}", get(handlers::parse::task_status))
        .route("/batch/{id}", get(handlers::parse::batch_status))
        .route("/layout", post(handlers::parse::layout))
        .route("/translate-layout", post(handlers::translate::translate_layout))
        .route("/translate", post(handlers::translate::translate_file))
        .route("/full-text/{id}", get(handlers::files::full_text))
        .route("/images/{id}/{*name}", get(handlers::files::image))
        .route("/mineru/{*path}", get(handlers::files::mineru_file))
        .nest_service("/files", ServeDir::new(&config.upload_dir));

    let app = Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state);

    if config.cors {
        app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        app
    }
}

/// Create the storage folders, bind and serve until Ctrl-C.
pub async fn serve(config: ReaderConfig) -> Result<(), ReaderError> {
    for dir in [&config.upload_dir, &config.mineru_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ReaderError::io(dir.as_path(), e))?;
    }

    let addr = config.bind_addr.clone();
    let state = AppState::new(config)?;
    log_startup(&state.config);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ReaderError::io(addr.as_str(), e))?;
    info!("Server listening on http://{addr}");

    let stop = CancellationToken::new();
    let _stop_sweeper = stop.clone().drop_guard();
    spawn_sweeper(state.llm().shared_cache(), CACHE_SWEEP_INTERVAL, stop);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ReaderError::Internal(format!("server error: {e}")))?;
    info!("Server stopped");
    Ok(())
}

fn log_startup(config: &ReaderConfig) {
    info!(
        provider = ?config.llm.provider,
        model = %config.llm.model,
        llm_configured = config.llm.is_configured(),
        mineru_configured = !config.mineru_token.is_empty(),
        model_version = config.model_version.as_str(),
        upload_dir = %config.upload_dir.display(),
        mineru_dir = %config.mineru_dir.display(),
        "Starting litreader server"
    );
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Cannot listen for Ctrl-C; stop the process to shut down");
            std::future::pending::<()>().await;
        }
    }
}
