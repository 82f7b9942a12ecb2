pub mod config;
pub mod routes;
pub mod upload;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use billscan_ocr::OcrBackend;
use billscan_storage::DbPool;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Uploads larger than this are rejected before any processing.
const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

pub struct AppState {
    pub db: DbPool,
    pub recognizer: Arc<dyn OcrBackend>,
    /// Transient storage for in-flight uploads; emptied per request.
    pub upload_dir: PathBuf,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/ocr", post(routes::ocr))
        .route("/ocr/debug", post(routes::ocr_debug))
        .route("/ocr/raw", post(routes::ocr_raw))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
