use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use billscan_ocr::{
    BillPipeline, PipelineError, PreprocessError, DEBUG_PRESETS, RECEIPT_PRESETS,
};

use crate::upload::TempUpload;
use crate::AppState;

/// Every failure leaves the handler as this type: the client always gets
/// the `{error, success:false}` JSON shape, never a stack trace.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.message, "success": false }));
        (self.status, body).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        let status = match &e {
            PipelineError::Preprocess(PreprocessError::Decode(_)) => StatusCode::BAD_REQUEST,
            PipelineError::Ocr(ocr) if ocr.is_fatal() => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::internal(format!("failed to store upload: {e}"))
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Best-effort extraction: preprocess, fan out over the receipt presets,
/// persist the winning text, return it.
pub async fn ocr(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (filename, data) = read_upload(&mut multipart).await?;
    let _upload = TempUpload::save(&state.upload_dir, &filename, &data)?;

    let recognizer = state.recognizer.clone();
    let result = run_blocking(move || {
        BillPipeline::new(recognizer).extract_best(&data, &RECEIPT_PRESETS)
    })
    .await?;

    // Persistence is best-effort relative to the response: the caller
    // still gets the extracted text when the store is unreachable.
    if !result.best_text.trim().is_empty() {
        if let Err(e) =
            billscan_storage::insert_bill(&state.db, &result.best_text, None, None, None).await
        {
            tracing::warn!(error = %e, "failed to persist bill, returning OCR result anyway");
        }
    }

    let text_length = result.best_text.chars().count();
    Ok(Json(json!({
        "extracted_text": result.best_text,
        "text_length": text_length,
        "success": true
    })))
}

/// Debug comparison: every preset's text and stats, no persistence.
pub async fn ocr_debug(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (filename, data) = read_upload(&mut multipart).await?;
    let _upload = TempUpload::save(&state.upload_dir, &filename, &data)?;

    let recognizer = state.recognizer.clone();
    let reports = run_blocking(move || {
        BillPipeline::new(recognizer).extract_debug(&data, &DEBUG_PRESETS)
    })
    .await?;

    let mut results = Map::new();
    for (description, outcome) in reports {
        let value = match outcome {
            Ok(report) => serde_json::to_value(report)
                .map_err(|e| ApiError::internal(e.to_string()))?,
            Err(message) => json!({ "error": message }),
        };
        results.insert(description.to_string(), value);
    }

    Ok(Json(json!({ "ocr_results": Value::Object(results) })))
}

/// Raw extraction: single default engine pass over the untouched upload.
/// No preprocessing, no persistence.
pub async fn ocr_raw(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let (filename, data) = read_upload(&mut multipart).await?;
    let _upload = TempUpload::save(&state.upload_dir, &filename, &data)?;

    let recognizer = state.recognizer.clone();
    let text = run_blocking(move || BillPipeline::new(recognizer).extract_raw(&data)).await?;

    let text_length = text.chars().count();
    Ok(Json(json!({
        "raw_extracted_text": text,
        "text_length": text_length,
        "success": true
    })))
}

/// Pull the `file` field out of the multipart body.
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(e.to_string()))?;
            return Ok((filename, data.to_vec()));
        }
    }
    Err(ApiError::bad_request("missing multipart field 'file'"))
}

/// Image filtering and the engine subprocess are blocking; keep them off
/// the async workers.
async fn run_blocking<T: Send + 'static>(
    f: impl FnOnce() -> Result<T, PipelineError> + Send + 'static,
) -> Result<T, ApiError> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(ApiError::from)
}
