use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use billscan_ocr::{OcrBackend, OcrConfig, OcrError};
use billscan_server::{app, AppState};
use billscan_storage::DbPool;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use serde_json::Value;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

const BOUNDARY: &str = "billscan-test-boundary";

fn tiny_png() -> Vec<u8> {
    let img: GrayImage = ImageBuffer::from_fn(16, 16, |x, _| Luma([(x * 16) as u8]));
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn multipart_request(uri: &str, field: &str, filename: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
             filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

struct Harness {
    _dir: tempfile::TempDir,
    app: Router,
    pool: DbPool,
    upload_dir: PathBuf,
}

async fn harness(recognizer: Arc<dyn OcrBackend>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let upload_dir = dir.path().join("uploads");
    std::fs::create_dir_all(&upload_dir).unwrap();
    let pool = billscan_storage::create_db(&dir.path().join("bills.db"))
        .await
        .unwrap();

    let app = app(AppState {
        db: pool.clone(),
        recognizer,
        upload_dir: upload_dir.clone(),
    });

    Harness { _dir: dir, app, pool, upload_dir }
}

fn upload_dir_is_empty(h: &Harness) -> bool {
    std::fs::read_dir(&h.upload_dir).unwrap().next().is_none()
}

// ── Test recognizers ──────────────────────────────────────────────────────────

/// Fixed text regardless of image or configuration.
struct FixedText(&'static str);

impl OcrBackend for FixedText {
    fn recognize(&self, _: &[u8], _: Option<&OcrConfig>) -> Result<String, OcrError> {
        Ok(self.0.to_string())
    }
}

/// Text varies by page-segmentation mode; psm 8 always fails.
struct PerModeText;

impl OcrBackend for PerModeText {
    fn recognize(&self, _: &[u8], config: Option<&OcrConfig>) -> Result<String, OcrError> {
        match config.map(|c| c.page_seg_mode) {
            Some(8) => Err(OcrError::Engine("psm 8 crashed".into())),
            Some(psm) => Ok(format!("text from psm {psm}")),
            None => Ok("default pass".into()),
        }
    }
}

/// Every configuration fails non-fatally.
struct AlwaysFailing;

impl OcrBackend for AlwaysFailing {
    fn recognize(&self, _: &[u8], _: Option<&OcrConfig>) -> Result<String, OcrError> {
        Err(OcrError::Engine("simulated engine crash".into()))
    }
}

struct Unavailable;

impl OcrBackend for Unavailable {
    fn recognize(&self, _: &[u8], _: Option<&OcrConfig>) -> Result<String, OcrError> {
        Err(OcrError::EngineUnavailable("binary missing".into()))
    }
}

/// Records the bytes handed to the engine.
struct Capturing {
    seen: Mutex<Vec<Vec<u8>>>,
}

impl OcrBackend for Capturing {
    fn recognize(&self, image_bytes: &[u8], _: Option<&OcrConfig>) -> Result<String, OcrError> {
        self.seen.lock().unwrap().push(image_bytes.to_vec());
        Ok("RAW TEXT".into())
    }
}

// ── /ocr ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn ocr_extracts_persists_and_cleans_up() {
    let h = harness(Arc::new(FixedText("Total 99.99\nThank you"))).await;

    let response = h
        .app
        .clone()
        .oneshot(multipart_request("/ocr", "file", "bill.png", &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["extracted_text"], "Total 99.99\nThank you");
    assert_eq!(body["text_length"], 21);

    let bill = billscan_storage::get_bill_by_id(&h.pool, 1)
        .await
        .unwrap()
        .expect("bill row should exist");
    assert_eq!(bill.raw_text, "Total 99.99\nThank you");
    assert!(bill.total_amount.is_none());
    assert!(bill.tax.is_none());
    assert!(bill.other_charges.is_none());

    assert!(upload_dir_is_empty(&h));
}

#[tokio::test]
async fn ocr_with_all_configs_failing_still_succeeds_with_empty_text() {
    let h = harness(Arc::new(AlwaysFailing)).await;

    let response = h
        .app
        .clone()
        .oneshot(multipart_request("/ocr", "file", "bill.png", &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["extracted_text"], "");
    assert_eq!(body["text_length"], 0);

    // Empty text never creates a row.
    assert_eq!(billscan_storage::count_bills(&h.pool).await.unwrap(), 0);
    assert!(upload_dir_is_empty(&h));
}

#[tokio::test]
async fn ocr_whitespace_only_text_creates_no_row() {
    let h = harness(Arc::new(FixedText("  \n\t  "))).await;

    let response = h
        .app
        .clone()
        .oneshot(multipart_request("/ocr", "file", "bill.png", &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(billscan_storage::count_bills(&h.pool).await.unwrap(), 0);
}

#[tokio::test]
async fn ocr_unreachable_engine_is_a_service_error() {
    let h = harness(Arc::new(Unavailable)).await;

    let response = h
        .app
        .clone()
        .oneshot(multipart_request("/ocr", "file", "bill.png", &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response_json(response).await;
    assert_eq!(body["success"], Value::Bool(false));
    assert!(body["error"].as_str().unwrap().contains("unavailable"));
    assert!(upload_dir_is_empty(&h));
}

#[tokio::test]
async fn ocr_rejects_undecodable_upload() {
    let h = harness(Arc::new(FixedText("unused"))).await;

    let response = h
        .app
        .clone()
        .oneshot(multipart_request("/ocr", "file", "junk.bin", b"not an image at all"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["success"], Value::Bool(false));
    assert!(upload_dir_is_empty(&h));
}

#[tokio::test]
async fn ocr_rejects_missing_file_field() {
    let h = harness(Arc::new(FixedText("unused"))).await;

    let response = h
        .app
        .clone()
        .oneshot(multipart_request("/ocr", "image", "bill.png", &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["success"], Value::Bool(false));
}

#[tokio::test]
async fn ocr_survives_a_closed_store() {
    let h = harness(Arc::new(FixedText("Total 12.00"))).await;
    h.pool.close().await;

    let response = h
        .app
        .clone()
        .oneshot(multipart_request("/ocr", "file", "bill.png", &tiny_png()))
        .await
        .unwrap();

    // Persistence is best-effort: the OCR result still reaches the caller.
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["extracted_text"], "Total 12.00");
    assert!(upload_dir_is_empty(&h));
}

// ── /ocr/debug ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn debug_reports_every_configuration_without_persisting() {
    let h = harness(Arc::new(PerModeText)).await;

    let response = h
        .app
        .clone()
        .oneshot(multipart_request("/ocr/debug", "file", "bill.png", &tiny_png()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let results = body["ocr_results"].as_object().unwrap();
    assert_eq!(results.len(), 6);

    let single_column = &results["Single column of text"];
    assert_eq!(single_column["config"], "--oem 3 --psm 4");
    assert_eq!(single_column["extracted_text"], "text from psm 4");
    assert_eq!(single_column["word_count"], 4);
    assert_eq!(single_column["number_count"], 1);
    assert_eq!(single_column["has_content"], Value::Bool(true));

    let failed = &results["Treat as single word"];
    assert!(failed["error"].as_str().unwrap().contains("psm 8 crashed"));

    assert_eq!(billscan_storage::count_bills(&h.pool).await.unwrap(), 0);
    assert!(upload_dir_is_empty(&h));
}

// ── /ocr/raw ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn raw_bypasses_preprocessing_and_persistence() {
    let capturing = Arc::new(Capturing { seen: Mutex::new(Vec::new()) });
    let h = harness(capturing.clone()).await;
    let upload = tiny_png();

    let response = h
        .app
        .clone()
        .oneshot(multipart_request("/ocr/raw", "file", "bill.png", &upload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["raw_extracted_text"], "RAW TEXT");
    assert_eq!(body["text_length"], 8);
    assert_eq!(body["success"], Value::Bool(true));

    // The engine saw the untouched upload, not a preprocessed re-encode.
    let seen = capturing.seen.lock().unwrap();
    assert_eq!(seen.as_slice(), &[upload]);

    assert_eq!(billscan_storage::count_bills(&h.pool).await.unwrap(), 0);
    assert!(upload_dir_is_empty(&h));
}

// ── Cross-cutting ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint_responds() {
    let h = harness(Arc::new(FixedText("unused"))).await;

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn no_uploads_leak_across_a_hundred_requests() {
    let h = harness(Arc::new(FixedText("Total 1.00"))).await;
    let good = tiny_png();

    for i in 0..100 {
        // Alternate success and failure paths; neither may leak a file.
        let request = if i % 2 == 0 {
            multipart_request("/ocr", "file", "bill.png", &good)
        } else {
            multipart_request("/ocr", "file", "junk.bin", b"garbage")
        };
        let _ = h.app.clone().oneshot(request).await.unwrap();
        assert!(upload_dir_is_empty(&h), "leaked upload after request {i}");
    }
}
