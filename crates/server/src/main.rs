use anyhow::Context;
use billscan_ocr::{OcrBackend, TesseractRecognizer};
use billscan_server::config::Config;
use billscan_server::{app, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env();

    std::fs::create_dir_all(&config.upload_dir).with_context(|| {
        format!("failed to create upload dir {}", config.upload_dir.display())
    })?;

    let db = billscan_storage::create_db(&config.db_path)
        .await
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;

    let recognizer: Arc<dyn OcrBackend> = Arc::new(TesseractRecognizer::new(
        &config.tesseract_path,
        &config.ocr_lang,
    ));

    let state = AppState {
        db,
        recognizer,
        upload_dir: config.upload_dir.clone(),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        tesseract = %config.tesseract_path.display(),
        "billscan listening"
    );
    axum::serve(listener, app(state)).await?;

    Ok(())
}
