use std::env;
use std::path::PathBuf;

/// Runtime configuration, resolved once from the environment at startup.
/// The Tesseract binary path is injected here rather than hardcoded so
/// the service is portable across environments.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub tesseract_path: PathBuf,
    pub ocr_lang: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env::var("BILLSCAN_BIND").unwrap_or_else(|_| "0.0.0.0:8000".into()),
            db_path: env::var("BILLSCAN_DB")
                .unwrap_or_else(|_| "billscan.db".into())
                .into(),
            upload_dir: env::var("BILLSCAN_UPLOAD_DIR")
                .unwrap_or_else(|_| "uploads".into())
                .into(),
            // Bare name resolves through PATH.
            tesseract_path: env::var("BILLSCAN_TESSERACT")
                .unwrap_or_else(|_| "tesseract".into())
                .into(),
            ocr_lang: env::var("BILLSCAN_OCR_LANG").unwrap_or_else(|_| "eng".into()),
        }
    }
}
