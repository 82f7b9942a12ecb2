use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OcrError {
    /// The engine binary cannot be invoked at all. Fatal to the whole
    /// request, unlike a single configuration failing.
    #[error("OCR engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("OCR output is not valid UTF-8: {0}")]
    Output(String),
}

impl OcrError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, OcrError::EngineUnavailable(_))
    }
}

/// One engine-mode / page-segmentation-mode combination tried during the
/// multi-pass fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrConfig {
    pub engine_mode: u8,
    pub page_seg_mode: u8,
    pub description: &'static str,
}

impl OcrConfig {
    pub const fn new(engine_mode: u8, page_seg_mode: u8, description: &'static str) -> Self {
        Self { engine_mode, page_seg_mode, description }
    }
}

impl fmt::Display for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--oem {} --psm {}", self.engine_mode, self.page_seg_mode)
    }
}

/// Presets tried by the best-effort extraction path, in tie-break order.
/// No single segmentation mode is reliably best across receipt layouts.
pub const RECEIPT_PRESETS: [OcrConfig; 3] = [
    OcrConfig::new(3, 4, "Single column of text"),
    OcrConfig::new(3, 6, "Uniform block of text"),
    OcrConfig::new(3, 3, "Fully automatic page segmentation"),
];

/// Wider preset sweep exposed by the debug endpoint.
pub const DEBUG_PRESETS: [OcrConfig; 6] = [
    OcrConfig::new(3, 3, "Fully automatic page segmentation"),
    OcrConfig::new(3, 4, "Single column of text"),
    OcrConfig::new(3, 6, "Uniform block of text"),
    OcrConfig::new(3, 8, "Treat as single word"),
    OcrConfig::new(3, 11, "Sparse text"),
    OcrConfig::new(3, 12, "Sparse text with OSD"),
];

/// Abstraction over an OCR backend. Implementations accept raw PNG/JPEG
/// image bytes and return the recognized text; `config: None` means the
/// engine's defaults.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8], config: Option<&OcrConfig>)
        -> Result<String, OcrError>;
}

impl<T: OcrBackend + ?Sized> OcrBackend for std::sync::Arc<T> {
    fn recognize(
        &self,
        image_bytes: &[u8],
        config: Option<&OcrConfig>,
    ) -> Result<String, OcrError> {
        (**self).recognize(image_bytes, config)
    }
}

// ── Tesseract subprocess backend ──────────────────────────────────────────────

/// Invokes the `tesseract` binary with the image piped through stdin.
/// The binary path is injected at construction so the service stays
/// portable across environments.
pub struct TesseractRecognizer {
    binary: PathBuf,
    lang: String,
}

impl TesseractRecognizer {
    pub fn new(binary: impl Into<PathBuf>, lang: &str) -> Self {
        Self { binary: binary.into(), lang: lang.to_string() }
    }
}

impl OcrBackend for TesseractRecognizer {
    fn recognize(
        &self,
        image_bytes: &[u8],
        config: Option<&OcrConfig>,
    ) -> Result<String, OcrError> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("stdin")
            .arg("stdout")
            .args(["-l", &self.lang])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(c) = config {
            cmd.args(["--oem", &c.engine_mode.to_string()])
                .args(["--psm", &c.page_seg_mode.to_string()]);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                OcrError::EngineUnavailable(format!("{}: {e}", self.binary.display()))
            }
            _ => OcrError::Engine(e.to_string()),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A broken pipe here means the engine died before reading the image.
            stdin
                .write_all(image_bytes)
                .map_err(|e| OcrError::Engine(format!("failed to pipe image: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| OcrError::Engine(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "exit status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout).map_err(|e| OcrError::Output(e.to_string()))
    }
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string regardless of image or configuration — lets
/// the pipeline and the HTTP surface be tested without a Tesseract install.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(
        &self,
        _image_bytes: &[u8],
        _config: Option<&OcrConfig>,
    ) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}
