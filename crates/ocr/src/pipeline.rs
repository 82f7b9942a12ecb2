use serde::Serialize;
use thiserror::Error;

use crate::preprocess::{self, PreprocessError};
use crate::recognizer::{OcrBackend, OcrConfig, OcrError};
use crate::score::score_text;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("OCR recognition failed: {0}")]
    Ocr(#[from] OcrError),
}

/// The recorded outcome of one configuration's engine invocation.
/// A failed attempt is data, not an abort — selection simply skips it.
#[derive(Debug)]
pub struct ConfigAttempt {
    pub config: OcrConfig,
    pub outcome: Result<String, OcrError>,
}

/// The winning text plus every attempt that produced it.
#[derive(Debug)]
pub struct MultiPassResult {
    /// Best text by score; empty when every attempt failed or produced
    /// only whitespace.
    pub best_text: String,
    pub best_score: usize,
    pub attempts: Vec<ConfigAttempt>,
}

/// Per-configuration stats exposed by the debug endpoint.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub config: String,
    pub extracted_text: String,
    pub text_length: usize,
    pub word_count: usize,
    pub number_count: usize,
    pub has_content: bool,
}

/// Orchestrates: preprocess → per-configuration OCR fan-out → heuristic
/// selection. Generic over the backend so tests run without Tesseract.
pub struct BillPipeline<R: OcrBackend> {
    recognizer: R,
}

impl<R: OcrBackend> BillPipeline<R> {
    pub fn new(recognizer: R) -> Self {
        Self { recognizer }
    }

    /// Full pipeline: preprocess the upload, try every configuration in
    /// order, and pick the highest-scoring text (first seen wins ties).
    pub fn extract_best(
        &self,
        data: &[u8],
        configs: &[OcrConfig],
    ) -> Result<MultiPassResult, PipelineError> {
        let png = preprocess::prepare_for_ocr(data)?;
        let attempts = self.fan_out(&png, configs)?;
        Ok(select_best(attempts))
    }

    /// Debug variant: same fan-out, but reports stats for every attempt
    /// instead of reducing to a single winner.
    #[allow(clippy::type_complexity)]
    pub fn extract_debug(
        &self,
        data: &[u8],
        configs: &[OcrConfig],
    ) -> Result<Vec<(&'static str, Result<ConfigReport, String>)>, PipelineError> {
        let png = preprocess::prepare_for_ocr(data)?;
        let attempts = self.fan_out(&png, configs)?;
        Ok(attempts.into_iter().map(report).collect())
    }

    /// Minimal-processing variant: a single default-configuration pass
    /// over the untouched upload bytes. The decode only validates the
    /// upload is an image; the engine sees the original bytes.
    pub fn extract_raw(&self, data: &[u8]) -> Result<String, PipelineError> {
        preprocess::decode(data)?;
        Ok(self.recognizer.recognize(data, None)?)
    }

    /// Run every configuration, recording each outcome. A single bad
    /// configuration never aborts the fan-out; only a wholly unreachable
    /// engine does.
    fn fan_out(
        &self,
        png: &[u8],
        configs: &[OcrConfig],
    ) -> Result<Vec<ConfigAttempt>, OcrError> {
        let mut attempts = Vec::with_capacity(configs.len());
        for config in configs {
            match self.recognizer.recognize(png, Some(config)) {
                Ok(text) => attempts.push(ConfigAttempt { config: *config, outcome: Ok(text) }),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(config = %config, error = %e, "OCR configuration failed");
                    attempts.push(ConfigAttempt { config: *config, outcome: Err(e) });
                }
            }
        }
        Ok(attempts)
    }
}

/// Strictly-highest score wins; ties keep the first-seen attempt. With no
/// successful non-whitespace attempt the result is ("", 0).
fn select_best(attempts: Vec<ConfigAttempt>) -> MultiPassResult {
    let mut best_text = String::new();
    let mut best_score = 0;

    for attempt in &attempts {
        if let Ok(text) = &attempt.outcome {
            let score = score_text(text);
            if score > best_score {
                best_score = score;
                best_text = text.clone();
            }
        }
    }

    MultiPassResult { best_text, best_score, attempts }
}

fn report(attempt: ConfigAttempt) -> (&'static str, Result<ConfigReport, String>) {
    let description = attempt.config.description;
    match attempt.outcome {
        Ok(text) => {
            let report = ConfigReport {
                config: attempt.config.to_string(),
                text_length: text.chars().count(),
                word_count: text.split_whitespace().count(),
                number_count: text.chars().filter(|c| c.is_ascii_digit()).count(),
                has_content: !text.trim().is_empty(),
                extracted_text: text,
            };
            (description, Ok(report))
        }
        Err(e) => (description, Err(e.to_string())),
    }
}
