pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod score;

pub use pipeline::{BillPipeline, ConfigAttempt, ConfigReport, MultiPassResult, PipelineError};
pub use preprocess::{prepare_for_ocr, PreprocessError};
pub use recognizer::{
    MockRecognizer, OcrBackend, OcrConfig, OcrError, TesseractRecognizer, DEBUG_PRESETS,
    RECEIPT_PRESETS,
};
pub use score::score_text;
