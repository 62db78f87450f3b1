//! Error types for plate_capture

use thiserror::Error;

/// Errors raised while detecting, reading and saving plates.
#[derive(Error, Debug)]
pub enum PlateError {
    #[error("model initialisation failed: {0}")]
    ModelInit(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("detection error: {0}")]
    Detection(String),

    #[error("OCR error: {0}")]
    Ocr(String),

    #[error("region extraction error: {0}")]
    Extraction(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("OpenCV error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlateError>;
