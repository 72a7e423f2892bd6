//! Error types for the bodycomp-ocr library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`ExtractError`] (fatal): the run cannot proceed at all (source
//!   directory missing, OCR binary unavailable, table file unreadable).
//!   Returned as `Err(ExtractError)` from the top-level `extract*` functions.
//!
//! * [`ScreenshotError`] (non-fatal): a single screenshot failed (decode
//!   error, OCR failure, unmappable token list) but the rest of the directory
//!   is processed. Stored inside [`crate::output::ScreenshotResult`].
//!
//! * [`MapError`] is raised by the field mapper when a token sequence does not
//!   fit the schema. Wrapped into [`ScreenshotError::Mapping`] or, in strict
//!   mode, into [`ExtractError::MappingAborted`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the bodycomp-ocr library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Source directory was not found at the given path.
    #[error("dir not found at '{path}'\nCheck the screenshot directory exists and is readable.")]
    DirectoryNotFound { path: PathBuf },

    /// Source path exists but is a file, not a directory.
    #[error("'{path}' is not a directory")]
    NotADirectory { path: PathBuf },

    /// Directory listing failed part-way or could not start.
    #[error("Failed to list directory '{path}': {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// The OCR backend failed its readiness check.
    #[error("OCR backend is not available: {0}")]
    OcrUnavailable(#[from] OcrError),

    // ── Mapping errors ────────────────────────────────────────────────────
    /// Strict mode: a screenshot produced an unmappable token list.
    #[error("Extraction aborted on '{file}': {source}")]
    MappingAborted {
        file: String,
        #[source]
        source: MapError,
    },

    // ── Table errors ──────────────────────────────────────────────────────
    /// The persisted table exists but could not be read or parsed.
    #[error("Failed to read table '{path}': {detail}")]
    TableRead { path: PathBuf, detail: String },

    /// The persisted table could not be written.
    #[error("Failed to write table '{path}': {detail}")]
    TableWrite { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors from the OCR collaborator.
#[derive(Debug, Error)]
pub enum OcrError {
    /// The configured binary could not be spawned.
    #[error(
        "tesseract binary not found at '{path}'\n\
Install Tesseract OCR or point --tesseract / TESSERACT_CMD at the executable."
    )]
    BinaryNotFound { path: PathBuf },

    /// The binary ran but exited unsuccessfully.
    #[error("tesseract exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// Spawning or piping failed for another reason.
    #[error("tesseract I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Field-mapping failures.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum MapError {
    /// The token sequence does not have one token per schema field.
    #[error("expected {expected} tokens, found {found}")]
    TokenCount { expected: usize, found: usize },

    /// A token bound to a numeric field is not a number.
    #[error("field '{field}': '{token}' is not a number")]
    InvalidNumber { field: String, token: String },
}

/// A non-fatal error for a single screenshot.
///
/// Stored alongside [`crate::output::ScreenshotResult`] when a screenshot
/// fails. The run continues with the next file.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum ScreenshotError {
    /// Decoding, transforming or rewriting the image failed.
    #[error("{file}: image conditioning failed: {detail}")]
    Condition { file: String, detail: String },

    /// Rendering the OCR document failed.
    #[error("{file}: document conversion failed: {detail}")]
    Convert { file: String, detail: String },

    /// The OCR backend returned an error.
    #[error("{file}: text extraction failed: {detail}")]
    Ocr { file: String, detail: String },

    /// The normalised tokens could not be mapped to a record.
    #[error("{file}: {source}")]
    Mapping {
        file: String,
        #[source]
        source: MapError,
    },

    /// The record could not be merged into the table.
    #[error("{file}: table update failed: {detail}")]
    Persist { file: String, detail: String },
}
