//! Result types returned by the extraction entry points.

use crate::error::ScreenshotError;
use crate::pipeline::mapper::MeasurementRecord;
use crate::pipeline::scan::Screenshot;
use crate::store::UpsertOutcome;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Table the records were merged into.
    pub table_path: PathBuf,
    /// One entry per screenshot attempted, in processing order.
    pub results: Vec<ScreenshotResult>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// Records that made it into the table.
    pub fn records(&self) -> impl Iterator<Item = &MeasurementRecord> {
        self.results.iter().filter_map(|r| r.record.as_ref())
    }

    /// Screenshots that were abandoned.
    pub fn failures(&self) -> impl Iterator<Item = &ScreenshotResult> {
        self.results.iter().filter(|r| r.error.is_some())
    }
}

/// Outcome of one screenshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotResult {
    pub file_name: String,
    pub acquisition_date: String,

    /// Normalised tokens, empty when OCR never ran.
    #[serde(default)]
    pub tokens: Vec<String>,

    /// The stored record; `None` when the screenshot failed.
    pub record: Option<MeasurementRecord>,

    /// How the table changed; `None` when nothing was written.
    pub upsert: Option<UpsertOutcome>,

    /// Error if this screenshot was abandoned.
    pub error: Option<ScreenshotError>,

    /// Wall-clock time spent on this screenshot.
    pub duration_ms: u64,

    /// Part of `duration_ms` spent inside the OCR backend.
    #[serde(default)]
    pub ocr_duration_ms: u64,
}

impl ScreenshotResult {
    /// An empty result for `shot`, filled in as stages complete.
    pub fn pending(shot: &Screenshot) -> Self {
        Self {
            file_name: shot.file_name.clone(),
            acquisition_date: shot.acquisition_date.clone(),
            tokens: Vec::new(),
            record: None,
            upsert: None,
            error: None,
            duration_ms: 0,
            ocr_duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Screenshots selected from the directory listing.
    pub total_screenshots: usize,
    /// Screenshots whose record reached the table.
    pub processed: usize,
    /// Screenshots abandoned with a [`ScreenshotError`].
    pub failed: usize,
    /// Directory entries ignored because of their extension.
    pub skipped_files: usize,
    pub total_duration_ms: u64,
    /// Time spent inside the OCR backend.
    pub ocr_duration_ms: u64,
}
