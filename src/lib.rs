//! # bodycomp-ocr
//!
//! Turn body-composition screenshots from a smart-scale app into a CSV
//! time series, one row per measurement day.
//!
//! ## Pipeline Overview
//!
//! ```text
//! screenshot dir
//!  │
//!  ├─ 1. Scan       keep .jpg/.jpeg, date = file name with '_' → '/'
//!  ├─ 2. Condition  contrast 0.5, brightness +1, written back in place
//!  ├─ 3. Document   lossless PNG for the OCR backend
//!  ├─ 4. OCR        tesseract (or any TextExtractor), spawn_blocking
//!  ├─ 5. Normalize  seven ordered rules → 13 numeric tokens
//!  ├─ 6. Map        positional schema → MeasurementRecord
//!  └─ 7. Upsert     replace-by-date into the CSV table
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bodycomp_ocr::{extract_directory, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::builder()
//!         .tesseract_cmd("/usr/bin/tesseract")
//!         .build()?;
//!     let output = extract_directory("screenshots", "body.csv", &config).await?;
//!     eprintln!(
//!         "stored {}/{} screenshots",
//!         output.stats.processed, output.stats.total_screenshots
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bodycomp` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! bodycomp-ocr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod correlate;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use correlate::{CorrelatedPair, CorrelationMatrix, Strength};
pub use error::{ExtractError, MapError, OcrError, ScreenshotError};
pub use extract::{extract_directory, extract_directory_sync, extract_file, map_text};
pub use output::{ExtractionOutput, ExtractionStats, ScreenshotResult};
pub use pipeline::mapper::{FieldGroup, FieldSchema, FieldValue, MeasurementRecord};
pub use pipeline::ocr::{TesseractExtractor, TextExtractor};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{MeasurementTable, UpsertOutcome};
