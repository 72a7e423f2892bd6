//! Extraction entry points: screenshot directory in, table rows out.
//!
//! Screenshots are processed one at a time in directory-listing order. The
//! CPU-bound stages (image conditioning, document rendering) and the blocking
//! OCR subprocess each run on the blocking pool so the runtime stays free.
//! A failing screenshot is recorded in its [`ScreenshotResult`] and the run
//! moves on; only directory, readiness and strict-mode mapping problems end
//! the run early.

use crate::config::ExtractionConfig;
use crate::error::{ExtractError, MapError, ScreenshotError};
use crate::output::{ExtractionOutput, ExtractionStats, ScreenshotResult};
use crate::pipeline::condition::condition_in_place;
use crate::pipeline::document::{render_document, Document};
use crate::pipeline::mapper::{map_tokens, FieldSchema, MeasurementRecord};
use crate::pipeline::normalize::normalize;
use crate::pipeline::ocr::TextExtractor;
use crate::pipeline::scan::{scan_directory, Screenshot};
use crate::store::upsert_record;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Process every screenshot in `dir` and merge the records into `table_path`.
///
/// # Returns
/// `Ok(ExtractionOutput)` once every screenshot was attempted, even if some
/// failed (check `output.stats.failed`).
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal errors:
/// - directory missing, not a directory, or unreadable
/// - the OCR backend fails its readiness check
/// - a mapping failure while `config.strict` is set
pub async fn extract_directory(
    dir: impl AsRef<Path>,
    table_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let dir = dir.as_ref();
    let table_path = table_path.as_ref();
    info!("Starting extraction: {} → {}", dir.display(), table_path.display());

    // ── Step 1: List the directory ───────────────────────────────────────
    let scan = scan_directory(dir)?;
    let total = scan.screenshots.len();
    info!(
        "Found {} screenshots ({} other files skipped)",
        total,
        scan.skipped.len()
    );

    // ── Step 2: Check the OCR backend once ───────────────────────────────
    let extractor = config.resolve_extractor();
    if total > 0 {
        ensure_ready(&extractor).await?;
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total, scan.skipped.len());
    }

    // ── Step 3: Process screenshots in listing order ─────────────────────
    let mut results: Vec<ScreenshotResult> = Vec::with_capacity(total);
    for (i, shot) in scan.screenshots.iter().enumerate() {
        let index = i + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_screenshot_start(index, total, &shot.file_name);
        }

        let result = process_screenshot(shot, table_path, &extractor, config).await;

        match &result.error {
            None => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_screenshot_complete(index, total, &result.acquisition_date);
                }
            }
            Some(e) => {
                if let Some(source) = strict_abort(config, e) {
                    if let Some(ref cb) = config.progress_callback {
                        let processed = results.iter().filter(|r| r.is_success()).count();
                        cb.on_run_complete(total, processed);
                    }
                    return Err(ExtractError::MappingAborted {
                        file: shot.file_name.clone(),
                        source,
                    });
                }
                warn!("Skipping {}: {}", shot.file_name, e);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_screenshot_error(index, total, &e.to_string());
                }
            }
        }
        results.push(result);
    }

    // ── Step 4: Stats ────────────────────────────────────────────────────
    let processed = results.iter().filter(|r| r.is_success()).count();
    let stats = ExtractionStats {
        total_screenshots: total,
        processed,
        failed: total - processed,
        skipped_files: scan.skipped.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        ocr_duration_ms: results.iter().map(|r| r.ocr_duration_ms).sum(),
    };

    info!(
        "Extraction complete: {}/{} screenshots stored, {}ms total",
        processed, total, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, processed);
    }

    Ok(ExtractionOutput {
        table_path: table_path.to_path_buf(),
        results,
        stats,
    })
}

/// Process a single screenshot file and merge its record into `table_path`.
///
/// Per-screenshot failures come back inside the result, except a mapping
/// failure in strict mode, which is returned as
/// [`ExtractError::MappingAborted`].
pub async fn extract_file(
    path: impl AsRef<Path>,
    table_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ScreenshotResult, ExtractError> {
    let path = path.as_ref();
    let shot = Screenshot::from_path(path).ok_or_else(|| {
        ExtractError::Internal(format!("no usable file name in '{}'", path.display()))
    })?;

    let extractor = config.resolve_extractor();
    ensure_ready(&extractor).await?;

    let result = process_screenshot(&shot, table_path.as_ref(), &extractor, config).await;
    if let Some(source) = result.error.as_ref().and_then(|e| strict_abort(config, e)) {
        return Err(ExtractError::MappingAborted {
            file: shot.file_name,
            source,
        });
    }
    Ok(result)
}

/// Synchronous wrapper around [`extract_directory`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_directory_sync(
    dir: impl AsRef<Path>,
    table_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_directory(dir, table_path, config))
}

/// Normalise raw OCR text and map it onto `schema`.
///
/// The pure tail of the pipeline; no I/O.
pub fn map_text(
    raw: &str,
    acquisition_date: &str,
    schema: &FieldSchema,
) -> Result<MeasurementRecord, MapError> {
    map_tokens(schema, &normalize(raw), acquisition_date)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn ensure_ready(extractor: &Arc<dyn TextExtractor>) -> Result<(), ExtractError> {
    let extractor = Arc::clone(extractor);
    tokio::task::spawn_blocking(move || extractor.ensure_ready())
        .await
        .map_err(|e| ExtractError::Internal(format!("readiness check panicked: {e}")))??;
    Ok(())
}

/// The mapping error that should end the run, if strict mode is on.
fn strict_abort(config: &ExtractionConfig, error: &ScreenshotError) -> Option<MapError> {
    match error {
        ScreenshotError::Mapping { source, .. } if config.strict => Some(source.clone()),
        _ => None,
    }
}

/// Run every stage for one screenshot, never failing outright.
async fn process_screenshot(
    shot: &Screenshot,
    table_path: &Path,
    extractor: &Arc<dyn TextExtractor>,
    config: &ExtractionConfig,
) -> ScreenshotResult {
    let start = Instant::now();
    let mut result = ScreenshotResult::pending(shot);

    if let Err(e) = run_stages(shot, table_path, extractor, config, &mut result).await {
        result.error = Some(e);
    }

    result.duration_ms = start.elapsed().as_millis() as u64;
    result
}

async fn run_stages(
    shot: &Screenshot,
    table_path: &Path,
    extractor: &Arc<dyn TextExtractor>,
    config: &ExtractionConfig,
    result: &mut ScreenshotResult,
) -> Result<(), ScreenshotError> {
    let file = shot.file_name.clone();

    // ── Condition + render (CPU-bound) ───────────────────────────────────
    let document = {
        let path = shot.path.clone();
        let adjustment = config.adjustment();
        let task_file = file.clone();
        tokio::task::spawn_blocking(move || -> Result<Document, ScreenshotError> {
            let conditioned =
                condition_in_place(&path, adjustment).map_err(|e| ScreenshotError::Condition {
                    file: task_file.clone(),
                    detail: e.to_string(),
                })?;
            render_document(&conditioned).map_err(|e| ScreenshotError::Convert {
                file: task_file,
                detail: e.to_string(),
            })
        })
        .await
        .map_err(|e| ScreenshotError::Condition {
            file: file.clone(),
            detail: format!("task panicked: {e}"),
        })??
    };

    // ── OCR (blocking subprocess) ────────────────────────────────────────
    let ocr_start = Instant::now();
    let raw = {
        let extractor = Arc::clone(extractor);
        tokio::task::spawn_blocking(move || extractor.extract_text(&document))
            .await
            .map_err(|e| ScreenshotError::Ocr {
                file: file.clone(),
                detail: format!("task panicked: {e}"),
            })?
            .map_err(|e| ScreenshotError::Ocr {
                file: file.clone(),
                detail: e.to_string(),
            })?
    };
    result.ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
    debug!("Raw OCR text for {}:\n{}", file, raw);

    // ── Normalise + map ──────────────────────────────────────────────────
    let tokens = normalize(&raw);
    debug!("Normalized tokens for {}: {}", file, tokens.join(" "));
    result.tokens = tokens.clone();

    let record = map_tokens(&config.schema, &tokens, &shot.acquisition_date).map_err(|source| {
        ScreenshotError::Mapping {
            file: file.clone(),
            source,
        }
    })?;

    // ── Persist ──────────────────────────────────────────────────────────
    let outcome = {
        let table_path = table_path.to_path_buf();
        let record = record.clone();
        tokio::task::spawn_blocking(move || upsert_record(&table_path, &record))
            .await
            .map_err(|e| ScreenshotError::Persist {
                file: file.clone(),
                detail: format!("task panicked: {e}"),
            })?
            .map_err(|e| ScreenshotError::Persist {
                file: file.clone(),
                detail: e.to_string(),
            })?
    };

    result.record = Some(record);
    result.upsert = Some(outcome);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULT_PAGE: &str = "Body Composition\n\
        Today 08:15\n\
        Weight 65.1kg\n\
        Body Fat 28.4%\n\
        BMI 22.1\n\
        Skeletal Muscle 41.0%\n\
        Muscle Mass 60.0kg\n\
        Muscle Storage 3\n\
        Protein 18.0%\n\
        BMR 1500kcal\n\
        Fat-Free Body Weight 49.0kg\n\
        Subcutaneous Fat 10.0%\n\
        Visceral Fat 9\n\
        Body Water 55.0%\n\
        Bone Mass 3.0kg\n";

    #[test]
    fn map_text_produces_a_full_record() {
        let record = map_text(RESULT_PAGE, "03/14/2024", &FieldSchema::default()).unwrap();
        assert_eq!(record.acquisition_date, "03/14/2024");
        assert_eq!(record.fields.len(), 13);
        assert_eq!(record.number("Weight"), Some(65.1));
        assert_eq!(record.number("Body Fat"), Some(0.284));
        assert_eq!(record.number("BMR"), Some(1500.0));
    }

    #[test]
    fn map_text_reports_short_pages() {
        let err = map_text("a\nb\nWeight 65.1\n", "d", &FieldSchema::default()).unwrap_err();
        assert_eq!(
            err,
            MapError::TokenCount {
                expected: 13,
                found: 1
            }
        );
    }

    #[test]
    fn strict_abort_only_for_mapping_errors() {
        let strict = ExtractionConfig::builder().strict(true).build().unwrap();
        let lenient = ExtractionConfig::default();
        let mapping = ScreenshotError::Mapping {
            file: "a.jpg".into(),
            source: MapError::TokenCount {
                expected: 13,
                found: 2,
            },
        };
        let ocr = ScreenshotError::Ocr {
            file: "a.jpg".into(),
            detail: "boom".into(),
        };
        assert!(strict_abort(&strict, &mapping).is_some());
        assert!(strict_abort(&strict, &ocr).is_none());
        assert!(strict_abort(&lenient, &mapping).is_none());
    }
}
