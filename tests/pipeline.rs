//! Integration tests for bodycomp-ocr.
//!
//! The directory pipeline runs against generated JPEGs in a temp directory
//! with a fake OCR backend, so nothing here needs tesseract installed. The
//! one live test is gated behind the `TESSERACT_E2E` environment variable.
//!
//! Run the live test with:
//!   TESSERACT_E2E=1 cargo test --test pipeline -- --nocapture

use bodycomp_ocr::pipeline::document::Document;
use bodycomp_ocr::{
    extract_directory, extract_file, ExtractError, ExtractionConfig,
    ExtractionProgressCallback, MapError, MeasurementTable, OcrError, ScreenshotError,
    TesseractExtractor, TextExtractor, UpsertOutcome,
};
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// OCR stand-in: the screenshot's pixel width selects the text it "reads".
struct FakeOcr {
    pages: HashMap<u32, String>,
    calls: AtomicUsize,
}

impl FakeOcr {
    fn new(pages: Vec<(u32, String)>) -> Arc<Self> {
        Arc::new(Self {
            pages: pages.into_iter().collect(),
            calls: AtomicUsize::new(0),
        })
    }
}

impl TextExtractor for FakeOcr {
    fn extract_text(&self, document: &Document) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(&document.width)
            .cloned()
            .ok_or_else(|| OcrError::Failed {
                status: "exit status: 1".into(),
                stderr: format!("no page for width {}", document.width),
            })
    }

    fn name(&self) -> &str {
        "fake"
    }
}

/// Backend whose readiness check always fails.
struct MissingOcr;

impl TextExtractor for MissingOcr {
    fn extract_text(&self, _: &Document) -> Result<String, OcrError> {
        unreachable!("extract_text must not run when the backend is not ready")
    }

    fn ensure_ready(&self) -> Result<(), OcrError> {
        Err(OcrError::BinaryNotFound {
            path: "/nowhere/tesseract".into(),
        })
    }
}

/// A result page as tesseract prints it, with the given weight and BMR.
fn result_page(weight: &str, bmr: &str) -> String {
    format!(
        "Body Composition\n\
         Today 07:42\n\
         Weight {weight}kg\n\
         Body Fat 28.4%\n\
         BMI 22.1\n\
         Skeletal Muscle 41.0%\n\
         Muscle Mass 60.0kg\n\
         Muscle Storage Ability 3\n\
         Protein 18.0%\n\
         BMR {bmr}kcal\n\
         Fat-Free Body Weight 49.0kg\n\
         Subcutaneous Fat 10.0%\n\
         Visceral Fat 9\n\
         Body Water 55.0%\n\
         Bone Mass 3.0kg\n"
    )
}

fn write_jpeg(dir: &Path, name: &str, width: u32) {
    RgbImage::from_pixel(width, 12, Rgb([230, 230, 230]))
        .save_with_format(dir.join(name), ImageFormat::Jpeg)
        .expect("write test jpeg");
}

fn config_with(ocr: Arc<dyn TextExtractor>) -> ExtractionConfig {
    ExtractionConfig::builder()
        .extractor(ocr)
        .build()
        .expect("valid config")
}

// ── Directory pipeline ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_directory_writes_one_row_per_date() {
    let shots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let table = out.path().join("body.csv");

    write_jpeg(shots.path(), "01_05_2024.jpg", 20);
    write_jpeg(shots.path(), "01_06_2024.JPEG", 21);
    std::fs::write(shots.path().join("chart.png"), b"not a screenshot").unwrap();

    let ocr = FakeOcr::new(vec![
        (20, result_page("65.1", "1500")),
        (21, result_page("64.8", "1490")),
    ]);
    let output = extract_directory(shots.path(), &table, &config_with(ocr.clone()))
        .await
        .expect("extraction succeeds");

    assert_eq!(output.stats.total_screenshots, 2);
    assert_eq!(output.stats.processed, 2);
    assert_eq!(output.stats.failed, 0);
    assert_eq!(output.stats.skipped_files, 1);
    assert_eq!(ocr.calls.load(Ordering::SeqCst), 2);

    let table = MeasurementTable::load(&table).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.headers()[0], "Reading_Date");
    assert_eq!(table.headers().len(), 14);
    assert_eq!(table.cell("01/05/2024", "Weight"), Some("65.1"));
    assert_eq!(table.cell("01/06/2024", "Weight"), Some("64.8"));
    assert_eq!(table.cell("01/05/2024", "Body Fat"), Some("0.284"));
    assert_eq!(table.cell("01/05/2024", "BMI"), Some("22.1"));
    assert_eq!(table.cell("01/06/2024", "BMR"), Some("1490.0"));
    assert_eq!(table.cell("01/06/2024", "Bone Mass"), Some("3.0"));
}

#[tokio::test]
async fn test_reprocessing_a_date_replaces_its_row() {
    let shots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let table = out.path().join("body.csv");

    write_jpeg(shots.path(), "02_01_2024.jpg", 20);
    write_jpeg(shots.path(), "02_02_2024.jpg", 21);
    let first = FakeOcr::new(vec![
        (20, result_page("70.0", "1600")),
        (21, result_page("69.5", "1590")),
    ]);
    extract_directory(shots.path(), &table, &config_with(first))
        .await
        .unwrap();

    // Same directory, corrected reading for 02/01 only.
    std::fs::remove_file(shots.path().join("02_02_2024.jpg")).unwrap();
    let second = FakeOcr::new(vec![(20, result_page("71.2", "1610"))]);
    let output = extract_directory(shots.path(), &table, &config_with(second))
        .await
        .unwrap();

    assert_eq!(
        output.results[0].upsert,
        Some(UpsertOutcome::Replaced { removed: 1 })
    );
    let table = MeasurementTable::load(&table).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.cell("02/01/2024", "Weight"), Some("71.2"));
    assert_eq!(table.cell("02/02/2024", "Weight"), Some("69.5"));
}

#[tokio::test]
async fn test_unmappable_screenshot_is_skipped() {
    let shots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let table = out.path().join("body.csv");

    write_jpeg(shots.path(), "03_01_2024.jpg", 20);
    write_jpeg(shots.path(), "03_02_2024.jpg", 22);
    let ocr = FakeOcr::new(vec![
        (20, result_page("66.0", "1510")),
        (22, "Body Composition\nToday\nWeight 66.0kg\nBMR 1500\n".to_string()),
    ]);

    let output = extract_directory(shots.path(), &table, &config_with(ocr))
        .await
        .expect("lenient mode never aborts on mapping");

    assert_eq!(output.stats.processed, 1);
    assert_eq!(output.stats.failed, 1);
    let failure = output.failures().next().unwrap();
    assert_eq!(failure.file_name, "03_02_2024.jpg");
    assert_eq!(failure.tokens, vec!["66.0", "1500"]);
    assert!(matches!(
        failure.error,
        Some(ScreenshotError::Mapping {
            source: MapError::TokenCount {
                expected: 13,
                found: 2
            },
            ..
        })
    ));

    let table = MeasurementTable::load(&table).unwrap();
    assert_eq!(table.len(), 1);
    assert!(table.rows_for("03/02/2024").is_empty());
}

#[tokio::test]
async fn test_strict_mode_aborts_on_mapping_failure() {
    let shots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let table = out.path().join("body.csv");

    write_jpeg(shots.path(), "04_01_2024.jpg", 20);
    let ocr = FakeOcr::new(vec![(20, "a\nb\n1 2 3\n".to_string())]);
    let config = ExtractionConfig::builder()
        .extractor(ocr)
        .strict(true)
        .build()
        .unwrap();

    let err = extract_directory(shots.path(), &table, &config)
        .await
        .unwrap_err();
    match err {
        ExtractError::MappingAborted { file, source } => {
            assert_eq!(file, "04_01_2024.jpg");
            assert_eq!(
                source,
                MapError::TokenCount {
                    expected: 13,
                    found: 3
                }
            );
        }
        other => panic!("expected MappingAborted, got {other:?}"),
    }
    assert!(!table.exists());
}

#[tokio::test]
async fn test_ocr_failure_is_per_screenshot() {
    let shots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let table = out.path().join("body.csv");

    write_jpeg(shots.path(), "05_01_2024.jpg", 20);
    write_jpeg(shots.path(), "05_02_2024.jpg", 99);
    let ocr = FakeOcr::new(vec![(20, result_page("60.0", "1400"))]);

    let output = extract_directory(shots.path(), &table, &config_with(ocr))
        .await
        .unwrap();
    assert_eq!(output.stats.processed, 1);
    let failure = output.failures().next().unwrap();
    assert!(matches!(failure.error, Some(ScreenshotError::Ocr { .. })));
    assert!(failure.tokens.is_empty());
}

#[tokio::test]
async fn test_undecodable_jpeg_is_per_screenshot() {
    let shots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    std::fs::write(shots.path().join("06_01_2024.jpg"), b"truncated").unwrap();

    let ocr = FakeOcr::new(vec![]);
    let output = extract_directory(shots.path(), out.path().join("t.csv"), &config_with(ocr))
        .await
        .unwrap();
    assert_eq!(output.stats.failed, 1);
    assert!(matches!(
        output.results[0].error,
        Some(ScreenshotError::Condition { .. })
    ));
}

#[tokio::test]
async fn test_screenshots_are_conditioned_in_place() {
    let shots = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_jpeg(shots.path(), "07_01_2024.jpg", 20);

    let ocr = FakeOcr::new(vec![(20, result_page("60.0", "1400"))]);
    extract_directory(shots.path(), out.path().join("t.csv"), &config_with(ocr))
        .await
        .unwrap();

    let px = image::open(shots.path().join("07_01_2024.jpg"))
        .unwrap()
        .to_rgb8()
        .get_pixel(10, 6)
        .0[0];
    // 0.5 * 230 + 1 = 116, allow for JPEG loss
    assert!((105..=127).contains(&px), "got {px}");
}

// ── Fatal errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_directory_is_fatal_and_touches_nothing() {
    let out = tempfile::tempdir().unwrap();
    let table = out.path().join("body.csv");

    let config = config_with(FakeOcr::new(vec![]));
    let err = extract_directory("/definitely/not/a/dir", &table, &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::DirectoryNotFound { .. }));
    assert!(err.to_string().contains("dir not found"));
    assert!(!table.exists());
}

#[tokio::test]
async fn test_unavailable_ocr_is_fatal() {
    let shots = tempfile::tempdir().unwrap();
    write_jpeg(shots.path(), "08_01_2024.jpg", 20);

    let config = config_with(Arc::new(MissingOcr));
    let err = extract_directory(shots.path(), shots.path().join("t.csv"), &config)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExtractError::OcrUnavailable(OcrError::BinaryNotFound { .. })
    ));
}

#[tokio::test]
async fn test_empty_directory_skips_readiness_check() {
    let shots = tempfile::tempdir().unwrap();
    let config = config_with(Arc::new(MissingOcr));
    let output = extract_directory(shots.path(), shots.path().join("t.csv"), &config)
        .await
        .expect("nothing to OCR");
    assert_eq!(output.stats.total_screenshots, 0);
    assert!(output.results.is_empty());
}

// ── Single file + progress ───────────────────────────────────────────────────

#[tokio::test]
async fn test_extract_file() {
    let shots = tempfile::tempdir().unwrap();
    write_jpeg(shots.path(), "09_09_2024.jpeg", 20);
    let table = shots.path().join("t.csv");

    let ocr = FakeOcr::new(vec![(20, result_page("58.3", "1350"))]);
    let path = shots.path().join("09_09_2024.jpeg");
    let result = extract_file(&path, &table, &config_with(ocr))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.acquisition_date, "09/09/2024");
    assert_eq!(result.upsert, Some(UpsertOutcome::Created));
    let record = result.record.unwrap();
    assert_eq!(record.number("Weight"), Some(58.3));
}

#[derive(Default)]
struct Events {
    started: Mutex<Option<(usize, usize)>>,
    completes: AtomicUsize,
    errors: AtomicUsize,
    finished: Mutex<Option<(usize, usize)>>,
}

impl ExtractionProgressCallback for Events {
    fn on_run_start(&self, total: usize, skipped: usize) {
        *self.started.lock().unwrap() = Some((total, skipped));
    }
    fn on_screenshot_complete(&self, _: usize, _: usize, _: &str) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
    fn on_screenshot_error(&self, _: usize, _: usize, _: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_run_complete(&self, total: usize, success_count: usize) {
        *self.finished.lock().unwrap() = Some((total, success_count));
    }
}

#[tokio::test]
async fn test_progress_callback_sees_every_screenshot() {
    let shots = tempfile::tempdir().unwrap();
    write_jpeg(shots.path(), "10_01_2024.jpg", 20);
    write_jpeg(shots.path(), "10_02_2024.jpg", 21);
    std::fs::write(shots.path().join("readme.txt"), b"x").unwrap();

    let events = Arc::new(Events::default());
    let config = ExtractionConfig::builder()
        .extractor(FakeOcr::new(vec![(20, result_page("60.0", "1400"))]))
        .progress_callback(events.clone())
        .build()
        .unwrap();

    extract_directory(shots.path(), shots.path().join("t.csv"), &config)
        .await
        .unwrap();

    assert_eq!(*events.started.lock().unwrap(), Some((2, 1)));
    assert_eq!(events.completes.load(Ordering::SeqCst), 1);
    assert_eq!(events.errors.load(Ordering::SeqCst), 1);
    assert_eq!(*events.finished.lock().unwrap(), Some((2, 1)));
}

#[tokio::test]
async fn test_strict_abort_still_reports_run_complete() {
    let shots = tempfile::tempdir().unwrap();
    write_jpeg(shots.path(), "10_03_2024.jpg", 20);

    let events = Arc::new(Events::default());
    let config = ExtractionConfig::builder()
        .extractor(FakeOcr::new(vec![(20, "a\nb\n1 2\n".to_string())]))
        .strict(true)
        .progress_callback(events.clone())
        .build()
        .unwrap();

    let err = extract_directory(shots.path(), shots.path().join("t.csv"), &config)
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::MappingAborted { .. }));
    assert_eq!(*events.finished.lock().unwrap(), Some((1, 0)));
}

// ── Live tesseract ───────────────────────────────────────────────────────────

#[test]
fn test_live_tesseract_reads_a_blank_page() {
    if std::env::var("TESSERACT_E2E").is_err() {
        println!("SKIP: set TESSERACT_E2E=1 to run against a real tesseract");
        return;
    }
    let cmd = std::env::var("TESSERACT_CMD").unwrap_or_else(|_| "tesseract".into());
    let ocr = TesseractExtractor::new(cmd);
    ocr.ensure_ready().expect("tesseract is installed");

    let blank =
        image::DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 60, Rgb([255, 255, 255])));
    let doc = bodycomp_ocr::pipeline::document::render_document(&blank).unwrap();
    let text = ocr.extract_text(&doc).expect("tesseract runs");
    println!("tesseract returned {:?}", text);
    assert!(text.trim().is_empty(), "blank page should have no text");
}
