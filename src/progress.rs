//! Progress-callback trait for per-screenshot extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events while a directory is processed. The CLI uses it to drive its
//! progress bar; library callers can forward events anywhere.
//!
//! # Example
//!
//! ```rust
//! use bodycomp_ocr::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ExtractionProgressCallback for Counter {
//!     fn on_screenshot_complete(&self, index: usize, total: usize, date: &str) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{index}/{total}: stored {date}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes each screenshot.
///
/// Screenshots are handled one at a time, so calls never overlap, but the
/// trait is `Send + Sync` because the config travels across tasks. All
/// methods default to no-ops.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the directory is listed.
    ///
    /// # Arguments
    /// * `total`: screenshots that will be processed
    /// * `skipped`: directory entries ignored because of their extension
    fn on_run_start(&self, total: usize, skipped: usize) {
        let _ = (total, skipped);
    }

    /// Called before a screenshot is conditioned.
    ///
    /// `index` is 1-based.
    fn on_screenshot_start(&self, index: usize, total: usize, file_name: &str) {
        let _ = (index, total, file_name);
    }

    /// Called after the screenshot's record reached the table.
    fn on_screenshot_complete(&self, index: usize, total: usize, acquisition_date: &str) {
        let _ = (index, total, acquisition_date);
    }

    /// Called when a screenshot is abandoned.
    fn on_screenshot_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every screenshot has been attempted.
    fn on_run_complete(&self, total: usize, success_count: usize) {
        let _ = (total, success_count);
    }
}

/// A callback that ignores every event.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ExtractionProgressCallback for Recorder {
        fn on_run_start(&self, total: usize, skipped: usize) {
            self.events.lock().unwrap().push(format!("start {total}/{skipped}"));
        }

        fn on_screenshot_error(&self, index: usize, _total: usize, error: &str) {
            self.events.lock().unwrap().push(format!("error {index} {error}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(2, 1);
        cb.on_screenshot_start(1, 2, "01_01_2024.jpg");
        cb.on_screenshot_complete(1, 2, "01/01/2024");
        cb.on_screenshot_error(2, 2, "bad");
        cb.on_run_complete(2, 1);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let rec = Recorder::default();
        rec.on_run_start(3, 0);
        rec.on_screenshot_start(1, 3, "ignored.jpg");
        rec.on_screenshot_error(2, 3, "expected 13 tokens, found 12");
        assert_eq!(
            *rec.events.lock().unwrap(),
            vec!["start 3/0", "error 2 expected 13 tokens, found 12"]
        );
    }
}
