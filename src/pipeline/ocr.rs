//! Text extraction: hand the document to an OCR backend, get raw text back.
//!
//! The OCR engine is an external collaborator and a noisy oracle. This
//! module only moves bytes in and text out; it never retries and never
//! cleans anything. All tolerance for misreads lives in
//! [`crate::pipeline::normalize`].
//!
//! The default backend shells out to the `tesseract` CLI with the document
//! on stdin and the text on stdout, so no native bindings are needed at
//! build time. The binary location is injected through
//! [`crate::config::ExtractionConfig::tesseract_cmd`].

use crate::error::OcrError;
use crate::pipeline::document::Document;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// An OCR backend: document in, multi-line text out.
///
/// Implementations must be `Send + Sync`; the pipeline calls them from a
/// blocking worker thread.
pub trait TextExtractor: Send + Sync {
    /// Recognise the text of a single-page document, line breaks preserved.
    fn extract_text(&self, document: &Document) -> Result<String, OcrError>;

    /// Cheap check run once before a directory is processed.
    fn ensure_ready(&self) -> Result<(), OcrError> {
        Ok(())
    }

    /// Name used in log lines.
    fn name(&self) -> &str {
        "ocr"
    }
}

/// Default tesseract location for the current platform.
pub fn default_tesseract_cmd() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(r"C:\Program Files\Tesseract-OCR\tesseract.exe")
    } else {
        PathBuf::from("tesseract")
    }
}

/// [`TextExtractor`] backed by the tesseract command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractExtractor {
    binary: PathBuf,
    language: String,
}

impl TesseractExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            language: "eng".to_string(),
        }
    }

    /// Set the traineddata language(s), e.g. `"eng"` or `"eng+fra"`.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn spawn_error(&self, e: std::io::Error) -> OcrError {
        if e.kind() == ErrorKind::NotFound {
            OcrError::BinaryNotFound {
                path: self.binary.clone(),
            }
        } else {
            OcrError::Io(e)
        }
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract_text(&self, document: &Document) -> Result<String, OcrError> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", self.language.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // tesseract reads the whole image before writing, so feeding stdin
        // to completion first cannot deadlock on a full stdout pipe.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(&document.bytes) {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(e.into());
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            "tesseract recognised {} lines from {}x{} document",
            text.lines().count(),
            document.width,
            document.height
        );
        Ok(text)
    }

    fn ensure_ready(&self) -> Result<(), OcrError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(OcrError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Older releases print the version banner on stderr.
        let banner = if output.stdout.is_empty() {
            &output.stderr
        } else {
            &output.stdout
        };
        debug!(
            "Using {}",
            String::from_utf8_lossy(banner).lines().next().unwrap_or("tesseract")
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}
