//! Configuration types for screenshot extraction.
//!
//! Every knob of a run lives in [`ExtractionConfig`], built through
//! [`ExtractionConfigBuilder`]. The CLI maps its flags onto the builder; the
//! library defaults reproduce the ArboLeaf workflow unchanged.

use crate::error::ExtractError;
use crate::pipeline::condition::Adjustment;
use crate::pipeline::mapper::FieldSchema;
use crate::pipeline::ocr::{default_tesseract_cmd, TesseractExtractor, TextExtractor};
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one extraction run.
///
/// # Example
/// ```rust
/// use bodycomp_ocr::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .tesseract_cmd("/usr/local/bin/tesseract")
///     .contrast(0.6)
///     .strict(true)
///     .build()
///     .unwrap();
/// assert_eq!(config.brightness, 1.0);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Offset added to every channel sample after scaling. Default: 1.0.
    pub brightness: f32,

    /// Multiplier applied to every channel sample. Default: 0.5.
    ///
    /// Halving contrast washes out the grey card backgrounds of the result
    /// page so only the digits survive as dark strokes.
    pub contrast: f32,

    /// Path to the tesseract executable. Default: `tesseract` on PATH
    /// (the standard install location on Windows).
    pub tesseract_cmd: PathBuf,

    /// Tesseract language code. Default: `eng`.
    pub ocr_language: String,

    /// Pre-constructed OCR backend. Takes precedence over `tesseract_cmd`.
    pub extractor: Option<Arc<dyn TextExtractor>>,

    /// Positional layout used to map tokens onto fields.
    pub schema: FieldSchema,

    /// Abort the whole run on the first unmappable screenshot. Default: false.
    pub strict: bool,

    /// Per-screenshot event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 0.5,
            tesseract_cmd: default_tesseract_cmd(),
            ocr_language: "eng".to_string(),
            extractor: None,
            schema: FieldSchema::default(),
            strict: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("brightness", &self.brightness)
            .field("contrast", &self.contrast)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("ocr_language", &self.ocr_language)
            .field(
                "extractor",
                &self.extractor.as_ref().map(|e| e.name().to_string()),
            )
            .field("schema", &self.schema.version)
            .field("strict", &self.strict)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn Callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Pixel transform for the conditioning stage.
    pub fn adjustment(&self) -> Adjustment {
        Adjustment {
            brightness: self.brightness,
            contrast: self.contrast,
        }
    }

    /// The configured backend, or tesseract at `tesseract_cmd`.
    pub fn resolve_extractor(&self) -> Arc<dyn TextExtractor> {
        match self.extractor {
            Some(ref extractor) => Arc::clone(extractor),
            None => Arc::new(
                TesseractExtractor::new(&self.tesseract_cmd)
                    .with_language(self.ocr_language.clone()),
            ),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn brightness(mut self, brightness: f32) -> Self {
        self.config.brightness = brightness;
        self
    }

    pub fn contrast(mut self, contrast: f32) -> Self {
        self.config.contrast = contrast;
        self
    }

    pub fn tesseract_cmd(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_cmd = path.into();
        self
    }

    pub fn ocr_language(mut self, language: impl Into<String>) -> Self {
        self.config.ocr_language = language.into();
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn schema(mut self, schema: FieldSchema) -> Self {
        self.config.schema = schema;
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.config.strict = strict;
        self
    }

    pub fn progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.config.progress_callback = Some(callback);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if !c.brightness.is_finite() {
            return Err(ExtractError::InvalidConfig(format!(
                "brightness must be finite, got {}",
                c.brightness
            )));
        }
        if !c.contrast.is_finite() || c.contrast < 0.0 {
            return Err(ExtractError::InvalidConfig(format!(
                "contrast must be a finite value ≥ 0, got {}",
                c.contrast
            )));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(ExtractError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        if c.schema.is_empty() {
            return Err(ExtractError::InvalidConfig(
                "field schema has no fields".into(),
            ));
        }
        Ok(self.config)
    }
}
