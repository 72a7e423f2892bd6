//! Document rendering: conditioned `DynamicImage` → single-page PNG.
//!
//! Tesseract accepts any Leptonica-readable image on stdin. PNG is chosen
//! over re-using the screenshot's JPEG because it is lossless: the
//! conditioned pixels reach the OCR engine exactly as computed, at the
//! original resolution and colour depth, with no second round of block
//! artefacts around the digits.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

/// A single-page document ready for the OCR backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
}

/// Encode a conditioned screenshot as a PNG document.
pub fn render_document(img: &DynamicImage) -> Result<Document, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    debug!(
        "Rendered document {}x{} → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );

    Ok(Document {
        bytes: buf,
        mime_type: "image/png".to_string(),
        width: img.width(),
        height: img.height(),
    })
}
