//! Image conditioning: brightness/contrast adjustment written back in place.
//!
//! The result-page screenshots use light-grey digits on white cards.
//! Halving the contrast and nudging brightness flattens the card background
//! enough for tesseract to stop reading card borders as glyphs.
//!
//! Each 8-bit channel sample becomes `contrast * v + brightness`, rounded to
//! nearest with ties to even and saturated to `0..=255`. The conditioned
//! image replaces the source file atomically, re-encoded in the format its
//! extension names; a failed encode leaves the original untouched.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// JPEG quality used when writing the conditioned screenshot back.
pub const JPEG_QUALITY: u8 = 95;

/// Brightness offset and contrast multiplier for [`condition_pixels`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Adjustment {
    pub brightness: f32,
    pub contrast: f32,
}

impl Adjustment {
    /// Transform one channel sample.
    pub fn apply(&self, sample: u8) -> u8 {
        let v = self.contrast * f32::from(sample) + self.brightness;
        v.round_ties_even().clamp(0.0, 255.0) as u8
    }
}

/// Apply the affine transform to every RGB sample.
pub fn condition_pixels(image: &DynamicImage, adjustment: Adjustment) -> RgbImage {
    let mut rgb = image.to_rgb8();
    for pixel in rgb.pixels_mut() {
        for channel in pixel.0.iter_mut() {
            *channel = adjustment.apply(*channel);
        }
    }
    rgb
}

/// Load `path`, condition it, replace the file and return the result.
///
/// Blocking; callers in async code run it through `spawn_blocking`.
pub fn condition_in_place(
    path: &Path,
    adjustment: Adjustment,
) -> Result<DynamicImage, image::ImageError> {
    let source = image::open(path)?;
    let conditioned = DynamicImage::ImageRgb8(condition_pixels(&source, adjustment));

    let format = ImageFormat::from_path(path)?;
    replace_file(path, |writer| match format {
        ImageFormat::Jpeg => {
            conditioned.write_with_encoder(JpegEncoder::new_with_quality(writer, JPEG_QUALITY))
        }
        format => conditioned.write_to(writer, format),
    })?;

    debug!(
        "Conditioned {} ({}x{}, contrast={}, brightness={})",
        path.display(),
        conditioned.width(),
        conditioned.height(),
        adjustment.contrast,
        adjustment.brightness
    );
    Ok(conditioned)
}

/// Write a sibling temp file through `encode`, then rename it over `path`.
fn replace_file<F>(path: &Path, encode: F) -> Result<(), image::ImageError>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> Result<(), image::ImageError>,
{
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        encode(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| image::ImageError::IoError(e.error))?;
    Ok(())
}
