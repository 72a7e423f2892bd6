//! Input resolution: list a screenshot directory and name each file's date.
//!
//! Screenshots are saved as `MM_DD_YYYY.jpg`. The file name is the only
//! place the acquisition date exists, so it doubles as the record key: we
//! swap underscores for slashes and drop the extension. Nothing validates
//! that the result is really a date; a misnamed file stores a misnamed key.
//!
//! Entries come back in whatever order the filesystem lists them.

use crate::error::ExtractError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Screenshot extensions accepted, compared case-insensitively.
pub const SCREENSHOT_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// A screenshot selected for processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Screenshot {
    pub path: PathBuf,
    pub file_name: String,
    /// Record key derived from the file name, e.g. `03/14/2024`.
    pub acquisition_date: String,
}

impl Screenshot {
    /// Describe the file at `path`; `None` if it has no UTF-8 file name.
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_str()?.to_string();
        let acquisition_date = acquisition_date(&file_name);
        Some(Self {
            path,
            file_name,
            acquisition_date,
        })
    }
}

/// Result of listing the source directory.
#[derive(Debug, Clone, Default)]
pub struct DirectoryScan {
    /// Accepted screenshots in listing order.
    pub screenshots: Vec<Screenshot>,
    /// Regular files skipped because of their extension.
    pub skipped: Vec<PathBuf>,
}

/// Check if the file name has an accepted screenshot extension.
pub fn is_screenshot(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            SCREENSHOT_EXTENSIONS
                .iter()
                .any(|accepted| ext.eq_ignore_ascii_case(accepted))
        })
        .unwrap_or(false)
}

/// Derive the acquisition date from a screenshot file name.
///
/// `03_14_2024.jpg` → `03/14/2024`. The extension is removed whatever its
/// case; a name without extension is used as-is.
pub fn acquisition_date(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    stem.replace('_', "/")
}

/// List `dir` and select the screenshots to process.
///
/// Fails only when the directory itself is missing or unreadable; odd
/// entries inside it are skipped.
pub fn scan_directory(dir: &Path) -> Result<DirectoryScan, ExtractError> {
    if !dir.exists() {
        return Err(ExtractError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    if !dir.is_dir() {
        return Err(ExtractError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let unreadable = |source: std::io::Error| ExtractError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    };

    let mut scan = DirectoryScan::default();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        if !is_screenshot(&path) {
            debug!("Skipping non-screenshot file: {}", path.display());
            scan.skipped.push(path);
            continue;
        }

        match Screenshot::from_path(path) {
            Some(shot) => scan.screenshots.push(shot),
            None => warn!("Skipping screenshot with a non UTF-8 name in {}", dir.display()),
        }
    }

    debug!(
        "Found {} screenshots ({} other files) in {}",
        scan.screenshots.len(),
        scan.skipped.len(),
        dir.display()
    );
    Ok(scan)
}
