//! Record persistence: upsert measurement rows into a CSV table.
//!
//! The table is small (one row per day at most) so every update is a full
//! read-modify-write: load the file, drop any row with the same acquisition
//! date, append the new row, and write the whole table back. Last write by
//! processing order wins; no timestamps are compared.
//!
//! Rewrites go through a temp file in the destination directory followed by
//! a rename, so a crash mid-write never leaves a truncated table behind.

use crate::error::ExtractError;
use crate::pipeline::mapper::MeasurementRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Key column holding the acquisition date.
pub const DATE_COLUMN: &str = "Reading_Date";

/// What an upsert did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum UpsertOutcome {
    /// The table file did not exist and was created with this single row.
    Created,
    /// No row had this date; the row was appended.
    Inserted,
    /// Existing rows with this date were dropped before appending.
    Replaced { removed: usize },
}

/// In-memory copy of the persisted table. Cells are kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MeasurementTable {
    /// An empty table with the given columns.
    pub fn with_headers(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// A table containing exactly `record`.
    pub fn from_record(record: &MeasurementRecord) -> Self {
        let headers = std::iter::once(DATE_COLUMN.to_string())
            .chain(record.fields.iter().map(|f| f.name.clone()))
            .collect();
        let mut table = Self::with_headers(headers);
        table.upsert(record);
        table
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Rows whose date equals `date`.
    pub fn rows_for(&self, date: &str) -> Vec<&[String]> {
        match self.column_index(DATE_COLUMN) {
            Some(key) => self
                .rows
                .iter()
                .filter(|r| r[key] == date)
                .map(Vec::as_slice)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Cell at (`date`, `column`) of the first row with that date.
    pub fn cell(&self, date: &str, column: &str) -> Option<&str> {
        let key = self.column_index(DATE_COLUMN)?;
        let idx = self.column_index(column)?;
        self.rows
            .iter()
            .find(|r| r[key] == date)
            .map(|r| r[idx].as_str())
    }

    /// Insert `record`, replacing every row with the same date.
    ///
    /// Columns the table does not have yet are appended; older rows get
    /// empty cells for them. Returns the number of rows removed.
    pub fn upsert(&mut self, record: &MeasurementRecord) -> usize {
        if self.column_index(DATE_COLUMN).is_none() {
            self.add_column(DATE_COLUMN);
        }
        for field in &record.fields {
            if self.column_index(&field.name).is_none() {
                self.add_column(&field.name);
            }
        }

        let key = self.column_index(DATE_COLUMN).unwrap_or(0);
        let before = self.rows.len();
        self.rows.retain(|r| r[key] != record.acquisition_date);
        let removed = before - self.rows.len();

        let mut row = vec![String::new(); self.headers.len()];
        row[key] = record.acquisition_date.clone();
        for field in &record.fields {
            if let Some(idx) = self.column_index(&field.name) {
                row[idx] = field.value.to_cell();
            }
        }
        self.rows.push(row);
        removed
    }

    fn add_column(&mut self, name: &str) {
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(String::new());
        }
    }

    /// Read a table written by [`MeasurementTable::save`] (or any CSV with a
    /// `Reading_Date` header). Short rows are padded, long rows truncated.
    pub fn load(path: &Path) -> Result<Self, ExtractError> {
        let read_err = |detail: String| ExtractError::TableRead {
            path: path.to_path_buf(),
            detail,
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|e| read_err(e.to_string()))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| read_err(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();

        if !headers.iter().any(|h| h == DATE_COLUMN) {
            return Err(read_err(format!("missing '{DATE_COLUMN}' column")));
        }

        let width = headers.len();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| read_err(e.to_string()))?;
            let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        debug!("Loaded {} rows from {}", rows.len(), path.display());
        Ok(Self { headers, rows })
    }

    /// Write the whole table to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), ExtractError> {
        let write_err = |detail: String| ExtractError::TableWrite {
            path: path.to_path_buf(),
            detail,
        };

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| write_err(e.to_string()))?;

        let mut tmp =
            tempfile::NamedTempFile::new_in(&parent).map_err(|e| write_err(e.to_string()))?;
        {
            let mut writer = csv::Writer::from_writer(&mut tmp);
            writer
                .write_record(&self.headers)
                .map_err(|e| write_err(e.to_string()))?;
            for row in &self.rows {
                writer
                    .write_record(row)
                    .map_err(|e| write_err(e.to_string()))?;
            }
            writer.flush().map_err(|e| write_err(e.to_string()))?;
        }

        tmp.persist(path).map_err(|e| write_err(e.error.to_string()))?;
        Ok(())
    }
}

/// Merge `record` into the table at `path`, creating the file if needed.
pub fn upsert_record(
    path: &Path,
    record: &MeasurementRecord,
) -> Result<UpsertOutcome, ExtractError> {
    if !path.exists() {
        MeasurementTable::from_record(record).save(path)?;
        info!(
            "Created table {} with {}",
            path.display(),
            record.acquisition_date
        );
        return Ok(UpsertOutcome::Created);
    }

    let mut table = MeasurementTable::load(path)?;
    let removed = table.upsert(record);
    table.save(path)?;

    let outcome = if removed == 0 {
        UpsertOutcome::Inserted
    } else {
        UpsertOutcome::Replaced { removed }
    };
    info!(
        "Upserted {} into {} ({:?}, {} rows)",
        record.acquisition_date,
        path.display(),
        outcome,
        table.len()
    );
    Ok(outcome)
}
