//! Pairwise correlation of the stored measurements.
//!
//! Every numeric column of the table is compared with every other using
//! Pearson's r over the rows where both cells are present. Columns holding
//! any cell that does not parse as a number are left out entirely, as is the
//! date column.

use crate::error::ExtractError;
use crate::pipeline::mapper::{FieldGroup, FieldSchema};
use crate::store::{MeasurementTable, DATE_COLUMN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// `|r|` at or above which a pair is reported by default.
pub const DEFAULT_THRESHOLD: f64 = 0.8;

/// Qualitative label for a coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strength {
    High,
    Medium,
    Low,
}

impl Strength {
    pub fn of(coefficient: f64) -> Self {
        let r = coefficient.abs();
        if r >= 0.75 {
            Strength::High
        } else if r >= 0.5 {
            Strength::Medium
        } else {
            Strength::Low
        }
    }
}

impl fmt::Display for Strength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strength::High => "High",
            Strength::Medium => "Medium",
            Strength::Low => "Low",
        })
    }
}

/// A pair of columns whose correlation passed the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
    pub strength: Strength,
    pub first_group: Option<FieldGroup>,
    pub second_group: Option<FieldGroup>,
}

impl fmt::Display for CorrelatedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = |g: Option<FieldGroup>| g.map(FieldGroup::label).unwrap_or("-");
        write!(
            f,
            "{} ({}) ~ {} ({}): {:+.3} [{}]",
            self.first,
            group(self.first_group),
            self.second,
            group(self.second_group),
            self.coefficient,
            self.strength
        )
    }
}

/// Symmetric matrix of coefficients between numeric columns.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    columns: Vec<String>,
    /// Row-major, `columns.len()²` entries.
    values: Vec<Option<f64>>,
}

impl CorrelationMatrix {
    /// Build from named columns of optional samples (all the same length).
    pub fn from_columns(columns: Vec<(String, Vec<Option<f64>>)>) -> Self {
        let n = columns.len();
        let mut values = vec![None; n * n];
        for i in 0..n {
            for j in 0..=i {
                let r = pearson(&columns[i].1, &columns[j].1);
                values[i * n + j] = r;
                values[j * n + i] = r;
            }
        }
        Self {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            values,
        }
    }

    /// Numeric columns of `table`, date column excluded.
    pub fn from_table(table: &MeasurementTable) -> Self {
        let mut numeric = Vec::new();
        for name in table.headers() {
            if name == DATE_COLUMN {
                continue;
            }
            let Some(cells) = table.column(name) else {
                continue;
            };
            match parse_column(&cells) {
                Some(samples) => numeric.push((name.clone(), samples)),
                None => debug!("Column '{}' is not numeric, excluded", name),
            }
        }
        Self::from_columns(numeric)
    }

    /// Load the table at `path` and correlate it.
    pub fn load(path: &Path) -> Result<Self, ExtractError> {
        Ok(Self::from_table(&MeasurementTable::load(path)?))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Coefficient between two columns; `None` if either is unknown or the
    /// correlation is undefined.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i * self.columns.len() + j]
    }

    /// Lower-triangle pairs with `|r| >= threshold`, strongest first.
    pub fn strong_pairs(&self, threshold: f64, schema: &FieldSchema) -> Vec<CorrelatedPair> {
        let n = self.columns.len();
        let mut pairs = Vec::new();
        for i in 0..n {
            for j in 0..i {
                let Some(r) = self.values[i * n + j] else {
                    continue;
                };
                if r.abs() < threshold {
                    continue;
                }
                pairs.push(CorrelatedPair {
                    first: self.columns[i].clone(),
                    second: self.columns[j].clone(),
                    coefficient: r,
                    strength: Strength::of(r),
                    first_group: schema.group_of(&self.columns[i]),
                    second_group: schema.group_of(&self.columns[j]),
                });
            }
        }
        pairs.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
        pairs
    }
}

/// Parse table cells; empty cells are missing. `None` if any cell is not a
/// number.
fn parse_column(cells: &[&str]) -> Option<Vec<Option<f64>>> {
    cells
        .iter()
        .map(|cell| {
            let cell = cell.trim();
            if cell.is_empty() {
                Some(None)
            } else {
                cell.parse::<f64>().ok().map(Some)
            }
        })
        .collect()
}

/// Pearson's r over pairwise-complete samples.
///
/// `None` with fewer than two complete pairs or when either side has zero
/// variance.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}
