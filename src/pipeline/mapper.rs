//! Field mapping: ordered numeric tokens → typed [`MeasurementRecord`].
//!
//! The result page prints its thirteen metrics in a fixed order, so the
//! mapping is purely positional. Rather than hard-coding `tokens[0]`,
//! `tokens[1]`, … the positions live in an explicit [`FieldSchema`]: an
//! ordered list of [`FieldSpec`]s naming each field, its rescaling and its
//! rounding. A layout change in the app becomes a new schema constructor,
//! not an edit scattered across the mapper.
//!
//! ## Rounding
//!
//! Values are rounded by formatting to N decimals and parsing the text back.
//! This keeps the stored representation identical to what a spreadsheet
//! shows (`0.284`, not `0.28400000000000003`), which matters for the
//! correlation step downstream.

use crate::error::MapError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Rescaling applied to a parsed value before rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transform {
    /// Keep the value as printed.
    Identity,
    /// Printed as a percentage; stored as a fraction (`÷100`).
    Percent,
}

impl Transform {
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Transform::Identity => value,
            Transform::Percent => value / 100.0,
        }
    }
}

/// How a token is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Parsed as `f64`, transformed and optionally rounded.
    Number,
    /// Kept verbatim as the token text.
    Text,
}

/// Thematic grouping used when reporting correlations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldGroup {
    BodyMetrics,
    BodyComposition,
    Metabolic,
}

impl FieldGroup {
    pub fn label(self) -> &'static str {
        match self {
            FieldGroup::BodyMetrics => "Body Metrics",
            FieldGroup::BodyComposition => "Body Composition",
            FieldGroup::Metabolic => "Metabolic",
        }
    }
}

impl fmt::Display for FieldGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One position of the result-page layout.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Column name in the persisted table.
    pub name: &'static str,
    pub kind: FieldKind,
    pub transform: Transform,
    /// Decimal places to round to; `None` stores the value as parsed.
    pub precision: Option<usize>,
    pub group: FieldGroup,
    /// Strip one trailing `.` from the token before parsing.
    ///
    /// Set only on the first field: OCR occasionally reads the weight as
    /// `65.1..`, and the normaliser's per-token rule removes just one period.
    pub strip_trailing_period: bool,
}

impl FieldSpec {
    fn number(
        name: &'static str,
        transform: Transform,
        precision: Option<usize>,
        group: FieldGroup,
    ) -> Self {
        Self {
            name,
            kind: FieldKind::Number,
            transform,
            precision,
            group,
            strip_trailing_period: false,
        }
    }

    fn text(name: &'static str, group: FieldGroup) -> Self {
        Self {
            name,
            kind: FieldKind::Text,
            transform: Transform::Identity,
            precision: None,
            group,
            strip_trailing_period: false,
        }
    }

    fn with_trailing_period_guard(mut self) -> Self {
        self.strip_trailing_period = true;
        self
    }

    /// Convert one token into this field's value.
    pub fn map_token(&self, token: &str) -> Result<FieldValue, MapError> {
        let token = if self.strip_trailing_period {
            token.strip_suffix('.').unwrap_or(token)
        } else {
            token
        };

        match self.kind {
            FieldKind::Text => Ok(FieldValue::Text(token.to_string())),
            FieldKind::Number => {
                let parsed: f64 = token.parse().map_err(|_| MapError::InvalidNumber {
                    field: self.name.to_string(),
                    token: token.to_string(),
                })?;
                let value = self.transform.apply(parsed);
                let value = match self.precision {
                    Some(decimals) => round_to(value, decimals),
                    None => value,
                };
                Ok(FieldValue::Number(value))
            }
        }
    }
}

/// Ordered positional layout of a result page.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    /// Identifier recorded in logs so a table can be traced to its layout.
    pub version: &'static str,
    pub fields: Vec<FieldSpec>,
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::arboleaf_v1()
    }
}

impl FieldSchema {
    /// The 13-field ArboLeaf result page.
    pub fn arboleaf_v1() -> Self {
        use FieldGroup::*;
        use Transform::*;

        Self {
            version: "arboleaf-v1",
            fields: vec![
                FieldSpec::number("Weight", Identity, Some(3), BodyMetrics)
                    .with_trailing_period_guard(),
                FieldSpec::number("Body Fat", Percent, Some(3), BodyComposition),
                FieldSpec::text("BMI", BodyMetrics),
                FieldSpec::number("Skeletal Muscle", Percent, Some(3), BodyComposition),
                FieldSpec::number("Muscle Mass", Identity, Some(1), BodyComposition),
                FieldSpec::number("Muscle Storage Ability Level", Identity, None, Metabolic),
                FieldSpec::number("Protein", Percent, Some(3), Metabolic),
                FieldSpec::number("BMR", Identity, None, Metabolic),
                FieldSpec::number("Fat-Free Body Weight", Identity, None, BodyComposition),
                FieldSpec::number("Subcutaneous Fat", Percent, Some(3), BodyComposition),
                FieldSpec::number("Visceral Fat", Identity, None, BodyComposition),
                FieldSpec::number("Body Water", Percent, Some(3), BodyComposition),
                FieldSpec::number("Bone Mass", Identity, None, BodyComposition),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    /// Group of the named field, if the schema has it.
    pub fn group_of(&self, name: &str) -> Option<FieldGroup> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.group)
    }
}

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }

    /// Render for a table cell: whole numbers keep one decimal (`3.0`).
    pub fn to_cell(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(v) => format_number(*v),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_cell())
    }
}

/// A named value inside a [`MeasurementRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasuredField {
    pub name: String,
    pub value: FieldValue,
}

/// One screenshot's worth of measurements, keyed by acquisition date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub acquisition_date: String,
    /// Fields in schema order.
    pub fields: Vec<MeasuredField>,
}

impl MeasurementRecord {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    /// Numeric value of a field; `None` for text fields or unknown names.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FieldValue::as_number)
    }
}

/// Map a normalised token sequence onto `schema`.
///
/// The sequence must contain exactly one token per schema field; anything
/// else means the OCR text did not follow the expected layout and no record
/// is produced.
pub fn map_tokens(
    schema: &FieldSchema,
    tokens: &[String],
    acquisition_date: &str,
) -> Result<MeasurementRecord, MapError> {
    if tokens.len() != schema.len() {
        return Err(MapError::TokenCount {
            expected: schema.len(),
            found: tokens.len(),
        });
    }

    let fields = schema
        .fields
        .iter()
        .zip(tokens)
        .map(|(spec, token)| {
            spec.map_token(token).map(|value| MeasuredField {
                name: spec.name.to_string(),
                value,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(
        "Mapped {} fields for {} ({})",
        fields.len(),
        acquisition_date,
        schema.version
    );

    Ok(MeasurementRecord {
        acquisition_date: acquisition_date.to_string(),
        fields,
    })
}

/// Round by printing to `decimals` places and parsing the text back.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    let text = format!("{value:.decimals$}");
    text.parse().unwrap_or(value)
}

/// Table-cell rendering of a float.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
