//! Dataset loading and typed column access

use crate::structs::{Dataset, DatasenseError, Result, Row, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use std::path::Path;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%m/%d/%Y"];

/// Parse a string as a calendar date or timestamp
#[must_use]
pub fn parse_temporal(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Parse a string as a finite float
#[must_use]
pub fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

impl Value {
    /// Infer a typed value from an untyped text cell
    #[must_use]
    pub fn from_cell(cell: &str) -> Self {
        let trimmed = cell.trim();
        if trimmed.is_empty() {
            return Self::Null;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if let Some(n) = parse_number(trimmed) {
            return Self::Number(n);
        }
        if let Some(t) = parse_temporal(trimmed) {
            return Self::Temporal(t);
        }
        Self::Text(cell.to_string())
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view: finite numbers and text that parses to one
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// Temporal view: timestamps and text that parses as a date
    #[must_use]
    pub fn as_temporal(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Temporal(t) => Some(*t),
            Self::Text(s) => parse_temporal(s),
            _ => None,
        }
    }

    /// Key used for distinct-value counting; `None` for nulls
    #[must_use]
    pub fn distinct_key(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(n.to_string()),
            Self::Temporal(t) => Some(t.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }

    fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::Text(other.to_string()),
        }
    }
}

impl Dataset {
    #[must_use]
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Build from `(column, value)` pairs per row
    #[must_use]
    pub fn from_records<I, R, K>(records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let rows = records
            .into_iter()
            .map(|r| r.into_iter().map(|(k, v)| (k.into(), v)).collect())
            .collect();
        Self { rows }
    }

    /// Build a dataset of numeric columns, one row per index
    ///
    /// Shorter columns leave nulls in trailing rows.
    #[must_use]
    pub fn from_numeric_columns(columns: &[(&str, &[f64])]) -> Self {
        let n = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let rows = (0..n)
            .map(|i| {
                columns
                    .iter()
                    .map(|(name, values)| {
                        let value = values.get(i).map_or(Value::Null, |&v| Value::Number(v));
                        ((*name).to_string(), value)
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Parse a CSV or TSV file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_csv_path(path: &Path, is_tsv: bool) -> Result<Self> {
        let delimiter = if is_tsv { b'\t' } else { b',' };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let row: Row = headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.clone(), record.get(i).map_or(Value::Null, Value::from_cell)))
                .collect();
            rows.push(row);
        }

        Ok(Self { rows })
    }

    /// Load from a JSON file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn from_json_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Load from JSON: an array of objects, or an object with a `rows`/`data` array
    ///
    /// # Errors
    /// Returns error if JSON is invalid or not row-shaped
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        let rows_value = match value {
            serde_json::Value::Array(_) => value,
            serde_json::Value::Object(mut map) => map
                .remove("rows")
                .or_else(|| map.remove("data"))
                .ok_or_else(|| {
                    DatasenseError::InvalidArgument(
                        "JSON must be an array or have 'rows'/'data' field".into(),
                    )
                })?,
            _ => {
                return Err(DatasenseError::InvalidArgument(
                    "JSON must be an array of objects".into(),
                ))
            }
        };

        let raw_rows: Vec<serde_json::Map<String, serde_json::Value>> =
            serde_json::from_value(rows_value)?;

        let rows = raw_rows
            .into_iter()
            .map(|obj| obj.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
            .collect();

        Ok(Self { rows })
    }

    /// Get number of rows
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in order of first appearance
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.rows.iter().any(|row| row.contains_key(name))
    }

    /// Cell value; missing keys read as null
    #[must_use]
    pub fn value(&self, row: usize, field: &str) -> &Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(field))
            .unwrap_or(&Value::Null)
    }

    /// Numeric view of a column: `(row index, value)` for every parseable cell
    #[must_use]
    pub fn numeric_values(&self, field: &str) -> Vec<(usize, f64)> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.get(field).and_then(Value::as_number).map(|v| (i, v)))
            .collect()
    }

    /// Numeric values of a column without row indices
    #[must_use]
    pub fn numeric_series(&self, field: &str) -> Vec<f64> {
        self.numeric_values(field).into_iter().map(|(_, v)| v).collect()
    }

    /// Temporal view of a column
    #[must_use]
    pub fn temporal_values(&self, field: &str) -> Vec<(usize, NaiveDateTime)> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.get(field).and_then(Value::as_temporal).map(|t| (i, t)))
            .collect()
    }

    /// Categorical view of a column: the non-null cells as labels
    #[must_use]
    pub fn categorical_values(&self, field: &str) -> Vec<(usize, String)> {
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.get(field).and_then(Value::distinct_key).map(|k| (i, k)))
            .collect()
    }
}
