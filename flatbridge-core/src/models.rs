//! Data model shared by readers, writers and the transfer engine.
//!
//! A [`RowBatch`] is positional: every row holds exactly one [`CellValue`] per
//! entry of the batch's [`ColumnSpec`] sequence, in that order. Name lookups go
//! through the shared column list, which keeps rows compact and makes the
//! "same keys, same order" projection invariant structural.

use crate::error::{ErrorDetail, FlatbridgeError, Result};
use chrono::NaiveDateTime;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;

/// Rendering used whenever a datetime is turned into text.
pub const DATETIME_TEXT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses an ISO-8601 style timestamp or date.
///
/// Offsets are normalized to UTC. A bare date means midnight.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(ts) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(ts.naive_utc());
    }
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Type hint attached to a column.
///
/// Database columns get it from the native type name, file columns from a
/// single-row sniff. `Unknown` is treated as opaque text downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ColumnType {
    Int,
    Float,
    String,
    DateTime,
    Bool,
    #[default]
    Unknown,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Int => "Int",
            Self::Float => "Float",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Bool => "Bool",
            Self::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnSpec {
    pub name: String,
    pub source_type: ColumnType,
}

impl ColumnSpec {
    /// Creates a new column spec
    pub fn new(name: impl Into<String>, source_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            source_type,
        }
    }
}

/// A single scalar cell, either typed or raw text awaiting coercion.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Renders the value as delimited-file text. `Null` renders as an empty
    /// field.
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Text(v) => v.clone(),
            Self::DateTime(v) => v.format(DATETIME_TEXT_FORMAT).to_string(),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::DateTime(v) => {
                serializer.serialize_str(&v.format(DATETIME_TEXT_FORMAT).to_string())
            }
        }
    }
}

/// One row; positions follow the owning batch's columns.
pub type Row = Vec<CellValue>;

/// Bounded, ordered group of rows moved as one transfer unit.
///
/// Batches are produced, consumed once and dropped; nothing mutates a batch
/// after it has been handed to a sink.
#[derive(Debug, Clone)]
pub struct RowBatch {
    /// Zero-based position of this batch in its source stream
    pub index: u64,
    /// Columns every row carries, in order
    pub columns: Arc<[ColumnSpec]>,
    /// Row data
    pub rows: Vec<Row>,
    /// Source records dropped while assembling this batch (malformed input)
    pub skipped_rows: u64,
}

impl RowBatch {
    /// Creates an empty batch over the given columns.
    pub fn new(index: u64, columns: Arc<[ColumnSpec]>) -> Self {
        Self {
            index,
            columns,
            rows: Vec::new(),
            skipped_rows: 0,
        }
    }

    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Borrowing view of one row keyed by column name, for serialization.
    pub fn row_view(&self, position: usize) -> Option<RowView<'_>> {
        self.rows.get(position).map(|values| RowView {
            columns: &self.columns,
            values,
        })
    }

    /// Iterates rows as name-keyed views.
    pub fn row_views(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(|values| RowView {
            columns: &self.columns,
            values,
        })
    }
}

/// A row serialized as an object whose keys follow the column order.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [ColumnSpec],
    values: &'a [CellValue],
}

impl RowView<'_> {
    /// Looks a value up by column name.
    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .and_then(|i| self.values.get(i))
    }

    /// Column names of this row, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(&column.name, value)?;
        }
        map.end()
    }
}

/// Small, column-projected sample of a source.
#[derive(Debug, Clone)]
pub struct PreviewResult {
    /// Columns used to produce the sample
    pub columns: Vec<ColumnSpec>,
    /// At most the requested number of rows
    pub batch: RowBatch,
}

impl PreviewResult {
    /// Number of sampled rows.
    pub fn row_count(&self) -> usize {
        self.batch.len()
    }
}

impl Serialize for PreviewResult {
    /// Serializes as an array of row objects.
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.batch.len()))?;
        for row in self.batch.row_views() {
            seq.serialize_element(&row)?;
        }
        seq.end()
    }
}

/// Which way a transfer moves data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Export: database table to delimited file
    DatabaseToFile,
    /// Load: delimited file to database table
    FileToDatabase,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DatabaseToFile => f.write_str("database→file"),
            Self::FileToDatabase => f.write_str("file→database"),
        }
    }
}

/// Final status of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStatus {
    Success,
    PartialFailure,
    Failed,
}

/// Outcome of a transfer.
///
/// `record_count` counts rows accepted by the sink, never rows merely read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    pub record_count: u64,
    pub status: TransferStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<ErrorDetail>,
    pub rejected_rows: u64,
    pub failed_batches: u64,
    pub batches: u64,
}

impl TransferResult {
    /// A transfer that failed before moving anything.
    pub fn failed(error: &FlatbridgeError) -> Self {
        Self {
            record_count: 0,
            status: TransferStatus::Failed,
            first_error: Some(ErrorDetail::from(error)),
            rejected_rows: 0,
            failed_batches: 0,
            batches: 0,
        }
    }

    /// True when every produced row reached the sink.
    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }
}

/// Resolves a caller's column selection against the available columns.
///
/// Returns the selected specs in requested order together with their
/// positions in `available`. Fails without partial application: an empty or
/// duplicated selection is a configuration error, an unknown name is
/// `NotFound`.
pub fn project_columns(
    available: &[ColumnSpec],
    requested: &[String],
) -> Result<Vec<(usize, ColumnSpec)>> {
    if requested.is_empty() {
        return Err(FlatbridgeError::configuration(
            "at least one column must be selected",
        ));
    }

    let mut seen = HashSet::with_capacity(requested.len());
    let mut projection = Vec::with_capacity(requested.len());

    for name in requested {
        if !seen.insert(name.as_str()) {
            return Err(FlatbridgeError::configuration(format!(
                "column '{}' selected more than once",
                name
            )));
        }
        let position = available
            .iter()
            .position(|c| &c.name == name)
            .ok_or_else(|| FlatbridgeError::not_found(format!("column '{}'", name)))?;
        projection.push((position, available[position].clone()));
    }

    Ok(projection)
}

/// Checks that column names are unique and non-empty.
pub fn ensure_unique_names(columns: &[ColumnSpec]) -> Result<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for (i, column) in columns.iter().enumerate() {
        if column.name.trim().is_empty() {
            return Err(FlatbridgeError::parse(format!(
                "column {} has an empty name",
                i + 1
            )));
        }
        if !seen.insert(column.name.as_str()) {
            return Err(FlatbridgeError::parse(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
    }
    Ok(())
}
