//! Value coercion toward the sink's column types.
//!
//! Coercion works row by row: a cell that cannot be converted rejects its
//! row, the remaining rows of the batch go through.

use crate::error::FlatbridgeError;
use crate::models::{CellValue, ColumnSpec, ColumnType, RowBatch, parse_datetime};
use std::sync::Arc;

/// Converts one value to `target`.
///
/// Returns `None` when the value has no faithful representation in the
/// target type. Empty text becomes `Null` for every typed target.
pub fn coerce_cell(value: CellValue, target: ColumnType) -> Option<CellValue> {
    use CellValue as V;

    match (target, value) {
        (_, V::Null) => Some(V::Null),
        (ColumnType::String | ColumnType::Unknown, V::Text(s)) => Some(V::Text(s)),
        (ColumnType::String | ColumnType::Unknown, other) => Some(V::Text(other.to_text())),
        (_, V::Text(s)) if s.trim().is_empty() => Some(V::Null),

        (ColumnType::Int, V::Int(v)) => Some(V::Int(v)),
        (ColumnType::Int, V::Float(f)) => float_to_int(f).map(V::Int),
        (ColumnType::Int, V::Bool(b)) => Some(V::Int(i64::from(b))),
        (ColumnType::Int, V::Text(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(float_to_int))
                .map(V::Int)
        }

        (ColumnType::Float, V::Float(f)) => Some(V::Float(f)),
        (ColumnType::Float, V::Int(v)) => Some(V::Float(v as f64)),
        (ColumnType::Float, V::Text(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(V::Float),

        (ColumnType::Bool, V::Bool(b)) => Some(V::Bool(b)),
        (ColumnType::Bool, V::Int(0)) => Some(V::Bool(false)),
        (ColumnType::Bool, V::Int(1)) => Some(V::Bool(true)),
        (ColumnType::Bool, V::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(V::Bool(true)),
            "false" | "0" => Some(V::Bool(false)),
            _ => None,
        },

        (ColumnType::DateTime, V::DateTime(ts)) => Some(V::DateTime(ts)),
        (ColumnType::DateTime, V::Text(s)) => parse_datetime(&s).map(V::DateTime),

        _ => None,
    }
}

fn float_to_int(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    (f.is_finite() && f.fract() == 0.0 && f >= -LIMIT && f < LIMIT).then_some(f as i64)
}

/// A batch after coercion, plus what was dropped from it.
#[derive(Debug)]
pub struct CoercedBatch {
    /// Surviving rows, now carrying the target columns
    pub batch: RowBatch,
    /// Rows dropped because a cell could not be converted
    pub rejected: u64,
    /// Description of the first dropped row
    pub first_rejection: Option<FlatbridgeError>,
}

/// Coerces every row of `batch` to `targets`.
///
/// `targets` must name the same columns as the batch, in the same order.
pub fn coerce_batch(batch: RowBatch, targets: &Arc<[ColumnSpec]>) -> CoercedBatch {
    let RowBatch {
        index,
        columns,
        rows,
        skipped_rows,
    } = batch;

    let mut out = RowBatch::new(index, Arc::clone(targets));
    out.skipped_rows = skipped_rows;
    out.rows.reserve(rows.len());
    let mut rejected = 0;
    let mut first_rejection = None;

    for (position, row) in rows.into_iter().enumerate() {
        let mut converted = Vec::with_capacity(row.len());
        let mut failure = None;

        for ((value, target), source) in row.into_iter().zip(targets.iter()).zip(columns.iter()) {
            let shown = describe(&value);
            match coerce_cell(value, target.source_type) {
                Some(v) => converted.push(v),
                None => {
                    failure = Some(format!(
                        "batch {} row {}: column '{}' value {} is not a valid {}",
                        index,
                        position + 1,
                        source.name,
                        shown,
                        target.source_type
                    ));
                    break;
                }
            }
        }

        match failure {
            None => out.rows.push(converted),
            Some(reason) => {
                rejected += 1;
                tracing::debug!("Rejecting {}", reason);
                if first_rejection.is_none() {
                    first_rejection = Some(FlatbridgeError::validation(reason));
                }
            }
        }
    }

    CoercedBatch {
        batch: out,
        rejected,
        first_rejection,
    }
}

fn describe(value: &CellValue) -> String {
    const MAX: usize = 64;
    let text = value.to_text();
    if text.chars().count() <= MAX {
        format!("'{}'", text)
    } else {
        format!("'{}...'", text.chars().take(MAX).collect::<String>())
    }
}
