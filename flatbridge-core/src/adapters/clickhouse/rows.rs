//! `JSONCompactEachRow` decoding and encoding.
//!
//! Each line is a JSON array holding one value per selected column, so rows
//! map positionally onto the active [`ColumnSpec`] sequence.

use crate::error::FlatbridgeError;
use crate::models::{CellValue, ColumnSpec, ColumnType, Row, parse_datetime};
use crate::Result;
use serde_json::Value as JsonValue;

/// Decodes one response line into a row typed after `columns`.
///
/// Values the hint cannot represent (a `UInt64` above `i64::MAX`, nested
/// arrays) are kept as text rather than dropped.
pub(crate) fn decode_row(line: &str, columns: &[ColumnSpec]) -> Result<Row> {
    let values: Vec<JsonValue> = serde_json::from_str(line)
        .map_err(|e| FlatbridgeError::serialization("decoding result row", e))?;

    if values.len() != columns.len() {
        return Err(FlatbridgeError::parse(format!(
            "result row has {} values, expected {}",
            values.len(),
            columns.len()
        )));
    }

    Ok(values
        .into_iter()
        .zip(columns)
        .map(|(value, column)| decode_cell(value, column.source_type))
        .collect())
}

pub(crate) fn decode_cell(value: JsonValue, hint: ColumnType) -> CellValue {
    match (value, hint) {
        (JsonValue::Null, _) => CellValue::Null,
        (JsonValue::Number(n), ColumnType::Int) => match n.as_i64() {
            Some(v) => CellValue::Int(v),
            None => CellValue::Text(n.to_string()),
        },
        (JsonValue::Number(n), ColumnType::Float) => match n.as_f64() {
            Some(v) => CellValue::Float(v),
            None => CellValue::Text(n.to_string()),
        },
        (JsonValue::String(s), ColumnType::Int) => match s.parse::<i64>() {
            Ok(v) => CellValue::Int(v),
            Err(_) => CellValue::Text(s),
        },
        (JsonValue::String(s), ColumnType::Float) => match s.parse::<f64>() {
            Ok(v) => CellValue::Float(v),
            Err(_) => CellValue::Text(s),
        },
        (JsonValue::Bool(b), _) => CellValue::Bool(b),
        (JsonValue::Number(n), ColumnType::Bool) => CellValue::Bool(n.as_u64() != Some(0)),
        (JsonValue::String(s), ColumnType::DateTime) => match parse_datetime(&s) {
            Some(ts) => CellValue::DateTime(ts),
            None => CellValue::Text(s),
        },
        (JsonValue::String(s), _) => CellValue::Text(s),
        (JsonValue::Number(n), _) => match n.as_i64() {
            Some(v) => CellValue::Int(v),
            None => n.as_f64().map_or_else(|| CellValue::Text(n.to_string()), CellValue::Float),
        },
        (other, _) => CellValue::Text(other.to_string()),
    }
}

/// Appends one row as a `JSONCompactEachRow` line.
pub(crate) fn encode_row(row: &Row, out: &mut Vec<u8>) -> Result<()> {
    serde_json::to_writer(&mut *out, row)
        .map_err(|e| FlatbridgeError::serialization("encoding insert row", e))?;
    out.push(b'\n');
    Ok(())
}

/// Extracts the single value of a one-column, one-row catalog reply.
pub(crate) fn scalar_u64(body: &str) -> Result<u64> {
    let line = body
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| FlatbridgeError::query_failed("empty reply to scalar query", None))?;
    let values: Vec<JsonValue> = serde_json::from_str(line)
        .map_err(|e| FlatbridgeError::serialization("decoding scalar reply", e))?;

    match values.first() {
        Some(JsonValue::Number(n)) => n.as_u64(),
        Some(JsonValue::String(s)) => s.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| FlatbridgeError::query_failed(format!("unexpected scalar reply {}", line), None))
}

/// Decodes every line of a small catalog reply into string tuples.
pub(crate) fn string_rows(body: &str) -> Result<Vec<Vec<String>>> {
    body.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let values: Vec<JsonValue> = serde_json::from_str(line)
                .map_err(|e| FlatbridgeError::serialization("decoding catalog row", e))?;
            Ok(values
                .into_iter()
                .map(|v| match v {
                    JsonValue::String(s) => s,
                    other => other.to_string(),
                })
                .collect())
        })
        .collect()
}
