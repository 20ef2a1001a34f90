//! Single-row type sniffing for delimited file columns.

use crate::models::{ColumnType, parse_datetime};

/// Guesses a column type from one raw cell.
///
/// Order matters: integers before floats, so `42` is an `Int`; timestamps
/// before booleans. Empty cells give no evidence and stay `Unknown`.
///
/// # Example
/// ```rust
/// use flatbridge_core::adapters::file::sniff_value;
/// use flatbridge_core::models::ColumnType;
///
/// assert_eq!(sniff_value("10"), ColumnType::Int);
/// assert_eq!(sniff_value("10.5"), ColumnType::Float);
/// assert_eq!(sniff_value("2024-02-29T12:00:00"), ColumnType::DateTime);
/// assert_eq!(sniff_value("FALSE"), ColumnType::Bool);
/// assert_eq!(sniff_value("Alice"), ColumnType::String);
/// ```
pub fn sniff_value(raw: &str) -> ColumnType {
    let value = raw.trim();
    if value.is_empty() {
        return ColumnType::Unknown;
    }
    if value.parse::<i64>().is_ok() {
        return ColumnType::Int;
    }
    if value.parse::<f64>().is_ok_and(f64::is_finite) && looks_numeric(value) {
        return ColumnType::Float;
    }
    if parse_datetime(value).is_some() {
        return ColumnType::DateTime;
    }
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        return ColumnType::Bool;
    }
    ColumnType::String
}

/// `f64::from_str` also accepts words such as `inf` and `NaN`; those are
/// text in a data file.
fn looks_numeric(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

/// Applies [`sniff_value`] to each cell of the first data record.
///
/// Columns beyond the record's length stay `Unknown`.
pub fn sniff_record<'a>(width: usize, cells: impl IntoIterator<Item = &'a str>) -> Vec<ColumnType> {
    let mut types = vec![ColumnType::Unknown; width];
    for (slot, cell) in types.iter_mut().zip(cells) {
        *slot = sniff_value(cell);
    }
    types
}
