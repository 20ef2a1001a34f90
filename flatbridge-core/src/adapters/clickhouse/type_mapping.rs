//! ClickHouse native types to column type hints and back.

use crate::models::ColumnType;

/// Strips `Nullable(..)` and `LowCardinality(..)` wrappers, in any nesting.
pub(crate) fn strip_wrappers(native: &str) -> &str {
    let mut current = native.trim();
    loop {
        let inner = ["Nullable(", "LowCardinality("]
            .iter()
            .find_map(|prefix| current.strip_prefix(prefix))
            .and_then(|rest| rest.strip_suffix(')'));
        match inner {
            Some(inner) => current = inner.trim(),
            None => return current,
        }
    }
}

/// Maps a ClickHouse type name to a [`ColumnType`].
///
/// Best effort: composite types (arrays, maps, tuples) and anything else
/// unrecognized become `Unknown`, which is handled as opaque text.
///
/// # Example
/// ```rust
/// use flatbridge_core::adapters::clickhouse::map_clickhouse_type;
/// use flatbridge_core::models::ColumnType;
///
/// assert_eq!(map_clickhouse_type("Nullable(UInt32)"), ColumnType::Int);
/// assert_eq!(map_clickhouse_type("LowCardinality(String)"), ColumnType::String);
/// assert_eq!(map_clickhouse_type("Array(Int8)"), ColumnType::Unknown);
/// ```
pub fn map_clickhouse_type(native: &str) -> ColumnType {
    let base = strip_wrappers(native);
    let name = base.split('(').next().unwrap_or(base).trim();

    match name {
        "Int8" | "Int16" | "Int32" | "Int64" | "Int128" | "Int256" | "UInt8" | "UInt16"
        | "UInt32" | "UInt64" | "UInt128" | "UInt256" => ColumnType::Int,
        "Float32" | "Float64" | "BFloat16" => ColumnType::Float,
        n if n.starts_with("Decimal") => ColumnType::Float,
        "Bool" | "Boolean" => ColumnType::Bool,
        "Date" | "Date32" | "DateTime" | "DateTime64" => ColumnType::DateTime,
        "String" | "FixedString" | "UUID" => ColumnType::String,
        n if n.starts_with("Enum") => ColumnType::String,
        _ => ColumnType::Unknown,
    }
}

/// Column type used when creating a table for a load.
///
/// Every column is nullable so empty file cells can be stored.
pub fn clickhouse_type_for(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Int => "Nullable(Int64)",
        ColumnType::Float => "Nullable(Float64)",
        ColumnType::Bool => "Nullable(Bool)",
        ColumnType::DateTime => "Nullable(DateTime64(3))",
        ColumnType::String | ColumnType::Unknown => "Nullable(String)",
    }
}
