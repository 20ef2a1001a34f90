//! SQL text for the statements the adapter issues.
//!
//! Identifiers are always back-quoted. Catalog lookups bind values through
//! server-side query parameters instead of string interpolation.

use super::type_mapping::clickhouse_type_for;
use crate::error::FlatbridgeError;
use crate::models::ColumnSpec;
use crate::Result;
use std::sync::OnceLock;

/// Quotes an identifier with backticks, escaping backslashes and backticks.
pub(crate) fn quote_identifier(identifier: &str) -> String {
    let mut quoted = String::with_capacity(identifier.len() + 2);
    quoted.push('`');
    for ch in identifier.chars() {
        if matches!(ch, '`' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('`');
    quoted
}

fn object_name_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_$.\-]{0,254}$")
            .expect("Invalid object name pattern")
    })
}

/// Checks a database or table name before it is placed in a statement.
///
/// Quoting already makes any name safe; this catches typos and control
/// characters early with a clear configuration error.
pub(crate) fn validate_object_name(kind: &str, name: &str) -> Result<()> {
    if object_name_pattern().is_match(name) {
        Ok(())
    } else {
        Err(FlatbridgeError::configuration(format!(
            "invalid {} name '{}'",
            kind, name
        )))
    }
}

/// Fully qualified, quoted table reference.
pub(crate) fn qualified_table(database: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(database), quote_identifier(table))
}

fn column_list(columns: &[ColumnSpec]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) const LIST_TABLES: &str = "SELECT name FROM system.tables \
     WHERE database = {db:String} AND NOT is_temporary \
     ORDER BY name FORMAT JSONCompactEachRow";

pub(crate) const LIST_COLUMNS: &str = "SELECT name, type FROM system.columns \
     WHERE database = {db:String} AND table = {tbl:String} \
     ORDER BY position FORMAT JSONCompactEachRow";

pub(crate) const TABLE_EXISTS: &str = "SELECT count() FROM system.tables \
     WHERE database = {db:String} AND name = {tbl:String} FORMAT JSONCompactEachRow";

/// Streaming projection of a table.
pub(crate) fn select_projection(
    database: &str,
    table: &str,
    columns: &[ColumnSpec],
    limit: Option<usize>,
) -> String {
    let mut sql = format!(
        "SELECT {} FROM {}",
        column_list(columns),
        qualified_table(database, table)
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql.push_str(" FORMAT JSONCompactEachRow");
    sql
}

pub(crate) fn count_rows(database: &str, table: &str) -> String {
    format!(
        "SELECT count() FROM {} FORMAT JSONCompactEachRow",
        qualified_table(database, table)
    )
}

/// Insert statement; the row data follows in the request body.
pub(crate) fn insert_rows(database: &str, table: &str, columns: &[ColumnSpec]) -> String {
    format!(
        "INSERT INTO {} ({}) FORMAT JSONCompactEachRow",
        qualified_table(database, table),
        column_list(columns)
    )
}

pub(crate) fn create_table(database: &str, table: &str, columns: &[ColumnSpec]) -> String {
    let definitions = columns
        .iter()
        .map(|c| {
            format!(
                "{} {}",
                quote_identifier(&c.name),
                clickhouse_type_for(c.source_type)
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE = MergeTree ORDER BY tuple()",
        qualified_table(database, table),
        definitions
    )
}
