//! Unit tests for the ClickHouse adapter.

use super::connection::{classify_failure, exception_code_in};
use super::query::{
    count_rows, create_table, insert_rows, quote_identifier, select_projection,
    validate_object_name,
};
use super::rows::{decode_cell, decode_row, encode_row, scalar_u64, string_rows};
use super::sink::written_rows;
use super::type_mapping::strip_wrappers;
use super::*;
use crate::adapters::config::ConnectionConfig;
use crate::models::{CellValue, ColumnType};
use chrono::NaiveDate;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::json;

fn specs(columns: &[(&str, ColumnType)]) -> Vec<ColumnSpec> {
    columns
        .iter()
        .map(|(name, ty)| ColumnSpec::new(*name, *ty))
        .collect()
}

#[test]
fn test_type_mapping() {
    assert_eq!(map_clickhouse_type("Int32"), ColumnType::Int);
    assert_eq!(map_clickhouse_type("UInt64"), ColumnType::Int);
    assert_eq!(map_clickhouse_type("Float32"), ColumnType::Float);
    assert_eq!(map_clickhouse_type("Decimal(18, 4)"), ColumnType::Float);
    assert_eq!(map_clickhouse_type("Bool"), ColumnType::Bool);
    assert_eq!(map_clickhouse_type("Date32"), ColumnType::DateTime);
    assert_eq!(
        map_clickhouse_type("DateTime64(3, 'UTC')"),
        ColumnType::DateTime
    );
    assert_eq!(map_clickhouse_type("FixedString(16)"), ColumnType::String);
    assert_eq!(
        map_clickhouse_type("Enum8('a' = 1, 'b' = 2)"),
        ColumnType::String
    );
    assert_eq!(
        map_clickhouse_type("Nullable(LowCardinality(String))"),
        ColumnType::String
    );
    assert_eq!(map_clickhouse_type("Map(String, UInt8)"), ColumnType::Unknown);
    assert_eq!(map_clickhouse_type("IPv4"), ColumnType::Unknown);
}

#[test]
fn test_strip_wrappers_nested() {
    assert_eq!(strip_wrappers("LowCardinality(Nullable(String))"), "String");
    assert_eq!(strip_wrappers("Nullable(Decimal(9, 2))"), "Decimal(9, 2)");
    assert_eq!(strip_wrappers("Array(Nullable(Int8))"), "Array(Nullable(Int8))");
}

#[test]
fn test_created_column_types_are_nullable() {
    assert_eq!(clickhouse_type_for(ColumnType::Int), "Nullable(Int64)");
    assert_eq!(
        clickhouse_type_for(ColumnType::DateTime),
        "Nullable(DateTime64(3))"
    );
    assert_eq!(clickhouse_type_for(ColumnType::Unknown), "Nullable(String)");
}

#[test]
fn test_identifier_quoting() {
    assert_eq!(quote_identifier("events"), "`events`");
    assert_eq!(quote_identifier("we`ird"), "`we\\`ird`");
    assert_eq!(quote_identifier("back\\slash"), "`back\\\\slash`");
}

#[test]
fn test_object_name_validation() {
    assert!(validate_object_name("table", "events_2024").is_ok());
    assert!(validate_object_name("table", "_tmp-load.v2").is_ok());
    assert!(validate_object_name("table", "").is_err());
    assert!(validate_object_name("table", "1events").is_err());
    assert!(validate_object_name("table", "drop table;").is_err());
    assert!(validate_object_name("table", &"x".repeat(256)).is_err());
}

#[test]
fn test_statement_builders() {
    let columns = specs(&[("id", ColumnType::Int), ("name", ColumnType::String)]);

    assert_eq!(
        select_projection("analytics", "events", &columns, None),
        "SELECT `id`, `name` FROM `analytics`.`events` FORMAT JSONCompactEachRow"
    );
    assert_eq!(
        select_projection("analytics", "events", &columns, Some(50)),
        "SELECT `id`, `name` FROM `analytics`.`events` LIMIT 50 FORMAT JSONCompactEachRow"
    );
    assert_eq!(
        count_rows("analytics", "events"),
        "SELECT count() FROM `analytics`.`events` FORMAT JSONCompactEachRow"
    );
    assert_eq!(
        insert_rows("analytics", "events", &columns),
        "INSERT INTO `analytics`.`events` (`id`, `name`) FORMAT JSONCompactEachRow"
    );
    assert_eq!(
        create_table("analytics", "events", &columns),
        "CREATE TABLE IF NOT EXISTS `analytics`.`events` \
         (`id` Nullable(Int64), `name` Nullable(String)) ENGINE = MergeTree ORDER BY tuple()"
    );
}

#[test]
fn test_decode_row_by_column_type() {
    let columns = specs(&[
        ("id", ColumnType::Int),
        ("amount", ColumnType::Float),
        ("seen", ColumnType::DateTime),
        ("ok", ColumnType::Bool),
        ("raw", ColumnType::Unknown),
    ]);
    let row = decode_row(
        r#"[7, 10.5, "2024-03-01 12:30:00.250", 1, ["a","b"]]"#,
        &columns,
    )
    .unwrap();

    let seen = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_milli_opt(12, 30, 0, 250)
        .unwrap();
    assert_eq!(
        row,
        vec![
            CellValue::Int(7),
            CellValue::Float(10.5),
            CellValue::DateTime(seen),
            CellValue::Bool(true),
            CellValue::Text(r#"["a","b"]"#.to_string()),
        ]
    );
}

#[test]
fn test_decode_row_width_mismatch_is_parse_error() {
    let columns = specs(&[("id", ColumnType::Int)]);
    assert!(matches!(
        decode_row("[1, 2]", &columns),
        Err(FlatbridgeError::Parse { .. })
    ));
    assert!(matches!(
        decode_row("not json", &columns),
        Err(FlatbridgeError::Serialization { .. })
    ));
}

#[test]
fn test_decode_cell_keeps_unrepresentable_values_as_text() {
    assert_eq!(
        decode_cell(json!(18446744073709551615u64), ColumnType::Int),
        CellValue::Text("18446744073709551615".to_string())
    );
    assert_eq!(
        decode_cell(json!("12345678901"), ColumnType::Int),
        CellValue::Int(12_345_678_901)
    );
    assert_eq!(
        decode_cell(json!("not a date"), ColumnType::DateTime),
        CellValue::Text("not a date".to_string())
    );
    assert_eq!(decode_cell(json!(null), ColumnType::String), CellValue::Null);
}

#[test]
fn test_encode_row() {
    let mut out = Vec::new();
    encode_row(
        &vec![
            CellValue::Int(1),
            CellValue::Text("a \"quoted\" value".to_string()),
            CellValue::Null,
            CellValue::Bool(false),
        ],
        &mut out,
    )
    .unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "[1,\"a \\\"quoted\\\" value\",null,false]\n"
    );
}

#[test]
fn test_scalar_and_catalog_replies() {
    assert_eq!(scalar_u64("[1]\n").unwrap(), 1);
    assert_eq!(scalar_u64("\n[\"42\"]\n").unwrap(), 42);
    assert!(matches!(
        scalar_u64(""),
        Err(FlatbridgeError::Query { .. })
    ));

    let rows = string_rows("[\"id\",\"UInt64\"]\n[\"name\",\"String\"]\n").unwrap();
    assert_eq!(
        rows,
        vec![
            vec!["id".to_string(), "UInt64".to_string()],
            vec!["name".to_string(), "String".to_string()]
        ]
    );
}

#[test]
fn test_exception_code_extraction() {
    assert_eq!(
        exception_code_in("Code: 60. DB::Exception: Table default.nope does not exist."),
        Some(60)
    );
    assert_eq!(exception_code_in("Code:27. DB::Exception: Cannot parse"), Some(27));
    assert_eq!(exception_code_in("something else"), None);
}

#[test]
fn test_failure_classification() {
    let auth = classify_failure(Some(StatusCode::INTERNAL_SERVER_ERROR), Some(516), "x".into());
    assert_eq!(auth.kind(), crate::error::ErrorKind::Auth);

    let status_auth = classify_failure(Some(StatusCode::UNAUTHORIZED), None, "x".into());
    assert_eq!(status_auth.kind(), crate::error::ErrorKind::Auth);

    let missing = classify_failure(Some(StatusCode::NOT_FOUND), Some(60), "no table".into());
    assert_eq!(missing.kind(), crate::error::ErrorKind::NotFound);

    let bad_row = classify_failure(Some(StatusCode::BAD_REQUEST), Some(27), "bad row".into());
    assert!(bad_row.is_row_level());

    let syntax = classify_failure(Some(StatusCode::BAD_REQUEST), Some(62), "syntax".into());
    assert!(matches!(
        syntax,
        FlatbridgeError::Query { code: Some(62), .. }
    ));

    let unknown = classify_failure(Some(StatusCode::BAD_GATEWAY), None, "proxy".into());
    assert_eq!(unknown.kind(), crate::error::ErrorKind::Query);
}

#[test]
fn test_written_rows_from_summary() {
    let mut headers = HeaderMap::new();
    assert_eq!(written_rows(&headers), None);

    headers.insert(
        "X-ClickHouse-Summary",
        HeaderValue::from_static(r#"{"read_rows":"0","written_rows":"998","written_bytes":"1"}"#),
    );
    assert_eq!(written_rows(&headers), Some(998));

    headers.insert("X-ClickHouse-Summary", HeaderValue::from_static("garbage"));
    assert_eq!(written_rows(&headers), None);
}

#[test]
fn test_client_rejects_invalid_names() {
    let bad_db = ConnectionConfig::new("localhost".to_string()).with_database("my db".to_string());
    assert!(matches!(
        ClickHouseClient::new(bad_db, Credentials::anonymous()),
        Err(FlatbridgeError::Configuration { .. })
    ));

    let good = ConnectionConfig::new("localhost".to_string()).with_table("events".to_string());
    let client = ClickHouseClient::new(good, Credentials::new("etl".into(), Some("s3cret".into())))
        .unwrap();
    let debug = format!("{:?}", client);
    assert!(debug.contains("has_token: true"));
    assert!(!debug.contains("s3cret"));
}

#[test]
fn test_table_required_for_table_operations() {
    let client = ClickHouseClient::new(
        ConnectionConfig::new("localhost".to_string()),
        Credentials::anonymous(),
    )
    .unwrap();
    assert!(matches!(
        client.write_sink(specs(&[("id", ColumnType::Int)])),
        Err(FlatbridgeError::Configuration { .. })
    ));
}
