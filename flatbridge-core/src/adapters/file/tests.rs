//! Unit tests for the delimited file adapter.

use super::*;
use crate::adapters::config::FileFormat;
use crate::adapters::{BatchSink, BatchSource};
use crate::error::FlatbridgeError;
use crate::models::{CellValue, ColumnSpec, ColumnType, RowBatch};
use std::io::Cursor;
use std::sync::Arc;

fn reader_over(text: &str, format: FileFormat) -> crate::Result<DelimitedReader> {
    DelimitedReader::new(Box::new(Cursor::new(text.as_bytes().to_vec())), format)
}

fn source_over(text: &str, selected: Option<&[String]>, batch_size: usize) -> FileSource {
    FileSource::from_reader(
        Box::new(Cursor::new(text.as_bytes().to_vec())),
        "memory".to_string(),
        FileFormat::default(),
        selected,
        batch_size,
    )
    .unwrap()
}

fn texts(row: &[CellValue]) -> Vec<String> {
    row.iter().map(CellValue::to_text).collect()
}

#[test]
fn test_open_columns_sniffs_first_row() {
    let reader = reader_over(
        "id,name,amount,seen,active\n1,Alice,10.5,2024-01-01 09:00:00,true\n2,Bob,x,y,z\n",
        FileFormat::default(),
    )
    .unwrap();

    let types: Vec<ColumnType> = reader.columns().iter().map(|c| c.source_type).collect();
    assert_eq!(
        types,
        vec![
            ColumnType::Int,
            ColumnType::String,
            ColumnType::Float,
            ColumnType::DateTime,
            ColumnType::Bool
        ]
    );
    assert_eq!(reader.columns()[1].name, "name");
}

#[test]
fn test_header_only_file_has_unknown_types() {
    let reader = reader_over("a,b\n", FileFormat::default()).unwrap();
    assert_eq!(reader.columns().len(), 2);
    assert!(
        reader
            .columns()
            .iter()
            .all(|c| c.source_type == ColumnType::Unknown)
    );
}

#[test]
fn test_empty_file_is_parse_error() {
    let result = reader_over("", FileFormat::default());
    assert!(matches!(result, Err(FlatbridgeError::Parse { .. })));
}

#[test]
fn test_duplicate_header_is_parse_error() {
    let result = reader_over("id,id\n1,2\n", FileFormat::default());
    assert!(matches!(result, Err(FlatbridgeError::Parse { .. })));
}

#[test]
fn test_headerless_file_gets_generated_names() {
    let mut reader = reader_over("1;x\n2;y\n", FileFormat::default().with_delimiter(b';').with_header(false))
        .unwrap();
    let names: Vec<&str> = reader.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["column_1", "column_2"]);

    let (rows, skipped) = reader.read_rows(&[0, 1], 10).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(skipped, 0);
    assert_eq!(texts(&rows[0]), vec!["1", "x"]);
}

#[test]
fn test_quotes_crlf_and_trailing_newline() {
    let text = "id,comment\r\n1,\"hello, world\"\r\n2,\"multi\nline\"\r\n\r\n";
    let mut reader = reader_over(text, FileFormat::default()).unwrap();
    let (rows, skipped) = reader.read_rows(&[0, 1], 10).unwrap();

    assert_eq!(skipped, 0);
    assert_eq!(rows.len(), 2);
    assert_eq!(texts(&rows[0]), vec!["1", "hello, world"]);
    assert_eq!(texts(&rows[1]), vec!["2", "multi\nline"]);
}

#[test]
fn test_malformed_rows_are_skipped_and_counted() {
    let text = "a,b\n1,2\n3\n4,5,6\n7,8\n";
    let mut reader = reader_over(text, FileFormat::default()).unwrap();
    let (rows, skipped) = reader.read_rows(&[0, 1], 10).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(skipped, 2);
    assert_eq!(texts(&rows[1]), vec!["7", "8"]);
}

#[test]
fn test_malformed_rows_before_first_data_row_are_counted() {
    let text = "a,b\nbroken\n1,2\n";
    let mut reader = reader_over(text, FileFormat::default()).unwrap();
    assert_eq!(reader.columns()[0].source_type, ColumnType::Int);

    let (rows, skipped) = reader.read_rows(&[0, 1], 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(skipped, 1);
}

#[tokio::test]
async fn test_file_source_batches_and_projection() {
    let selected = vec!["c".to_string(), "a".to_string()];
    let mut source = source_over("a,b,c\n1,2,3\n4,5,6\n7,8,9\n", Some(&selected), 2);

    let names: Vec<&str> = source.columns().iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["c", "a"]);

    let first = source.next_batch().await.unwrap().unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(first.len(), 2);
    assert_eq!(texts(&first.rows[0]), vec!["3", "1"]);

    let second = source.next_batch().await.unwrap().unwrap();
    assert_eq!(second.index, 1);
    assert_eq!(second.len(), 1);
    assert_eq!(texts(&second.rows[0]), vec!["9", "7"]);

    assert!(source.next_batch().await.unwrap().is_none());
    assert!(source.next_batch().await.unwrap().is_none());
}

#[tokio::test]
async fn test_file_source_unknown_column_fails_whole_projection() {
    let selected = vec!["a".to_string(), "missing".to_string()];
    let result = FileSource::from_reader(
        Box::new(Cursor::new(b"a,b\n1,2\n".to_vec())),
        "memory".to_string(),
        FileFormat::default(),
        Some(&selected),
        10,
    );
    assert!(matches!(result, Err(FlatbridgeError::NotFound { .. })));
}

#[tokio::test]
async fn test_file_source_reports_trailing_skips() {
    let mut source = source_over("a,b\n1,2\n3,4\nbad\n", None, 2);

    let first = source.next_batch().await.unwrap().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first.skipped_rows, 0);

    let trailing = source.next_batch().await.unwrap().unwrap();
    assert!(trailing.is_empty());
    assert_eq!(trailing.skipped_rows, 1);

    assert!(source.next_batch().await.unwrap().is_none());
}

#[tokio::test]
async fn test_open_columns_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let result = open_columns(&dir.path().join("absent.csv"), FileFormat::default()).await;
    assert!(matches!(result, Err(FlatbridgeError::NotFound { .. })));
}

#[tokio::test]
async fn test_open_columns_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::write(&path, "id,name\n1,Alice\n").unwrap();

    let first = open_columns(&path, FileFormat::default()).await.unwrap();
    let second = open_columns(&path, FileFormat::default()).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            ColumnSpec::new("id", ColumnType::Int),
            ColumnSpec::new("name", ColumnType::String)
        ]
    );
}

#[tokio::test]
async fn test_file_sink_writes_header_quotes_and_flushes_per_batch() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    let columns = vec![
        ColumnSpec::new("id", ColumnType::Int),
        ColumnSpec::new("note", ColumnType::String),
    ];
    let mut sink = FileSink::create(&path, FileFormat::default(), &columns)
        .await
        .unwrap();
    assert!(sink.columns().iter().all(|c| c.source_type == ColumnType::String));

    let shared: Arc<[ColumnSpec]> = columns.into();
    let mut batch = RowBatch::new(0, Arc::clone(&shared));
    batch.rows.push(vec![
        CellValue::Text("1".into()),
        CellValue::Text("a,b".into()),
    ]);
    batch
        .rows
        .push(vec![CellValue::Text("2".into()), CellValue::Null]);

    assert_eq!(sink.consume_batch(batch).await.unwrap(), 2);

    // Visible before finish() because every batch is flushed.
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, "id,note\n1,\"a,b\"\n2,\n");

    sink.finish().await.unwrap();
}

#[test]
fn test_writer_rejects_row_of_wrong_width() {
    let columns = vec![ColumnSpec::new("only", ColumnType::String)];
    let mut writer =
        DelimitedWriter::new(Box::new(std::io::sink()), FileFormat::default(), &columns).unwrap();
    let result = writer.write_rows(&[vec![CellValue::Int(1), CellValue::Int(2)]]);
    assert!(matches!(result, Err(FlatbridgeError::Validation { .. })));
}

#[test]
fn test_writer_tab_delimited_without_header() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.tsv");
    let columns = vec![
        ColumnSpec::new("a", ColumnType::String),
        ColumnSpec::new("b", ColumnType::String),
    ];
    {
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = DelimitedWriter::new(
            Box::new(file),
            FileFormat::default().with_delimiter(b'\t').with_header(false),
            &columns,
        )
        .unwrap();
        writer
            .write_rows(&[vec![CellValue::Int(7), CellValue::Bool(false)]])
            .unwrap();
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "7\tfalse\n");
}
