//! Streaming delimited file reader.
//!
//! Parsing is synchronous (the `csv` crate); [`FileSource`] moves the reader
//! onto the blocking pool for each batch so the async runtime never stalls
//! on disk reads.

use super::blocking;
use super::inference::sniff_record;
use crate::adapters::BatchSource;
use crate::adapters::config::FileFormat;
use crate::error::FlatbridgeError;
use crate::models::{CellValue, ColumnSpec, Row, RowBatch, ensure_unique_names, project_columns};
use crate::Result;
use async_trait::async_trait;
use csv::StringRecord;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Synchronous reader over any byte source.
///
/// On construction it reads the header record and the first well-formed
/// data record, which fixes every column's type. That record is kept and
/// returned first by [`read_rows`](Self::read_rows).
pub struct DelimitedReader {
    records: csv::Reader<Box<dyn Read + Send>>,
    columns: Vec<ColumnSpec>,
    pending: Option<StringRecord>,
    carried_skips: u64,
    scratch: StringRecord,
}

impl std::fmt::Debug for DelimitedReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelimitedReader")
            .field("columns", &self.columns)
            .field("has_pending", &self.pending.is_some())
            .finish()
    }
}

/// Outcome of reading one record.
enum NextRecord {
    Row,
    Malformed,
    End,
}

impl DelimitedReader {
    /// Opens a reader and determines the columns.
    ///
    /// # Errors
    /// `Parse` for an empty input, duplicate or blank header names, or an
    /// unreadable header.
    pub fn new(input: Box<dyn Read + Send>, format: FileFormat) -> Result<Self> {
        format.validate()?;
        let records = csv::ReaderBuilder::new()
            .delimiter(format.delimiter)
            .quote(format.quote)
            .has_headers(false)
            .flexible(true)
            .from_reader(input);

        let mut reader = Self {
            records,
            columns: Vec::new(),
            pending: None,
            carried_skips: 0,
            scratch: StringRecord::new(),
        };

        let mut first = StringRecord::new();
        if !reader.records.read_record(&mut first)? {
            return Err(FlatbridgeError::parse("file is empty, expected a header row"));
        }

        let names: Vec<String> = if format.has_header {
            first.iter().map(|name| name.trim().to_string()).collect()
        } else {
            (1..=first.len()).map(|i| format!("column_{}", i)).collect()
        };
        let width = names.len();

        if !format.has_header {
            reader.pending = Some(first);
        } else {
            reader.pending = reader.next_well_formed(width)?;
        }

        let types = match &reader.pending {
            Some(record) => sniff_record(width, record.iter()),
            None => sniff_record(width, std::iter::empty()),
        };

        reader.columns = names
            .into_iter()
            .zip(types)
            .map(|(name, source_type)| ColumnSpec::new(name, source_type))
            .collect();
        ensure_unique_names(&reader.columns)?;

        tracing::debug!(
            "Opened delimited input with {} columns: {:?}",
            reader.columns.len(),
            reader.columns.iter().map(|c| &c.name).collect::<Vec<_>>()
        );
        Ok(reader)
    }

    /// Columns with their sniffed types, in file order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    fn read_next(&mut self, width: usize) -> Result<NextRecord> {
        match self.records.read_record(&mut self.scratch) {
            Ok(false) => Ok(NextRecord::End),
            Ok(true) if self.scratch.len() == width => Ok(NextRecord::Row),
            Ok(true) => {
                let line = self.scratch.position().map_or(0, |p| p.line());
                tracing::warn!(
                    "Skipping line {}: {} fields, expected {}",
                    line,
                    self.scratch.len(),
                    width
                );
                Ok(NextRecord::Malformed)
            }
            Err(e) if matches!(e.kind(), csv::ErrorKind::Utf8 { .. }) => {
                tracing::warn!("Skipping record with invalid UTF-8: {}", e);
                Ok(NextRecord::Malformed)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn next_well_formed(&mut self, width: usize) -> Result<Option<StringRecord>> {
        loop {
            match self.read_next(width)? {
                NextRecord::Row => return Ok(Some(self.scratch.clone())),
                NextRecord::Malformed => self.carried_skips += 1,
                NextRecord::End => return Ok(None),
            }
        }
    }

    /// Reads up to `max_rows` rows, keeping only the `projection` positions.
    ///
    /// Returns the rows plus the number of malformed records skipped on the
    /// way. An empty row vector with zero skips means the input is done.
    pub fn read_rows(&mut self, projection: &[usize], max_rows: usize) -> Result<(Vec<Row>, u64)> {
        let width = self.columns.len();
        let mut rows = Vec::with_capacity(max_rows.min(4_096));
        let mut skipped = std::mem::take(&mut self.carried_skips);

        if let Some(record) = self.pending.take() {
            rows.push(project_record(&record, projection));
        }

        while rows.len() < max_rows {
            match self.read_next(width)? {
                NextRecord::Row => rows.push(project_record(&self.scratch, projection)),
                NextRecord::Malformed => skipped += 1,
                NextRecord::End => break,
            }
        }

        Ok((rows, skipped))
    }
}

fn project_record(record: &StringRecord, projection: &[usize]) -> Row {
    projection
        .iter()
        .map(|&i| CellValue::Text(record.get(i).unwrap_or_default().to_string()))
        .collect()
}

fn open_file(path: &Path) -> Result<Box<dyn Read + Send>> {
    match File::open(path) {
        Ok(file) => Ok(Box::new(BufReader::with_capacity(64 * 1024, file))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FlatbridgeError::not_found(format!("file {}", path.display())))
        }
        Err(e) => Err(FlatbridgeError::io(
            format!("opening {}", path.display()),
            e,
        )),
    }
}

/// Reads only the header (and first data row) of a file.
///
/// Repeated calls on an unchanged file return the same sequence.
pub async fn open_columns(path: &Path, format: FileFormat) -> Result<Vec<ColumnSpec>> {
    let path = path.to_path_buf();
    blocking("reading file header", move || {
        let reader = DelimitedReader::new(open_file(&path)?, format)?;
        Ok(reader.columns)
    })
    .await?
}

/// Lazy, finite, non-restartable batch sequence over a delimited file.
pub struct FileSource {
    reader: Option<DelimitedReader>,
    label: String,
    projection: Arc<[usize]>,
    columns: Arc<[ColumnSpec]>,
    batch_size: usize,
    next_index: u64,
    exhausted: bool,
}

impl std::fmt::Debug for FileSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSource")
            .field("label", &self.label)
            .field("columns", &self.columns)
            .field("batch_size", &self.batch_size)
            .field("next_index", &self.next_index)
            .finish()
    }
}

impl FileSource {
    /// Opens a file and resolves the column selection.
    ///
    /// `selected` of `None` keeps every column in file order.
    pub async fn open(
        path: &Path,
        format: FileFormat,
        selected: Option<Vec<String>>,
        batch_size: usize,
    ) -> Result<Self> {
        let path_buf: PathBuf = path.to_path_buf();
        blocking("opening delimited file", move || {
            let input = open_file(&path_buf)?;
            Self::from_reader(
                input,
                path_buf.display().to_string(),
                format,
                selected.as_deref(),
                batch_size,
            )
        })
        .await?
    }

    /// Builds a source over an arbitrary byte stream.
    pub fn from_reader(
        input: Box<dyn Read + Send>,
        label: String,
        format: FileFormat,
        selected: Option<&[String]>,
        batch_size: usize,
    ) -> Result<Self> {
        let reader = DelimitedReader::new(input, format)?;
        let (projection, columns): (Vec<usize>, Vec<ColumnSpec>) = match selected {
            Some(names) => project_columns(reader.columns(), names)?.into_iter().unzip(),
            None => reader.columns().iter().cloned().enumerate().unzip(),
        };

        tracing::info!(
            "Reading {} of {} columns from {}",
            columns.len(),
            reader.columns().len(),
            label
        );

        Ok(Self {
            reader: Some(reader),
            label,
            projection: projection.into(),
            columns: columns.into(),
            batch_size: batch_size.max(1),
            next_index: 0,
            exhausted: false,
        })
    }
}

#[async_trait]
impl BatchSource for FileSource {
    fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    async fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        if self.exhausted {
            return Ok(None);
        }

        let mut reader = self.reader.take().ok_or_else(|| {
            FlatbridgeError::parse(format!("{} can no longer be read", self.label))
        })?;
        let projection = Arc::clone(&self.projection);
        let batch_size = self.batch_size;

        let (reader, outcome) = blocking("reading delimited file", move || {
            let outcome = reader.read_rows(&projection, batch_size);
            (reader, outcome)
        })
        .await?;
        self.reader = Some(reader);

        let (rows, skipped) = match outcome {
            Ok(read) => read,
            Err(e) => {
                self.exhausted = true;
                return Err(e);
            }
        };

        if rows.len() < batch_size {
            self.exhausted = true;
        }
        if rows.is_empty() && skipped == 0 {
            return Ok(None);
        }

        let mut batch = RowBatch::new(self.next_index, Arc::clone(&self.columns));
        batch.rows = rows;
        batch.skipped_rows = skipped;
        self.next_index += 1;

        tracing::debug!(
            "Read batch {} from {} ({} rows, {} skipped)",
            batch.index,
            self.label,
            batch.len(),
            skipped
        );
        Ok(Some(batch))
    }
}
