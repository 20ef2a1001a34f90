//! Delimited file writer.

use super::blocking;
use crate::adapters::BatchSink;
use crate::adapters::config::FileFormat;
use crate::error::FlatbridgeError;
use crate::models::{ColumnSpec, ColumnType, Row, RowBatch};
use crate::Result;
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Synchronous writer emitting one line per row, fields in column order.
///
/// Fields holding the delimiter, the quote character or a line break are
/// quoted. Output is flushed after every [`write_rows`](Self::write_rows)
/// call, so whatever batches were committed survive a crash.
pub struct DelimitedWriter {
    records: csv::Writer<Box<dyn Write + Send>>,
    width: usize,
}

impl std::fmt::Debug for DelimitedWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelimitedWriter")
            .field("width", &self.width)
            .finish()
    }
}

impl DelimitedWriter {
    /// Creates a writer and emits the header line when the format has one.
    pub fn new(
        output: Box<dyn Write + Send>,
        format: FileFormat,
        columns: &[ColumnSpec],
    ) -> Result<Self> {
        format.validate()?;
        if columns.is_empty() {
            return Err(FlatbridgeError::configuration(
                "at least one column must be selected",
            ));
        }

        let mut records = csv::WriterBuilder::new()
            .delimiter(format.delimiter)
            .quote(format.quote)
            .quote_style(csv::QuoteStyle::Necessary)
            .terminator(csv::Terminator::Any(b'\n'))
            .has_headers(false)
            .from_writer(output);

        if format.has_header {
            records.write_record(columns.iter().map(|c| c.name.as_str()))?;
            records
                .flush()
                .map_err(|e| FlatbridgeError::io("flushing header", e))?;
        }

        Ok(Self {
            records,
            width: columns.len(),
        })
    }

    /// Writes rows and flushes. Returns the number of rows written.
    pub fn write_rows(&mut self, rows: &[Row]) -> Result<u64> {
        let mut fields: Vec<String> = Vec::with_capacity(self.width);
        for row in rows {
            if row.len() != self.width {
                return Err(FlatbridgeError::validation(format!(
                    "row has {} values, expected {}",
                    row.len(),
                    self.width
                )));
            }
            fields.clear();
            fields.extend(row.iter().map(|cell| cell.to_text()));
            self.records.write_record(&fields)?;
        }
        self.flush()?;
        Ok(rows.len() as u64)
    }

    /// Flushes buffered output to the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.records
            .flush()
            .map_err(|e| FlatbridgeError::io("flushing delimited output", e))
    }
}

/// Batch sink writing to a delimited file.
///
/// All columns are textual on this side, so coercion renders every typed
/// value as text before it reaches the writer.
pub struct FileSink {
    writer: Option<DelimitedWriter>,
    label: String,
    columns: Vec<ColumnSpec>,
}

impl std::fmt::Debug for FileSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSink")
            .field("label", &self.label)
            .field("columns", &self.columns)
            .finish()
    }
}

impl FileSink {
    /// Creates (or truncates) `path` and writes the header.
    pub async fn create(path: &Path, format: FileFormat, columns: &[ColumnSpec]) -> Result<Self> {
        let path_buf = path.to_path_buf();
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        blocking("creating delimited file", move || {
            let file = File::create(&path_buf).map_err(|e| {
                FlatbridgeError::io(format!("creating {}", path_buf.display()), e)
            })?;
            let output: Box<dyn Write + Send> = Box::new(BufWriter::with_capacity(64 * 1024, file));
            Self::from_writer(output, path_buf.display().to_string(), format, &names)
        })
        .await?
    }

    /// Builds a sink over an arbitrary writer.
    pub fn from_writer(
        output: Box<dyn Write + Send>,
        label: String,
        format: FileFormat,
        names: &[String],
    ) -> Result<Self> {
        let columns: Vec<ColumnSpec> = names
            .iter()
            .map(|name| ColumnSpec::new(name.clone(), ColumnType::String))
            .collect();
        let writer = DelimitedWriter::new(output, format, &columns)?;
        tracing::info!("Writing {} columns to {}", columns.len(), label);
        Ok(Self {
            writer: Some(writer),
            label,
            columns,
        })
    }

    async fn with_writer<T, F>(&mut self, context: &str, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DelimitedWriter) -> Result<T> + Send + 'static,
    {
        let mut writer = self.writer.take().ok_or_else(|| {
            FlatbridgeError::io(
                format!("{} can no longer be written", self.label),
                std::io::Error::from(std::io::ErrorKind::BrokenPipe),
            )
        })?;
        let (writer, outcome) = blocking(context, move || {
            let outcome = task(&mut writer);
            (writer, outcome)
        })
        .await?;
        self.writer = Some(writer);
        outcome
    }
}

#[async_trait]
impl BatchSink for FileSink {
    fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    async fn consume_batch(&mut self, batch: RowBatch) -> Result<u64> {
        let index = batch.index;
        let written = self
            .with_writer("writing delimited file", move |writer| {
                writer.write_rows(&batch.rows)
            })
            .await?;
        tracing::debug!("Wrote batch {} to {} ({} rows)", index, self.label, written);
        Ok(written)
    }

    async fn finish(&mut self) -> Result<()> {
        self.with_writer("flushing delimited file", |writer| writer.flush())
            .await
    }
}
