//! Streaming table reader.

use super::connection::{classify_failure, exception_code_in};
use super::{ClickHouseClient, rows};
use crate::adapters::BatchSource;
use crate::error::{FlatbridgeError, redact_secret};
use crate::models::{ColumnSpec, RowBatch};
use crate::Result;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::time::Duration;

/// Lazy, finite, non-restartable sequence of batches from one `SELECT`.
///
/// The response body is consumed only as batches are requested, so memory
/// stays proportional to the batch size. Dropping the source closes the
/// connection.
pub struct DatabaseSource {
    client: ClickHouseClient,
    stream: Option<BoxStream<'static, reqwest::Result<Bytes>>>,
    buffer: BytesMut,
    columns: Arc<[ColumnSpec]>,
    batch_size: usize,
    next_index: u64,
    total_estimate: Option<u64>,
    idle_timeout: Duration,
}

impl std::fmt::Debug for DatabaseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSource")
            .field("table", &self.client.config.table)
            .field("columns", &self.columns.len())
            .field("batch_size", &self.batch_size)
            .field("next_index", &self.next_index)
            .field("open", &self.stream.is_some())
            .finish()
    }
}

impl DatabaseSource {
    pub(super) async fn open(
        client: &ClickHouseClient,
        sql: &str,
        columns: Vec<ColumnSpec>,
        batch_size: usize,
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(FlatbridgeError::configuration(
                "at least one column must be selected",
            ));
        }

        let http = client.http_client()?;
        let builder = client
            .request(&http, None)
            .query(&[
                ("output_format_json_quote_64bit_integers", "0"),
                ("output_format_json_quote_decimals", "0"),
            ])
            .body(sql.to_string());
        let response = client.send(builder, "reading rows").await?;

        tracing::debug!(
            "Streaming {} columns from {} in batches of {}",
            columns.len(),
            client.config,
            batch_size
        );

        Ok(Self {
            client: client.clone(),
            stream: Some(response.bytes_stream().boxed()),
            buffer: BytesMut::new(),
            columns: columns.into(),
            batch_size: batch_size.max(1),
            next_index: 0,
            total_estimate: None,
            idle_timeout: client.config.query_timeout,
        })
    }

    /// Attaches a row count used for progress percentages.
    pub fn with_total_estimate(mut self, total: Option<u64>) -> Self {
        self.total_estimate = total;
        self
    }

    fn take_line(&mut self) -> Option<BytesMut> {
        let end = self.buffer.iter().position(|b| *b == b'\n')?;
        let mut line = self.buffer.split_to(end + 1);
        line.truncate(end);
        Some(line)
    }

    async fn next_line(&mut self) -> Result<Option<BytesMut>> {
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }

            let Some(stream) = self.stream.as_mut() else {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.buffer.split()));
            };

            match tokio::time::timeout(self.idle_timeout, stream.next()).await {
                Ok(Some(Ok(chunk))) => self.buffer.extend_from_slice(&chunk),
                Ok(Some(Err(e))) => {
                    self.stream = None;
                    return Err(self.client.transport_error("reading rows", e));
                }
                Ok(None) => self.stream = None,
                Err(_) => {
                    self.stream = None;
                    return Err(FlatbridgeError::network_other(
                        format!("reading rows from {}", self.client.config),
                        std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "no data received within the query timeout",
                        ),
                    ));
                }
            }
        }
    }

    /// The server appends an exception to a body it has already started
    /// streaming; such a line replaces the generic decode error.
    fn stream_failure(&self, line: &str, decode_error: FlatbridgeError) -> FlatbridgeError {
        match exception_code_in(line) {
            Some(code) => classify_failure(
                None,
                Some(code),
                format!(
                    "reading rows: {}",
                    redact_secret(line.trim(), self.client.credentials.token())
                ),
            ),
            None => decode_error,
        }
    }
}

#[async_trait]
impl BatchSource for DatabaseSource {
    fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    async fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        let mut batch = RowBatch::new(self.next_index, Arc::clone(&self.columns));

        while batch.len() < self.batch_size {
            let Some(line) = self.next_line().await? else {
                break;
            };
            let text = match std::str::from_utf8(&line) {
                Ok(text) => text.trim_end_matches('\r'),
                Err(e) => {
                    tracing::warn!(
                        "Batch {}: skipping row with invalid UTF-8: {}",
                        batch.index,
                        e
                    );
                    batch.skipped_rows += 1;
                    continue;
                }
            };
            if text.trim().is_empty() {
                continue;
            }
            match rows::decode_row(text, &self.columns) {
                Ok(row) => batch.rows.push(row),
                Err(e) => {
                    self.stream = None;
                    return Err(self.stream_failure(text, e));
                }
            }
        }

        if batch.is_empty() && batch.skipped_rows == 0 {
            return Ok(None);
        }

        tracing::debug!("Read batch {} ({} rows)", batch.index, batch.len());
        self.next_index += 1;
        Ok(Some(batch))
    }

    fn total_estimate(&self) -> Option<u64> {
        self.total_estimate
    }
}
