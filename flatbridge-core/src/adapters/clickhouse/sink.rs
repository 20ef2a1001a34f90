//! Batched inserts into one table.

use super::connection::SUMMARY_HEADER;
use super::{ClickHouseClient, query, rows};
use crate::adapters::BatchSink;
use crate::error::FlatbridgeError;
use crate::models::{ColumnSpec, RowBatch};
use crate::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;

/// Appends batches to a table with one `INSERT` per batch.
pub struct DatabaseSink {
    client: ClickHouseClient,
    http: reqwest::Client,
    table: String,
    columns: Vec<ColumnSpec>,
    insert_sql: String,
}

impl std::fmt::Debug for DatabaseSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSink")
            .field("table", &self.table)
            .field("columns", &self.columns.len())
            .finish()
    }
}

/// Reads `written_rows` from the summary header. Absent or malformed
/// summaries yield `None`.
pub(crate) fn written_rows(headers: &HeaderMap) -> Option<u64> {
    let raw = headers.get(SUMMARY_HEADER)?.to_str().ok()?;
    let summary: serde_json::Value = serde_json::from_str(raw).ok()?;
    match summary.get("written_rows")? {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

impl DatabaseSink {
    pub(super) fn new(
        client: ClickHouseClient,
        table: String,
        columns: Vec<ColumnSpec>,
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(FlatbridgeError::configuration(
                "at least one column must be selected",
            ));
        }
        query::validate_object_name("table", &table)?;
        let http = client.http_client()?;
        let insert_sql = query::insert_rows(&client.config.database, &table, &columns);
        Ok(Self {
            client,
            http,
            table,
            columns,
            insert_sql,
        })
    }

    /// Inserts one batch and returns the rows the server reports as
    /// committed.
    ///
    /// # Errors
    /// `Validation` when the server refuses the row data; `Network`,
    /// `Authentication` or `Query` for failures that concern the whole
    /// transfer.
    pub async fn write_batch(&self, batch: &RowBatch) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let matches_target = batch.columns.len() == self.columns.len()
            && batch
                .columns
                .iter()
                .zip(&self.columns)
                .all(|(a, b)| a.name == b.name);
        if !matches_target {
            return Err(FlatbridgeError::configuration(format!(
                "batch columns [{}] do not match insert columns of {}",
                batch.column_names().join(", "),
                self.table
            )));
        }

        let mut body = Vec::with_capacity(batch.len() * 16 * self.columns.len());
        for row in &batch.rows {
            rows::encode_row(row, &mut body)?;
        }

        let builder = self
            .client
            .request(&self.http, Some(self.client.config.query_timeout))
            .query(&[
                ("query", self.insert_sql.as_str()),
                ("date_time_input_format", "best_effort"),
                ("wait_end_of_query", "1"),
            ])
            .body(body);

        let response = self.client.send(builder, "inserting rows").await?;
        let committed = match written_rows(response.headers()) {
            Some(n) => n,
            None => {
                tracing::debug!("No insert summary returned, assuming the whole batch landed");
                batch.len() as u64
            }
        };

        tracing::debug!(
            "Inserted batch {} into {}: {} of {} rows committed",
            batch.index,
            self.table,
            committed,
            batch.len()
        );
        Ok(committed)
    }
}

#[async_trait]
impl BatchSink for DatabaseSink {
    fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    async fn consume_batch(&mut self, batch: RowBatch) -> Result<u64> {
        self.write_batch(&batch).await
    }
}
