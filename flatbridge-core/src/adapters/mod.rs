//! Sources and sinks for both ends of a transfer.
//!
//! The transfer engine only sees two capabilities: [`BatchSource`] produces
//! batches and [`BatchSink`] consumes them. The concrete ends are the tagged
//! variants of [`Source`] (`Database` / `File`) and [`Sink`] (`Database` /
//! `File`), so orchestration is written once for both directions.
//!
//! # Module Structure
//! - `config`: connection, file format and transfer settings
//! - `clickhouse`: the columnar store over its HTTP interface
//! - `file`: delimited flat files

use crate::Result;
use crate::error::FlatbridgeError;
use crate::models::{ColumnSpec, Direction, RowBatch, project_columns};
use crate::security::Credentials;
use async_trait::async_trait;
use std::path::PathBuf;

pub mod clickhouse;
pub mod config;
pub mod file;

pub use clickhouse::{ClickHouseClient, DatabaseSink, DatabaseSource};
pub use config::{
    AuthScheme, ConnectionConfig, FileFormat, PreviewOptions, TransferOptions,
};
pub use file::{DelimitedReader, DelimitedWriter, FileSink, FileSource};

/// Producer half of a transfer.
///
/// A source is a lazy, finite, non-restartable batch sequence. Once
/// `next_batch` returns `Ok(None)` it keeps doing so; starting over means
/// opening a new source.
#[async_trait]
pub trait BatchSource: Send {
    /// Columns every produced row carries, in order.
    fn columns(&self) -> &[ColumnSpec];

    /// Produces the next batch, or `None` once the source is exhausted.
    ///
    /// # Errors
    /// Any error here is fatal to the transfer.
    async fn next_batch(&mut self) -> Result<Option<RowBatch>>;

    /// Expected total row count, when the source can know it up front.
    fn total_estimate(&self) -> Option<u64> {
        None
    }
}

/// Consumer half of a transfer.
#[async_trait]
pub trait BatchSink: Send {
    /// Target columns with the types values are coerced to.
    fn columns(&self) -> &[ColumnSpec];

    /// Commits one batch and returns how many rows were actually accepted.
    ///
    /// # Errors
    /// `Validation` rejects this batch only; any other error aborts the
    /// transfer.
    async fn consume_batch(&mut self, batch: RowBatch) -> Result<u64>;

    /// Final flush after the last batch.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One end of a transfer, as configured by the caller.
#[derive(Debug, Clone)]
pub enum Endpoint {
    /// A ClickHouse table
    Database {
        config: ConnectionConfig,
        credentials: Credentials,
    },
    /// A delimited file on local disk
    File { path: PathBuf, format: FileFormat },
}

impl Endpoint {
    /// Shorthand for a database endpoint.
    pub fn database(config: ConnectionConfig, credentials: Credentials) -> Self {
        Self::Database {
            config,
            credentials,
        }
    }

    /// Shorthand for a file endpoint.
    pub fn file(path: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self::File {
            path: path.into(),
            format,
        }
    }

    /// True for the database variant.
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database { .. })
    }

    /// Credential-free description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Database { config, .. } => config.to_string(),
            Self::File { path, .. } => path.display().to_string(),
        }
    }

    pub(crate) fn client(&self) -> Result<Option<ClickHouseClient>> {
        match self {
            Self::Database {
                config,
                credentials,
            } => ClickHouseClient::new(config.clone(), credentials.clone()).map(Some),
            Self::File { .. } => Ok(None),
        }
    }
}

impl Direction {
    /// Checks that the endpoints match this direction.
    pub fn validate(self, source: &Endpoint, sink: &Endpoint) -> Result<()> {
        let expected = match self {
            Direction::DatabaseToFile => (true, false),
            Direction::FileToDatabase => (false, true),
        };
        if (source.is_database(), sink.is_database()) == expected {
            Ok(())
        } else {
            Err(FlatbridgeError::configuration(format!(
                "{} transfer needs a {} source and a {} sink",
                self,
                if expected.0 { "database" } else { "file" },
                if expected.1 { "database" } else { "file" },
            )))
        }
    }
}

/// Concrete batch producers.
#[derive(Debug)]
pub enum Source {
    Database(DatabaseSource),
    File(FileSource),
}

#[async_trait]
impl BatchSource for Source {
    fn columns(&self) -> &[ColumnSpec] {
        match self {
            Self::Database(s) => s.columns(),
            Self::File(s) => s.columns(),
        }
    }

    async fn next_batch(&mut self) -> Result<Option<RowBatch>> {
        match self {
            Self::Database(s) => s.next_batch().await,
            Self::File(s) => s.next_batch().await,
        }
    }

    fn total_estimate(&self) -> Option<u64> {
        match self {
            Self::Database(s) => s.total_estimate(),
            Self::File(s) => s.total_estimate(),
        }
    }
}

/// Concrete batch consumers.
#[derive(Debug)]
pub enum Sink {
    Database(DatabaseSink),
    File(FileSink),
}

#[async_trait]
impl BatchSink for Sink {
    fn columns(&self) -> &[ColumnSpec] {
        match self {
            Self::Database(s) => s.columns(),
            Self::File(s) => s.columns(),
        }
    }

    async fn consume_batch(&mut self, batch: RowBatch) -> Result<u64> {
        match self {
            Self::Database(s) => s.consume_batch(batch).await,
            Self::File(s) => s.consume_batch(batch).await,
        }
    }

    async fn finish(&mut self) -> Result<()> {
        match self {
            Self::Database(s) => s.finish().await,
            Self::File(s) => s.finish().await,
        }
    }
}

/// How much of a source to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadPlan {
    /// Rows per batch
    pub batch_size: usize,
    /// Server-side row limit (database sources only)
    pub limit: Option<usize>,
    /// Ask the source for a row count up front
    pub estimate_total: bool,
}

/// Opens a source projected to `selected` (every column when `None`).
///
/// # Errors
/// `NotFound` if a selected column does not exist; `Configuration` for an
/// empty or duplicated selection. The projection is never partially applied.
pub async fn open_source(
    endpoint: &Endpoint,
    selected: Option<&[String]>,
    plan: ReadPlan,
) -> Result<Source> {
    match endpoint {
        Endpoint::Database { .. } => {
            let client = endpoint
                .client()?
                .ok_or_else(|| FlatbridgeError::configuration("database endpoint expected"))?;
            let available = client.list_columns().await?;
            let columns: Vec<ColumnSpec> = match selected {
                Some(names) => project_columns(&available, names)?
                    .into_iter()
                    .map(|(_, spec)| spec)
                    .collect(),
                None => available,
            };

            let estimate = if plan.estimate_total {
                match client.count_rows().await {
                    Ok(count) => Some(plan.limit.map_or(count, |l| count.min(l as u64))),
                    Err(e) => {
                        tracing::warn!("Row count unavailable, progress will be indeterminate: {}", e);
                        None
                    }
                }
            } else {
                None
            };

            let source = client
                .read_batches(columns, plan.batch_size, plan.limit)
                .await?
                .with_total_estimate(estimate);
            Ok(Source::Database(source))
        }
        Endpoint::File { path, format } => {
            let source = FileSource::open(
                path,
                *format,
                selected.map(<[String]>::to_vec),
                plan.batch_size,
            )
            .await?;
            Ok(Source::File(source))
        }
    }
}

/// Opens a sink for rows shaped like `columns`.
///
/// A database sink resolves the target table's own column types (creating
/// the table from `columns` first when it is missing and
/// `create_missing_table` is set). A file sink writes the header right away.
pub async fn open_sink(
    endpoint: &Endpoint,
    columns: &[ColumnSpec],
    options: &TransferOptions,
) -> Result<Sink> {
    match endpoint {
        Endpoint::Database { .. } => {
            let client = endpoint
                .client()?
                .ok_or_else(|| FlatbridgeError::configuration("database endpoint expected"))?;

            if options.create_missing_table && !client.table_exists().await? {
                tracing::info!(
                    "Target table {} does not exist, creating it from {} columns",
                    client.config(),
                    columns.len()
                );
                client.create_table(columns).await?;
            }

            let available = client.list_columns().await?;
            let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
            let target: Vec<ColumnSpec> = project_columns(&available, &names)?
                .into_iter()
                .map(|(_, spec)| spec)
                .collect();
            Ok(Sink::Database(client.write_sink(target)?))
        }
        Endpoint::File { path, format } => {
            Ok(Sink::File(FileSink::create(path, *format, columns).await?))
        }
    }
}
