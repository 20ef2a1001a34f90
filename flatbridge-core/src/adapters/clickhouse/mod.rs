//! ClickHouse client over the HTTP interface.
//!
//! # Module Structure
//! - `connection`: per-operation HTTP sessions and failure classification
//! - `type_mapping`: ClickHouse type names to column type hints
//! - `query`: statement text and identifier quoting
//! - `rows`: `JSONCompactEachRow` row codec
//! - `source`: streaming table reader
//! - `sink`: batched inserts
//!
//! # Security Guarantees
//! - The token travels only in request headers, never in URLs or logs
//! - Server error text is scrubbed of the token before it is surfaced
//! - No session outlives the operation that opened it

mod connection;
mod query;
mod rows;
mod sink;
mod source;
mod type_mapping;

#[cfg(test)]
mod tests;

use crate::adapters::config::ConnectionConfig;
use crate::error::FlatbridgeError;
use crate::models::ColumnSpec;
use crate::security::Credentials;
use crate::Result;

pub use sink::DatabaseSink;
pub use source::DatabaseSource;
pub use type_mapping::{clickhouse_type_for, map_clickhouse_type};

/// Authenticated handle on one ClickHouse database.
///
/// Holding a client keeps no connection open; each method opens and closes
/// its own.
#[derive(Clone)]
pub struct ClickHouseClient {
    config: ConnectionConfig,
    credentials: Credentials,
}

impl std::fmt::Debug for ClickHouseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClickHouseClient")
            .field("config", &self.config)
            .field("username", &self.credentials.username())
            .field("has_token", &self.credentials.has_token())
            .finish()
    }
}

impl ClickHouseClient {
    /// Creates a client after validating the configuration.
    ///
    /// # Errors
    /// Returns a configuration error for unusable settings or malformed
    /// database/table names.
    pub fn new(config: ConnectionConfig, credentials: Credentials) -> Result<Self> {
        config.validate()?;
        query::validate_object_name("database", &config.database)?;
        if let Some(table) = &config.table {
            query::validate_object_name("table", table)?;
        }
        Ok(Self {
            config,
            credentials,
        })
    }

    /// Connection settings (credential-free).
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn table(&self, operation: &str) -> Result<&str> {
        self.config.require_table(operation)
    }

    /// Opens a session, runs `SELECT 1` and closes it again.
    ///
    /// # Errors
    /// `Authentication` for rejected credentials, `Network` when the server
    /// cannot be reached.
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.http_client()?;
        let body = self
            .execute_text(&client, "SELECT 1 FORMAT JSONCompactEachRow", &[], "connection test")
            .await?;

        if rows::scalar_u64(&body)? != 1 {
            return Err(FlatbridgeError::query_failed(
                "connection test returned an unexpected result",
                None,
            ));
        }

        tracing::info!("Connection to {} verified", self.config);
        Ok(())
    }

    /// Lists tables of the configured database, ordered by name.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let client = self.http_client()?;
        let body = self
            .execute_text(
                &client,
                query::LIST_TABLES,
                &[("param_db", self.config.database.as_str())],
                "listing tables",
            )
            .await?;

        let tables: Vec<String> = rows::string_rows(&body)?
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .collect();

        tracing::info!(
            "Found {} tables in database {}",
            tables.len(),
            self.config.database
        );
        Ok(tables)
    }

    /// Lists the configured table's columns in definition order.
    ///
    /// # Errors
    /// `NotFound` when the table does not exist (the catalog has no rows for
    /// it).
    pub async fn list_columns(&self) -> Result<Vec<ColumnSpec>> {
        let table = self.table("listing columns")?;
        let client = self.http_client()?;
        let body = self
            .execute_text(
                &client,
                query::LIST_COLUMNS,
                &[
                    ("param_db", self.config.database.as_str()),
                    ("param_tbl", table),
                ],
                "listing columns",
            )
            .await?;

        let columns: Vec<ColumnSpec> = rows::string_rows(&body)?
            .into_iter()
            .filter_map(|row| {
                let mut values = row.into_iter();
                let name = values.next()?;
                let native = values.next().unwrap_or_default();
                let source_type = map_clickhouse_type(&native);
                tracing::trace!("column {} ({}) -> {}", name, native, source_type);
                Some(ColumnSpec::new(name, source_type))
            })
            .collect();

        if columns.is_empty() {
            return Err(FlatbridgeError::not_found(format!(
                "table {}.{}",
                self.config.database, table
            )));
        }

        tracing::info!("Found {} columns in table {}", columns.len(), table);
        Ok(columns)
    }

    /// Checks whether the configured table exists.
    pub async fn table_exists(&self) -> Result<bool> {
        let table = self.table("checking table existence")?;
        let client = self.http_client()?;
        let body = self
            .execute_text(
                &client,
                query::TABLE_EXISTS,
                &[
                    ("param_db", self.config.database.as_str()),
                    ("param_tbl", table),
                ],
                "checking table existence",
            )
            .await?;
        Ok(rows::scalar_u64(&body)? > 0)
    }

    /// Exact row count of the configured table.
    pub async fn count_rows(&self) -> Result<u64> {
        let table = self.table("counting rows")?;
        let client = self.http_client()?;
        let sql = query::count_rows(&self.config.database, table);
        let body = self.execute_text(&client, &sql, &[], "counting rows").await?;
        rows::scalar_u64(&body)
    }

    /// Creates the configured table with one nullable column per spec.
    ///
    /// A no-op when the table already exists.
    pub async fn create_table(&self, columns: &[ColumnSpec]) -> Result<()> {
        let table = self.table("creating a table")?;
        if columns.is_empty() {
            return Err(FlatbridgeError::configuration(
                "cannot create a table without columns",
            ));
        }
        let client = self.http_client()?;
        let sql = query::create_table(&self.config.database, table, columns);
        self.execute_text(&client, &sql, &[], "creating table").await?;
        tracing::info!("Ensured table {}.{} exists", self.config.database, table);
        Ok(())
    }

    /// Starts streaming the configured table projected to `columns`.
    ///
    /// Nothing beyond the current network buffer and one batch is held in
    /// memory. `limit` bounds the rows the server sends.
    pub async fn read_batches(
        &self,
        columns: Vec<ColumnSpec>,
        batch_size: usize,
        limit: Option<usize>,
    ) -> Result<DatabaseSource> {
        let table = self.table("reading rows")?;
        let sql = query::select_projection(&self.config.database, table, &columns, limit);
        DatabaseSource::open(self, &sql, columns, batch_size).await
    }

    /// Prepares an insert sink for the configured table.
    pub fn write_sink(&self, columns: Vec<ColumnSpec>) -> Result<DatabaseSink> {
        let table = self.table("writing rows")?.to_string();
        DatabaseSink::new(self.clone(), table, columns)
    }
}
