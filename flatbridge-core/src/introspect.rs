//! Uniform schema discovery for either kind of endpoint.

use crate::Result;
use crate::adapters::{Endpoint, file};
use crate::error::FlatbridgeError;
use crate::models::ColumnSpec;

/// Ordered columns of `endpoint` with their type hints.
///
/// Database columns come from the catalog; file columns from the header and
/// a sniff of the first data row. Calling this twice on an unchanged source
/// yields the same sequence.
///
/// # Errors
/// `NotFound` for a missing table or file, `Parse` for an unreadable header,
/// and the usual connection errors for databases.
pub async fn list_columns(endpoint: &Endpoint) -> Result<Vec<ColumnSpec>> {
    match endpoint {
        Endpoint::Database { .. } => database_client(endpoint)?.list_columns().await,
        Endpoint::File { path, format } => file::open_columns(path, *format).await,
    }
}

/// Column names only, in order.
pub async fn list_column_names(endpoint: &Endpoint) -> Result<Vec<String>> {
    Ok(list_columns(endpoint)
        .await?
        .into_iter()
        .map(|c| c.name)
        .collect())
}

/// Tables of the configured database, ordered by name.
pub async fn list_tables(endpoint: &Endpoint) -> Result<Vec<String>> {
    database_client(endpoint)?.list_tables().await
}

/// Opens and closes one session against the database.
pub async fn test_connection(endpoint: &Endpoint) -> Result<()> {
    database_client(endpoint)?.test_connection().await
}

fn database_client(endpoint: &Endpoint) -> Result<crate::adapters::ClickHouseClient> {
    endpoint.client()?.ok_or_else(|| {
        FlatbridgeError::configuration(format!(
            "{} is a file, a database connection is required",
            endpoint.describe()
        ))
    })
}
