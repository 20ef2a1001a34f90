//! Core ingestion engine for flatbridge.
//!
//! This crate moves column-projected data between a ClickHouse table and
//! delimited flat files in either direction. It covers connection and
//! authentication, schema discovery, bounded previews and batched bulk
//! transfer with progress reporting and partial-failure accounting.
//!
//! # Guarantees
//! - Bearer tokens are never stored in plain `Debug` output, logs or errors
//! - Memory stays bounded by the batch size, whatever the source size
//! - `TransferResult::record_count` counts rows the sink accepted, never rows
//!   merely read
//! - Every database operation holds its own connection and releases it on
//!   every exit path
//!
//! # Architecture
//! - `adapters`: the two ends of a transfer behind [`adapters::BatchSource`]
//!   and [`adapters::BatchSink`]
//! - `introspect` / `preview`: uniform discovery and sampling for either end
//! - `transfer`: the direction-agnostic engine, progress and cancellation

pub mod adapters;
pub mod error;
pub mod introspect;
pub mod logging;
pub mod models;
pub mod preview;
pub mod security;
pub mod transfer;

// Re-export commonly used types
pub use adapters::{
    AuthScheme, BatchSink, BatchSource, ClickHouseClient, ConnectionConfig, Endpoint,
    FileFormat, PreviewOptions, TransferOptions,
};
pub use error::{ErrorDetail, ErrorKind, FlatbridgeError, Result};
pub use models::{
    CellValue, ColumnSpec, ColumnType, Direction, PreviewResult, Row, RowBatch,
    TransferResult, TransferStatus,
};
pub use preview::preview;
pub use security::{Credentials, parse_connection_url};
pub use transfer::{
    Percentage, ProgressReporter, TransferEngine, TransferHandle, TransferSnapshot,
};
