//! Configuration types for sources and sinks.
//!
//! - `ConnectionConfig`: ClickHouse server address and target table
//! - `FileFormat`: delimited file layout
//! - `TransferOptions` / `PreviewOptions`: batching and sampling limits
//!
//! # Security
//! These configuration structs intentionally do NOT store tokens or
//! passwords. Credentials are handled by the security module.

mod connection;
mod file;
mod transfer;

pub use connection::{AuthScheme, ConnectionConfig, DEFAULT_HTTP_PORT, DEFAULT_HTTPS_PORT};
pub use file::FileFormat;
pub use transfer::{MAX_BATCH_SIZE, MAX_PREVIEW_ROWS, PreviewOptions, TransferOptions};
