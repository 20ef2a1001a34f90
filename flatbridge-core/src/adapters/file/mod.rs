//! Delimited flat file adapter.
//!
//! # Module Structure
//! - `inference`: single-row column type sniffing
//! - `reader`: header discovery and streaming batch reads
//! - `writer`: header plus row emission with per-batch flushes
//!
//! Quoted fields may contain the delimiter and line breaks. Both LF and CRLF
//! line endings are accepted, blank lines and a trailing newline are
//! ignored. Records with the wrong number of fields are skipped and counted,
//! never fatal.

mod inference;
mod reader;
mod writer;

#[cfg(test)]
mod tests;

pub use inference::{sniff_record, sniff_value};
pub use reader::{DelimitedReader, FileSource, open_columns};
pub use writer::{DelimitedWriter, FileSink};

use crate::error::FlatbridgeError;
use crate::Result;

/// Runs synchronous file work on the blocking pool.
async fn blocking<T, F>(context: &str, task: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| FlatbridgeError::io(context.to_string(), std::io::Error::other(e)))
}
