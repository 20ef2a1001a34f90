//! Transfer and preview tuning.

use serde::{Deserialize, Serialize};

/// Largest accepted batch size.
pub const MAX_BATCH_SIZE: usize = 100_000;

/// Largest accepted preview sample.
pub const MAX_PREVIEW_ROWS: usize = 100;

/// Settings for a bulk transfer.
///
/// # Example
/// ```rust
/// use flatbridge_core::adapters::TransferOptions;
///
/// let options = TransferOptions::default().with_batch_size(5_000).with_pipeline_depth(2);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOptions {
    /// Rows per batch
    pub batch_size: usize,
    /// Batches buffered between reader and writer; 0 runs both stages in turn
    pub pipeline_depth: usize,
    /// Create the target table from the file's columns when it is missing
    pub create_missing_table: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            batch_size: 1_000,
            pipeline_depth: 0,
            create_missing_table: true,
        }
    }
}

impl TransferOptions {
    /// Builder method to set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builder method to set the pipeline depth.
    pub fn with_pipeline_depth(mut self, depth: usize) -> Self {
        self.pipeline_depth = depth;
        self
    }

    /// Builder method to toggle table creation on load.
    pub fn with_create_missing_table(mut self, create: bool) -> Self {
        self.create_missing_table = create;
        self
    }

    /// Validates transfer settings.
    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 {
            return Err(crate::error::FlatbridgeError::configuration(
                "batch_size must be greater than 0",
            ));
        }

        if self.batch_size > MAX_BATCH_SIZE {
            return Err(crate::error::FlatbridgeError::configuration(format!(
                "batch_size should not exceed {} to bound memory use",
                MAX_BATCH_SIZE
            )));
        }

        if self.pipeline_depth > 64 {
            return Err(crate::error::FlatbridgeError::configuration(
                "pipeline_depth should not exceed 64",
            ));
        }

        Ok(())
    }
}

/// Settings for a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewOptions {
    /// Requested sample size; clamped to `1..=100`
    pub limit: usize,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            limit: MAX_PREVIEW_ROWS,
        }
    }
}

impl PreviewOptions {
    /// Creates options with the given limit.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit }
    }

    /// Limit actually applied.
    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_PREVIEW_ROWS)
    }
}
