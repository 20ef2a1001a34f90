//! Bounded, column-projected samples of a source.
//!
//! A preview opens the source, takes exactly one batch of at most `limit`
//! rows and drops the source again. Database previews push the limit into
//! the query; file previews stop reading after the first batch. Neither
//! touches the rest of the data.

use crate::Result;
use crate::adapters::{BatchSource, Endpoint, PreviewOptions, ReadPlan, open_source};
use crate::models::{PreviewResult, RowBatch};
use std::sync::Arc;

/// Samples up to `options.limit` rows of `endpoint`, projected to `selected`
/// (every column when `None`).
///
/// File previews return the raw cell text; database previews return values
/// decoded by column type.
///
/// # Errors
/// `NotFound` if any selected column is missing. The projection is applied
/// completely or not at all.
pub async fn preview(
    endpoint: &Endpoint,
    selected: Option<&[String]>,
    options: PreviewOptions,
) -> Result<PreviewResult> {
    let limit = options.effective_limit();
    let plan = ReadPlan {
        batch_size: limit,
        limit: Some(limit),
        estimate_total: false,
    };

    let mut source = open_source(endpoint, selected, plan).await?;
    let columns = source.columns().to_vec();
    let batch = match source.next_batch().await? {
        Some(batch) => batch,
        None => RowBatch::new(0, Arc::from(columns.clone())),
    };

    if batch.skipped_rows > 0 {
        tracing::warn!(
            "Preview of {} skipped {} malformed records",
            endpoint.describe(),
            batch.skipped_rows
        );
    }
    tracing::info!(
        "Previewed {} rows of {} ({} columns)",
        batch.len(),
        endpoint.describe(),
        columns.len()
    );

    Ok(PreviewResult { columns, batch })
}
