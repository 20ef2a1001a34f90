//! Bulk transfer orchestration.
//!
//! The engine pulls batches from a [`BatchSource`], coerces them to the
//! sink's column types and hands them to a [`BatchSink`], one batch at a
//! time and in source order. It is written once for both directions.
//!
//! # Failure policy
//! - Malformed source records, rows that fail coercion and batches the sink
//!   rejects with a `Validation` error are counted and skipped. The
//!   transfer ends in `PartialFailure`.
//! - Any source error and any other sink error aborts with `Failed`.
//! - Cancellation is checked between batches; committed batches stay
//!   committed and are reported in `record_count`.
//!
//! # Pipelining
//! With `pipeline_depth > 0` the source runs on its own task and feeds a
//! bounded channel of that many batches. Order is preserved, the channel
//! applies backpressure, and an abort on either side stops the other.

mod coerce;
mod progress;

pub use coerce::{CoercedBatch, coerce_batch, coerce_cell};
pub use progress::{
    Percentage, ProgressReporter, TransferHandle, TransferProgress, TransferSnapshot,
};

use crate::adapters::{
    BatchSink, BatchSource, Endpoint, ReadPlan, TransferOptions, open_sink, open_source,
};
use crate::error::{ErrorDetail, FlatbridgeError};
use crate::models::{ColumnSpec, Direction, RowBatch, TransferResult, TransferStatus};
use crate::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Running totals of one transfer.
///
/// `committed` is what the result reports; the handle's counter only
/// mirrors it for observers.
#[derive(Debug, Default)]
struct Tally {
    committed: u64,
    rejected_rows: u64,
    failed_batches: u64,
    batches: u64,
    first_rejection: Option<ErrorDetail>,
}

impl Tally {
    fn note(&mut self, error: &FlatbridgeError) {
        if self.first_rejection.is_none() {
            self.first_rejection = Some(ErrorDetail::from(error));
        }
    }
}

/// Runs transfers with fixed options.
///
/// The engine holds no per-transfer state: every call gets its own
/// [`TransferHandle`], so one engine (or its clones) can run any number of
/// transfers, one after another or side by side.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    options: TransferOptions,
}

impl TransferEngine {
    /// Creates an engine.
    pub fn new(options: TransferOptions) -> Self {
        Self { options }
    }

    /// Moves the selected columns from `source` to `sink`.
    ///
    /// Always returns a result; failures to open either end are reported as
    /// `Failed` with the cause in `first_error`.
    pub async fn transfer(
        &self,
        direction: Direction,
        source: &Endpoint,
        sink: &Endpoint,
        columns: Option<&[String]>,
    ) -> TransferResult {
        self.transfer_with(&TransferHandle::new(), direction, source, sink, columns)
            .await
    }

    /// Like [`transfer`](Self::transfer), reporting progress through and
    /// honoring cancellation from `handle`.
    ///
    /// A handle describes a single transfer; pass a new one each time.
    pub async fn transfer_with(
        &self,
        handle: &TransferHandle,
        direction: Direction,
        source: &Endpoint,
        sink: &Endpoint,
        columns: Option<&[String]>,
    ) -> TransferResult {
        tracing::info!(
            "Starting {} transfer {} ({} -> {})",
            direction,
            handle.id(),
            source.describe(),
            sink.describe()
        );

        match self.open(direction, source, sink, columns).await {
            Ok((source, sink)) => self.run_with(handle, source, sink).await,
            Err(e) => {
                tracing::error!("Transfer {} could not start: {}", handle.id(), e);
                handle.progress().mark_terminal();
                TransferResult::failed(&e)
            }
        }
    }

    async fn open(
        &self,
        direction: Direction,
        source: &Endpoint,
        sink: &Endpoint,
        columns: Option<&[String]>,
    ) -> Result<(crate::adapters::Source, crate::adapters::Sink)> {
        self.options.validate()?;
        direction.validate(source, sink)?;

        let plan = ReadPlan {
            batch_size: self.options.batch_size,
            limit: None,
            estimate_total: true,
        };
        let opened_source = open_source(source, columns, plan).await?;
        let opened_sink = open_sink(sink, opened_source.columns(), &self.options).await?;
        Ok((opened_source, opened_sink))
    }

    /// Drives an already opened source into an already opened sink.
    pub async fn run<S, K>(&self, source: S, sink: K) -> TransferResult
    where
        S: BatchSource + 'static,
        K: BatchSink + 'static,
    {
        self.run_with(&TransferHandle::new(), source, sink).await
    }

    /// Like [`run`](Self::run), reporting through `handle`.
    pub async fn run_with<S, K>(
        &self,
        handle: &TransferHandle,
        source: S,
        mut sink: K,
    ) -> TransferResult
    where
        S: BatchSource + 'static,
        K: BatchSink + 'static,
    {
        let progress = handle.progress();
        progress.set_total_estimate(source.total_estimate());

        let mut tally = Tally::default();
        let outcome = match aligned_targets(source.columns(), sink.columns()) {
            Ok(targets) => {
                let drained = if self.options.pipeline_depth == 0 {
                    self.run_sequential(handle, source, &mut sink, &targets, &mut tally)
                        .await
                } else {
                    self.run_pipelined(handle, source, &mut sink, &targets, &mut tally)
                        .await
                };
                match drained {
                    Ok(()) => sink.finish().await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };

        progress.mark_terminal();
        let record_count = tally.committed;

        let result = match outcome {
            Ok(()) => {
                let partial = tally.rejected_rows > 0 || tally.failed_batches > 0;
                TransferResult {
                    record_count,
                    status: if partial {
                        TransferStatus::PartialFailure
                    } else {
                        TransferStatus::Success
                    },
                    first_error: tally.first_rejection,
                    rejected_rows: tally.rejected_rows,
                    failed_batches: tally.failed_batches,
                    batches: tally.batches,
                }
            }
            Err(e) => {
                tracing::error!(
                    "Transfer {} aborted after {} records: {}",
                    handle.id(),
                    record_count,
                    e
                );
                TransferResult {
                    record_count,
                    status: TransferStatus::Failed,
                    first_error: Some(ErrorDetail::from(&e)),
                    rejected_rows: tally.rejected_rows,
                    failed_batches: tally.failed_batches,
                    batches: tally.batches,
                }
            }
        };

        tracing::info!(
            "Transfer {} finished: {:?}, {} records, {} rejected rows, {} failed batches",
            handle.id(),
            result.status,
            result.record_count,
            result.rejected_rows,
            result.failed_batches
        );
        result
    }

    async fn run_sequential<S, K>(
        &self,
        handle: &TransferHandle,
        mut source: S,
        sink: &mut K,
        targets: &Arc<[ColumnSpec]>,
        tally: &mut Tally,
    ) -> Result<()>
    where
        S: BatchSource,
        K: BatchSink,
    {
        loop {
            if handle.is_cancelled() {
                return Err(FlatbridgeError::Cancelled);
            }
            match source.next_batch().await? {
                Some(batch) => self.deliver(handle, batch, sink, targets, tally).await?,
                None => return Ok(()),
            }
        }
    }

    async fn run_pipelined<S, K>(
        &self,
        handle: &TransferHandle,
        source: S,
        sink: &mut K,
        targets: &Arc<[ColumnSpec]>,
        tally: &mut Tally,
    ) -> Result<()>
    where
        S: BatchSource + 'static,
        K: BatchSink,
    {
        let depth = self.options.pipeline_depth;
        let producer_token = handle.token().child_token();
        let (tx, mut rx) = mpsc::channel::<Result<RowBatch>>(depth);

        let token = producer_token.clone();
        let producer = tokio::spawn(async move {
            let mut source = source;
            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => break,
                    next = source.next_batch() => next,
                };
                let stop = !matches!(next, Ok(Some(_)));
                let message = match next {
                    Ok(Some(batch)) => Ok(batch),
                    Ok(None) => break,
                    Err(e) => Err(e),
                };
                if tx.send(message).await.is_err() || stop {
                    break;
                }
            }
        });

        tracing::debug!("Pipelined transfer with a queue of {} batches", depth);

        let outcome = loop {
            if handle.is_cancelled() {
                break Err(FlatbridgeError::Cancelled);
            }
            match rx.recv().await {
                Some(Ok(batch)) => {
                    if let Err(e) = self.deliver(handle, batch, sink, targets, tally).await {
                        break Err(e);
                    }
                }
                Some(Err(e)) => break Err(e),
                None if handle.is_cancelled() => break Err(FlatbridgeError::Cancelled),
                None => break Ok(()),
            }
        };

        producer_token.cancel();
        drop(rx);
        if let Err(e) = producer.await {
            tracing::error!("Source task ended abnormally: {}", e);
            if outcome.is_ok() {
                return Err(FlatbridgeError::io(
                    "source task",
                    std::io::Error::other(e.to_string()),
                ));
            }
        }
        outcome
    }

    /// Coerces and commits one batch, absorbing row- and batch-level
    /// rejections into `tally`.
    async fn deliver<K>(
        &self,
        handle: &TransferHandle,
        batch: RowBatch,
        sink: &mut K,
        targets: &Arc<[ColumnSpec]>,
        tally: &mut Tally,
    ) -> Result<()>
    where
        K: BatchSink,
    {
        let progress = handle.progress();
        let index = batch.index;
        progress.set_current_batch(index);
        tally.batches += 1;

        if batch.skipped_rows > 0 {
            tally.rejected_rows += batch.skipped_rows;
            tally.note(&FlatbridgeError::validation(format!(
                "{} malformed source records skipped in batch {}",
                batch.skipped_rows, index
            )));
        }

        let coerced = coerce_batch(batch, targets);
        if coerced.rejected > 0 {
            tracing::warn!(
                "Batch {}: {} rows rejected during type coercion",
                index,
                coerced.rejected
            );
            tally.rejected_rows += coerced.rejected;
            if let Some(reason) = &coerced.first_rejection {
                tally.note(reason);
            }
        }

        let offered = coerced.batch.len() as u64;
        if offered == 0 {
            return Ok(());
        }

        match sink.consume_batch(coerced.batch).await {
            Ok(written) => {
                let accepted = written.min(offered);
                tally.committed += accepted;
                progress.add_records(accepted);
                if accepted < offered {
                    let lost = offered - accepted;
                    tracing::warn!(
                        "Batch {}: sink accepted {} of {} rows",
                        index,
                        accepted,
                        offered
                    );
                    tally.rejected_rows += lost;
                    tally.note(&FlatbridgeError::validation(format!(
                        "sink accepted {} of {} rows in batch {}",
                        accepted, offered, index
                    )));
                }
                tracing::debug!(
                    "Batch {} committed, {} records so far",
                    index,
                    tally.committed
                );
                Ok(())
            }
            Err(e) if e.is_row_level() => {
                tracing::warn!("Batch {} rejected by sink, skipping it: {}", index, e);
                tally.failed_batches += 1;
                tally.rejected_rows += offered;
                tally.note(&e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Sink columns, checked to line up name for name with the source columns.
fn aligned_targets(source: &[ColumnSpec], sink: &[ColumnSpec]) -> Result<Arc<[ColumnSpec]>> {
    let aligned = source.len() == sink.len()
        && source.iter().zip(sink).all(|(a, b)| a.name == b.name);
    if aligned {
        Ok(sink.to_vec().into())
    } else {
        Err(FlatbridgeError::configuration(format!(
            "sink columns [{}] do not match source columns [{}]",
            sink.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", "),
            source.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", ")
        )))
    }
}

/// One-shot transfer with a fresh engine.
pub async fn transfer(
    direction: Direction,
    source: &Endpoint,
    sink: &Endpoint,
    columns: Option<&[String]>,
    options: TransferOptions,
) -> TransferResult {
    TransferEngine::new(options)
        .transfer(direction, source, sink, columns)
        .await
}
