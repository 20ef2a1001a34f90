//! Per-transfer progress counters and the cancellation handle.
//!
//! Each transfer owns one [`TransferProgress`]; nothing is global, so any
//! number of transfers can run side by side. Observers get a read-only
//! [`ProgressReporter`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const UNKNOWN_TOTAL: u64 = u64::MAX;

/// Live counters of one transfer.
///
/// `records_processed` only ever grows.
#[derive(Debug)]
pub struct TransferProgress {
    records_processed: AtomicU64,
    total_estimate: AtomicU64,
    current_batch: AtomicU64,
    terminal: AtomicBool,
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self {
            records_processed: AtomicU64::new(0),
            total_estimate: AtomicU64::new(UNKNOWN_TOTAL),
            current_batch: AtomicU64::new(0),
            terminal: AtomicBool::new(false),
        }
    }
}

impl TransferProgress {
    pub(crate) fn add_records(&self, count: u64) {
        self.records_processed.fetch_add(count, Ordering::AcqRel);
    }

    pub(crate) fn set_total_estimate(&self, total: Option<u64>) {
        self.total_estimate
            .store(total.unwrap_or(UNKNOWN_TOTAL), Ordering::Release);
    }

    pub(crate) fn set_current_batch(&self, index: u64) {
        self.current_batch.store(index, Ordering::Release);
    }

    pub(crate) fn mark_terminal(&self) {
        self.terminal.store(true, Ordering::Release);
    }

    /// Rows accepted by the sink so far.
    pub fn records_processed(&self) -> u64 {
        self.records_processed.load(Ordering::Acquire)
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> TransferSnapshot {
        let total = self.total_estimate.load(Ordering::Acquire);
        TransferSnapshot {
            records_processed: self.records_processed(),
            total_estimate: (total != UNKNOWN_TOTAL).then_some(total),
            current_batch_index: self.current_batch.load(Ordering::Acquire),
            terminal: self.terminal.load(Ordering::Acquire),
        }
    }
}

/// Read-only copy of a transfer's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSnapshot {
    pub records_processed: u64,
    pub total_estimate: Option<u64>,
    pub current_batch_index: u64,
    pub terminal: bool,
}

/// Completion ratio, when one can be computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Percentage {
    /// Percentage in `0.0..=100.0`
    Known(f64),
    /// No total is known; show activity instead
    Indeterminate,
}

impl std::fmt::Display for Percentage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Known(p) => write!(f, "{:.1}%", p),
            Self::Indeterminate => f.write_str("?"),
        }
    }
}

impl TransferSnapshot {
    /// `records_processed / total_estimate`, capped at 100.
    pub fn percentage(&self) -> Percentage {
        match self.total_estimate {
            None => Percentage::Indeterminate,
            Some(0) => Percentage::Known(100.0),
            Some(total) => Percentage::Known(
                (self.records_processed as f64 / total as f64 * 100.0).min(100.0),
            ),
        }
    }
}

/// Read-only view for whatever displays progress.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    progress: Arc<TransferProgress>,
}

impl ProgressReporter {
    /// Current counters.
    pub fn snapshot(&self) -> TransferSnapshot {
        self.progress.snapshot()
    }

    /// Current percentage.
    pub fn percentage(&self) -> Percentage {
        self.snapshot().percentage()
    }
}

/// Cheap, clonable handle on one transfer: identity, progress, cancellation.
///
/// # Example
/// ```rust
/// use flatbridge_core::transfer::{Percentage, TransferHandle};
///
/// let handle = TransferHandle::new();
/// let reporter = handle.reporter();
/// assert_eq!(reporter.percentage(), Percentage::Indeterminate);
///
/// handle.cancel();
/// assert!(handle.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct TransferHandle {
    id: Uuid,
    progress: Arc<TransferProgress>,
    cancel: CancellationToken,
}

impl Default for TransferHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferHandle {
    /// Creates a handle with fresh counters.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            progress: Arc::new(TransferProgress::default()),
            cancel: CancellationToken::new(),
        }
    }

    /// Unique id of the transfer.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Read-only progress view.
    pub fn reporter(&self) -> ProgressReporter {
        ProgressReporter {
            progress: Arc::clone(&self.progress),
        }
    }

    /// Requests an abort at the next batch boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn progress(&self) -> &TransferProgress {
        &self.progress
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_tracks_counters() {
        let handle = TransferHandle::new();
        let progress = handle.progress();
        progress.set_total_estimate(Some(200));
        progress.add_records(50);
        progress.set_current_batch(3);

        let snapshot = handle.reporter().snapshot();
        assert_eq!(snapshot.records_processed, 50);
        assert_eq!(snapshot.total_estimate, Some(200));
        assert_eq!(snapshot.current_batch_index, 3);
        assert!(!snapshot.terminal);
        assert_eq!(snapshot.percentage(), Percentage::Known(25.0));

        progress.mark_terminal();
        assert!(handle.reporter().snapshot().terminal);
    }

    #[test]
    fn test_percentage_edges() {
        let unknown = TransferSnapshot {
            records_processed: 10,
            total_estimate: None,
            current_batch_index: 0,
            terminal: false,
        };
        assert_eq!(unknown.percentage(), Percentage::Indeterminate);
        assert_eq!(unknown.percentage().to_string(), "?");

        let empty = TransferSnapshot {
            total_estimate: Some(0),
            ..unknown
        };
        assert_eq!(empty.percentage(), Percentage::Known(100.0));

        let overshoot = TransferSnapshot {
            total_estimate: Some(5),
            ..unknown
        };
        assert_eq!(overshoot.percentage(), Percentage::Known(100.0));
    }

    #[test]
    fn test_handles_are_independent() {
        let a = TransferHandle::new();
        let b = TransferHandle::new();
        assert_ne!(a.id(), b.id());

        a.progress().add_records(5);
        a.cancel();
        assert_eq!(b.reporter().snapshot().records_processed, 0);
        assert!(!b.is_cancelled());

        let a_clone = a.clone();
        assert!(a_clone.is_cancelled());
        assert_eq!(a_clone.reporter().snapshot().records_processed, 5);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = TransferHandle::new().reporter().snapshot();
        let json = serde_json::to_value(snapshot).unwrap();
        assert_eq!(json["recordsProcessed"], 0);
        assert!(json["totalEstimate"].is_null());
    }
}
