//! Metrics collection for engine monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Ledger engine metrics.
pub struct LedgerMetrics {
    /// Transactions created.
    pub transactions_created: AtomicU64,
    /// Transactions reaching Completed.
    pub transactions_completed: AtomicU64,
    /// Transactions reaching Failed.
    pub transactions_failed: AtomicU64,
    /// Transactions reaching Cancelled.
    pub transactions_cancelled: AtomicU64,
    /// Invoices created.
    pub invoices_created: AtomicU64,
    /// Invoices reaching Paid.
    pub invoices_paid: AtomicU64,
    /// Invoices reaching Cancelled.
    pub invoices_cancelled: AtomicU64,
    /// Status changes rejected by the transition table.
    pub transitions_rejected: AtomicU64,
    /// Mutations rejected on a stale version.
    pub version_conflicts: AtomicU64,
}

impl LedgerMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self {
            transactions_created: AtomicU64::new(0),
            transactions_completed: AtomicU64::new(0),
            transactions_failed: AtomicU64::new(0),
            transactions_cancelled: AtomicU64::new(0),
            invoices_created: AtomicU64::new(0),
            invoices_paid: AtomicU64::new(0),
            invoices_cancelled: AtomicU64::new(0),
            transitions_rejected: AtomicU64::new(0),
            version_conflicts: AtomicU64::new(0),
        }
    }

    /// Increment a counter.
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a point-in-time snapshot.
    pub fn snapshot(&self) -> LedgerMetricsSnapshot {
        LedgerMetricsSnapshot {
            transactions_created: self.transactions_created.load(Ordering::Relaxed),
            transactions_completed: self.transactions_completed.load(Ordering::Relaxed),
            transactions_failed: self.transactions_failed.load(Ordering::Relaxed),
            transactions_cancelled: self.transactions_cancelled.load(Ordering::Relaxed),
            invoices_created: self.invoices_created.load(Ordering::Relaxed),
            invoices_paid: self.invoices_paid.load(Ordering::Relaxed),
            invoices_cancelled: self.invoices_cancelled.load(Ordering::Relaxed),
            transitions_rejected: self.transitions_rejected.load(Ordering::Relaxed),
            version_conflicts: self.version_conflicts.load(Ordering::Relaxed),
        }
    }
}

impl Default for LedgerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LedgerMetricsSnapshot {
    pub transactions_created: u64,
    pub transactions_completed: u64,
    pub transactions_failed: u64,
    pub transactions_cancelled: u64,
    pub invoices_created: u64,
    pub invoices_paid: u64,
    pub invoices_cancelled: u64,
    pub transitions_rejected: u64,
    pub version_conflicts: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<LedgerMetrics>;
