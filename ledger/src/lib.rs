//! Daybook Ledger
//!
//! Transaction and invoice lifecycle over the shared audit trail. Client
//! movements, internal bookings and currency swaps share one envelope and
//! one closed status graph; fees and conversions are priced from the
//! settings snapshot in force when the transaction is recorded.

pub mod config;
pub mod engine;
pub mod invoice;
pub mod metrics;
pub mod status;
pub mod transaction;

pub use config::LedgerConfig;
pub use engine::LedgerEngine;
pub use invoice::{Invoice, InvoiceDraft, InvoiceLine};
pub use metrics::{LedgerMetrics, LedgerMetricsSnapshot, SharedMetrics};
pub use status::{InvoiceStatus, TransactionStatus};
pub use transaction::{
    Direction, InternalCategory, Transaction, TransactionDraft, TransactionFilter, TransactionKind,
};
