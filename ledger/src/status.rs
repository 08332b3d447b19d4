//! Transaction and invoice status state machines.
//!
//! Both machines are closed transition tables: a status change is accepted
//! only when the target appears in the current status's
//! `valid_transitions()` slice, and terminal states have empty slices.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a transaction, shared across all variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Recorded, not yet picked up.
    Pending,
    /// Being executed.
    Processing,
    /// Executed successfully. Terminal.
    Completed,
    /// Withdrawn before processing started. Terminal.
    Cancelled,
    /// Execution failed after processing started. Terminal.
    Failed,
}

impl TransactionStatus {
    /// Check if this is a terminal state.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Cancelled | TransactionStatus::Failed
        )
    }

    /// Get valid next states from the current state.
    pub fn valid_transitions(&self) -> &'static [TransactionStatus] {
        match self {
            TransactionStatus::Pending => {
                &[TransactionStatus::Processing, TransactionStatus::Cancelled]
            }
            TransactionStatus::Processing => {
                &[TransactionStatus::Completed, TransactionStatus::Failed]
            }
            TransactionStatus::Completed => &[],
            TransactionStatus::Cancelled => &[],
            TransactionStatus::Failed => &[],
        }
    }

    /// Check if a transition to the given state is valid.
    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Being drafted, not yet sent to the client.
    Draft,
    /// Sent, awaiting payment.
    Issued,
    /// Paid in full. Terminal.
    Paid,
    /// Withdrawn. Terminal.
    Cancelled,
}

impl InvoiceStatus {
    /// Check if this is a terminal state.
    pub fn is_final(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    /// Get valid next states from the current state.
    pub fn valid_transitions(&self) -> &'static [InvoiceStatus] {
        match self {
            InvoiceStatus::Draft => &[InvoiceStatus::Issued, InvoiceStatus::Cancelled],
            InvoiceStatus::Issued => &[InvoiceStatus::Paid, InvoiceStatus::Cancelled],
            InvoiceStatus::Paid => &[],
            InvoiceStatus::Cancelled => &[],
        }
    }

    /// Check if a transition to the given state is valid.
    pub fn can_transition_to(&self, next: InvoiceStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}
