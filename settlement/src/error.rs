//! Settlement computation error types.

use daybook_common::{CurrencyPair, DaybookError, OperationType};
use thiserror::Error;

/// Errors that can occur during settlement computation.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// No rate path between the two currencies, direct or through the
    /// base currency.
    #[error("Unsupported currency pair: {0}")]
    UnsupportedPair(CurrencyPair),

    /// The operation type has no configured fee rule. Never defaulted to
    /// a zero fee; the enclosing mutation must fail.
    #[error("No fee rule configured for operation type: {0}")]
    FeeRuleNotFound(OperationType),
}

impl From<SettlementError> for DaybookError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::UnsupportedPair(pair) => DaybookError::UnsupportedCurrencyPair(pair),
            SettlementError::FeeRuleNotFound(op) => DaybookError::FeeRuleNotFound(op),
        }
    }
}

/// Result type for settlement computations.
pub type SettlementResult<T> = Result<T, SettlementError>;
