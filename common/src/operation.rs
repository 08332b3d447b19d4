//! Operation vocabulary: the closed set of operation types that fee rules
//! are keyed on.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fee-bearing operation types. Every settings version must carry a fee
/// rule for each of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// Client money transfer.
    Transfer,
    /// Client goods order paid through the ledger.
    Order,
    /// Movement on behalf of a partner agent.
    Partner,
    /// Inter-account currency swap.
    Swap,
    /// Internal expense or revenue booking.
    Internal,
}

impl OperationType {
    /// All enumerated operation types, in stable order.
    pub const ALL: [OperationType; 5] = [
        OperationType::Transfer,
        OperationType::Order,
        OperationType::Partner,
        OperationType::Swap,
        OperationType::Internal,
    ];
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperationType::Transfer => "transfer",
            OperationType::Order => "order",
            OperationType::Partner => "partner",
            OperationType::Swap => "swap",
            OperationType::Internal => "internal",
        };
        write!(f, "{}", s)
    }
}
