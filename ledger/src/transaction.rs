//! Transaction variants over a common envelope.

use daybook_audit::FieldChange;
use daybook_common::{
    AccountId, ActorId, ClientId, Currency, Money, OperationType, TimeRange, Timestamp,
    TransactionId,
};
use daybook_settlement::{Conversion, FeeBreakdown};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

use crate::status::TransactionStatus;

/// Direction of a client transaction, seen from the ledger's books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Money coming in from the client.
    Credit,
    /// Money going out to the client.
    Debit,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Credit => write!(f, "credit"),
            Direction::Debit => write!(f, "debit"),
        }
    }
}

/// Booking category of an internal operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InternalCategory {
    Expense,
    Revenue,
}

impl fmt::Display for InternalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalCategory::Expense => write!(f, "expense"),
            InternalCategory::Revenue => write!(f, "revenue"),
        }
    }
}

/// The variant-specific half of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Movement for an external client.
    Client {
        client_id: ClientId,
        direction: Direction,
    },
    /// Internal booking against one of the house accounts.
    Internal {
        account: AccountId,
        category: InternalCategory,
    },
    /// Currency swap between two house accounts. The conversion record is
    /// captured at creation time and never recomputed, so the swap stays
    /// reproducible from stored data after later rate changes.
    Swap {
        source_account: AccountId,
        destination_account: AccountId,
        conversion: Conversion,
    },
}

impl TransactionKind {
    /// Variant label used in filters, logs and audit diffs.
    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Client { .. } => "client",
            TransactionKind::Internal { .. } => "internal",
            TransactionKind::Swap { .. } => "swap",
        }
    }

    /// The linked client, when the variant has one.
    pub fn client_id(&self) -> Option<ClientId> {
        match self {
            TransactionKind::Client { client_id, .. } => Some(*client_id),
            _ => None,
        }
    }
}

/// One ledger transaction: common envelope plus variant payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identity, time-ordered.
    pub id: TransactionId,
    /// When the transaction was recorded.
    pub created_at: Timestamp,
    /// Who recorded it.
    pub created_by: ActorId,
    /// Principal amount and currency.
    pub amount: Money,
    /// Operation type the fee rule was selected by.
    pub operation: OperationType,
    /// Current lifecycle status.
    pub status: TransactionStatus,
    /// Fee breakdown computed at creation from the settings snapshot then
    /// in force.
    pub fee: FeeBreakdown,
    /// Variant payload.
    pub kind: TransactionKind,
    /// Optimistic concurrency version, starting at 1.
    pub version: u64,
}

impl Transaction {
    /// The transaction currency.
    pub fn currency(&self) -> &Currency {
        &self.amount.currency
    }

    /// The linked client, when the variant has one.
    pub fn client_id(&self) -> Option<ClientId> {
        self.kind.client_id()
    }

    /// Creation diff for the audit trail: one `set` per envelope field.
    pub fn creation_diff(&self) -> Vec<FieldChange> {
        vec![
            FieldChange::set("kind", json!(self.kind.label())),
            FieldChange::set("amount", json!(self.amount.value)),
            FieldChange::set("currency", json!(self.currency().code())),
            FieldChange::set("operation", json!(self.operation)),
            FieldChange::set("status", json!(self.status)),
            FieldChange::set("fee", json!(self.fee.fee.value)),
        ]
    }
}

/// What a caller submits to create a transaction. Shape checks live here;
/// checks needing the settings snapshot or the client registry live in
/// the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionDraft {
    Client {
        client_id: ClientId,
        direction: Direction,
        operation: OperationType,
        amount: Money,
    },
    Internal {
        account: AccountId,
        category: InternalCategory,
        amount: Money,
    },
    Swap {
        source_account: AccountId,
        destination_account: AccountId,
        amount: Money,
        target_currency: Currency,
    },
}

impl TransactionDraft {
    /// Principal amount of the draft.
    pub fn amount(&self) -> &Money {
        match self {
            TransactionDraft::Client { amount, .. } => amount,
            TransactionDraft::Internal { amount, .. } => amount,
            TransactionDraft::Swap { amount, .. } => amount,
        }
    }

    /// Operation type the fee rule is selected by.
    pub fn operation(&self) -> OperationType {
        match self {
            TransactionDraft::Client { operation, .. } => *operation,
            TransactionDraft::Internal { .. } => OperationType::Internal,
            TransactionDraft::Swap { .. } => OperationType::Swap,
        }
    }

    /// Check the draft's shape. Returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if !self.amount().is_positive() {
            return Err(format!(
                "amount must be positive, got {}",
                self.amount().value
            ));
        }
        match self {
            TransactionDraft::Client { operation, .. } => {
                if !matches!(
                    operation,
                    OperationType::Transfer | OperationType::Order | OperationType::Partner
                ) {
                    return Err(format!(
                        "client transactions must use a client operation type, got {}",
                        operation
                    ));
                }
            }
            TransactionDraft::Internal { account, .. } => {
                if !account.is_valid() {
                    return Err(format!("invalid account id: {}", account));
                }
            }
            TransactionDraft::Swap {
                source_account,
                destination_account,
                amount,
                target_currency,
            } => {
                if !source_account.is_valid() {
                    return Err(format!("invalid source account id: {}", source_account));
                }
                if !destination_account.is_valid() {
                    return Err(format!(
                        "invalid destination account id: {}",
                        destination_account
                    ));
                }
                if source_account == destination_account {
                    return Err("source and destination account must differ".to_string());
                }
                if amount.currency == *target_currency {
                    return Err("swap currencies must differ".to_string());
                }
            }
        }
        Ok(())
    }
}

/// Read-side filter for transaction queries.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    /// Variant label: "client", "internal" or "swap".
    pub kind: Option<&'static str>,
    pub operation: Option<OperationType>,
    pub currency: Option<Currency>,
    pub client_id: Option<ClientId>,
    pub created: Option<TimeRange>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
}

impl TransactionFilter {
    /// Whether the transaction passes every set criterion.
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(status) = self.status {
            if tx.status != status {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if tx.kind.label() != kind {
                return false;
            }
        }
        if let Some(operation) = self.operation {
            if tx.operation != operation {
                return false;
            }
        }
        if let Some(currency) = &self.currency {
            if tx.currency() != currency {
                return false;
            }
        }
        if let Some(client_id) = self.client_id {
            if tx.client_id() != Some(client_id) {
                return false;
            }
        }
        if let Some(range) = self.created {
            if !range.contains(tx.created_at) {
                return false;
            }
        }
        if let Some(min) = self.min_amount {
            if tx.amount.value < min {
                return false;
            }
        }
        if let Some(max) = self.max_amount {
            if tx.amount.value > max {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_draft_rejects_non_positive_amount() {
        let draft = TransactionDraft::Internal {
            account: AccountId::new("caisse-usd"),
            category: InternalCategory::Expense,
            amount: Money::new(dec!(0), Currency::usd()),
        };
        assert!(draft.validate().is_err());

        let draft = TransactionDraft::Internal {
            account: AccountId::new("caisse-usd"),
            category: InternalCategory::Expense,
            amount: Money::new(dec!(-5), Currency::usd()),
        };
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_client_draft_needs_client_operation() {
        let draft = TransactionDraft::Client {
            client_id: ClientId::new(),
            direction: Direction::Credit,
            operation: OperationType::Internal,
            amount: Money::new(dec!(100), Currency::usd()),
        };
        assert!(draft.validate().is_err());

        let draft = TransactionDraft::Client {
            client_id: ClientId::new(),
            direction: Direction::Credit,
            operation: OperationType::Transfer,
            amount: Money::new(dec!(100), Currency::usd()),
        };
        assert!(draft.validate().is_ok());
        assert_eq!(draft.operation(), OperationType::Transfer);
    }

    #[test]
    fn test_swap_draft_shape_checks() {
        let base = TransactionDraft::Swap {
            source_account: AccountId::new("caisse-usd"),
            destination_account: AccountId::new("caisse-cdf"),
            amount: Money::new(dec!(100), Currency::usd()),
            target_currency: Currency::cdf(),
        };
        assert!(base.validate().is_ok());
        assert_eq!(base.operation(), OperationType::Swap);

        let same_account = TransactionDraft::Swap {
            source_account: AccountId::new("caisse-usd"),
            destination_account: AccountId::new("caisse-usd"),
            amount: Money::new(dec!(100), Currency::usd()),
            target_currency: Currency::cdf(),
        };
        assert!(same_account.validate().is_err());

        let same_currency = TransactionDraft::Swap {
            source_account: AccountId::new("caisse-usd"),
            destination_account: AccountId::new("caisse-cdf"),
            amount: Money::new(dec!(100), Currency::usd()),
            target_currency: Currency::usd(),
        };
        assert!(same_currency.validate().is_err());

        let bad_account = TransactionDraft::Swap {
            source_account: AccountId::new("Caisse USD"),
            destination_account: AccountId::new("caisse-cdf"),
            amount: Money::new(dec!(100), Currency::usd()),
            target_currency: Currency::cdf(),
        };
        assert!(bad_account.validate().is_err());
    }

    #[test]
    fn test_filter_amount_range() {
        let tx = Transaction {
            id: TransactionId::new(),
            created_at: daybook_common::now(),
            created_by: ActorId::new(),
            amount: Money::new(dec!(250), Currency::usd()),
            operation: OperationType::Transfer,
            status: TransactionStatus::Pending,
            fee: FeeBreakdown {
                fee: Money::zero(Currency::usd()),
                partner_commission: Money::zero(Currency::usd()),
                net_margin: Money::zero(Currency::usd()),
            },
            kind: TransactionKind::Client {
                client_id: ClientId::new(),
                direction: Direction::Credit,
            },
            version: 1,
        };

        let mut filter = TransactionFilter {
            min_amount: Some(dec!(100)),
            max_amount: Some(dec!(300)),
            ..Default::default()
        };
        assert!(filter.matches(&tx));

        filter.max_amount = Some(dec!(200));
        assert!(!filter.matches(&tx));

        let by_kind = TransactionFilter {
            kind: Some("swap"),
            ..Default::default()
        };
        assert!(!by_kind.matches(&tx));
    }
}
