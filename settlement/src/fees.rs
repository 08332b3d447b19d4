//! Fee schedules: per-operation-type fee rules and partner commissions.

use daybook_common::{Money, OperationType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SettlementError, SettlementResult};

/// How the fee for an operation type is computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeRule {
    /// Fixed amount, denominated in the transaction currency.
    Flat(Decimal),
    /// Fraction of the amount, e.g. 0.05 for 5%.
    Percentage(Decimal),
    /// Fraction selected by amount bracket. Each tier applies from its
    /// `min_amount` (inclusive) up to the next tier's bound.
    Tiered(Vec<FeeTier>),
}

/// One bracket of a tiered rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    /// Inclusive lower bound of the bracket.
    pub min_amount: Decimal,
    /// Fraction applied to the whole amount within this bracket.
    pub rate: Decimal,
}

impl FeeRule {
    /// Check the rule's shape. Returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            FeeRule::Flat(amount) => {
                if *amount < Decimal::ZERO {
                    return Err(format!("flat fee must not be negative, got {}", amount));
                }
            }
            FeeRule::Percentage(rate) => {
                if *rate < Decimal::ZERO || *rate > Decimal::ONE {
                    return Err(format!("percentage rate must be within [0, 1], got {}", rate));
                }
            }
            FeeRule::Tiered(tiers) => {
                if tiers.is_empty() {
                    return Err("tiered rule must have at least one tier".to_string());
                }
                if tiers[0].min_amount != Decimal::ZERO {
                    return Err(format!(
                        "first tier must start at 0, got {}",
                        tiers[0].min_amount
                    ));
                }
                for window in tiers.windows(2) {
                    if window[1].min_amount <= window[0].min_amount {
                        return Err(format!(
                            "tier bounds must be strictly increasing, got {} after {}",
                            window[1].min_amount, window[0].min_amount
                        ));
                    }
                }
                for tier in tiers {
                    if tier.rate < Decimal::ZERO || tier.rate > Decimal::ONE {
                        return Err(format!(
                            "tier rate must be within [0, 1], got {}",
                            tier.rate
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// The raw (unrounded) fee for an amount.
    fn raw_fee(&self, amount: Decimal) -> Decimal {
        match self {
            FeeRule::Flat(fee) => *fee,
            FeeRule::Percentage(rate) => amount * rate,
            FeeRule::Tiered(tiers) => {
                // Brackets are lower-bound inclusive: pick the last tier
                // whose bound does not exceed the amount.
                let rate = tiers
                    .iter()
                    .rev()
                    .find(|tier| amount >= tier.min_amount)
                    .map(|tier| tier.rate)
                    .unwrap_or(Decimal::ZERO);
                amount * rate
            }
        }
    }
}

/// Fee rule plus optional partner commission for one operation type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEntry {
    /// How the fee is computed.
    pub rule: FeeRule,
    /// Fraction of the amount owed to the partner agent, if any.
    pub partner_rate: Option<Decimal>,
}

impl FeeEntry {
    /// Entry with no partner commission.
    pub fn new(rule: FeeRule) -> Self {
        Self {
            rule,
            partner_rate: None,
        }
    }

    /// Attach a partner commission rate.
    pub fn with_partner_rate(mut self, rate: Decimal) -> Self {
        self.partner_rate = Some(rate);
        self
    }

    /// Check rule shape and commission bounds.
    pub fn validate(&self) -> Result<(), String> {
        self.rule.validate()?;
        if let Some(rate) = self.partner_rate {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(format!(
                    "partner commission rate must be within [0, 1], got {}",
                    rate
                ));
            }
        }
        Ok(())
    }
}

/// Fee computed for one operation.
///
/// `net_margin` is what the house keeps: the fee minus the partner's
/// commission. It can go negative when the commission rate outruns the
/// fee rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    /// Fee charged, in the transaction currency.
    pub fee: Money,
    /// Partner commission, zero when no partner rate is configured.
    pub partner_commission: Money,
    /// Fee minus partner commission.
    pub net_margin: Money,
}

/// All fee entries in force for one settings version.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeSchedule {
    entries: BTreeMap<OperationType, FeeEntry>,
}

impl FeeSchedule {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entry for an operation type.
    pub fn set(&mut self, operation: OperationType, entry: FeeEntry) {
        self.entries.insert(operation, entry);
    }

    /// Builder-style [`set`](Self::set).
    pub fn with_entry(mut self, operation: OperationType, entry: FeeEntry) -> Self {
        self.set(operation, entry);
        self
    }

    /// The entry for an operation type, if configured.
    pub fn entry(&self, operation: OperationType) -> Option<&FeeEntry> {
        self.entries.get(&operation)
    }

    /// Compute the fee breakdown for an operation.
    ///
    /// A missing entry is an error, never a silent zero fee: a schedule
    /// gap needs an administrator, not a default.
    pub fn compute(&self, operation: OperationType, amount: &Money) -> SettlementResult<FeeBreakdown> {
        let entry = self
            .entries
            .get(&operation)
            .ok_or(SettlementError::FeeRuleNotFound(operation))?;

        let currency = amount.currency.clone();
        let fee = Money::new(entry.rule.raw_fee(amount.value), currency.clone()).round();
        let commission = match entry.partner_rate {
            Some(rate) => Money::new(amount.value * rate, currency.clone()).round(),
            None => Money::zero(currency.clone()),
        };
        let net_margin = Money::new(fee.value - commission.value, currency);

        Ok(FeeBreakdown {
            fee,
            partner_commission: commission,
            net_margin,
        })
    }

    /// Check every enumerated operation type resolves and every entry is
    /// well-formed.
    pub fn validate(&self) -> Result<(), String> {
        for operation in OperationType::ALL {
            match self.entries.get(&operation) {
                Some(entry) => entry
                    .validate()
                    .map_err(|e| format!("fee entry for {}: {}", operation, e))?,
                None => return Err(format!("missing fee rule for operation type {}", operation)),
            }
        }
        Ok(())
    }

    /// Configured entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&OperationType, &FeeEntry)> {
        self.entries.iter()
    }
}
