//! Versioned settings model: one immutable value per committed version.

use daybook_common::{ActorId, Currency, OperationType, Timestamp};
use daybook_settlement::{FeeEntry, FeeSchedule, RateSheet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Company identity shown on documents and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub name: String,
    pub address: String,
    pub contact: String,
}

impl CompanyProfile {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("company name must not be empty".to_string());
        }
        Ok(())
    }
}

/// A payment channel clients can settle through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    /// Stable machine code, e.g. "mobile_money".
    pub code: String,
    /// Human label shown in the UI.
    pub label: String,
    /// Inactive methods stay listed but refuse new transactions.
    pub active: bool,
}

impl PaymentMethod {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
            active: true,
        }
    }
}

/// One committed settings version. Versions are immutable; every update
/// commits a whole new one, so computations done under an old regime stay
/// auditable against the values in force at their execution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsVersion {
    /// Monotonically increasing version number, starting at 1.
    pub version: u64,
    /// When this version was committed.
    pub committed_at: Timestamp,
    /// Who committed it.
    pub committed_by: ActorId,
    /// Company identity.
    pub profile: CompanyProfile,
    /// Registered payment methods.
    pub payment_methods: Vec<PaymentMethod>,
    /// Exchange rates against the base currency.
    pub rates: RateSheet,
    /// Fee rules per operation type.
    pub fees: FeeSchedule,
}

impl SettingsVersion {
    /// Whether the currency is registered in this version.
    pub fn knows_currency(&self, currency: &Currency) -> bool {
        self.rates.knows(currency)
    }

    /// The active payment method with the given code.
    pub fn payment_method(&self, code: &str) -> Option<&PaymentMethod> {
        self.payment_methods.iter().find(|m| m.code == code)
    }

    /// Validate the whole version; an update never commits a version
    /// failing this.
    pub fn validate(&self) -> Result<(), String> {
        self.profile.validate()?;
        self.rates.validate()?;
        self.fees.validate()?;
        for method in &self.payment_methods {
            if method.code.trim().is_empty() {
                return Err("payment method code must not be empty".to_string());
            }
        }
        let mut codes: Vec<&str> = self.payment_methods.iter().map(|m| m.code.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        if codes.len() != self.payment_methods.len() {
            return Err("payment method codes must be unique".to_string());
        }
        Ok(())
    }
}

/// A shared, immutable read of one settings version.
///
/// Operations fetch one snapshot at their start and use it throughout, so
/// a settings update mid-operation never mixes rate regimes within one
/// computation.
pub type SettingsSnapshot = std::sync::Arc<SettingsVersion>;

/// One change request against the current version. Every variant replaces
/// or adjusts a whole section; the store validates the resulting version
/// all-or-nothing before committing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsPatch {
    /// Replace the company profile.
    Profile(CompanyProfile),
    /// Replace the payment method registry.
    PaymentMethods(Vec<PaymentMethod>),
    /// Set or overwrite one currency's quote against the base.
    SetRate { currency: Currency, rate: Decimal },
    /// Drop one currency's quote.
    RemoveRate(Currency),
    /// Replace the whole rate sheet.
    ReplaceRates(RateSheet),
    /// Set or overwrite one operation type's fee entry.
    SetFee {
        operation: OperationType,
        entry: FeeEntry,
    },
    /// Replace the whole fee schedule.
    ReplaceFees(FeeSchedule),
}

impl SettingsPatch {
    /// Name of the section the patch touches, used in audit diffs.
    pub fn section(&self) -> &'static str {
        match self {
            SettingsPatch::Profile(_) => "profile",
            SettingsPatch::PaymentMethods(_) => "payment_methods",
            SettingsPatch::SetRate { .. }
            | SettingsPatch::RemoveRate(_)
            | SettingsPatch::ReplaceRates(_) => "rates",
            SettingsPatch::SetFee { .. } | SettingsPatch::ReplaceFees(_) => "fees",
        }
    }
}

/// One observed change of a currency's quote across versions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateChange {
    /// Version that introduced the new quote.
    pub version: u64,
    pub changed_at: Timestamp,
    pub changed_by: ActorId,
    /// Quote before the change; `None` when the currency was introduced.
    pub old_rate: Option<Decimal>,
    /// Quote after the change; `None` when the currency was dropped.
    pub new_rate: Option<Decimal>,
    /// Signed percent variation, when both sides exist.
    pub variation_percent: Option<Decimal>,
}

impl RateChange {
    /// Percent variation between two quotes, rounded to two places.
    pub fn variation_between(old: Decimal, new: Decimal) -> Option<Decimal> {
        if old.is_zero() {
            return None;
        }
        Some(((new - old) / old * Decimal::ONE_HUNDRED).round_dp(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn version() -> SettingsVersion {
        SettingsVersion {
            version: 1,
            committed_at: daybook_common::now(),
            committed_by: ActorId::new(),
            profile: CompanyProfile {
                name: "Daybook Exchange".to_string(),
                address: "12 Avenue du Commerce, Lubumbashi".to_string(),
                contact: "ops@daybook.example".to_string(),
            },
            payment_methods: vec![
                PaymentMethod::new("cash", "Cash"),
                PaymentMethod::new("mobile_money", "Mobile money"),
            ],
            rates: RateSheet::new(Currency::usd()).with_rate(Currency::cdf(), dec!(2200)),
            fees: FeeSchedule::new(),
        }
    }

    #[test]
    fn test_knows_currency() {
        let v = version();
        assert!(v.knows_currency(&Currency::usd()));
        assert!(v.knows_currency(&Currency::cdf()));
        assert!(!v.knows_currency(&Currency::cny()));
    }

    #[test]
    fn test_validate_rejects_duplicate_method_codes() {
        let mut v = version();
        v.payment_methods.push(PaymentMethod::new("cash", "Cash again"));
        assert!(v.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_company_name() {
        let mut v = version();
        v.profile.name = "  ".to_string();
        assert!(v.validate().is_err());
    }

    #[test]
    fn test_variation_percent() {
        assert_eq!(
            RateChange::variation_between(dec!(0.90), dec!(0.95)),
            Some(dec!(5.56))
        );
        assert_eq!(
            RateChange::variation_between(dec!(2200), dec!(2145)),
            Some(dec!(-2.50))
        );
        assert_eq!(RateChange::variation_between(dec!(0), dec!(1)), None);
    }

    #[test]
    fn test_patch_sections() {
        assert_eq!(
            SettingsPatch::SetRate {
                currency: Currency::cny(),
                rate: dec!(6.95),
            }
            .section(),
            "rates"
        );
        assert_eq!(SettingsPatch::ReplaceFees(FeeSchedule::new()).section(), "fees");
    }
}
