//! Bootstrap values for the first settings version.

use daybook_common::{Currency, OperationType};
use daybook_settlement::{FeeEntry, FeeRule, FeeSchedule, RateSheet};
use rust_decimal::Decimal;

use crate::model::{CompanyProfile, PaymentMethod};

/// Initial configuration installed as settings version 1.
///
/// Defaults mirror a small USD-based exchange desk: CDF and CNY quoted
/// against a USD base, percentage fees on client operations and a partner
/// commission carved out of the transfer fee.
#[derive(Debug, Clone)]
pub struct SettingsSeed {
    pub profile: CompanyProfile,
    pub payment_methods: Vec<PaymentMethod>,
    pub rates: RateSheet,
    pub fees: FeeSchedule,
}

impl Default for SettingsSeed {
    fn default() -> Self {
        let rates = RateSheet::new(Currency::usd())
            .with_rate(Currency::cdf(), Decimal::from(2200))
            .with_rate(Currency::cny(), Decimal::new(695, 2));

        let fees = FeeSchedule::new()
            .with_entry(
                OperationType::Transfer,
                FeeEntry::new(FeeRule::Percentage(Decimal::new(5, 2)))
                    .with_partner_rate(Decimal::new(3, 2)),
            )
            .with_entry(
                OperationType::Order,
                FeeEntry::new(FeeRule::Percentage(Decimal::new(15, 2))),
            )
            .with_entry(
                OperationType::Partner,
                FeeEntry::new(FeeRule::Percentage(Decimal::new(3, 2))),
            )
            .with_entry(OperationType::Swap, FeeEntry::new(FeeRule::Flat(Decimal::ZERO)))
            .with_entry(
                OperationType::Internal,
                FeeEntry::new(FeeRule::Flat(Decimal::ZERO)),
            );

        Self {
            profile: CompanyProfile {
                name: "Daybook Exchange".to_string(),
                address: "12 Avenue du Commerce, Lubumbashi".to_string(),
                contact: "ops@daybook.example".to_string(),
            },
            payment_methods: vec![
                PaymentMethod::new("cash", "Cash"),
                PaymentMethod::new("mobile_money", "Mobile money"),
                PaymentMethod::new("bank_transfer", "Bank transfer"),
            ],
            rates,
            fees,
        }
    }
}

impl SettingsSeed {
    /// Validate the seed the same way an update is validated.
    pub fn validate(&self) -> Result<(), String> {
        self.profile.validate()?;
        self.rates.validate()?;
        self.fees.validate()
    }
}
