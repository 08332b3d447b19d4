//! Currency conversion against a rate sheet.

use daybook_common::{Currency, CurrencyPair, Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SettlementResult;
use crate::rates::RateSheet;

/// Result of converting an amount between currencies.
///
/// The rate is the effective units-of-target per unit-of-source figure
/// actually applied. Callers that persist a conversion (account swaps)
/// store this record verbatim so the outcome stays reproducible after
/// later rate changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    /// Input amount.
    pub input: Money,
    /// Output amount, rounded to the target currency's decimal places.
    pub output: Money,
    /// Effective rate applied, unrounded.
    pub rate: Decimal,
}

impl Conversion {
    /// Get the currency pair.
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(self.input.currency.clone(), self.output.currency.clone())
    }
}

/// Convert `amount` into `target` using the sheet's rates.
///
/// Routing is always through the sheet's base currency, so any two
/// registered currencies convert even without a direct quote. The output
/// is rounded half-even at the target currency's decimal places.
pub fn convert(amount: &Money, target: Currency, sheet: &RateSheet) -> SettlementResult<Conversion> {
    let pair = CurrencyPair::new(amount.currency.clone(), target.clone());
    let rate = sheet.rate_between(&pair)?;
    let output = Money::new(amount.value * rate, target).round();
    Ok(Conversion {
        input: amount.clone(),
        output,
        rate,
    })
}
