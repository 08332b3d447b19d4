//! Exchange-rate sheet: every registered currency quoted against one base.

use daybook_common::{Currency, CurrencyPair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{SettlementError, SettlementResult};

/// All exchange rates in force for one settings version.
///
/// Each entry reads "one unit of `base` buys `rate` units of the keyed
/// currency". The base itself is never stored; its rate is identically 1.
/// Any pair of registered currencies converts through the base, so a sheet
/// with CDF and CNY entries supports CDF/CNY without a direct quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSheet {
    /// Base currency the quotes are expressed against.
    base: Currency,
    /// Units of keyed currency per one unit of base.
    rates: BTreeMap<Currency, Decimal>,
}

impl RateSheet {
    /// Create a sheet with no quotes; only the base currency is known.
    pub fn new(base: Currency) -> Self {
        Self {
            base,
            rates: BTreeMap::new(),
        }
    }

    /// The base currency.
    pub fn base(&self) -> &Currency {
        &self.base
    }

    /// Set the quote for a currency. Quoting the base is rejected at
    /// [`validate`](Self::validate) time, not here.
    pub fn set_rate(&mut self, currency: Currency, rate: Decimal) {
        self.rates.insert(currency, rate);
    }

    /// Builder-style [`set_rate`](Self::set_rate).
    pub fn with_rate(mut self, currency: Currency, rate: Decimal) -> Self {
        self.set_rate(currency, rate);
        self
    }

    /// Remove a currency's quote.
    pub fn remove_rate(&mut self, currency: &Currency) -> Option<Decimal> {
        self.rates.remove(currency)
    }

    /// Whether the currency is registered (quoted, or the base itself).
    pub fn knows(&self, currency: &Currency) -> bool {
        *currency == self.base || self.rates.contains_key(currency)
    }

    /// Units of `currency` per one unit of base.
    pub fn units_per_base(&self, currency: &Currency) -> Option<Decimal> {
        if *currency == self.base {
            Some(Decimal::ONE)
        } else {
            self.rates.get(currency).copied()
        }
    }

    /// The quote stored for a non-base currency, if any.
    pub fn quoted_rate(&self, currency: &Currency) -> Option<Decimal> {
        self.rates.get(currency).copied()
    }

    /// Effective rate for a pair: units of `quote` per one unit of `base`
    /// leg of the pair, routed through the sheet's base currency.
    pub fn rate_between(&self, pair: &CurrencyPair) -> SettlementResult<Decimal> {
        if pair.is_identity() && self.knows(&pair.base) {
            return Ok(Decimal::ONE);
        }
        let from = self
            .units_per_base(&pair.base)
            .ok_or_else(|| SettlementError::UnsupportedPair(pair.clone()))?;
        let to = self
            .units_per_base(&pair.quote)
            .ok_or_else(|| SettlementError::UnsupportedPair(pair.clone()))?;
        to.checked_div(from)
            .ok_or_else(|| SettlementError::UnsupportedPair(pair.clone()))
    }

    /// All registered currencies, base first.
    pub fn currencies(&self) -> Vec<Currency> {
        let mut out = Vec::with_capacity(self.rates.len() + 1);
        out.push(self.base.clone());
        out.extend(self.rates.keys().cloned());
        out
    }

    /// Quoted entries in key order.
    pub fn quotes(&self) -> impl Iterator<Item = (&Currency, &Decimal)> {
        self.rates.iter()
    }

    /// Check every quote is usable: positive, and never re-quoting the
    /// base currency.
    pub fn validate(&self) -> Result<(), String> {
        for (currency, rate) in &self.rates {
            if *currency == self.base {
                return Err(format!(
                    "base currency {} must not carry an explicit quote",
                    self.base
                ));
            }
            if *rate <= Decimal::ZERO {
                return Err(format!("rate for {} must be positive, got {}", currency, rate));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sheet() -> RateSheet {
        RateSheet::new(Currency::usd())
            .with_rate(Currency::cdf(), dec!(2200))
            .with_rate(Currency::cny(), dec!(6.95))
            .with_rate(Currency::eur(), dec!(0.90))
    }

    #[test]
    fn test_direct_rate_from_base() {
        let pair = CurrencyPair::new(Currency::usd(), Currency::eur());
        assert_eq!(sheet().rate_between(&pair).unwrap(), dec!(0.90));
    }

    #[test]
    fn test_rate_into_base() {
        let pair = CurrencyPair::new(Currency::cdf(), Currency::usd());
        let rate = sheet().rate_between(&pair).unwrap();
        assert_eq!(rate, Decimal::ONE / dec!(2200));
    }

    #[test]
    fn test_transitive_rate_through_base() {
        let pair = CurrencyPair::new(Currency::cdf(), Currency::cny());
        let rate = sheet().rate_between(&pair).unwrap();
        assert_eq!(rate, dec!(6.95) / dec!(2200));
    }

    #[test]
    fn test_identity_pair() {
        let pair = CurrencyPair::new(Currency::cny(), Currency::cny());
        assert_eq!(sheet().rate_between(&pair).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_unknown_leg_is_unsupported() {
        let pair = CurrencyPair::new(Currency::usd(), Currency::new("GBP"));
        assert!(matches!(
            sheet().rate_between(&pair),
            Err(SettlementError::UnsupportedPair(_))
        ));

        let mut s = sheet();
        s.remove_rate(&Currency::cny());
        let pair = CurrencyPair::new(Currency::cdf(), Currency::cny());
        assert!(matches!(
            s.rate_between(&pair),
            Err(SettlementError::UnsupportedPair(_))
        ));
    }

    #[test]
    fn test_knows_base_without_quote() {
        let s = sheet();
        assert!(s.knows(&Currency::usd()));
        assert!(s.knows(&Currency::cdf()));
        assert!(!s.knows(&Currency::new("GBP")));
    }

    #[test]
    fn test_validate_rejects_non_positive() {
        let s = RateSheet::new(Currency::usd()).with_rate(Currency::cdf(), dec!(0));
        assert!(s.validate().is_err());

        let s = RateSheet::new(Currency::usd()).with_rate(Currency::cdf(), dec!(-1));
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_quoted_base() {
        let s = RateSheet::new(Currency::usd()).with_rate(Currency::usd(), dec!(1));
        assert!(s.validate().is_err());
    }
}
