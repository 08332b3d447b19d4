//! Daybook Settlement
//!
//! Pure computation over a settings snapshot: currency conversion against
//! a base-quoted rate sheet, and fee breakdowns per operation type. This
//! crate holds no mutable state and performs no persistence; callers pass
//! in the rate sheet and fee schedule in force at their operation's start.
//!
//! # Example
//!
//! ```rust,ignore
//! use daybook_settlement::{convert, FeeSchedule, RateSheet};
//! use daybook_common::{Currency, Money, OperationType};
//!
//! let sheet = RateSheet::new(Currency::usd())
//!     .with_rate(Currency::cdf(), "2200".parse()?)
//!     .with_rate(Currency::cny(), "6.95".parse()?);
//!
//! let usd = Money::from_str("100.00", Currency::usd())?;
//! let cny = convert(&usd, Currency::cny(), &sheet)?.output;
//! ```

pub mod conversion;
pub mod error;
pub mod fees;
pub mod rates;

pub use conversion::{convert, Conversion};
pub use error::{SettlementError, SettlementResult};
pub use fees::{FeeBreakdown, FeeEntry, FeeRule, FeeSchedule, FeeTier};
pub use rates::RateSheet;
