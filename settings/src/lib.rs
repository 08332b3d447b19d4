//! Daybook Settings
//!
//! Versioned singleton configuration: company profile, payment methods,
//! exchange rates and fee schedules. Every update commits a whole new
//! immutable version, so a computation done under an old regime stays
//! reproducible against the values in force at its execution time.
//! Reads hand out [`SettingsSnapshot`]s and never block writers.

pub mod model;
pub mod seed;
pub mod store;

pub use model::{
    CompanyProfile, PaymentMethod, RateChange, SettingsPatch, SettingsSnapshot, SettingsVersion,
};
pub use seed::SettingsSeed;
pub use store::SettingsStore;
