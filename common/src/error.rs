//! Error types for daybook operations.

use crate::{ActorId, Currency, CurrencyPair, EntityRef, EntityType, Grant, OperationType};
use thiserror::Error;

/// Main error type for daybook operations.
///
/// Every variant carries enough structure (kind, entity reference, detail)
/// for a caller to render an actionable message without inspecting internal
/// state.
#[derive(Error, Debug)]
pub enum DaybookError {
    /// Malformed input; the caller can correct and resubmit.
    #[error("Validation failed for {entity}: {detail}")]
    Validation {
        entity: EntityRef,
        detail: String,
        field: Option<String>,
    },

    /// Status change not present in the transition table. The entity is
    /// untouched.
    #[error("Invalid transition for {entity}: {from} -> {to}")]
    InvalidTransition {
        entity: EntityRef,
        from: String,
        to: String,
    },

    /// The entity version advanced under the caller; re-read and retry.
    #[error("Concurrent modification of {entity}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        entity: EntityRef,
        expected: u64,
        actual: u64,
    },

    /// Currency is not registered in the settings in force.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(Currency),

    /// No rate path between the two currencies, direct or through the
    /// base currency.
    #[error("Unsupported currency pair: {0}")]
    UnsupportedCurrencyPair(CurrencyPair),

    /// The operation type has no configured fee rule.
    #[error("No fee rule configured for operation type: {0}")]
    FeeRuleNotFound(OperationType),

    /// The actor's role does not hold the required grant.
    #[error("Permission denied: actor {actor} lacks {grant} on {entity}")]
    PermissionDenied {
        actor: ActorId,
        entity: EntityType,
        grant: Grant,
    },

    /// Entity does not exist.
    #[error("Not found: {0}")]
    NotFound(EntityRef),

    /// Storage-layer failure. The enclosing mutation was rolled back and
    /// the caller's view of the entity is unchanged.
    #[error("Persistence failure: {0}")]
    Persistence(String),
}

impl DaybookError {
    /// Check if the caller should re-read and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DaybookError::ConcurrentModification { .. })
    }

    /// Check if resolving this error needs an administrator to fix the
    /// configuration rather than the caller to change the request.
    pub fn is_configuration_gap(&self) -> bool {
        matches!(
            self,
            DaybookError::UnknownCurrency(_)
                | DaybookError::UnsupportedCurrencyPair(_)
                | DaybookError::FeeRuleNotFound(_)
        )
    }

    /// Stable code for presentation-layer dispatch.
    pub fn error_code(&self) -> &'static str {
        match self {
            DaybookError::Validation { .. } => "VALIDATION",
            DaybookError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DaybookError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            DaybookError::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
            DaybookError::UnsupportedCurrencyPair(_) => "UNSUPPORTED_CURRENCY_PAIR",
            DaybookError::FeeRuleNotFound(_) => "FEE_RULE_NOT_FOUND",
            DaybookError::PermissionDenied { .. } => "PERMISSION_DENIED",
            DaybookError::NotFound(_) => "NOT_FOUND",
            DaybookError::Persistence(_) => "PERSISTENCE",
        }
    }

    /// Entity the error is about, when it names one.
    pub fn entity(&self) -> Option<&EntityRef> {
        match self {
            DaybookError::Validation { entity, .. } => Some(entity),
            DaybookError::InvalidTransition { entity, .. } => Some(entity),
            DaybookError::ConcurrentModification { entity, .. } => Some(entity),
            DaybookError::NotFound(entity) => Some(entity),
            _ => None,
        }
    }

    /// Flatten into the report shape handed to the presentation layer.
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.error_code().to_string(),
            message: self.to_string(),
            entity: self.entity().map(|e| e.to_string()),
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(entity: EntityRef, detail: impl Into<String>) -> Self {
        DaybookError::Validation {
            entity,
            detail: detail.into(),
            field: None,
        }
    }

    /// Shorthand for a validation failure on a named field.
    pub fn validation_field(
        entity: EntityRef,
        field: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        DaybookError::Validation {
            entity,
            detail: detail.into(),
            field: Some(field.into()),
        }
    }
}

/// Result type alias for daybook operations.
pub type Result<T> = std::result::Result<T, DaybookError>;

/// Flat error shape for the presentation layer.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Stable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Entity reference, when the error names one.
    pub entity: Option<String>,
}
