//! Invoices issued to clients.

use daybook_audit::FieldChange;
use daybook_common::{ActorId, ClientId, Currency, InvoiceId, Money, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::status::InvoiceStatus;

/// One line item on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: Decimal,
    /// Price per unit, in the invoice currency.
    pub unit_price: Decimal,
}

impl InvoiceLine {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
        }
    }

    /// Line total before rounding.
    pub fn total(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    /// Check the line's shape. Returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("line description must not be empty".to_string());
        }
        if self.quantity <= Decimal::ZERO {
            return Err(format!("line quantity must be positive, got {}", self.quantity));
        }
        if self.unit_price <= Decimal::ZERO {
            return Err(format!(
                "line unit price must be positive, got {}",
                self.unit_price
            ));
        }
        Ok(())
    }
}

/// One invoice. The total is computed from the lines at creation and
/// rounded half-even at the currency's decimal places.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub client_id: ClientId,
    /// Human-facing invoice number.
    pub number: String,
    pub lines: Vec<InvoiceLine>,
    pub total: Money,
    pub status: InvoiceStatus,
    pub created_at: Timestamp,
    pub created_by: ActorId,
    /// Optimistic concurrency version, starting at 1.
    pub version: u64,
}

impl Invoice {
    /// The invoice currency.
    pub fn currency(&self) -> &Currency {
        &self.total.currency
    }

    /// Creation diff for the audit trail.
    pub fn creation_diff(&self) -> Vec<FieldChange> {
        vec![
            FieldChange::set("number", json!(self.number)),
            FieldChange::set("client_id", json!(self.client_id.to_string())),
            FieldChange::set("lines", json!(self.lines.len())),
            FieldChange::set("total", json!(self.total.value)),
            FieldChange::set("currency", json!(self.currency().code())),
            FieldChange::set("status", json!(self.status)),
        ]
    }
}

/// What a caller submits to create an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub client_id: ClientId,
    pub number: String,
    pub currency: Currency,
    pub lines: Vec<InvoiceLine>,
}

impl InvoiceDraft {
    /// Sum of the line totals, rounded to the currency's decimal places.
    pub fn total(&self) -> Money {
        let sum: Decimal = self.lines.iter().map(InvoiceLine::total).sum();
        Money::new(sum, self.currency.clone()).round()
    }

    /// Check the draft's shape. Returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.number.trim().is_empty() {
            return Err("invoice number must not be empty".to_string());
        }
        if self.lines.is_empty() {
            return Err("invoice must have at least one line".to_string());
        }
        for (index, line) in self.lines.iter().enumerate() {
            line.validate().map_err(|e| format!("line {}: {}", index + 1, e))?;
        }
        Ok(())
    }
}
