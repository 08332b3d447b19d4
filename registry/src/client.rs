//! Client entity, drafts and patches.

use daybook_audit::FieldChange;
use daybook_common::{ActorId, ClientId, Currency, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Client lifecycle status. Archived clients stay readable and keep their
/// full history; they only stop accepting new business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    Archived,
}

impl fmt::Display for ClientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientStatus::Active => write!(f, "active"),
            ClientStatus::Archived => write!(f, "archived"),
        }
    }
}

/// One registered client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    /// Immutable identity.
    pub id: ClientId,
    /// Display name.
    pub name: String,
    /// Contact phone number.
    pub phone: Option<String>,
    /// City of residence.
    pub city: Option<String>,
    /// Preferred transaction currency.
    pub currency: Currency,
    /// Lifecycle status.
    pub status: ClientStatus,
    /// Optimistic concurrency version, starting at 1.
    pub version: u64,
    /// When the client was registered.
    pub created_at: Timestamp,
    /// Who registered the client.
    pub created_by: ActorId,
    /// When the client was last mutated.
    pub updated_at: Timestamp,
}

impl Client {
    /// Whether the client accepts new business.
    pub fn is_active(&self) -> bool {
        self.status == ClientStatus::Active
    }

    /// The mutable fields as a flat JSON object, the shape audit diffs
    /// are computed over. Folding a client's audit entries reproduces
    /// exactly this value.
    pub fn fields(&self) -> Value {
        json!({
            "name": self.name,
            "phone": self.phone,
            "city": self.city,
            "currency": self.currency.code(),
            "status": self.status,
        })
    }
}

/// Fields required to register a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDraft {
    pub name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub currency: Currency,
}

impl ClientDraft {
    pub fn new(name: impl Into<String>, currency: Currency) -> Self {
        Self {
            name: name.into(),
            phone: None,
            city: None,
            currency,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    /// Check the draft's shape. Returns a description of the first problem.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("client name must not be empty".to_string());
        }
        Ok(())
    }
}

/// Partial update against a client. `None` fields are left unchanged; a
/// patch equal to current state still commits, producing an audit entry
/// with an empty diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub currency: Option<Currency>,
}

impl ClientPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    /// Apply the patch to a client, returning the field-level diff. The
    /// client's version and `updated_at` are the caller's to bump; a
    /// no-op patch yields an empty diff.
    pub fn apply(&self, client: &mut Client) -> Vec<FieldChange> {
        let mut diff = Vec::new();
        if let Some(name) = &self.name {
            if *name != client.name {
                diff.push(FieldChange::changed(
                    "name",
                    json!(client.name),
                    json!(name),
                ));
                client.name = name.clone();
            }
        }
        if let Some(phone) = &self.phone {
            if Some(phone) != client.phone.as_ref() {
                diff.push(FieldChange::changed(
                    "phone",
                    json!(client.phone),
                    json!(phone),
                ));
                client.phone = Some(phone.clone());
            }
        }
        if let Some(city) = &self.city {
            if Some(city) != client.city.as_ref() {
                diff.push(FieldChange::changed(
                    "city",
                    json!(client.city),
                    json!(city),
                ));
                client.city = Some(city.clone());
            }
        }
        if let Some(currency) = &self.currency {
            if *currency != client.currency {
                diff.push(FieldChange::changed(
                    "currency",
                    json!(client.currency.code()),
                    json!(currency.code()),
                ));
                client.currency = currency.clone();
            }
        }
        diff
    }

    /// Check the patch's shape.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err("client name must not be empty".to_string());
            }
        }
        Ok(())
    }
}

/// Read-side filter for client listings.
#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    /// Case-insensitive substring match on the name.
    pub name_contains: Option<String>,
    /// Exact city match.
    pub city: Option<String>,
    /// Lifecycle status.
    pub status: Option<ClientStatus>,
}

impl ClientFilter {
    /// Whether the client passes every set criterion.
    pub fn matches(&self, client: &Client) -> bool {
        if let Some(needle) = &self.name_contains {
            if !client
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if client.city.as_deref() != Some(city.as_str()) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if client.status != status {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client {
            id: ClientId::new(),
            name: "Jean Mukendi".to_string(),
            phone: Some("+243810000001".to_string()),
            city: Some("Lubumbashi".to_string()),
            currency: Currency::usd(),
            status: ClientStatus::Active,
            version: 1,
            created_at: daybook_common::now(),
            created_by: ActorId::new(),
            updated_at: daybook_common::now(),
        }
    }

    #[test]
    fn test_patch_reports_only_changed_fields() {
        let mut c = client();
        let diff = ClientPatch::new()
            .name("Jean Mukendi")
            .city("Kinshasa")
            .apply(&mut c);

        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].field, "city");
        assert_eq!(diff[0].before, json!("Lubumbashi"));
        assert_eq!(diff[0].after, json!("Kinshasa"));
        assert_eq!(c.city.as_deref(), Some("Kinshasa"));
    }

    #[test]
    fn test_noop_patch_yields_empty_diff() {
        let mut c = client();
        let before = c.clone();
        let diff = ClientPatch::new().name("Jean Mukendi").apply(&mut c);
        assert!(diff.is_empty());
        assert_eq!(c, before);
    }

    #[test]
    fn test_draft_validation() {
        assert!(ClientDraft::new("Amina", Currency::cdf()).validate().is_ok());
        assert!(ClientDraft::new("  ", Currency::cdf()).validate().is_err());
        assert!(ClientPatch::new().name("").validate().is_err());
    }

    #[test]
    fn test_filter_matches() {
        let c = client();
        assert!(ClientFilter {
            name_contains: Some("mukendi".to_string()),
            ..Default::default()
        }
        .matches(&c));
        assert!(!ClientFilter {
            city: Some("Kinshasa".to_string()),
            ..Default::default()
        }
        .matches(&c));
        assert!(ClientFilter {
            status: Some(ClientStatus::Active),
            ..Default::default()
        }
        .matches(&c));
    }
}
