//! Mutation event vocabulary shared by the audit trail and the
//! fire-and-forget notification channel.

use crate::{ActorId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of entity a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Client,
    Transaction,
    Invoice,
    Settings,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EntityType::Client => "client",
            EntityType::Transaction => "transaction",
            EntityType::Invoice => "invoice",
            EntityType::Settings => "settings",
        };
        write!(f, "{}", s)
    }
}

/// What a mutation did to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    Archive,
    StatusChange,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::Archive => "archive",
            AuditAction::StatusChange => "status_change",
        };
        write!(f, "{}", s)
    }
}

/// Reference to one entity, carried inside errors and events so callers
/// can act without inspecting internal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: EntityType, entity_id: impl fmt::Display) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.to_string(),
        }
    }

    pub fn client(id: impl fmt::Display) -> Self {
        Self::new(EntityType::Client, id)
    }

    pub fn transaction(id: impl fmt::Display) -> Self {
        Self::new(EntityType::Transaction, id)
    }

    pub fn invoice(id: impl fmt::Display) -> Self {
        Self::new(EntityType::Invoice, id)
    }

    /// Settings is a singleton; the reference carries the version seen.
    pub fn settings(version: u64) -> Self {
        Self::new(EntityType::Settings, format!("v{}", version))
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.entity_type, self.entity_id)
    }
}

/// Notification published after every committed mutation. Consumed by the
/// presentation layer for live updates; publishing never blocks or fails
/// the mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: AuditAction,
    pub actor_id: ActorId,
    pub timestamp: Timestamp,
}

impl MutationEvent {
    /// Build an event stamped with the current time.
    pub fn new(
        entity_type: EntityType,
        entity_id: impl fmt::Display,
        action: AuditAction,
        actor_id: ActorId,
    ) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.to_string(),
            action,
            actor_id,
            timestamp: crate::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_display() {
        assert_eq!(EntityType::Client.to_string(), "client");
        assert_eq!(AuditAction::StatusChange.to_string(), "status_change");
    }

    #[test]
    fn test_entity_ref_display() {
        let r = EntityRef::settings(3);
        assert_eq!(r.to_string(), "settings v3");
    }

    #[test]
    fn test_event_serializes_snake_case() {
        let event = MutationEvent::new(
            EntityType::Transaction,
            "abc",
            AuditAction::Create,
            ActorId::new(),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["entity_type"], "transaction");
        assert_eq!(json["action"], "create");
    }
}
