//! Actor identity and role grants.
//!
//! Authentication lives outside the core; every operation receives an
//! already-authenticated [`Actor`] and the core only records it on audit
//! entries and checks role grants at mutation entry points.

use crate::{ActorId, EntityType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role attached to an authenticated actor by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full access, including settings and archival.
    Admin,
    /// Day-to-day operation: may create and update business entities but
    /// not archive them, cancel invoices, or touch settings.
    Operator,
}

/// The grant being checked at a mutation entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    Read,
    Create,
    Update,
    Archive,
}

impl Role {
    /// Whether the role holds the grant on the given entity type.
    pub fn allows(&self, entity: EntityType, grant: Grant) -> bool {
        match self {
            Role::Admin => true,
            Role::Operator => match (entity, grant) {
                (_, Grant::Read) => true,
                (EntityType::Settings, _) => false,
                (_, Grant::Archive) => false,
                (_, Grant::Create) | (_, Grant::Update) => true,
            },
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Operator => write!(f, "operator"),
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grant::Read => "read",
            Grant::Create => "create",
            Grant::Update => "update",
            Grant::Archive => "archive",
        };
        write!(f, "{}", s)
    }
}

/// An authenticated actor: identity plus role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: ActorId, role: Role) -> Self {
        Self { id, role }
    }

    /// Whether this actor holds the grant.
    pub fn can(&self, entity: EntityType, grant: Grant) -> bool {
        self.role.allows(entity, grant)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_holds_every_grant() {
        for entity in [
            EntityType::Client,
            EntityType::Transaction,
            EntityType::Invoice,
            EntityType::Settings,
        ] {
            for grant in [Grant::Read, Grant::Create, Grant::Update, Grant::Archive] {
                assert!(Role::Admin.allows(entity, grant));
            }
        }
    }

    #[test]
    fn test_operator_grants() {
        assert!(Role::Operator.allows(EntityType::Client, Grant::Create));
        assert!(Role::Operator.allows(EntityType::Transaction, Grant::Update));
        assert!(Role::Operator.allows(EntityType::Settings, Grant::Read));
        assert!(!Role::Operator.allows(EntityType::Settings, Grant::Update));
        assert!(!Role::Operator.allows(EntityType::Client, Grant::Archive));
        assert!(!Role::Operator.allows(EntityType::Invoice, Grant::Archive));
    }
}
