//! The client registry: CRUD over the shared audit path.

use std::sync::Arc;

use dashmap::DashMap;
use daybook_audit::{AuditDraft, AuditTrail, FieldChange};
use daybook_common::{
    Actor, AuditAction, ClientId, DaybookError, EntityRef, EntityType, Grant, MutationEvent,
    Result,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, instrument, warn};

use crate::client::{Client, ClientDraft, ClientFilter, ClientPatch, ClientStatus};

/// Owns all client entities. Every mutation is serialized per client,
/// audited before it becomes visible, and announced on the event channel;
/// a failed audit append leaves the client exactly as it was.
pub struct ClientRegistry {
    clients: DashMap<ClientId, Client>,
    /// Per-client write locks. Mutation plus audit append run under the
    /// lock so two concurrent writers cannot silently overwrite one
    /// another; reads never take it.
    locks: DashMap<ClientId, Arc<Mutex<()>>>,
    trail: Arc<AuditTrail>,
    events: broadcast::Sender<MutationEvent>,
}

impl ClientRegistry {
    /// Create an empty registry over the given trail.
    pub fn new(trail: Arc<AuditTrail>, events: broadcast::Sender<MutationEvent>) -> Self {
        Self {
            clients: DashMap::new(),
            locks: DashMap::new(),
            trail,
            events,
        }
    }

    /// Register a new client.
    #[instrument(skip(self, draft, actor), fields(actor = %actor.id))]
    pub async fn create(&self, draft: ClientDraft, actor: &Actor) -> Result<Client> {
        self.require(actor, Grant::Create)?;

        let id = ClientId::new();
        draft
            .validate()
            .map_err(|detail| DaybookError::validation(EntityRef::client(id), detail))?;

        let now = daybook_common::now();
        let client = Client {
            id,
            name: draft.name,
            phone: draft.phone,
            city: draft.city,
            currency: draft.currency,
            status: ClientStatus::Active,
            version: 1,
            created_at: now,
            created_by: actor.id,
            updated_at: now,
        };

        self.trail
            .record(
                AuditDraft::new(EntityRef::client(id), actor.id, AuditAction::Create)
                    .with_diff(creation_diff(&client)),
            )
            .await?;
        self.clients.insert(id, client.clone());

        let _ = self.events.send(MutationEvent::new(
            EntityType::Client,
            id,
            AuditAction::Create,
            actor.id,
        ));
        info!(client_id = %id, "Client registered");
        Ok(client)
    }

    /// Apply a partial update.
    ///
    /// `expected_version` carries the version the caller read; a mismatch
    /// is rejected with `ConcurrentModification` before anything is
    /// written. A patch equal to current state still commits and audits
    /// an empty diff, keeping the timeline gapless.
    #[instrument(skip(self, patch, actor), fields(client_id = %id, actor = %actor.id))]
    pub async fn update(
        &self,
        id: ClientId,
        patch: ClientPatch,
        expected_version: Option<u64>,
        actor: &Actor,
    ) -> Result<Client> {
        self.require(actor, Grant::Update)?;
        patch
            .validate()
            .map_err(|detail| DaybookError::validation(EntityRef::client(id), detail))?;

        let lock = self.entity_lock(id);
        let _guard = lock.lock().await;

        let mut candidate = self.read_checked(id, expected_version)?;
        if candidate.status == ClientStatus::Archived {
            return Err(DaybookError::validation(
                EntityRef::client(id),
                "archived clients are read-only",
            ));
        }

        let diff = patch.apply(&mut candidate);
        candidate.version += 1;
        candidate.updated_at = daybook_common::now();

        self.trail
            .record(
                AuditDraft::new(EntityRef::client(id), actor.id, AuditAction::Update)
                    .with_diff(diff),
            )
            .await?;
        self.clients.insert(id, candidate.clone());

        let _ = self.events.send(MutationEvent::new(
            EntityType::Client,
            id,
            AuditAction::Update,
            actor.id,
        ));
        info!(client_id = %id, version = candidate.version, "Client updated");
        Ok(candidate)
    }

    /// Soft-delete a client: status flips to `Archived`, history stays.
    ///
    /// Archiving an already-archived client is a no-op success: no second
    /// status-change entry, no version bump.
    #[instrument(skip(self, actor), fields(client_id = %id, actor = %actor.id))]
    pub async fn archive(
        &self,
        id: ClientId,
        expected_version: Option<u64>,
        actor: &Actor,
    ) -> Result<Client> {
        self.require(actor, Grant::Archive)?;

        let lock = self.entity_lock(id);
        let _guard = lock.lock().await;

        let mut candidate = self.read_checked(id, expected_version)?;
        if candidate.status == ClientStatus::Archived {
            return Ok(candidate);
        }

        candidate.status = ClientStatus::Archived;
        candidate.version += 1;
        candidate.updated_at = daybook_common::now();

        self.trail
            .record(
                AuditDraft::new(EntityRef::client(id), actor.id, AuditAction::Archive).with_diff(
                    vec![FieldChange::changed(
                        "status",
                        serde_json::json!(ClientStatus::Active),
                        serde_json::json!(ClientStatus::Archived),
                    )],
                ),
            )
            .await?;
        self.clients.insert(id, candidate.clone());

        let _ = self.events.send(MutationEvent::new(
            EntityType::Client,
            id,
            AuditAction::Archive,
            actor.id,
        ));
        info!(client_id = %id, "Client archived");
        Ok(candidate)
    }

    /// Current state of one client.
    pub fn get(&self, id: ClientId) -> Result<Client> {
        self.clients
            .get(&id)
            .map(|c| c.clone())
            .ok_or_else(|| DaybookError::NotFound(EntityRef::client(id)))
    }

    /// Clients passing the filter, ordered by name. Never blocks writers.
    pub fn list(&self, filter: &ClientFilter) -> Vec<Client> {
        let mut clients: Vec<Client> = self
            .clients
            .iter()
            .filter(|c| filter.matches(c))
            .map(|c| c.clone())
            .collect();
        clients.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()))
        });
        clients
    }

    /// Total number of registered clients, archived included.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    fn entity_lock(&self, id: ClientId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Read the current state and check the caller's version, under the
    /// entity lock.
    fn read_checked(&self, id: ClientId, expected_version: Option<u64>) -> Result<Client> {
        let current = self.get(id)?;
        if let Some(expected) = expected_version {
            if current.version != expected {
                warn!(
                    client_id = %id,
                    expected,
                    actual = current.version,
                    "Stale client version"
                );
                return Err(DaybookError::ConcurrentModification {
                    entity: EntityRef::client(id),
                    expected,
                    actual: current.version,
                });
            }
        }
        Ok(current)
    }

    fn require(&self, actor: &Actor, grant: Grant) -> Result<()> {
        if actor.can(EntityType::Client, grant) {
            Ok(())
        } else {
            Err(DaybookError::PermissionDenied {
                actor: actor.id,
                entity: EntityType::Client,
                grant,
            })
        }
    }
}

/// Diff for a creation entry: one `set` per populated field, so folding
/// the trail from the first entry rebuilds the client.
fn creation_diff(client: &Client) -> Vec<FieldChange> {
    client
        .fields()
        .as_object()
        .into_iter()
        .flatten()
        .filter(|(_, value)| !value.is_null())
        .map(|(field, value)| FieldChange::set(field.clone(), value.clone()))
        .collect()
}
