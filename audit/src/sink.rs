//! Physical storage behind the audit trail.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use daybook_common::{ActorId, DaybookError, EntityType, Result, TimeRange};

use crate::entry::AuditEntry;

/// Storage seam for audit entries.
///
/// Implementations must be append-only: entries are never updated or
/// deleted once `append` returns Ok. A failed `append` must leave no
/// trace, so the caller can roll back its enclosing mutation.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Sink name for logging.
    fn name(&self) -> &str;

    /// Durably append one entry.
    async fn append(&self, entry: &AuditEntry) -> Result<()>;

    /// All entries for one entity, unordered.
    async fn entries_for(&self, entity_type: EntityType, entity_id: &str) -> Result<Vec<AuditEntry>>;

    /// All entries recorded by one actor within the range, unordered.
    async fn entries_by_actor(&self, actor_id: ActorId, range: TimeRange) -> Result<Vec<AuditEntry>>;
}

/// In-process sink backed by sharded maps: primary store plus entity and
/// actor indexes.
#[derive(Default)]
pub struct MemorySink {
    /// All entries by ID.
    entries: DashMap<daybook_common::AuditEntryId, AuditEntry>,
    /// Entry IDs per entity.
    by_entity: DashMap<(EntityType, String), Vec<daybook_common::AuditEntryId>>,
    /// Entry IDs per actor.
    by_actor: DashMap<ActorId, Vec<daybook_common::AuditEntryId>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the sink holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn collect(&self, ids: &[daybook_common::AuditEntryId]) -> Vec<AuditEntry> {
        ids.iter()
            .filter_map(|id| self.entries.get(id).map(|e| e.clone()))
            .collect()
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        self.entries.insert(entry.id, entry.clone());
        self.by_entity
            .entry((entry.entity.entity_type, entry.entity.entity_id.clone()))
            .or_insert_with(Vec::new)
            .push(entry.id);
        self.by_actor
            .entry(entry.actor_id)
            .or_insert_with(Vec::new)
            .push(entry.id);
        Ok(())
    }

    async fn entries_for(&self, entity_type: EntityType, entity_id: &str) -> Result<Vec<AuditEntry>> {
        Ok(self
            .by_entity
            .get(&(entity_type, entity_id.to_string()))
            .map(|ids| self.collect(&ids))
            .unwrap_or_default())
    }

    async fn entries_by_actor(&self, actor_id: ActorId, range: TimeRange) -> Result<Vec<AuditEntry>> {
        Ok(self
            .by_actor
            .get(&actor_id)
            .map(|ids| self.collect(&ids))
            .unwrap_or_default()
            .into_iter()
            .filter(|e| range.contains(e.timestamp))
            .collect())
    }
}

/// Sink that starts failing after a set number of appends. Used to test
/// that callers roll back when storage goes away mid-run.
#[cfg(any(test, feature = "test-utils"))]
pub struct FlakySink {
    inner: MemorySink,
    remaining_ok: std::sync::atomic::AtomicI64,
}

#[cfg(any(test, feature = "test-utils"))]
impl FlakySink {
    /// Allow `appends` successful appends, then fail every one after.
    pub fn failing_after(appends: i64) -> Self {
        Self {
            inner: MemorySink::new(),
            remaining_ok: std::sync::atomic::AtomicI64::new(appends),
        }
    }

    /// Fail every append from the start.
    pub fn always_failing() -> Self {
        Self::failing_after(0)
    }

    /// Entries that made it through before the failures.
    pub fn stored(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl AuditSink for FlakySink {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn append(&self, entry: &AuditEntry) -> Result<()> {
        use std::sync::atomic::Ordering;
        if self.remaining_ok.fetch_sub(1, Ordering::SeqCst) > 0 {
            self.inner.append(entry).await
        } else {
            Err(DaybookError::Persistence(
                "audit storage unavailable".to_string(),
            ))
        }
    }

    async fn entries_for(&self, entity_type: EntityType, entity_id: &str) -> Result<Vec<AuditEntry>> {
        self.inner.entries_for(entity_type, entity_id).await
    }

    async fn entries_by_actor(&self, actor_id: ActorId, range: TimeRange) -> Result<Vec<AuditEntry>> {
        self.inner.entries_by_actor(actor_id, range).await
    }
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn AuditSink>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{AuditDraft, FieldChange};
    use daybook_common::{AuditAction, AuditEntryId, EntityRef};
    use serde_json::json;

    fn entry_for(entity: EntityRef, seq: u64, actor: ActorId) -> AuditEntry {
        let draft = AuditDraft::new(entity, actor, AuditAction::Create)
            .with_diff(vec![FieldChange::set("name", json!("x"))]);
        AuditEntry {
            id: AuditEntryId::new(),
            entity: draft.entity,
            seq,
            actor_id: draft.actor_id,
            timestamp: daybook_common::now(),
            action: draft.action,
            diff: draft.diff,
        }
    }

    #[tokio::test]
    async fn test_append_and_query_by_entity() {
        let sink = MemorySink::new();
        let actor = ActorId::new();
        let entity = EntityRef::client("c1");

        sink.append(&entry_for(entity.clone(), 1, actor)).await.unwrap();
        sink.append(&entry_for(EntityRef::client("c2"), 1, actor))
            .await
            .unwrap();

        let entries = sink.entries_for(EntityType::Client, "c1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entity, entity);
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_query_by_actor_respects_range() {
        let sink = MemorySink::new();
        let actor = ActorId::new();
        sink.append(&entry_for(EntityRef::client("c1"), 1, actor))
            .await
            .unwrap();

        let hits = sink
            .entries_by_actor(actor, TimeRange::last(chrono::Duration::minutes(1)))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);

        let past = TimeRange::new(
            daybook_common::now() - chrono::Duration::hours(2),
            daybook_common::now() - chrono::Duration::hours(1),
        );
        assert!(sink.entries_by_actor(actor, past).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flaky_sink_fails_after_budget() {
        let sink = FlakySink::failing_after(1);
        let actor = ActorId::new();

        assert!(sink
            .append(&entry_for(EntityRef::client("c1"), 1, actor))
            .await
            .is_ok());
        let err = sink
            .append(&entry_for(EntityRef::client("c1"), 2, actor))
            .await
            .unwrap_err();
        assert!(matches!(err, DaybookError::Persistence(_)));
        assert_eq!(sink.stored(), 1);
    }
}
