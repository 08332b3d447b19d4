//! The audit trail: single write path for all mutation provenance.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use daybook_common::{
    ActorId, AuditAction, AuditEntryId, EntityRef, EntityType, Result, TimeRange,
};
use tracing::{debug, instrument, warn};

use crate::entry::{AuditDraft, AuditEntry};
use crate::sink::AuditSink;

/// Append-only change log keyed to entities, actors and timestamps.
///
/// Every entity mutation in the workspace funnels through [`record`]
/// (exactly one entry per successful mutation), which makes this log the
/// single source of truth for who changed what, when.
///
/// [`record`]: AuditTrail::record
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
    /// Next sequence number per entity. A failed append burns its number;
    /// ordering stays strictly monotonic.
    seqs: DashMap<(EntityType, String), u64>,
    counters: TrailCounters,
}

#[derive(Default)]
struct TrailCounters {
    recorded: AtomicU64,
    creates: AtomicU64,
    updates: AtomicU64,
    archives: AtomicU64,
    status_changes: AtomicU64,
    failed_appends: AtomicU64,
}

/// Point-in-time view of trail activity, grouped by action.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AuditStats {
    pub recorded: u64,
    pub creates: u64,
    pub updates: u64,
    pub archives: u64,
    pub status_changes: u64,
    pub failed_appends: u64,
}

impl AuditTrail {
    /// Create a trail over the given sink.
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            sink,
            seqs: DashMap::new(),
            counters: TrailCounters::default(),
        }
    }

    /// Append one entry. Assigns the entry ID, per-entity sequence number
    /// and timestamp; returns the stored entry.
    ///
    /// Storage failures surface as `Persistence` and leave no trace, so
    /// the caller can treat its enclosing mutation as never having
    /// happened.
    #[instrument(skip(self, draft), fields(entity = %draft.entity, action = %draft.action, sink = self.sink.name()))]
    pub async fn record(&self, draft: AuditDraft) -> Result<AuditEntry> {
        let key = (draft.entity.entity_type, draft.entity.entity_id.clone());
        let seq = {
            let mut next = self.seqs.entry(key).or_insert(0);
            *next += 1;
            *next
        };

        let entry = AuditEntry {
            id: AuditEntryId::new(),
            entity: draft.entity,
            seq,
            actor_id: draft.actor_id,
            timestamp: daybook_common::now(),
            action: draft.action,
            diff: draft.diff,
        };

        if let Err(err) = self.sink.append(&entry).await {
            self.counters.failed_appends.fetch_add(1, Ordering::Relaxed);
            warn!(seq, error = %err, "Audit append failed");
            return Err(err);
        }

        self.counters.recorded.fetch_add(1, Ordering::Relaxed);
        self.counter_for(entry.action).fetch_add(1, Ordering::Relaxed);
        debug!(entry_id = %entry.id, seq, "Audit entry recorded");
        Ok(entry)
    }

    /// All entries for one entity, ordered by timestamp then sequence
    /// number ascending.
    pub async fn query_by_entity(&self, entity: &EntityRef) -> Result<Vec<AuditEntry>> {
        let mut entries = self
            .sink
            .entries_for(entity.entity_type, &entity.entity_id)
            .await?;
        entries.sort_by(|a, b| (a.timestamp, a.seq).cmp(&(b.timestamp, b.seq)));
        Ok(entries)
    }

    /// Activity view: everything one actor did within a time range,
    /// ordered by timestamp ascending.
    pub async fn query_by_actor(
        &self,
        actor_id: ActorId,
        range: TimeRange,
    ) -> Result<Vec<AuditEntry>> {
        let mut entries = self.sink.entries_by_actor(actor_id, range).await?;
        entries.sort_by(|a, b| (a.timestamp, a.id).cmp(&(b.timestamp, b.id)));
        Ok(entries)
    }

    /// Activity counts grouped by action.
    pub fn stats(&self) -> AuditStats {
        AuditStats {
            recorded: self.counters.recorded.load(Ordering::Relaxed),
            creates: self.counters.creates.load(Ordering::Relaxed),
            updates: self.counters.updates.load(Ordering::Relaxed),
            archives: self.counters.archives.load(Ordering::Relaxed),
            status_changes: self.counters.status_changes.load(Ordering::Relaxed),
            failed_appends: self.counters.failed_appends.load(Ordering::Relaxed),
        }
    }

    fn counter_for(&self, action: AuditAction) -> &AtomicU64 {
        match action {
            AuditAction::Create => &self.counters.creates,
            AuditAction::Update => &self.counters.updates,
            AuditAction::Archive => &self.counters.archives,
            AuditAction::StatusChange => &self.counters.status_changes,
        }
    }
}
