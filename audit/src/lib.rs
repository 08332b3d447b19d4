//! Daybook Audit Trail
//!
//! Append-only change log for every entity mutation in the workspace.
//! Entries carry the actor, a per-entity sequence number and a field-level
//! before/after diff, so the trail alone can answer "who changed what,
//! when" and replay any entity's current state.

pub mod entry;
pub mod sink;
pub mod trail;

pub use entry::{diff_objects, fold_entries, AuditDraft, AuditEntry, FieldChange};
pub use sink::{AuditSink, MemorySink, SharedSink};
pub use trail::{AuditStats, AuditTrail};

#[cfg(any(test, feature = "test-utils"))]
pub use sink::FlakySink;
