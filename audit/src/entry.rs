//! Audit entry shape and field-level diffs.

use daybook_common::{ActorId, AuditAction, AuditEntryId, EntityRef, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One field-level change inside an audit entry.
///
/// `Value::Null` on either side means the field was absent: a creation
/// diff carries `Null` befores, a removal carries a `Null` after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Field name.
    pub field: String,
    /// Value before the mutation.
    pub before: Value,
    /// Value after the mutation.
    pub after: Value,
}

impl FieldChange {
    /// A field that changed value.
    pub fn changed(field: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            field: field.into(),
            before,
            after,
        }
    }

    /// A field set where nothing was before.
    pub fn set(field: impl Into<String>, after: Value) -> Self {
        Self {
            field: field.into(),
            before: Value::Null,
            after,
        }
    }
}

/// One append-only row of the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique entry ID, time-ordered.
    pub id: AuditEntryId,
    /// Entity the mutation touched.
    pub entity: EntityRef,
    /// Per-entity sequence number, strictly increasing. Gives entries a
    /// total order per entity independent of wall-clock precision.
    pub seq: u64,
    /// Actor who performed the mutation.
    pub actor_id: ActorId,
    /// When the entry was recorded.
    pub timestamp: Timestamp,
    /// What the mutation did.
    pub action: AuditAction,
    /// Field-level before/after changes. Empty for no-op updates.
    pub diff: Vec<FieldChange>,
}

/// What a mutation wants recorded; the trail assigns id, sequence number
/// and timestamp.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub entity: EntityRef,
    pub actor_id: ActorId,
    pub action: AuditAction,
    pub diff: Vec<FieldChange>,
}

impl AuditDraft {
    pub fn new(entity: EntityRef, actor_id: ActorId, action: AuditAction) -> Self {
        Self {
            entity,
            actor_id,
            action,
            diff: Vec::new(),
        }
    }

    /// Attach a field-level diff.
    pub fn with_diff(mut self, diff: Vec<FieldChange>) -> Self {
        self.diff = diff;
        self
    }
}

/// Compute the field-level diff between two JSON objects, comparing
/// top-level keys. Non-object inputs diff as a single `value` field.
pub fn diff_objects(before: &Value, after: &Value) -> Vec<FieldChange> {
    match (before.as_object(), after.as_object()) {
        (Some(b), Some(a)) => {
            let mut changes = Vec::new();
            for (key, before_value) in b {
                let after_value = a.get(key).cloned().unwrap_or(Value::Null);
                if *before_value != after_value {
                    changes.push(FieldChange::changed(
                        key.clone(),
                        before_value.clone(),
                        after_value,
                    ));
                }
            }
            for (key, after_value) in a {
                if !b.contains_key(key) && !after_value.is_null() {
                    changes.push(FieldChange::set(key.clone(), after_value.clone()));
                }
            }
            changes
        }
        _ => {
            if before == after {
                Vec::new()
            } else {
                vec![FieldChange::changed("value", before.clone(), after.clone())]
            }
        }
    }
}

/// Fold entries (in per-entity order) back into the entity's current
/// field values. Later diffs overwrite earlier ones; a `Null` after
/// removes the field.
pub fn fold_entries(entries: &[AuditEntry]) -> Value {
    let mut state = serde_json::Map::new();
    for entry in entries {
        for change in &entry.diff {
            if change.after.is_null() {
                state.remove(&change.field);
            } else {
                state.insert(change.field.clone(), change.after.clone());
            }
        }
    }
    Value::Object(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_diff_objects_reports_changed_fields() {
        let before = json!({"name": "Jean", "city": "Lubumbashi", "phone": "+243"});
        let after = json!({"name": "Jean", "city": "Kinshasa", "phone": "+243"});

        let diff = diff_objects(&before, &after);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].field, "city");
        assert_eq!(diff[0].before, json!("Lubumbashi"));
        assert_eq!(diff[0].after, json!("Kinshasa"));
    }

    #[test]
    fn test_diff_objects_equal_is_empty() {
        let v = json!({"a": 1, "b": 2});
        assert!(diff_objects(&v, &v.clone()).is_empty());
    }

    #[test]
    fn test_diff_objects_added_and_removed_keys() {
        let before = json!({"keep": 1, "drop": 2});
        let after = json!({"keep": 1, "add": 3});

        let diff = diff_objects(&before, &after);
        assert_eq!(diff.len(), 2);
        assert!(diff
            .iter()
            .any(|c| c.field == "drop" && c.after == Value::Null));
        assert!(diff
            .iter()
            .any(|c| c.field == "add" && c.before == Value::Null));
    }

    #[test]
    fn test_fold_replays_to_latest_values() {
        let entity = EntityRef::client("c1");
        let actor = ActorId::new();
        let make = |seq, diff: Vec<FieldChange>| AuditEntry {
            id: AuditEntryId::new(),
            entity: entity.clone(),
            seq,
            actor_id: actor,
            timestamp: daybook_common::now(),
            action: if seq == 1 {
                AuditAction::Create
            } else {
                AuditAction::Update
            },
            diff,
        };

        let entries = vec![
            make(
                1,
                vec![
                    FieldChange::set("name", json!("Jean")),
                    FieldChange::set("city", json!("Lubumbashi")),
                ],
            ),
            make(
                2,
                vec![FieldChange::changed(
                    "city",
                    json!("Lubumbashi"),
                    json!("Kinshasa"),
                )],
            ),
        ];

        let state = fold_entries(&entries);
        assert_eq!(state, json!({"name": "Jean", "city": "Kinshasa"}));
    }
}
