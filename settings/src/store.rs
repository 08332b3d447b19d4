//! Versioned settings store with snapshot reads.

use std::sync::Arc;

use daybook_audit::{AuditDraft, AuditTrail, FieldChange};
use daybook_common::{
    Actor, AuditAction, Currency, DaybookError, EntityRef, EntityType, Grant, MutationEvent,
    Result, Timestamp,
};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::model::{RateChange, SettingsPatch, SettingsSnapshot, SettingsVersion};
use crate::seed::SettingsSeed;

/// Singleton configuration store. Reads hand out immutable snapshots and
/// never block writers; every update commits a whole new version behind
/// one audit entry.
pub struct SettingsStore {
    versions: RwLock<Vec<SettingsSnapshot>>,
    /// Serializes update+audit so version numbers and audit order agree.
    write_lock: tokio::sync::Mutex<()>,
    trail: Arc<AuditTrail>,
    events: broadcast::Sender<MutationEvent>,
}

impl SettingsStore {
    /// Create an empty store. [`initialize`](Self::initialize) must commit
    /// the first version before snapshots can be read.
    pub fn new(trail: Arc<AuditTrail>, events: broadcast::Sender<MutationEvent>) -> Self {
        Self {
            versions: RwLock::new(Vec::new()),
            write_lock: tokio::sync::Mutex::new(()),
            trail,
            events,
        }
    }

    /// Commit the seed as version 1.
    #[instrument(skip(self, seed, actor), fields(actor = %actor.id))]
    pub async fn initialize(&self, seed: SettingsSeed, actor: &Actor) -> Result<SettingsSnapshot> {
        self.require(actor, Grant::Create)?;
        let _guard = self.write_lock.lock().await;

        if !self.versions.read().is_empty() {
            return Err(DaybookError::validation(
                EntityRef::settings(self.latest_version_number()),
                "settings already initialized",
            ));
        }
        seed.validate()
            .map_err(|detail| DaybookError::validation(EntityRef::settings(0), detail))?;

        let version = SettingsVersion {
            version: 1,
            committed_at: daybook_common::now(),
            committed_by: actor.id,
            profile: seed.profile,
            payment_methods: seed.payment_methods,
            rates: seed.rates,
            fees: seed.fees,
        };

        let diff = vec![
            FieldChange::set("profile", to_json(&version.profile)?),
            FieldChange::set("payment_methods", to_json(&version.payment_methods)?),
            FieldChange::set("rates", to_json(&version.rates)?),
            FieldChange::set("fees", to_json(&version.fees)?),
        ];
        self.trail
            .record(
                AuditDraft::new(EntityRef::settings(1), actor.id, AuditAction::Create)
                    .with_diff(diff),
            )
            .await?;

        let snapshot: SettingsSnapshot = Arc::new(version);
        self.versions.write().push(snapshot.clone());

        let _ = self.events.send(MutationEvent::new(
            EntityType::Settings,
            "v1",
            AuditAction::Create,
            actor.id,
        ));
        info!(version = 1, "Settings initialized");
        Ok(snapshot)
    }

    /// Apply one patch as a new version.
    ///
    /// Validation is all-or-nothing: a patch producing any invalid section
    /// commits nothing and writes no audit entry. `expected_version`
    /// carries the version the caller read; a mismatch is rejected with
    /// `ConcurrentModification`.
    #[instrument(skip(self, patch, actor), fields(section = patch.section(), actor = %actor.id))]
    pub async fn update(
        &self,
        patch: SettingsPatch,
        expected_version: Option<u64>,
        actor: &Actor,
    ) -> Result<SettingsSnapshot> {
        self.require(actor, Grant::Update)?;
        let _guard = self.write_lock.lock().await;

        let current = self.current_snapshot()?;
        if let Some(expected) = expected_version {
            if current.version != expected {
                return Err(DaybookError::ConcurrentModification {
                    entity: EntityRef::settings(current.version),
                    expected,
                    actual: current.version,
                });
            }
        }

        let section = patch.section();
        let candidate = apply_patch(&current, patch, actor);
        if let Err(detail) = candidate.validate() {
            warn!(section, %detail, "Settings patch rejected");
            return Err(DaybookError::validation_field(
                EntityRef::settings(current.version),
                section,
                detail,
            ));
        }

        let diff = section_diff(&current, &candidate, section)?;
        self.trail
            .record(
                AuditDraft::new(
                    EntityRef::settings(candidate.version),
                    actor.id,
                    AuditAction::Update,
                )
                .with_diff(diff),
            )
            .await?;

        let snapshot: SettingsSnapshot = Arc::new(candidate);
        self.versions.write().push(snapshot.clone());

        let _ = self.events.send(MutationEvent::new(
            EntityType::Settings,
            format!("v{}", snapshot.version),
            AuditAction::Update,
            actor.id,
        ));
        info!(version = snapshot.version, section, "Settings updated");
        Ok(snapshot)
    }

    /// Latest committed version.
    pub fn current_snapshot(&self) -> Result<SettingsSnapshot> {
        self.versions
            .read()
            .last()
            .cloned()
            .ok_or_else(|| DaybookError::NotFound(EntityRef::settings(0)))
    }

    /// The version in force at a past instant.
    pub fn snapshot_at(&self, at: Timestamp) -> Result<SettingsSnapshot> {
        self.versions
            .read()
            .iter()
            .rev()
            .find(|v| v.committed_at <= at)
            .cloned()
            .ok_or_else(|| DaybookError::NotFound(EntityRef::settings(0)))
    }

    /// Every committed version, oldest first.
    pub fn history(&self) -> Vec<SettingsSnapshot> {
        self.versions.read().clone()
    }

    /// Changes of one currency's quote across versions, oldest first.
    pub fn rate_changes(&self, currency: &Currency) -> Vec<RateChange> {
        let history = self.history();
        history
            .windows(2)
            .filter_map(|pair| {
                let old_rate = pair[0].rates.quoted_rate(currency);
                let new_rate = pair[1].rates.quoted_rate(currency);
                if old_rate == new_rate {
                    return None;
                }
                Some(RateChange {
                    version: pair[1].version,
                    changed_at: pair[1].committed_at,
                    changed_by: pair[1].committed_by,
                    old_rate,
                    new_rate,
                    variation_percent: match (old_rate, new_rate) {
                        (Some(old), Some(new)) => RateChange::variation_between(old, new),
                        _ => None,
                    },
                })
            })
            .collect()
    }

    fn latest_version_number(&self) -> u64 {
        self.versions.read().last().map(|v| v.version).unwrap_or(0)
    }

    fn require(&self, actor: &Actor, grant: Grant) -> Result<()> {
        if actor.can(EntityType::Settings, grant) {
            Ok(())
        } else {
            Err(DaybookError::PermissionDenied {
                actor: actor.id,
                entity: EntityType::Settings,
                grant,
            })
        }
    }
}

/// Build the candidate version with the patch applied.
fn apply_patch(current: &SettingsVersion, patch: SettingsPatch, actor: &Actor) -> SettingsVersion {
    let mut candidate = SettingsVersion {
        version: current.version + 1,
        committed_at: daybook_common::now(),
        committed_by: actor.id,
        profile: current.profile.clone(),
        payment_methods: current.payment_methods.clone(),
        rates: current.rates.clone(),
        fees: current.fees.clone(),
    };
    match patch {
        SettingsPatch::Profile(profile) => candidate.profile = profile,
        SettingsPatch::PaymentMethods(methods) => candidate.payment_methods = methods,
        SettingsPatch::SetRate { currency, rate } => candidate.rates.set_rate(currency, rate),
        SettingsPatch::RemoveRate(currency) => {
            candidate.rates.remove_rate(&currency);
        }
        SettingsPatch::ReplaceRates(rates) => candidate.rates = rates,
        SettingsPatch::SetFee { operation, entry } => candidate.fees.set(operation, entry),
        SettingsPatch::ReplaceFees(fees) => candidate.fees = fees,
    }
    candidate
}

/// Field-level diff for the touched section. Empty when the patch was a
/// no-op; no-op updates still commit and still audit.
fn section_diff(
    current: &SettingsVersion,
    candidate: &SettingsVersion,
    section: &str,
) -> Result<Vec<FieldChange>> {
    let (before, after) = match section {
        "profile" => (to_json(&current.profile)?, to_json(&candidate.profile)?),
        "payment_methods" => (
            to_json(&current.payment_methods)?,
            to_json(&candidate.payment_methods)?,
        ),
        "rates" => (to_json(&current.rates)?, to_json(&candidate.rates)?),
        _ => (to_json(&current.fees)?, to_json(&candidate.fees)?),
    };
    if before == after {
        return Ok(Vec::new());
    }
    Ok(vec![FieldChange::changed(section, before, after)])
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| DaybookError::Persistence(format!("serialize settings section: {}", e)))
}
