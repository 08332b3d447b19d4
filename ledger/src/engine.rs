//! The ledger engine: transaction and invoice lifecycle orchestration.

use std::sync::Arc;

use dashmap::DashMap;
use daybook_audit::{AuditDraft, AuditTrail, FieldChange};
use daybook_common::{
    Actor, AuditAction, ClientId, DaybookError, EntityRef, EntityType, Grant, InvoiceId,
    MutationEvent, Result, TransactionId,
};
use daybook_registry::ClientRegistry;
use daybook_settings::{SettingsSnapshot, SettingsStore};
use daybook_settlement::convert;
use serde_json::json;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, instrument, warn};

use crate::config::LedgerConfig;
use crate::invoice::{Invoice, InvoiceDraft};
use crate::metrics::{LedgerMetrics, SharedMetrics};
use crate::status::{InvoiceStatus, TransactionStatus};
use crate::transaction::{Transaction, TransactionDraft, TransactionFilter, TransactionKind};

/// Orchestrates every transaction and invoice mutation.
///
/// Fees and conversions are computed from the settings snapshot fetched at
/// the start of each operation, so a settings update mid-call never mixes
/// rate regimes. Every mutation is serialized per entity, audited before
/// it becomes visible, and announced on the event channel; a failed audit
/// append leaves the entity exactly as it was.
pub struct LedgerEngine {
    config: LedgerConfig,
    settings: Arc<SettingsStore>,
    registry: Arc<ClientRegistry>,
    trail: Arc<AuditTrail>,
    /// All transactions indexed by ID.
    transactions: DashMap<TransactionId, Transaction>,
    /// All invoices indexed by ID.
    invoices: DashMap<InvoiceId, Invoice>,
    /// Per-transaction write locks.
    transaction_locks: DashMap<TransactionId, Arc<Mutex<()>>>,
    /// Per-invoice write locks.
    invoice_locks: DashMap<InvoiceId, Arc<Mutex<()>>>,
    events: broadcast::Sender<MutationEvent>,
    metrics: SharedMetrics,
}

impl LedgerEngine {
    /// Create an engine over shared settings, registry and trail.
    pub fn new(
        config: LedgerConfig,
        settings: Arc<SettingsStore>,
        registry: Arc<ClientRegistry>,
        trail: Arc<AuditTrail>,
        events: broadcast::Sender<MutationEvent>,
    ) -> Self {
        Self {
            config,
            settings,
            registry,
            trail,
            transactions: DashMap::new(),
            invoices: DashMap::new(),
            transaction_locks: DashMap::new(),
            invoice_locks: DashMap::new(),
            events,
            metrics: Arc::new(LedgerMetrics::new()),
        }
    }

    /// Subscribe to mutation events.
    pub fn subscribe(&self) -> broadcast::Receiver<MutationEvent> {
        self.events.subscribe()
    }

    /// Engine metrics.
    pub fn metrics(&self) -> &LedgerMetrics {
        &self.metrics
    }

    /// Record a new transaction with status `Pending`.
    ///
    /// The fee breakdown, and for swaps the applied rate and converted
    /// amount, are computed from the snapshot in force now and stored on
    /// the transaction; they are never recomputed.
    #[instrument(skip(self, draft, actor), fields(kind = draft.operation().to_string(), actor = %actor.id))]
    pub async fn create_transaction(
        &self,
        draft: TransactionDraft,
        actor: &Actor,
    ) -> Result<Transaction> {
        self.require(actor, EntityType::Transaction, Grant::Create)?;
        let snapshot = self.settings.current_snapshot()?;

        let id = TransactionId::new();
        draft
            .validate()
            .map_err(|detail| DaybookError::validation(EntityRef::transaction(id), detail))?;

        let amount = draft.amount().clone();
        if !snapshot.knows_currency(&amount.currency) {
            return Err(DaybookError::UnknownCurrency(amount.currency));
        }

        let kind = self.resolve_kind(&draft, &snapshot)?;
        let operation = draft.operation();
        let fee = snapshot.fees.compute(operation, &amount)?;

        let transaction = Transaction {
            id,
            created_at: daybook_common::now(),
            created_by: actor.id,
            amount,
            operation,
            status: TransactionStatus::Pending,
            fee,
            kind,
            version: 1,
        };

        self.trail
            .record(
                AuditDraft::new(EntityRef::transaction(id), actor.id, AuditAction::Create)
                    .with_diff(transaction.creation_diff()),
            )
            .await?;
        self.transactions.insert(id, transaction.clone());
        LedgerMetrics::incr(&self.metrics.transactions_created);

        let _ = self.events.send(MutationEvent::new(
            EntityType::Transaction,
            id,
            AuditAction::Create,
            actor.id,
        ));
        info!(transaction_id = %id, amount = %transaction.amount, "Transaction recorded");
        Ok(transaction)
    }

    /// Move a transaction along the status graph.
    ///
    /// A target not adjacent to the current status is rejected with
    /// `InvalidTransition` and nothing is written. `expected_version`
    /// carries the version the caller read; a stale version is rejected
    /// with `ConcurrentModification`, so of two concurrent transitions on
    /// one transaction exactly one wins.
    #[instrument(skip(self, actor), fields(transaction_id = %id, target = %target, actor = %actor.id))]
    pub async fn transition(
        &self,
        id: TransactionId,
        target: TransactionStatus,
        actor: &Actor,
        expected_version: Option<u64>,
    ) -> Result<Transaction> {
        self.require(actor, EntityType::Transaction, Grant::Update)?;

        let lock = entity_lock(&self.transaction_locks, id);
        let _guard = lock.lock().await;

        let mut current = self.get_transaction(id)?;
        if let Some(expected) = expected_version {
            if current.version != expected {
                LedgerMetrics::incr(&self.metrics.version_conflicts);
                return Err(DaybookError::ConcurrentModification {
                    entity: EntityRef::transaction(id),
                    expected,
                    actual: current.version,
                });
            }
        }

        let from = current.status;
        if !from.can_transition_to(target) {
            LedgerMetrics::incr(&self.metrics.transitions_rejected);
            warn!(from = %from, "Transition rejected");
            return Err(DaybookError::InvalidTransition {
                entity: EntityRef::transaction(id),
                from: from.to_string(),
                to: target.to_string(),
            });
        }

        self.trail
            .record(
                AuditDraft::new(EntityRef::transaction(id), actor.id, AuditAction::StatusChange)
                    .with_diff(vec![FieldChange::changed(
                        "status",
                        json!(from),
                        json!(target),
                    )]),
            )
            .await?;

        current.status = target;
        current.version += 1;
        self.transactions.insert(id, current.clone());

        match target {
            TransactionStatus::Completed => {
                LedgerMetrics::incr(&self.metrics.transactions_completed)
            }
            TransactionStatus::Failed => LedgerMetrics::incr(&self.metrics.transactions_failed),
            TransactionStatus::Cancelled => {
                LedgerMetrics::incr(&self.metrics.transactions_cancelled)
            }
            _ => {}
        }

        let _ = self.events.send(MutationEvent::new(
            EntityType::Transaction,
            id,
            AuditAction::StatusChange,
            actor.id,
        ));
        info!(from = %from, "Transaction transitioned");
        Ok(current)
    }

    /// Current state of one transaction.
    pub fn get_transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.transactions
            .get(&id)
            .map(|t| t.clone())
            .ok_or_else(|| DaybookError::NotFound(EntityRef::transaction(id)))
    }

    /// All transactions linked to one client, newest first. Restartable:
    /// each call walks the store afresh.
    pub fn list_for_client(&self, client_id: ClientId) -> Vec<Transaction> {
        self.query(&TransactionFilter {
            client_id: Some(client_id),
            ..Default::default()
        })
    }

    /// Transactions passing the filter, newest first, truncated to the
    /// configured page limit. Never blocks writers.
    pub fn query(&self, filter: &TransactionFilter) -> Vec<Transaction> {
        let mut matches: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| filter.matches(t))
            .map(|t| t.clone())
            .collect();
        // Transaction IDs are time-ordered, so the ID is a stable
        // tiebreaker for equal creation timestamps.
        matches.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        matches.truncate(self.config.max_query_results);
        matches
    }

    /// Create an invoice with status `Draft`.
    #[instrument(skip(self, draft, actor), fields(number = %draft.number, actor = %actor.id))]
    pub async fn create_invoice(&self, draft: InvoiceDraft, actor: &Actor) -> Result<Invoice> {
        self.require(actor, EntityType::Invoice, Grant::Create)?;
        let snapshot = self.settings.current_snapshot()?;

        let id = InvoiceId::new();
        draft
            .validate()
            .map_err(|detail| DaybookError::validation(EntityRef::invoice(id), detail))?;
        if !snapshot.knows_currency(&draft.currency) {
            return Err(DaybookError::UnknownCurrency(draft.currency));
        }
        self.active_client(draft.client_id)?;

        let invoice = Invoice {
            id,
            client_id: draft.client_id,
            total: draft.total(),
            number: draft.number,
            lines: draft.lines,
            status: InvoiceStatus::Draft,
            created_at: daybook_common::now(),
            created_by: actor.id,
            version: 1,
        };

        self.trail
            .record(
                AuditDraft::new(EntityRef::invoice(id), actor.id, AuditAction::Create)
                    .with_diff(invoice.creation_diff()),
            )
            .await?;
        self.invoices.insert(id, invoice.clone());
        LedgerMetrics::incr(&self.metrics.invoices_created);

        let _ = self.events.send(MutationEvent::new(
            EntityType::Invoice,
            id,
            AuditAction::Create,
            actor.id,
        ));
        info!(invoice_id = %id, total = %invoice.total, "Invoice created");
        Ok(invoice)
    }

    /// Move an invoice along its status graph. Cancelling needs the
    /// archive grant, so operators may issue and collect but not void.
    #[instrument(skip(self, actor), fields(invoice_id = %id, target = %target, actor = %actor.id))]
    pub async fn transition_invoice(
        &self,
        id: InvoiceId,
        target: InvoiceStatus,
        actor: &Actor,
        expected_version: Option<u64>,
    ) -> Result<Invoice> {
        let grant = if target == InvoiceStatus::Cancelled {
            Grant::Archive
        } else {
            Grant::Update
        };
        self.require(actor, EntityType::Invoice, grant)?;

        let lock = entity_lock(&self.invoice_locks, id);
        let _guard = lock.lock().await;

        let mut current = self.get_invoice(id)?;
        if let Some(expected) = expected_version {
            if current.version != expected {
                LedgerMetrics::incr(&self.metrics.version_conflicts);
                return Err(DaybookError::ConcurrentModification {
                    entity: EntityRef::invoice(id),
                    expected,
                    actual: current.version,
                });
            }
        }

        let from = current.status;
        if !from.can_transition_to(target) {
            LedgerMetrics::incr(&self.metrics.transitions_rejected);
            warn!(from = %from, "Invoice transition rejected");
            return Err(DaybookError::InvalidTransition {
                entity: EntityRef::invoice(id),
                from: from.to_string(),
                to: target.to_string(),
            });
        }

        self.trail
            .record(
                AuditDraft::new(EntityRef::invoice(id), actor.id, AuditAction::StatusChange)
                    .with_diff(vec![FieldChange::changed(
                        "status",
                        json!(from),
                        json!(target),
                    )]),
            )
            .await?;

        current.status = target;
        current.version += 1;
        self.invoices.insert(id, current.clone());

        match target {
            InvoiceStatus::Paid => LedgerMetrics::incr(&self.metrics.invoices_paid),
            InvoiceStatus::Cancelled => LedgerMetrics::incr(&self.metrics.invoices_cancelled),
            _ => {}
        }

        let _ = self.events.send(MutationEvent::new(
            EntityType::Invoice,
            id,
            AuditAction::StatusChange,
            actor.id,
        ));
        info!(from = %from, "Invoice transitioned");
        Ok(current)
    }

    /// Current state of one invoice.
    pub fn get_invoice(&self, id: InvoiceId) -> Result<Invoice> {
        self.invoices
            .get(&id)
            .map(|i| i.clone())
            .ok_or_else(|| DaybookError::NotFound(EntityRef::invoice(id)))
    }

    /// Invoices for one client, newest first.
    pub fn invoices_for_client(&self, client_id: ClientId) -> Vec<Invoice> {
        let mut matches: Vec<Invoice> = self
            .invoices
            .iter()
            .filter(|i| i.client_id == client_id)
            .map(|i| i.clone())
            .collect();
        matches.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        matches.truncate(self.config.max_query_results);
        matches
    }

    // --- Private methods ---

    /// Resolve the draft into the stored variant, checking everything
    /// that needs the snapshot or the registry.
    fn resolve_kind(
        &self,
        draft: &TransactionDraft,
        snapshot: &SettingsSnapshot,
    ) -> Result<TransactionKind> {
        match draft {
            TransactionDraft::Client {
                client_id,
                direction,
                ..
            } => {
                self.active_client(*client_id)?;
                Ok(TransactionKind::Client {
                    client_id: *client_id,
                    direction: *direction,
                })
            }
            TransactionDraft::Internal {
                account, category, ..
            } => Ok(TransactionKind::Internal {
                account: account.clone(),
                category: *category,
            }),
            TransactionDraft::Swap {
                source_account,
                destination_account,
                amount,
                target_currency,
            } => {
                if !snapshot.knows_currency(target_currency) {
                    return Err(DaybookError::UnknownCurrency(target_currency.clone()));
                }
                let conversion = convert(amount, target_currency.clone(), &snapshot.rates)?;
                Ok(TransactionKind::Swap {
                    source_account: source_account.clone(),
                    destination_account: destination_account.clone(),
                    conversion,
                })
            }
        }
    }

    /// Look up a client and insist it still accepts business.
    fn active_client(&self, client_id: ClientId) -> Result<()> {
        let client = self.registry.get(client_id)?;
        if !client.is_active() {
            return Err(DaybookError::validation(
                EntityRef::client(client_id),
                "client is archived",
            ));
        }
        Ok(())
    }

    fn require(&self, actor: &Actor, entity: EntityType, grant: Grant) -> Result<()> {
        if actor.can(entity, grant) {
            Ok(())
        } else {
            Err(DaybookError::PermissionDenied {
                actor: actor.id,
                entity,
                grant,
            })
        }
    }
}

/// Fetch or create the write lock for one entity.
fn entity_lock<K: std::hash::Hash + Eq + Copy>(
    locks: &DashMap<K, Arc<Mutex<()>>>,
    id: K,
) -> Arc<Mutex<()>> {
    locks
        .entry(id)
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::InvoiceLine;
    use crate::transaction::{Direction, InternalCategory};
    use daybook_audit::{AuditSink, FlakySink, MemorySink};
    use daybook_common::{AccountId, ActorId, Currency, Money, OperationType, Role};
    use daybook_registry::ClientDraft;
    use daybook_settings::{SettingsPatch, SettingsSeed};
    use rust_decimal_macros::dec;

    struct Harness {
        engine: LedgerEngine,
        registry: Arc<ClientRegistry>,
        settings: Arc<SettingsStore>,
        trail: Arc<AuditTrail>,
        admin: Actor,
    }

    async fn harness_with_sink(sink: Arc<dyn AuditSink>) -> Harness {
        let trail = Arc::new(AuditTrail::new(sink));
        let (events, _) = broadcast::channel(64);
        let settings = Arc::new(SettingsStore::new(trail.clone(), events.clone()));
        let registry = Arc::new(ClientRegistry::new(trail.clone(), events.clone()));
        let admin = Actor::new(ActorId::new(), Role::Admin);
        settings
            .initialize(SettingsSeed::default(), &admin)
            .await
            .unwrap();
        let engine = LedgerEngine::new(
            LedgerConfig::default(),
            settings.clone(),
            registry.clone(),
            trail.clone(),
            events,
        );
        Harness {
            engine,
            registry,
            settings,
            trail,
            admin,
        }
    }

    async fn harness() -> Harness {
        harness_with_sink(Arc::new(MemorySink::new())).await
    }

    async fn jean(h: &Harness) -> ClientId {
        h.registry
            .create(
                ClientDraft::new("Jean Mukendi", Currency::usd()).with_city("Lubumbashi"),
                &h.admin,
            )
            .await
            .unwrap()
            .id
    }

    fn transfer(client_id: ClientId, value: rust_decimal::Decimal) -> TransactionDraft {
        TransactionDraft::Client {
            client_id,
            direction: Direction::Credit,
            operation: OperationType::Transfer,
            amount: Money::new(value, Currency::usd()),
        }
    }

    #[tokio::test]
    async fn test_client_transaction_full_lifecycle_audit() {
        let h = harness().await;
        let client_id = jean(&h).await;

        let tx = h
            .engine
            .create_transaction(transfer(client_id, dec!(100)), &h.admin)
            .await
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);

        h.engine
            .transition(tx.id, TransactionStatus::Processing, &h.admin, None)
            .await
            .unwrap();
        let done = h
            .engine
            .transition(tx.id, TransactionStatus::Completed, &h.admin, None)
            .await
            .unwrap();
        assert_eq!(done.status, TransactionStatus::Completed);
        assert_eq!(done.version, 3);

        // One create entry for the client.
        let client_entries = h
            .trail
            .query_by_entity(&EntityRef::client(client_id))
            .await
            .unwrap();
        assert_eq!(client_entries.len(), 1);
        assert_eq!(client_entries[0].action, AuditAction::Create);

        // Create plus two status changes for the transaction, in order.
        let tx_entries = h
            .trail
            .query_by_entity(&EntityRef::transaction(tx.id))
            .await
            .unwrap();
        assert_eq!(tx_entries.len(), 3);
        assert_eq!(tx_entries[0].action, AuditAction::Create);
        assert_eq!(tx_entries[1].action, AuditAction::StatusChange);
        assert_eq!(tx_entries[2].action, AuditAction::StatusChange);
        assert!(tx_entries
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(tx_entries[2].diff[0].after, json!("completed"));
    }

    #[tokio::test]
    async fn test_status_jump_is_rejected_without_mutation() {
        let h = harness().await;
        let client_id = jean(&h).await;
        let tx = h
            .engine
            .create_transaction(transfer(client_id, dec!(50)), &h.admin)
            .await
            .unwrap();

        let result = h
            .engine
            .transition(tx.id, TransactionStatus::Completed, &h.admin, None)
            .await;
        assert!(matches!(result, Err(DaybookError::InvalidTransition { .. })));

        let unchanged = h.engine.get_transaction(tx.id).unwrap();
        assert_eq!(unchanged.status, TransactionStatus::Pending);
        assert_eq!(unchanged.version, 1);
        assert_eq!(h.engine.metrics().snapshot().transitions_rejected, 1);

        // No audit entry for the rejected jump.
        let entries = h
            .trail
            .query_by_entity(&EntityRef::transaction(tx.id))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_terminal_transaction_is_immutable() {
        let h = harness().await;
        let client_id = jean(&h).await;
        let tx = h
            .engine
            .create_transaction(transfer(client_id, dec!(20)), &h.admin)
            .await
            .unwrap();

        h.engine
            .transition(tx.id, TransactionStatus::Cancelled, &h.admin, None)
            .await
            .unwrap();
        for target in [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Completed,
        ] {
            let result = h.engine.transition(tx.id, target, &h.admin, None).await;
            assert!(matches!(result, Err(DaybookError::InvalidTransition { .. })));
        }
    }

    #[tokio::test]
    async fn test_unknown_currency_is_rejected() {
        let h = harness().await;
        let client_id = jean(&h).await;

        let draft = TransactionDraft::Client {
            client_id,
            direction: Direction::Credit,
            operation: OperationType::Transfer,
            amount: Money::new(dec!(100), Currency::new("GBP")),
        };
        let result = h.engine.create_transaction(draft, &h.admin).await;
        assert!(matches!(result, Err(DaybookError::UnknownCurrency(_))));
    }

    #[tokio::test]
    async fn test_fee_computed_from_snapshot_at_creation() {
        let h = harness().await;
        let client_id = jean(&h).await;

        // Seed schedule: 5% transfer fee, 3% partner commission.
        let tx = h
            .engine
            .create_transaction(transfer(client_id, dec!(100)), &h.admin)
            .await
            .unwrap();
        assert_eq!(tx.fee.fee.value, dec!(5.00));
        assert_eq!(tx.fee.partner_commission.value, dec!(3.00));
        assert_eq!(tx.fee.net_margin.value, dec!(2.00));
    }

    #[tokio::test]
    async fn test_swap_rate_is_captured_not_recomputed() {
        let h = harness().await;
        h.settings
            .update(
                SettingsPatch::SetRate {
                    currency: Currency::eur(),
                    rate: dec!(0.90),
                },
                None,
                &h.admin,
            )
            .await
            .unwrap();

        let draft = TransactionDraft::Swap {
            source_account: AccountId::new("caisse-usd"),
            destination_account: AccountId::new("caisse-eur"),
            amount: Money::new(dec!(100), Currency::usd()),
            target_currency: Currency::eur(),
        };
        let tx = h.engine.create_transaction(draft, &h.admin).await.unwrap();

        let conversion = match &tx.kind {
            TransactionKind::Swap { conversion, .. } => conversion.clone(),
            other => panic!("expected swap, got {}", other.label()),
        };
        assert_eq!(conversion.output, Money::new(dec!(90.00), Currency::eur()));
        assert_eq!(conversion.rate, dec!(0.90));

        // A later rate change must not touch the stored swap.
        h.settings
            .update(
                SettingsPatch::SetRate {
                    currency: Currency::eur(),
                    rate: dec!(0.95),
                },
                None,
                &h.admin,
            )
            .await
            .unwrap();

        let reread = h.engine.get_transaction(tx.id).unwrap();
        match &reread.kind {
            TransactionKind::Swap { conversion, .. } => {
                assert_eq!(conversion.output.value, dec!(90.00));
                assert_eq!(conversion.rate, dec!(0.90));
            }
            other => panic!("expected swap, got {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_concurrent_transitions_exactly_one_wins() {
        let h = harness().await;
        let client_id = jean(&h).await;
        let tx = h
            .engine
            .create_transaction(transfer(client_id, dec!(75)), &h.admin)
            .await
            .unwrap();

        // Both callers read version 1 and race to transition.
        let (a, b) = tokio::join!(
            h.engine
                .transition(tx.id, TransactionStatus::Processing, &h.admin, Some(1)),
            h.engine
                .transition(tx.id, TransactionStatus::Cancelled, &h.admin, Some(1)),
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes.iter().any(|r| matches!(
            r,
            Err(DaybookError::ConcurrentModification { .. })
        )));
        assert_eq!(h.engine.metrics().snapshot().version_conflicts, 1);
        assert_eq!(h.engine.get_transaction(tx.id).unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_archived_client_accepts_no_new_transactions() {
        let h = harness().await;
        let client_id = jean(&h).await;
        h.registry.archive(client_id, None, &h.admin).await.unwrap();

        let result = h
            .engine
            .create_transaction(transfer(client_id, dec!(10)), &h.admin)
            .await;
        assert!(matches!(result, Err(DaybookError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_operator_creates_but_cannot_cancel_invoice() {
        let h = harness().await;
        let client_id = jean(&h).await;
        let operator = Actor::new(ActorId::new(), Role::Operator);

        // Operators handle day-to-day creation.
        let tx = h
            .engine
            .create_transaction(transfer(client_id, dec!(40)), &operator)
            .await
            .unwrap();
        h.engine
            .transition(tx.id, TransactionStatus::Processing, &operator, None)
            .await
            .unwrap();

        let invoice = h
            .engine
            .create_invoice(
                InvoiceDraft {
                    client_id,
                    number: "FAC-1".to_string(),
                    currency: Currency::usd(),
                    lines: vec![InvoiceLine::new("Service", dec!(1), dec!(40))],
                },
                &operator,
            )
            .await
            .unwrap();

        let denied = h
            .engine
            .transition_invoice(invoice.id, InvoiceStatus::Cancelled, &operator, None)
            .await;
        assert!(matches!(denied, Err(DaybookError::PermissionDenied { .. })));

        // The admin may void it.
        h.engine
            .transition_invoice(invoice.id, InvoiceStatus::Cancelled, &h.admin, None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invoice_lifecycle_and_closed_table() {
        let h = harness().await;
        let client_id = jean(&h).await;

        let invoice = h
            .engine
            .create_invoice(
                InvoiceDraft {
                    client_id,
                    number: "FAC-2026-0007".to_string(),
                    currency: Currency::usd(),
                    lines: vec![
                        InvoiceLine::new("Import handling", dec!(3), dec!(19.99)),
                        InvoiceLine::new("Customs brokerage", dec!(1), dec!(125.00)),
                    ],
                },
                &h.admin,
            )
            .await
            .unwrap();
        assert_eq!(invoice.total.value, dec!(184.97));
        assert_eq!(invoice.status, InvoiceStatus::Draft);

        // Draft cannot jump straight to Paid.
        let jump = h
            .engine
            .transition_invoice(invoice.id, InvoiceStatus::Paid, &h.admin, None)
            .await;
        assert!(matches!(jump, Err(DaybookError::InvalidTransition { .. })));

        h.engine
            .transition_invoice(invoice.id, InvoiceStatus::Issued, &h.admin, None)
            .await
            .unwrap();
        let paid = h
            .engine
            .transition_invoice(invoice.id, InvoiceStatus::Paid, &h.admin, None)
            .await
            .unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(h.engine.metrics().snapshot().invoices_paid, 1);
    }

    #[tokio::test]
    async fn test_list_for_client_newest_first() {
        let h = harness().await;
        let client_id = jean(&h).await;
        let other = h
            .registry
            .create(ClientDraft::new("Amina Kalenga", Currency::usd()), &h.admin)
            .await
            .unwrap()
            .id;

        let first = h
            .engine
            .create_transaction(transfer(client_id, dec!(10)), &h.admin)
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = h
            .engine
            .create_transaction(transfer(client_id, dec!(20)), &h.admin)
            .await
            .unwrap();
        h.engine
            .create_transaction(transfer(other, dec!(30)), &h.admin)
            .await
            .unwrap();

        let listed = h.engine.list_for_client(client_id);
        assert_eq!(
            listed.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );
    }

    #[tokio::test]
    async fn test_query_filters() {
        let h = harness().await;
        let client_id = jean(&h).await;

        let small = h
            .engine
            .create_transaction(transfer(client_id, dec!(10)), &h.admin)
            .await
            .unwrap();
        let large = h
            .engine
            .create_transaction(transfer(client_id, dec!(5000)), &h.admin)
            .await
            .unwrap();
        h.engine
            .transition(small.id, TransactionStatus::Processing, &h.admin, None)
            .await
            .unwrap();

        let pending = h.engine.query(&TransactionFilter {
            status: Some(TransactionStatus::Pending),
            ..Default::default()
        });
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, large.id);

        let big = h.engine.query(&TransactionFilter {
            min_amount: Some(dec!(1000)),
            ..Default::default()
        });
        assert_eq!(big.len(), 1);
        assert_eq!(big[0].id, large.id);

        let swaps = h.engine.query(&TransactionFilter {
            kind: Some("swap"),
            ..Default::default()
        });
        assert!(swaps.is_empty());
    }

    #[tokio::test]
    async fn test_failed_audit_append_rolls_back_transition() {
        // Budget: settings seed, then the create; the transition's append
        // fails.
        let h = harness_with_sink(Arc::new(FlakySink::failing_after(2))).await;

        let draft = TransactionDraft::Internal {
            account: AccountId::new("caisse-usd"),
            category: InternalCategory::Expense,
            amount: Money::new(dec!(100), Currency::usd()),
        };
        let tx = h.engine.create_transaction(draft, &h.admin).await.unwrap();

        let result = h
            .engine
            .transition(tx.id, TransactionStatus::Processing, &h.admin, None)
            .await;
        assert!(matches!(result, Err(DaybookError::Persistence(_))));

        let unchanged = h.engine.get_transaction(tx.id).unwrap();
        assert_eq!(unchanged.status, TransactionStatus::Pending);
        assert_eq!(unchanged.version, 1);
    }

    #[tokio::test]
    async fn test_every_mutation_publishes_one_event() {
        let h = harness().await;
        let mut rx = h.engine.subscribe();
        let client_id = jean(&h).await;

        let tx = h
            .engine
            .create_transaction(transfer(client_id, dec!(10)), &h.admin)
            .await
            .unwrap();
        h.engine
            .transition(tx.id, TransactionStatus::Processing, &h.admin, None)
            .await
            .unwrap();

        // Client create, transaction create, status change.
        let first = rx.recv().await.unwrap();
        assert_eq!(first.entity_type, EntityType::Client);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.entity_type, EntityType::Transaction);
        assert_eq!(second.action, AuditAction::Create);
        let third = rx.recv().await.unwrap();
        assert_eq!(third.action, AuditAction::StatusChange);
    }
}
