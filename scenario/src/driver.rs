//! Workday driver: wires a full in-memory workspace and runs a day of
//! business against it.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::broadcast;
use tracing::info;

use daybook_audit::{AuditTrail, MemorySink};
use daybook_common::{AccountId, Actor, ActorId, Currency, Money, OperationType, Role};
use daybook_ledger::{
    Direction, InternalCategory, InvoiceDraft, InvoiceLine, InvoiceStatus, LedgerConfig,
    LedgerEngine, TransactionDraft, TransactionStatus,
};
use daybook_registry::{ClientDraft, ClientRegistry};
use daybook_settings::{SettingsPatch, SettingsSeed, SettingsStore};

const NAMES: &[&str] = &[
    "Jean Mukendi",
    "Amina Kalenga",
    "Zawadi Ilunga",
    "Patrick Tshisekedi",
    "Grace Mwamba",
    "David Kabongo",
    "Esther Nzuzi",
    "Moise Lukusa",
];

const CITIES: &[&str] = &["Lubumbashi", "Kinshasa", "Goma", "Kolwezi", "Bukavu"];

/// How much work the day holds.
pub struct WorkdayPlan {
    pub clients: usize,
    pub transactions: usize,
    pub invoices: usize,
}

/// Drives one scripted workday and keeps handles to everything worth
/// reporting afterwards.
pub struct WorkdayDriver {
    plan: WorkdayPlan,
    rng: StdRng,
    trail: Arc<AuditTrail>,
    settings: Arc<SettingsStore>,
    registry: Arc<ClientRegistry>,
    engine: LedgerEngine,
    events: broadcast::Receiver<daybook_common::MutationEvent>,
    admin: Actor,
    operator: Actor,
}

impl WorkdayDriver {
    /// Wire a fresh in-memory workspace.
    pub fn new(plan: WorkdayPlan, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let config = LedgerConfig::from_env();
        let trail = Arc::new(AuditTrail::new(Arc::new(MemorySink::new())));
        let (sender, events) = broadcast::channel(config.event_capacity);
        let settings = Arc::new(SettingsStore::new(trail.clone(), sender.clone()));
        let registry = Arc::new(ClientRegistry::new(trail.clone(), sender.clone()));
        let engine = LedgerEngine::new(
            config,
            settings.clone(),
            registry.clone(),
            trail.clone(),
            sender,
        );

        Self {
            plan,
            rng,
            trail,
            settings,
            registry,
            engine,
            events,
            admin: Actor::new(ActorId::new(), Role::Admin),
            operator: Actor::new(ActorId::new(), Role::Operator),
        }
    }

    /// Run the scripted day.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.settings
            .initialize(SettingsSeed::default(), &self.admin)
            .await?;
        info!("Settings seeded at version 1");

        let clients = self.register_clients().await?;
        self.drive_transactions(&clients).await?;
        self.issue_invoices(&clients).await?;

        // One client closes their account at the end of the day.
        if let Some(client_id) = clients.first() {
            self.registry.archive(*client_id, None, &self.admin).await?;
            info!(client_id = %client_id, "Client archived");
        }

        Ok(())
    }

    async fn register_clients(&mut self) -> anyhow::Result<Vec<daybook_common::ClientId>> {
        let mut ids = Vec::with_capacity(self.plan.clients);
        for i in 0..self.plan.clients {
            let name = NAMES[i % NAMES.len()];
            let city = CITIES[self.rng.gen_range(0..CITIES.len())];
            let client = self
                .registry
                .create(
                    ClientDraft::new(name, Currency::usd()).with_city(city),
                    &self.operator,
                )
                .await?;
            info!(client_id = %client.id, name, "Client registered");
            ids.push(client.id);
        }
        Ok(ids)
    }

    async fn drive_transactions(
        &mut self,
        clients: &[daybook_common::ClientId],
    ) -> anyhow::Result<()> {
        let halfway = self.plan.transactions / 2;

        for i in 0..self.plan.transactions {
            // The evening rate update lands mid-run; everything recorded
            // before it keeps its captured rate.
            if i == halfway {
                self.settings
                    .update(
                        SettingsPatch::SetRate {
                            currency: Currency::cdf(),
                            rate: dec!(2310),
                        },
                        None,
                        &self.admin,
                    )
                    .await?;
                info!("CDF rate updated to 2310");
            }

            let draft = self.random_draft(clients);
            let tx = self.engine.create_transaction(draft, &self.operator).await?;
            self.walk_lifecycle(tx.id).await?;
        }
        Ok(())
    }

    fn random_draft(&mut self, clients: &[daybook_common::ClientId]) -> TransactionDraft {
        let amount = Money::new(
            Decimal::from(self.rng.gen_range(10..5000)),
            Currency::usd(),
        );
        match self.rng.gen_range(0..10) {
            n if clients.is_empty() || n == 0 => TransactionDraft::Internal {
                account: AccountId::new("caisse-usd"),
                category: if self.rng.gen_bool(0.5) {
                    InternalCategory::Expense
                } else {
                    InternalCategory::Revenue
                },
                amount,
            },
            1 => TransactionDraft::Swap {
                source_account: AccountId::new("caisse-usd"),
                destination_account: AccountId::new("caisse-cdf"),
                amount,
                target_currency: Currency::cdf(),
            },
            n => TransactionDraft::Client {
                client_id: clients[n % clients.len()],
                direction: if self.rng.gen_bool(0.7) {
                    Direction::Credit
                } else {
                    Direction::Debit
                },
                operation: match n % 3 {
                    0 => OperationType::Transfer,
                    1 => OperationType::Order,
                    _ => OperationType::Partner,
                },
                amount,
            },
        }
    }

    async fn walk_lifecycle(
        &mut self,
        id: daybook_common::TransactionId,
    ) -> anyhow::Result<()> {
        if self.rng.gen_bool(0.1) {
            self.engine
                .transition(id, TransactionStatus::Cancelled, &self.operator, None)
                .await?;
            return Ok(());
        }
        self.engine
            .transition(id, TransactionStatus::Processing, &self.operator, None)
            .await?;
        let target = if self.rng.gen_bool(0.9) {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Failed
        };
        self.engine
            .transition(id, target, &self.operator, None)
            .await?;
        Ok(())
    }

    async fn issue_invoices(
        &mut self,
        clients: &[daybook_common::ClientId],
    ) -> anyhow::Result<()> {
        if clients.is_empty() {
            info!("No clients registered, skipping invoices");
            return Ok(());
        }
        for i in 0..self.plan.invoices {
            let client_id = clients[i % clients.len()];
            let invoice = self
                .engine
                .create_invoice(
                    InvoiceDraft {
                        client_id,
                        number: format!("FAC-2026-{:04}", i + 1),
                        currency: Currency::usd(),
                        lines: vec![InvoiceLine::new(
                            "Import handling",
                            Decimal::from(self.rng.gen_range(1..5)),
                            dec!(49.90),
                        )],
                    },
                    &self.operator,
                )
                .await?;
            self.engine
                .transition_invoice(invoice.id, InvoiceStatus::Issued, &self.operator, None)
                .await?;
            if self.rng.gen_bool(0.8) {
                self.engine
                    .transition_invoice(invoice.id, InvoiceStatus::Paid, &self.operator, None)
                    .await?;
            } else {
                self.engine
                    .transition_invoice(invoice.id, InvoiceStatus::Cancelled, &self.admin, None)
                    .await?;
            }
        }
        Ok(())
    }

    /// Log what the day produced.
    pub fn report(&mut self) {
        let metrics = self.engine.metrics().snapshot();
        info!("Workday complete");
        info!("Clients registered: {}", self.registry.count());
        info!(
            "Transactions: {} created, {} completed, {} failed, {} cancelled",
            metrics.transactions_created,
            metrics.transactions_completed,
            metrics.transactions_failed,
            metrics.transactions_cancelled
        );
        info!(
            "Invoices: {} created, {} paid, {} cancelled",
            metrics.invoices_created, metrics.invoices_paid, metrics.invoices_cancelled
        );

        let stats = self.trail.stats();
        info!(
            "Audit trail: {} entries ({} creates, {} updates, {} archives, {} status changes)",
            stats.recorded, stats.creates, stats.updates, stats.archives, stats.status_changes
        );

        for change in self.settings.rate_changes(&Currency::cdf()) {
            info!(
                "CDF rate change at version {}: {:?} -> {:?} ({:?}%)",
                change.version, change.old_rate, change.new_rate, change.variation_percent
            );
        }

        let mut published = 0usize;
        while self.events.try_recv().is_ok() {
            published += 1;
        }
        info!("Mutation events published: {}", published);
    }
}
