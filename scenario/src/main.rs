//! Daybook Scenario
//!
//! Scripted workday against an in-memory workspace: seed settings,
//! register clients, drive transactions through their lifecycle, swap
//! between cash desks and issue invoices, then report what the audit
//! trail saw.

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod driver;

use driver::{WorkdayDriver, WorkdayPlan};

/// Daybook scenario CLI
#[derive(Parser, Debug)]
#[command(name = "scenario")]
#[command(about = "Scripted workday against an in-memory daybook workspace")]
struct Args {
    /// Number of clients to register
    #[arg(short, long, default_value = "5")]
    clients: usize,

    /// Number of transactions to drive
    #[arg(short, long, default_value = "20")]
    transactions: usize,

    /// Number of invoices to issue
    #[arg(short, long, default_value = "3")]
    invoices: usize,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting daybook scenario");
    info!("Clients: {}", args.clients);
    info!("Transactions: {}", args.transactions);
    info!("Invoices: {}", args.invoices);

    let plan = WorkdayPlan {
        clients: args.clients,
        transactions: args.transactions,
        invoices: args.invoices,
    };
    let mut driver = WorkdayDriver::new(plan, args.seed);
    driver.run().await?;
    driver.report();

    Ok(())
}
