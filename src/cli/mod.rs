//! Command-line interface for order-relay.
//!
//! Provides commands for running the relay loop, inspecting order counts,
//! listing orders, and showing the resolved configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use crate::adapters::HttpDelivery;
use crate::config::{load_config, ResolvedConfig};
use crate::core::{CycleOutcome, Relay, Scheduler};
use crate::domain::{Order, OrderStatus};
use crate::store::{OrderStore, SqliteOrderStore};

/// order-relay - Forward pending orders to a delivery endpoint
#[derive(Parser, Debug)]
#[command(name = "order-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to $RELAY_CONFIG or ./order-relay.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay loop until Ctrl+C
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Show order counts per status
    Status,

    /// List orders
    List {
        /// Filter by status
        #[arg(short, long, value_enum)]
        status: Option<StatusFilter>,

        /// Maximum number of orders to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show resolved configuration
    Config,
}

/// Status filter for CLI (maps to OrderStatus)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    Pending,
    Sent,
    Success,
    Failure,
}

impl From<StatusFilter> for OrderStatus {
    fn from(s: StatusFilter) -> Self {
        match s {
            StatusFilter::Pending => OrderStatus::Pending,
            StatusFilter::Sent => OrderStatus::Sent,
            StatusFilter::Success => OrderStatus::Success,
            StatusFilter::Failure => OrderStatus::Failure,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let config = load_config(self.config.as_deref())?;

        match self.command {
            Commands::Run { once } => run_relay(&config, once).await,
            Commands::Status => show_status(&config).await,
            Commands::List { status, limit } => list_orders(&config, status, limit).await,
            Commands::Config => show_config(&config),
        }
    }
}

fn open_store(config: &ResolvedConfig) -> Result<SqliteOrderStore> {
    SqliteOrderStore::open(&config.store_path)
        .with_context(|| format!("Failed to open order store: {}", config.store_path.display()))
}

/// Run the relay until Ctrl+C, or a single cycle with --once
async fn run_relay(config: &ResolvedConfig, once: bool) -> Result<()> {
    let store = open_store(config)?;
    let delivery = HttpDelivery::new(config.endpoint.clone(), config.timeout)
        .context("Failed to create delivery client")?;

    let mut relay = Relay::new(store, delivery);
    if let Some(max) = config.max_batch_size {
        relay = relay.with_max_batch_size(max);
    }

    let scheduler = Scheduler::new(relay, config.interval).with_pacing(config.pacing());

    if once {
        let outcome = scheduler.run_once().await.context("Relay cycle failed")?;
        match outcome {
            CycleOutcome::Idle => println!("No pending orders"),
            CycleOutcome::Delivered {
                forwarded,
                acknowledged,
            } => {
                println!("Forwarded:    {}", forwarded);
                println!("Acknowledged: {}", acknowledged.len());
            }
        }
        return Ok(());
    }

    info!(
        endpoint = %config.endpoint,
        store = %config.store_path.display(),
        interval_secs = config.interval.as_secs(),
        "Starting order relay"
    );

    let stats = scheduler
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for Ctrl+C; running until killed");
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!(
        cycles = stats.cycles,
        failed_cycles = stats.failed_cycles,
        acknowledged = stats.acknowledged,
        "Order relay stopped"
    );

    Ok(())
}

/// Show order counts per status
async fn show_status(config: &ResolvedConfig) -> Result<()> {
    let store = open_store(config)?;
    let counts = store.count_by_status().await?;

    println!();
    println!("Order Store Status");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    println!("Store:  {}", config.store_path.display());
    println!();

    let mut total = 0;
    for status in OrderStatus::ALL {
        let count = counts.get(&status).copied().unwrap_or(0);
        total += count;
        println!("  {:<10} {}", format!("{}:", status), count);
    }
    println!("  {:<10} {}", "total:", total);
    println!();

    Ok(())
}

/// List orders, optionally filtered by status
async fn list_orders(
    config: &ResolvedConfig,
    status: Option<StatusFilter>,
    limit: usize,
) -> Result<()> {
    let store = open_store(config)?;

    let statuses: Vec<OrderStatus> = match status {
        Some(s) => vec![s.into()],
        None => OrderStatus::ALL.to_vec(),
    };

    let mut orders: Vec<Order> = Vec::new();
    for status in statuses {
        orders.extend(store.list_by_status(status).await?);
    }

    if orders.is_empty() {
        println!("No orders");
        return Ok(());
    }

    println!();
    println!("{:<38} {:<10} {:<40}", "ORDER ID", "STATUS", "PAYLOAD");
    println!("{}", "-".repeat(90));

    for order in orders.iter().take(limit) {
        let payload = serde_json::to_string(&order.payload)?;
        let payload = if payload.chars().count() > 40 {
            format!("{}...", payload.chars().take(37).collect::<String>())
        } else {
            payload
        };

        println!("{:<38} {:<10} {:<40}", order.id, order.status, payload);
    }

    if orders.len() > limit {
        println!();
        println!("  (showing {} of {} orders)", limit, orders.len());
    }

    Ok(())
}

/// Show resolved configuration
fn show_config(config: &ResolvedConfig) -> Result<()> {
    println!();
    println!("Order Relay Configuration");
    println!("══════════════════════════════════════════════════════════════");
    println!();
    match &config.config_file {
        Some(path) => println!("Config file:  {}", path.display()),
        None => println!("Config file:  (none, using defaults)"),
    }
    println!("Store:        {}", config.store_path.display());
    println!("Endpoint:     {}", config.endpoint);
    println!("Timeout:      {}s", config.timeout.as_secs());
    println!("Interval:     {}s", config.interval.as_secs());
    match config.max_batch_size {
        Some(max) => println!("Batch cap:    {}", max),
        None => println!("Batch cap:    (none)"),
    }
    match &config.backoff {
        Some(b) => println!(
            "Backoff:      x{} up to {}s",
            b.multiplier,
            b.max_interval.as_secs()
        ),
        None => println!("Backoff:      (fixed interval)"),
    }
    println!();

    Ok(())
}
