//! Adjustment cap reconciliation tool
//!
//! # Usage
//!
//! ```bash
//! # Compute proposals for every claim
//! recon-migrate dry-run --batchSize 50 --concurrency 4
//!
//! # Apply one batch, then undo it
//! recon-migrate apply --proposals reports/proposals/Proposed_Adjustments_batch_0001.csv
//! recon-migrate rollback --bfile reports/backups/backup_batch_0001.csv
//! ```
//!
//! # Environment Variables
//!
//! * `RECON_STORE_URL` - Organization URL of the record store
//! * `RECON_TENANT_ID`, `RECON_CLIENT_ID`, `RECON_CLIENT_SECRET` - client credentials
//! * `RECON_ACCESS_TOKEN` - pre-issued token used instead of client credentials
//! * `RECON_REPORTS_DIR` - output directory (default: reports)
//! * `RECON_BATCH_SIZE`, `RECON_CONCURRENCY`, `RECON_ROLLBACK_CONCURRENCY`
//! * `RECON_MAX_ATTEMPTS`, `RECON_RETRY_BASE_MS`
//! * `RECON_LOG_LEVEL` - log filter (default: info); `RUST_LOG` wins

use clap::Parser;

use interface_cli::cli::Cli;
use interface_cli::config::AppConfig;
use interface_cli::{init_tracing, run};

#[tokio::main]
async fn main() {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if let Err(err) = start(cli).await {
        eprintln!("Fatal: {:#}", err);
        std::process::exit(1);
    }
}

async fn start(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    init_tracing(&level);
    tracing::debug!(?config, "Loaded configuration");
    run(cli, config).await
}
