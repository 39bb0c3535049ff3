//! Command-Line Interface
//!
//! Wires configuration, the record store adapter and the migration pipeline
//! together for the `recon-migrate` binary.
//!
//! # Commands
//!
//! ```text
//! recon-migrate dry-run  [--batchSize N] [--concurrency N] [--claims ids] [--claims-file path]
//! recon-migrate apply    --proposals path [--concurrency N]
//! recon-migrate rollback --bfile path [--concurrency N]
//! ```

pub mod cli;
pub mod config;

use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app_migration::{apply_proposals, dry_run, rollback, MigrationContext, MigrationSettings};
use infra_store::{
    ClientCredentialsTokenProvider, DataverseAdjustmentStore, DataverseClaimSource, DataverseClient,
    StaticTokenProvider, TokenProvider,
};

use crate::cli::{Cli, Command};
use crate::config::AppConfig;

/// Initializes the tracing subscriber
///
/// `RUST_LOG` wins over the configured level.
pub fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}

/// Builds the run context over the Web API
pub fn connect(config: &AppConfig, settings: MigrationSettings) -> anyhow::Result<MigrationContext> {
    let tokens: Arc<dyn TokenProvider> = match &config.access_token {
        Some(token) => Arc::new(StaticTokenProvider::new(token.clone())),
        None => Arc::new(ClientCredentialsTokenProvider::new(config.auth_config()?)?),
    };
    let client = Arc::new(DataverseClient::new(config.store_config()?, tokens)?);
    info!(api_base = %client.config().api_base(), "Connected to record store");

    let claims = Arc::new(DataverseClaimSource::new(client.clone()));
    let adjustments = Arc::new(DataverseAdjustmentStore::new(client));
    Ok(MigrationContext::new(claims, adjustments, settings)?)
}

/// Runs one command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let settings = cli.apply_global(config.settings()?);

    match &cli.command {
        Command::DryRun(args) => {
            let filter = args.filter()?;
            let ctx = connect(&config, args.apply_to(settings))?;
            let report = dry_run(&ctx, &filter).await.context("dry run failed")?;

            println!(
                "Dry run: {} claims, {} batches, {} proposals, {} claims with statistics",
                report.claims_selected, report.batches, report.proposals, report.claims_with_statistics
            );
            for path in report.proposal_files.iter().chain(&report.backup_files) {
                println!("  wrote {}", path.display());
            }
            println!("  wrote {}", report.stats_file.display());
            if !report.failed_claims.is_empty() {
                println!("  {} claims failed:", report.failed_claims.len());
                for id in &report.failed_claims {
                    println!("    {}", id.as_uuid());
                }
            }
        }
        Command::Apply(args) => {
            let ctx = connect(&config, args.apply_to(settings))?;
            let summary = apply_proposals(&ctx, &args.proposals)
                .await
                .with_context(|| format!("apply of {} failed", args.proposals.display()))?;
            println!(
                "Apply: {} total, {} patched, {} skipped, {} failed (audit: {})",
                summary.total,
                summary.patched,
                summary.skipped,
                summary.failed,
                summary.audit_file.display()
            );
        }
        Command::Rollback(args) => {
            let ctx = connect(&config, args.apply_to(settings))?;
            let summary = rollback(&ctx, &args.backup_file)
                .await
                .with_context(|| format!("rollback of {} failed", args.backup_file.display()))?;
            println!(
                "Rollback: {} total, {} restored, {} failed (audit: {})",
                summary.total,
                summary.restored,
                summary.failed,
                summary.audit_file.display()
            );
        }
    }
    Ok(())
}
