//! Command-line surface

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use app_migration::{ClaimFilter, MigrationError, MigrationSettings, RetryPolicy};
use domain_reconciliation::{ExcessSource, StatsPolicy, TieBreak};

/// Adjustment cap reconciliation against the record store
#[derive(Debug, Parser)]
#[command(name = "recon-migrate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory for proposals, backups and statistics
    #[arg(long, global = true)]
    pub reports_dir: Option<PathBuf>,

    /// Log filter, e.g. `info` or `app_migration=debug`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute proposals and write proposals, backup and statistics files
    DryRun(DryRunArgs),

    /// Apply a proposals file with verify-before-write
    Apply(ApplyArgs),

    /// Restore the original amounts of a backup file
    Rollback(RollbackArgs),
}

#[derive(Debug, Args)]
pub struct DryRunArgs {
    /// Claims per batch
    #[arg(long = "batch-size", visible_alias = "batchSize")]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Claim ids to process; wins over --claims-file
    #[arg(long, value_delimiter = ',')]
    pub claims: Vec<String>,

    /// File with one claim id per line (first comma-separated field)
    #[arg(long)]
    pub claims_file: Option<PathBuf>,

    /// Order of equal amounts: earliest | latest
    #[arg(long)]
    pub tie_break: Option<TieBreak>,

    /// Excess computation: claim | remittance
    #[arg(long)]
    pub excess_source: Option<ExcessSource>,

    /// Claims in the statistics file: violations | all
    #[arg(long)]
    pub stats: Option<StatsPolicy>,
}

#[derive(Debug, Args)]
pub struct RetryArgs {
    #[arg(long)]
    pub max_attempts: Option<u32>,

    #[arg(long)]
    pub retry_base_ms: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Proposals file written by dry-run
    #[arg(long)]
    pub proposals: PathBuf,

    #[arg(long)]
    pub concurrency: Option<usize>,

    #[command(flatten)]
    pub retry: RetryArgs,
}

#[derive(Debug, Args)]
pub struct RollbackArgs {
    /// Backup file written by dry-run
    #[arg(long = "bfile")]
    pub backup_file: PathBuf,

    #[arg(long)]
    pub concurrency: Option<usize>,

    #[command(flatten)]
    pub retry: RetryArgs,
}

impl Cli {
    /// Applies the global flags to configured settings
    pub fn apply_global(&self, mut settings: MigrationSettings) -> MigrationSettings {
        if let Some(dir) = &self.reports_dir {
            settings.reports_dir = dir.clone();
        }
        settings
    }
}

impl DryRunArgs {
    pub fn apply_to(&self, mut settings: MigrationSettings) -> MigrationSettings {
        if let Some(batch_size) = self.batch_size {
            settings.batch_size = batch_size;
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency;
        }
        if let Some(tie_break) = self.tie_break {
            settings.engine.tie_break = tie_break;
        }
        if let Some(excess_source) = self.excess_source {
            settings.engine.excess_source = excess_source;
        }
        if let Some(stats) = self.stats {
            settings.stats = stats;
        }
        settings
    }

    pub fn filter(&self) -> Result<ClaimFilter, MigrationError> {
        ClaimFilter::from_inputs(&self.claims, self.claims_file.as_deref())
    }
}

impl RetryArgs {
    pub fn apply_to(&self, settings: MigrationSettings) -> MigrationSettings {
        let current = settings.retry;
        let retry = RetryPolicy::new(
            self.max_attempts.unwrap_or(current.max_attempts()),
            self.retry_base_ms
                .map(Duration::from_millis)
                .unwrap_or(current.base_delay()),
        );
        settings.with_retry(retry)
    }
}

impl ApplyArgs {
    pub fn apply_to(&self, settings: MigrationSettings) -> MigrationSettings {
        let settings = self.retry.apply_to(settings);
        match self.concurrency {
            Some(concurrency) => settings.with_concurrency(concurrency),
            None => settings,
        }
    }
}

impl RollbackArgs {
    pub fn apply_to(&self, settings: MigrationSettings) -> MigrationSettings {
        let settings = self.retry.apply_to(settings);
        match self.concurrency {
            Some(concurrency) => settings.with_rollback_concurrency(concurrency),
            None => settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("recon-migrate").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_dry_run_flags_override_settings() {
        let cli = parse(&[
            "dry-run",
            "--batch-size",
            "10",
            "--concurrency",
            "2",
            "--tie-break",
            "latest",
            "--excess-source",
            "remittance",
            "--stats",
            "all",
            "--reports-dir",
            "out",
        ]);
        let Command::DryRun(args) = &cli.command else {
            panic!("expected dry-run");
        };
        let settings = args.apply_to(cli.apply_global(MigrationSettings::default()));
        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.engine.tie_break, TieBreak::LatestFirst);
        assert_eq!(settings.engine.excess_source, ExcessSource::RemittancePendingCaps);
        assert_eq!(settings.stats, StatsPolicy::AllClaims);
        assert_eq!(settings.reports_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_batch_size_accepts_both_spellings() {
        for flag in ["--batchSize", "--batch-size"] {
            let cli = parse(&["dry-run", flag, "25"]);
            let Command::DryRun(args) = &cli.command else {
                panic!("expected dry-run");
            };
            assert_eq!(args.batch_size, Some(25), "{}", flag);
        }
    }

    #[test]
    fn test_claims_list_is_comma_delimited() {
        let cli = parse(&[
            "dry-run",
            "--claims",
            "6f1c0e7e-1d43-4a8a-9d59-7bb1f7a1a001,6f1c0e7e-1d43-4a8a-9d59-7bb1f7a1a002",
        ]);
        let Command::DryRun(args) = &cli.command else {
            panic!("expected dry-run");
        };
        assert_eq!(args.claims.len(), 2);
        assert!(matches!(args.filter().unwrap(), ClaimFilter::Only(set) if set.len() == 2));
    }

    #[test]
    fn test_apply_requires_proposals() {
        assert!(Cli::try_parse_from(["recon-migrate", "apply"]).is_err());
        let cli = parse(&["apply", "--proposals", "p.csv", "--max-attempts", "4"]);
        let Command::Apply(args) = &cli.command else {
            panic!("expected apply");
        };
        let settings = args.apply_to(MigrationSettings::default());
        assert_eq!(settings.retry.max_attempts(), 4);
        assert_eq!(settings.retry.base_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_rollback_takes_bfile() {
        let cli = parse(&["rollback", "--bfile", "backup_batch_0001.csv", "--concurrency", "3"]);
        let Command::Rollback(args) = &cli.command else {
            panic!("expected rollback");
        };
        assert_eq!(args.backup_file, PathBuf::from("backup_batch_0001.csv"));
        assert_eq!(args.apply_to(MigrationSettings::default()).rollback_concurrency, 3);
    }

    #[test]
    fn test_unknown_policy_value_rejected() {
        assert!(Cli::try_parse_from(["recon-migrate", "dry-run", "--tie-break", "random"]).is_err());
    }
}
