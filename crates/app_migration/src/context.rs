//! Run context
//!
//! Built once at process start and shared by reference with every run.
//! Holds the store ports and the tunables of the pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use domain_reconciliation::{AdjustmentStore, ClaimSource, EnginePolicy, StatsPolicy};

use crate::error::MigrationError;
use crate::export::ReportLayout;
use crate::retry::RetryPolicy;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_ROLLBACK_CONCURRENCY: usize = 8;
/// Remittance ids per adjustment detail query
pub const ADJUSTMENT_CHUNK_SIZE: usize = 50;

/// Tunables of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSettings {
    pub reports_dir: PathBuf,
    pub batch_size: usize,
    /// Worker limit for dry-run and apply
    pub concurrency: usize,
    pub rollback_concurrency: usize,
    pub retry: RetryPolicy,
    pub engine: EnginePolicy,
    pub stats: StatsPolicy,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports"),
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            rollback_concurrency: DEFAULT_ROLLBACK_CONCURRENCY,
            retry: RetryPolicy::default(),
            engine: EnginePolicy::default(),
            stats: StatsPolicy::default(),
        }
    }
}

impl MigrationSettings {
    pub fn with_reports_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reports_dir = dir.into();
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_rollback_concurrency(mut self, concurrency: usize) -> Self {
        self.rollback_concurrency = concurrency;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_engine(mut self, engine: EnginePolicy) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_stats(mut self, stats: StatsPolicy) -> Self {
        self.stats = stats;
        self
    }

    pub fn layout(&self) -> ReportLayout {
        ReportLayout::new(self.reports_dir.clone())
    }

    pub fn validate(&self) -> Result<(), MigrationError> {
        if self.batch_size == 0 {
            return Err(MigrationError::input("batch size must be at least 1"));
        }
        Ok(())
    }
}

/// Store ports and settings for every command
#[derive(Clone)]
pub struct MigrationContext {
    pub claims: Arc<dyn ClaimSource>,
    pub adjustments: Arc<dyn AdjustmentStore>,
    pub settings: MigrationSettings,
}

impl std::fmt::Debug for MigrationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MigrationContext {
    pub fn new(
        claims: Arc<dyn ClaimSource>,
        adjustments: Arc<dyn AdjustmentStore>,
        settings: MigrationSettings,
    ) -> Result<Self, MigrationError> {
        settings.validate()?;
        Ok(Self {
            claims,
            adjustments,
            settings,
        })
    }
}
