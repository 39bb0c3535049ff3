//! Migration Pipeline
//!
//! The three commands of the reconciliation tool, over the domain ports:
//!
//! - **Dry run** (`orchestrator`): batches claims through the engine on a
//!   bounded worker pool and writes proposals, backups and statistics
//! - **Apply** (`apply`): verify-before-write of every proposal, with retry
//!   and an append-only audit log
//! - **Rollback** (`rollback`): restores backup values with the same retry
//!   and audit discipline
//!
//! # Example
//!
//! ```rust,ignore
//! use app_migration::{dry_run, ClaimFilter, MigrationContext, MigrationSettings};
//!
//! let ctx = MigrationContext::new(claims, adjustments, MigrationSettings::default())?;
//! let report = dry_run(&ctx, &ClaimFilter::All).await?;
//! ```

pub mod context;
pub mod error;
pub mod retry;
pub mod pool;
pub mod filter;
pub mod export;
pub mod orchestrator;
pub mod apply;
pub mod rollback;

pub use context::{MigrationContext, MigrationSettings};
pub use error::MigrationError;
pub use retry::{RetryError, RetryPolicy};
pub use filter::ClaimFilter;
pub use export::ReportLayout;
pub use orchestrator::{dry_run, DryRunReport};
pub use apply::{apply_proposals, ApplySummary};
pub use rollback::{rollback, RollbackSummary};
