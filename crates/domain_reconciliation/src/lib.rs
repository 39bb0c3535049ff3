//! Adjustment Cap Reconciliation Domain
//!
//! This crate holds the entities read from the record store and the pure
//! engine that turns them into reduction proposals.
//!
//! # Cap Formula
//!
//! ```text
//! adjustmentCap = claimed - received - max(pendingAdditionalPayer, patientResponsibility)
//! excess        = max(currentAdjustment - adjustmentCap, 0)
//! ```
//!
//! A claim is in violation when its current adjustment exceeds the cap. The
//! engine removes the excess from secondary and tertiary adjustment details,
//! tertiary first, largest amount first.

pub mod model;
pub mod policy;
pub mod engine;
pub mod proposal;
pub mod audit;
pub mod ports;
pub mod error;

pub use model::{AdjustmentDetail, Claim, PayerRank, Remittance};
pub use policy::{EnginePolicy, ExcessSource, StatsPolicy, TieBreak};
pub use engine::{CapStatistics, ClaimReconciliation, ProposedReduction, RankTotals, ReconciliationEngine};
pub use proposal::{BackupRow, Proposal};
pub use audit::{ApplyAuditRow, AuditStatus, RollbackAuditRow};
pub use ports::{AdjustmentStore, ClaimSource};
pub use error::ReconciliationError;

#[cfg(any(test, feature = "mock"))]
pub use ports::mock::{InjectedFailure, MockReconciliationStore};
