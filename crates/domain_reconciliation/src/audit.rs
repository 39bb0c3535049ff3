//! Audit trail rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{AdjustmentId, Amount, BatchId, ClaimId};

/// Outcome recorded for one adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Patched,
    Skipped,
    Failed,
    Restored,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Patched => "patched",
            AuditStatus::Skipped => "skipped",
            AuditStatus::Failed => "failed",
            AuditStatus::Restored => "restored",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the apply audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyAuditRow {
    pub timestamp: DateTime<Utc>,
    pub batch_id: BatchId,
    pub claim_id: ClaimId,
    pub adjustment_id: AdjustmentId,
    pub original_amount: Amount,
    pub new_amount: Amount,
    pub delta: Amount,
    pub status: AuditStatus,
    pub note: String,
}

/// One row of a rollback audit log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackAuditRow {
    pub timestamp: DateTime<Utc>,
    /// File name of the backup being restored
    pub backup_file: String,
    pub adjustment_id: AdjustmentId,
    pub original: Amount,
    /// Live value before the restore; empty when it could not be read
    pub previous: Option<Amount>,
    pub status: AuditStatus,
    pub note: String,
}
