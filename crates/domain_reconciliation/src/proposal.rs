//! Exported proposal and backup rows

use serde::{Deserialize, Serialize};

use core_kernel::{AdjustmentId, Amount, BatchId, ClaimId, RemittanceId};
use crate::engine::ProposedReduction;
use crate::error::ReconciliationError;

/// One row of a proposals file
///
/// Immutable once produced; the apply run reads it back and uses
/// `current_amount` as the expected live value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub batch_id: BatchId,
    pub claim_id: ClaimId,
    pub remittance_id: RemittanceId,
    pub adjustment_id: AdjustmentId,
    pub current_amount: Amount,
    pub new_amount: Amount,
    pub delta: Amount,
}

impl Proposal {
    pub fn from_reduction(batch_id: BatchId, reduction: &ProposedReduction) -> Self {
        Self {
            batch_id,
            claim_id: reduction.claim_id,
            remittance_id: reduction.remittance_id,
            adjustment_id: reduction.adjustment_id,
            current_amount: reduction.current_amount,
            new_amount: reduction.new_amount,
            delta: reduction.delta(),
        }
    }

    /// Checks a row read back from a file
    ///
    /// The new amount must not be negative, the delta must not be positive,
    /// and `delta == new - current` at file precision.
    pub fn validate(&self) -> Result<(), ReconciliationError> {
        let invalid = |message: &str| ReconciliationError::InvalidProposal {
            adjustment_id: self.adjustment_id.as_uuid().to_string(),
            message: message.to_string(),
        };

        if self.new_amount.is_negative() {
            return Err(invalid("new amount is negative"));
        }
        if self.delta.is_positive() {
            return Err(invalid("delta is positive"));
        }
        let expected = (self.new_amount.checked_sub(self.current_amount)?).round_to_file_precision();
        if expected != self.delta.round_to_file_precision() {
            return Err(invalid("delta does not equal new amount minus current amount"));
        }
        Ok(())
    }

    /// Backup row holding the value this proposal would overwrite
    pub fn backup_row(&self) -> BackupRow {
        BackupRow {
            adjustment_id: self.adjustment_id,
            claim_id: self.claim_id,
            original_amount: self.current_amount,
            parent_rem_id: self.remittance_id,
        }
    }
}

/// One row of a backup file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRow {
    pub adjustment_id: AdjustmentId,
    pub claim_id: ClaimId,
    pub original_amount: Amount,
    pub parent_rem_id: RemittanceId,
}
