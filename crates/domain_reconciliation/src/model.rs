//! Entities read from the record store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{AdjustmentId, Amount, ClaimId, RemittanceId};
use crate::error::ReconciliationError;

/// Position of a payer in the coordination-of-benefits order
///
/// Ordering follows payer priority: `Primary < Secondary < Tertiary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PayerRank {
    Primary,
    Secondary,
    Tertiary,
}

impl PayerRank {
    pub const PRIMARY_CODE: i64 = 622_490_000;
    pub const SECONDARY_CODE: i64 = 622_490_001;
    pub const TERTIARY_CODE: i64 = 622_490_002;

    /// Option-set value used by the store
    pub fn code(&self) -> i64 {
        match self {
            PayerRank::Primary => Self::PRIMARY_CODE,
            PayerRank::Secondary => Self::SECONDARY_CODE,
            PayerRank::Tertiary => Self::TERTIARY_CODE,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, ReconciliationError> {
        match code {
            Self::PRIMARY_CODE => Ok(PayerRank::Primary),
            Self::SECONDARY_CODE => Ok(PayerRank::Secondary),
            Self::TERTIARY_CODE => Ok(PayerRank::Tertiary),
            other => Err(ReconciliationError::UnknownPayerRank(other)),
        }
    }

    /// Only adjustments posted by secondary and tertiary payers may be reduced
    pub fn is_reducible(&self) -> bool {
        !matches!(self, PayerRank::Primary)
    }

    pub fn label(&self) -> &'static str {
        match self {
            PayerRank::Primary => "primary",
            PayerRank::Secondary => "secondary",
            PayerRank::Tertiary => "tertiary",
        }
    }
}

/// A claim with the amounts that define its adjustment cap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub claimed_amount: Amount,
    pub received_amount: Amount,
    pub patient_responsibility: Amount,
    pub pending_additional_payer: Amount,
    /// Current total adjustment recorded on the claim
    pub current_adjustment: Amount,
}

impl Claim {
    /// Creates a claim with all amounts zero
    pub fn new(id: ClaimId) -> Self {
        Self {
            id,
            claimed_amount: Amount::ZERO,
            received_amount: Amount::ZERO,
            patient_responsibility: Amount::ZERO,
            pending_additional_payer: Amount::ZERO,
            current_adjustment: Amount::ZERO,
        }
    }

    /// `max(pendingAdditionalPayer, patientResponsibility)`
    pub fn responsibility_amount(&self) -> Amount {
        self.pending_additional_payer.max(self.patient_responsibility)
    }

    pub fn adjustment_cap(&self) -> Amount {
        self.claimed_amount - self.received_amount - self.responsibility_amount()
    }

    /// Amount by which the current adjustment exceeds the cap, never negative
    pub fn excess(&self) -> Amount {
        (self.current_adjustment - self.adjustment_cap()).clamp_non_negative()
    }

    pub fn is_in_violation(&self) -> bool {
        self.current_adjustment > self.adjustment_cap()
    }
}

/// A payer remittance posted against a claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remittance {
    pub id: RemittanceId,
    pub claim_id: ClaimId,
    pub rank: PayerRank,
    pub processed_at: Option<DateTime<Utc>>,
    pub patient_responsibility: Amount,
    pub pending_additional_payer: Amount,
}

impl Remittance {
    /// Pending value this remittance contributes to the next rank's cap
    pub fn pending_value(&self) -> Amount {
        self.pending_additional_payer.max(self.patient_responsibility)
    }
}

/// One adjustment line under a remittance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentDetail {
    pub id: AdjustmentId,
    pub remittance_id: RemittanceId,
    pub amount: Amount,
    pub created_at: Option<DateTime<Utc>>,
}
