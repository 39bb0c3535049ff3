//! Reconciliation domain errors

use thiserror::Error;

use core_kernel::MoneyError;

/// Errors that can occur in the reconciliation domain
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("Unknown payer rank code: {0}")]
    UnknownPayerRank(i64),

    #[error("Invalid {entity} record: {message}")]
    Projection { entity: String, message: String },

    #[error("Invalid proposal for adjustment {adjustment_id}: {message}")]
    InvalidProposal { adjustment_id: String, message: String },

    #[error("Amount error: {0}")]
    Money(#[from] MoneyError),
}

impl ReconciliationError {
    pub fn projection(entity: impl Into<String>, message: impl Into<String>) -> Self {
        ReconciliationError::Projection {
            entity: entity.into(),
            message: message.into(),
        }
    }
}
