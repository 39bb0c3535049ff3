//! Store adapter error types
//!
//! Failures local to the adapter (configuration, token acquisition, row
//! projection). Remote request failures are reported directly as
//! `PortError`; these convert into `PortError` at the port boundary.

use thiserror::Error;

use core_kernel::PortError;
use domain_reconciliation::ReconciliationError;

/// Errors raised inside the store adapter
#[derive(Debug, Error)]
pub enum StoreError {
    /// The adapter configuration is unusable
    #[error("Invalid store configuration: {0}")]
    Configuration(String),

    /// An access token could not be obtained
    #[error("Token acquisition failed: {0}")]
    TokenAcquisition(String),

    /// A row could not be mapped into a typed entity
    #[error("Projection failed: {0}")]
    Projection(#[from] ReconciliationError),

    /// The HTTP client could not be built or used
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl StoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        StoreError::Configuration(message.into())
    }

    pub fn token(message: impl Into<String>) -> Self {
        StoreError::TokenAcquisition(message.into())
    }
}

impl From<StoreError> for PortError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Configuration(message) => PortError::Validation {
                message,
                field: None,
            },
            StoreError::TokenAcquisition(message) => PortError::Unauthorized { message },
            StoreError::Projection(err) => PortError::transformation(err.to_string()),
            StoreError::Http(err) => PortError::Connection {
                message: err.to_string(),
                source: Some(Box::new(err)),
            },
        }
    }
}
