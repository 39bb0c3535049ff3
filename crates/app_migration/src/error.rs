//! Migration pipeline errors
//!
//! Only setup and input failures surface as `MigrationError`. Per-row remote
//! failures during apply and rollback end up in the audit file instead.

use std::path::{Path, PathBuf};
use thiserror::Error;

use core_kernel::PortError;
use domain_reconciliation::ReconciliationError;

/// Errors that abort a whole run
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Missing or malformed input
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A remote failure outside per-row processing, e.g. listing claims
    #[error("Remote store error: {0}")]
    Remote(#[from] PortError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MigrationError {
    pub fn input(message: impl Into<String>) -> Self {
        MigrationError::Input(message.into())
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        MigrationError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn csv(path: impl AsRef<Path>, source: csv::Error) -> Self {
        MigrationError::Csv {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        MigrationError::Internal(message.into())
    }
}
