//! Claim selection for a dry run

use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

use core_kernel::ClaimId;
use domain_reconciliation::Claim;

use crate::error::MigrationError;

/// Which claims a dry run processes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClaimFilter {
    #[default]
    All,
    Only(BTreeSet<ClaimId>),
}

impl ClaimFilter {
    /// Builds the filter from the command-line inputs
    ///
    /// An explicit id list wins over an id file.
    pub fn from_inputs(ids: &[String], file: Option<&Path>) -> Result<Self, MigrationError> {
        if !ids.is_empty() {
            return Self::from_ids(ids.iter().map(String::as_str));
        }
        match file {
            Some(path) => Self::from_file(path),
            None => Ok(ClaimFilter::All),
        }
    }

    /// Parses ids; each entry may itself be a comma-separated list
    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Result<Self, MigrationError> {
        let mut set = BTreeSet::new();
        for raw in ids.into_iter().flat_map(|entry| entry.split(',')) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            set.insert(parse_claim_id(raw)?);
        }
        Ok(ClaimFilter::Only(set))
    }

    /// Reads an id file: one claim per line, id in the first comma field
    ///
    /// Lines whose first field is not a claim id (a header row, notes) are
    /// skipped with a warning, so an exported statistics file can be fed
    /// back in as is.
    pub fn from_file(path: &Path) -> Result<Self, MigrationError> {
        let text = std::fs::read_to_string(path).map_err(|e| MigrationError::io(path, e))?;
        let mut set = BTreeSet::new();
        for (index, line) in text.lines().enumerate() {
            let first = line.split(',').next().unwrap_or_default().trim();
            if first.is_empty() {
                continue;
            }
            match first.parse::<ClaimId>() {
                Ok(id) => {
                    set.insert(id);
                }
                Err(error) => {
                    warn!(
                        file = %path.display(),
                        line = index + 1,
                        value = first,
                        error = %error,
                        "Skipping line without a claim id"
                    );
                }
            }
        }
        Ok(ClaimFilter::Only(set))
    }

    pub fn matches(&self, id: &ClaimId) -> bool {
        match self {
            ClaimFilter::All => true,
            ClaimFilter::Only(set) => set.contains(id),
        }
    }

    /// Keeps the matching claims and sorts them by id
    pub fn select(&self, claims: Vec<Claim>) -> Vec<Claim> {
        let mut selected: Vec<Claim> = claims.into_iter().filter(|c| self.matches(&c.id)).collect();
        selected.sort_by_key(|c| c.id);
        selected
    }
}

fn parse_claim_id(raw: &str) -> Result<ClaimId, MigrationError> {
    raw.parse::<ClaimId>()
        .map_err(|e| MigrationError::input(format!("'{}' is not a claim id: {}", raw, e)))
}
