//! CSV files read and written by the pipeline
//!
//! Every file has a header row. Writers emit the header explicitly so that
//! an empty result still produces a well-formed file, and appending to an
//! existing non-empty file never repeats it.
//!
//! # Layout
//!
//! ```text
//! <reports>/proposals/Proposed_Adjustments_<batch>.csv
//! <reports>/backups/backup_<batch>.csv
//! <reports>/exports/Claim_Adjustment_Cap_Stats.csv
//! <proposals dir>/audit-logs/audit-log.csv
//! <backup dir>/rollback-audit/<backup stem>.rollback-audit.csv
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use core_kernel::BatchId;
use domain_reconciliation::{ApplyAuditRow, BackupRow, CapStatistics, Proposal, RollbackAuditRow};

use crate::error::MigrationError;

/// A row type with a fixed column layout
pub trait CsvRow: Serialize + DeserializeOwned {
    const HEADERS: &'static [&'static str];
}

impl CsvRow for Proposal {
    const HEADERS: &'static [&'static str] = &[
        "batchId",
        "claimId",
        "remittanceId",
        "adjustmentId",
        "currentAmount",
        "newAmount",
        "delta",
    ];
}

impl CsvRow for BackupRow {
    const HEADERS: &'static [&'static str] = &["adjustmentId", "claimId", "originalAmount", "parentRemId"];
}

impl CsvRow for ApplyAuditRow {
    const HEADERS: &'static [&'static str] = &[
        "timestamp",
        "batchId",
        "claimId",
        "adjustmentId",
        "originalAmount",
        "newAmount",
        "delta",
        "status",
        "note",
    ];
}

impl CsvRow for RollbackAuditRow {
    const HEADERS: &'static [&'static str] = &[
        "timestamp",
        "backupFile",
        "adjustmentId",
        "original",
        "previous",
        "status",
        "note",
    ];
}

impl CsvRow for CapStatistics {
    const HEADERS: &'static [&'static str] = &[
        "claimId",
        "claimedAmount",
        "receivedAmount",
        "patientResponsibility",
        "pendingAdditionalPayer",
        "responsibilityAmount",
        "currentAdjustment",
        "adjustmentCap",
        "amountToReduce",
        "totalReduced",
        "remainingToReduce",
    ];
}

/// Output locations under the reports directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLayout {
    root: PathBuf,
}

impl ReportLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn proposals_file(&self, batch: &BatchId) -> PathBuf {
        self.root
            .join("proposals")
            .join(format!("Proposed_Adjustments_{}.csv", batch))
    }

    pub fn backup_file(&self, batch: &BatchId) -> PathBuf {
        self.root.join("backups").join(format!("backup_{}.csv", batch))
    }

    pub fn stats_file(&self) -> PathBuf {
        self.root.join("exports").join("Claim_Adjustment_Cap_Stats.csv")
    }
}

/// Apply audit log next to a proposals file
pub fn apply_audit_file(proposals: &Path) -> PathBuf {
    parent_dir(proposals).join("audit-logs").join("audit-log.csv")
}

/// Rollback audit log next to a backup file
pub fn rollback_audit_file(backup: &Path) -> PathBuf {
    let stem = backup
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup".to_string());
    parent_dir(backup)
        .join("rollback-audit")
        .join(format!("{}.rollback-audit.csv", stem))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Writes `rows` to `path`, replacing any existing file
pub fn write_rows<T: CsvRow>(path: &Path, rows: &[T]) -> Result<(), MigrationError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|e| MigrationError::io(path, e))?;
    write_to(path, file, rows, true)
}

/// Appends `rows` to `path`, writing the header only when the file is new
/// or empty
pub fn append_rows<T: CsvRow>(path: &Path, rows: &[T]) -> Result<(), MigrationError> {
    ensure_parent(path)?;
    let needs_header = match fs::metadata(path) {
        Ok(meta) => meta.len() == 0,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => return Err(MigrationError::io(path, e)),
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| MigrationError::io(path, e))?;
    write_to(path, file, rows, needs_header)
}

fn write_to<T: CsvRow>(path: &Path, file: File, rows: &[T], header: bool) -> Result<(), MigrationError> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if header {
        writer
            .write_record(T::HEADERS)
            .map_err(|e| MigrationError::csv(path, e))?;
    }
    for row in rows {
        writer.serialize(row).map_err(|e| MigrationError::csv(path, e))?;
    }
    writer
        .flush()
        .map_err(|e| MigrationError::io(path, e))
}

/// Reads every row of `path`
///
/// A missing file or a malformed row fails the whole read; the error names
/// the line.
pub fn read_rows<T: CsvRow>(path: &Path) -> Result<Vec<T>, MigrationError> {
    if !path.is_file() {
        return Err(MigrationError::input(format!("{} does not exist", path.display())));
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| MigrationError::csv(path, e))?;

    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<T>().enumerate() {
        let row = record.map_err(|e| {
            // header is line 1
            MigrationError::input(format!("{} line {}: {}", path.display(), index + 2, e))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Reads and validates a proposals file
pub fn read_proposals(path: &Path) -> Result<Vec<Proposal>, MigrationError> {
    let proposals: Vec<Proposal> = read_rows(path)?;
    for proposal in &proposals {
        proposal.validate()?;
    }
    Ok(proposals)
}

fn ensure_parent(path: &Path) -> Result<(), MigrationError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| MigrationError::io(parent, e))
        }
        _ => Ok(()),
    }
}
