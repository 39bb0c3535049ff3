//! Backup-driven rollback
//!
//! Every backup row is restored unconditionally; the backup is the ground
//! truth. The live value is read first for the audit trail only, and a
//! failed read does not stop the restore.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use domain_reconciliation::{AdjustmentStore, AuditStatus, BackupRow, RollbackAuditRow};

use crate::context::MigrationContext;
use crate::error::MigrationError;
use crate::export;
use crate::pool::run_bounded;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackSummary {
    pub total: usize,
    pub restored: usize,
    pub failed: usize,
    pub audit_file: PathBuf,
}

/// Restores every original amount in `backup_file`
#[instrument(skip(ctx), fields(file = %backup_file.display()))]
pub async fn rollback(ctx: &MigrationContext, backup_file: &Path) -> Result<RollbackSummary, MigrationError> {
    let rows: Vec<BackupRow> = export::read_rows(backup_file)?;
    let audit_file = export::rollback_audit_file(backup_file);
    let backup_name: Arc<str> = backup_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .into();
    info!(
        rows = rows.len(),
        concurrency = ctx.settings.rollback_concurrency,
        "Starting rollback"
    );

    let store = ctx.adjustments.clone();
    let retry = ctx.settings.retry;
    let task_backup_name = backup_name.clone();
    let mut audit = run_bounded(
        rows,
        ctx.settings.rollback_concurrency,
        move |row| {
            let store = store.clone();
            let backup_name = task_backup_name.clone();
            async move { restore_one(store, retry, &backup_name, row).await }
        },
        move |row, message| RollbackAuditRow {
            timestamp: Utc::now(),
            backup_file: backup_name.to_string(),
            adjustment_id: row.adjustment_id,
            original: row.original_amount,
            previous: None,
            status: AuditStatus::Failed,
            note: format!("worker panicked: {}", message),
        },
    )
    .await?;

    audit.sort_by_key(|row| row.adjustment_id);
    export::write_rows(&audit_file, &audit)?;

    let restored = audit.iter().filter(|r| r.status == AuditStatus::Restored).count();
    let summary = RollbackSummary {
        total: audit.len(),
        restored,
        failed: audit.len() - restored,
        audit_file,
    };
    info!(
        total = summary.total,
        restored = summary.restored,
        failed = summary.failed,
        "Rollback complete"
    );
    Ok(summary)
}

async fn restore_one(
    store: Arc<dyn AdjustmentStore>,
    retry: RetryPolicy,
    backup_name: &str,
    backup: BackupRow,
) -> RollbackAuditRow {
    let id = backup.adjustment_id;
    let original = backup.original_amount;

    let (previous, read_note) = match store.current_amount(id).await {
        Ok(amount) => (Some(amount), None),
        Err(error) => {
            warn!(adjustment_id = %id, error = %error, "Could not read amount before restore");
            (None, Some(format!("previous unreadable: {}", error)))
        }
    };

    let outcome = retry
        .run("restore", || {
            let store = store.clone();
            async move { store.set_amount(id, original).await }
        })
        .await;

    let (status, note) = match outcome {
        Ok(()) => (AuditStatus::Restored, read_note.unwrap_or_default()),
        Err(error) => {
            warn!(adjustment_id = %id, attempts = error.attempts(), error = %error, "Restore failed");
            (AuditStatus::Failed, error.to_string())
        }
    };

    RollbackAuditRow {
        timestamp: Utc::now(),
        backup_file: backup_name.to_string(),
        adjustment_id: id,
        original,
        previous,
        status,
        note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{AdjustmentId, Amount, ClaimId, RemittanceId};
    use domain_reconciliation::{AdjustmentDetail, InjectedFailure, MockReconciliationStore};
    use rust_decimal_macros::dec;

    async fn seeded(live: Amount) -> (Arc<MockReconciliationStore>, BackupRow) {
        let store = Arc::new(MockReconciliationStore::new());
        let detail = AdjustmentDetail {
            id: AdjustmentId::new(),
            remittance_id: RemittanceId::new(),
            amount: live,
            created_at: None,
        };
        store.insert_detail(detail.clone()).await;
        let backup = BackupRow {
            adjustment_id: detail.id,
            claim_id: ClaimId::new(),
            original_amount: Amount::new(dec!(40)),
            parent_rem_id: detail.remittance_id,
        };
        (store, backup)
    }

    #[tokio::test]
    async fn test_restores_regardless_of_live_value() {
        let (store, backup) = seeded(Amount::new(dec!(7.5))).await;
        let row = restore_one(store.clone(), RetryPolicy::default(), "b.csv", backup.clone()).await;
        assert_eq!(row.status, AuditStatus::Restored);
        assert_eq!(row.previous, Some(Amount::new(dec!(7.5))));
        assert_eq!(store.amount_of(backup.adjustment_id).await, Some(Amount::new(dec!(40))));
    }

    #[tokio::test]
    async fn test_unreadable_previous_still_restores() {
        let (store, backup) = seeded(Amount::ZERO).await;
        store
            .fail_reads(backup.adjustment_id, vec![InjectedFailure::Connection])
            .await;
        let row = restore_one(store.clone(), RetryPolicy::default(), "b.csv", backup.clone()).await;
        assert_eq!(row.status, AuditStatus::Restored);
        assert_eq!(row.previous, None);
        assert!(row.note.starts_with("previous unreadable"));
    }

    #[tokio::test]
    async fn test_rejected_restore_fails_after_one_attempt() {
        let (store, backup) = seeded(Amount::ZERO).await;
        store
            .fail_writes(backup.adjustment_id, vec![InjectedFailure::status(400)])
            .await;
        let row = restore_one(store.clone(), RetryPolicy::default(), "b.csv", backup).await;
        assert_eq!(row.status, AuditStatus::Failed);
        assert_eq!(store.writes().await.len(), 1);
    }
}
