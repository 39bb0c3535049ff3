//! Verified apply of a proposals file
//!
//! Each proposal is checked against the live amount before anything is
//! written:
//!
//! | live amount              | action                 | status    |
//! |--------------------------|------------------------|-----------|
//! | equals `currentAmount`   | write via retry policy | `patched` or `failed` |
//! | differs                  | none                   | `skipped` |
//! | unreadable               | none                   | `failed`  |
//!
//! Audit rows are appended to `audit-logs/audit-log.csv` beside the
//! proposals file once every proposal has settled.

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use domain_reconciliation::{AdjustmentStore, ApplyAuditRow, AuditStatus, Proposal};

use crate::context::MigrationContext;
use crate::error::MigrationError;
use crate::export;
use crate::pool::run_bounded;
use crate::retry::RetryPolicy;

/// Counts of one apply run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplySummary {
    pub total: usize,
    pub patched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub audit_file: PathBuf,
}

/// Applies every proposal in `proposals_file`
///
/// Fails only on input problems; per-proposal outcomes go to the audit file.
#[instrument(skip(ctx), fields(file = %proposals_file.display()))]
pub async fn apply_proposals(ctx: &MigrationContext, proposals_file: &Path) -> Result<ApplySummary, MigrationError> {
    let proposals = export::read_proposals(proposals_file)?;
    let audit_file = export::apply_audit_file(proposals_file);
    info!(
        proposals = proposals.len(),
        concurrency = ctx.settings.concurrency,
        "Starting apply"
    );

    let store = ctx.adjustments.clone();
    let retry = ctx.settings.retry;
    let mut rows = run_bounded(
        proposals,
        ctx.settings.concurrency,
        move |proposal| {
            let store = store.clone();
            async move { apply_one(store, retry, proposal).await }
        },
        |proposal, message| {
            audit_row(&proposal, AuditStatus::Failed, format!("worker panicked: {}", message))
        },
    )
    .await?;

    rows.sort_by_key(|row| row.adjustment_id);
    export::append_rows(&audit_file, &rows)?;

    let count = |status: AuditStatus| rows.iter().filter(|r| r.status == status).count();
    let summary = ApplySummary {
        total: rows.len(),
        patched: count(AuditStatus::Patched),
        skipped: count(AuditStatus::Skipped),
        failed: count(AuditStatus::Failed),
        audit_file,
    };
    info!(
        total = summary.total,
        patched = summary.patched,
        skipped = summary.skipped,
        failed = summary.failed,
        "Apply complete"
    );
    Ok(summary)
}

fn audit_row(proposal: &Proposal, status: AuditStatus, note: String) -> ApplyAuditRow {
    ApplyAuditRow {
        timestamp: Utc::now(),
        batch_id: proposal.batch_id.clone(),
        claim_id: proposal.claim_id,
        adjustment_id: proposal.adjustment_id,
        original_amount: proposal.current_amount,
        new_amount: proposal.new_amount,
        delta: proposal.delta,
        status,
        note,
    }
}

async fn apply_one(store: Arc<dyn AdjustmentStore>, retry: RetryPolicy, proposal: Proposal) -> ApplyAuditRow {
    let id = proposal.adjustment_id;
    let row = |status: AuditStatus, note: String| audit_row(&proposal, status, note);

    let live = match store.current_amount(id).await {
        Ok(amount) => amount,
        Err(error) => {
            warn!(adjustment_id = %id, error = %error, "Could not read live amount");
            return row(AuditStatus::Failed, format!("read failed: {}", error));
        }
    };

    if live != proposal.current_amount {
        warn!(
            adjustment_id = %id,
            expected = %proposal.current_amount,
            live = %live,
            "Live amount changed since the dry run"
        );
        return ApplyAuditRow {
            original_amount: live,
            delta: proposal.new_amount - live,
            ..row(AuditStatus::Skipped, "current mismatch".to_string())
        };
    }

    let new_amount = proposal.new_amount;
    match retry
        .run("patch", || {
            let store = store.clone();
            async move { store.set_amount(id, new_amount).await }
        })
        .await
    {
        Ok(()) => row(AuditStatus::Patched, String::new()),
        Err(error) => {
            warn!(adjustment_id = %id, attempts = error.attempts(), error = %error, "Patch failed");
            row(AuditStatus::Failed, error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::{AdjustmentId, Amount, BatchId, ClaimId, DomainPort, PortError, RemittanceId};
    use domain_reconciliation::{AdjustmentDetail, InjectedFailure, MockReconciliationStore};
    use rust_decimal_macros::dec;

    async fn store_with(amount: Amount) -> (Arc<MockReconciliationStore>, Proposal) {
        let store = Arc::new(MockReconciliationStore::new());
        let detail = AdjustmentDetail {
            id: AdjustmentId::new(),
            remittance_id: RemittanceId::new(),
            amount,
            created_at: None,
        };
        store.insert_detail(detail.clone()).await;
        let proposal = Proposal {
            batch_id: BatchId::from_index(1),
            claim_id: ClaimId::new(),
            remittance_id: detail.remittance_id,
            adjustment_id: detail.id,
            current_amount: Amount::new(dec!(30)),
            new_amount: Amount::new(dec!(20)),
            delta: Amount::new(dec!(-10)),
        };
        (store, proposal)
    }

    #[tokio::test]
    async fn test_matching_amount_is_patched() {
        let (store, proposal) = store_with(Amount::new(dec!(30))).await;
        let row = apply_one(store.clone(), RetryPolicy::default(), proposal.clone()).await;
        assert_eq!(row.status, AuditStatus::Patched);
        assert_eq!(store.amount_of(proposal.adjustment_id).await, Some(Amount::new(dec!(20))));
    }

    #[tokio::test]
    async fn test_mismatch_records_live_amount() {
        let (store, proposal) = store_with(Amount::new(dec!(30.01))).await;
        let row = apply_one(store.clone(), RetryPolicy::default(), proposal.clone()).await;
        assert_eq!(row.status, AuditStatus::Skipped);
        assert_eq!(row.note, "current mismatch");
        assert_eq!(row.original_amount, Amount::new(dec!(30.01)));
        assert_eq!(row.delta, Amount::new(dec!(-10.01)));
        assert!(store.writes().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_amount_fails_without_write() {
        let (store, proposal) = store_with(Amount::new(dec!(30))).await;
        store
            .fail_reads(proposal.adjustment_id, vec![InjectedFailure::status(500)])
            .await;
        let row = apply_one(store.clone(), RetryPolicy::default(), proposal).await;
        assert_eq!(row.status, AuditStatus::Failed);
        assert!(row.note.starts_with("read failed"));
        assert!(store.writes().await.is_empty());
    }

    /// Delegates to the mock but panics when writing one chosen adjustment
    struct PanicOnWrite {
        inner: Arc<MockReconciliationStore>,
        poisoned: AdjustmentId,
    }

    impl DomainPort for PanicOnWrite {}

    #[async_trait::async_trait]
    impl AdjustmentStore for PanicOnWrite {
        async fn current_amount(&self, id: AdjustmentId) -> Result<Amount, PortError> {
            self.inner.current_amount(id).await
        }

        async fn set_amount(&self, id: AdjustmentId, amount: Amount) -> Result<(), PortError> {
            if id == self.poisoned {
                panic!("write handler crashed");
            }
            self.inner.set_amount(id, amount).await
        }
    }

    #[tokio::test]
    async fn test_panicking_write_is_audited_with_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let (store, first) = store_with(Amount::new(dec!(30))).await;
        let (_, mut second) = store_with(Amount::new(dec!(30))).await;
        second.remittance_id = first.remittance_id;
        store
            .insert_detail(AdjustmentDetail {
                id: second.adjustment_id,
                remittance_id: first.remittance_id,
                amount: Amount::new(dec!(30)),
                created_at: None,
            })
            .await;

        let proposals_file = dir.path().join("Proposed_Adjustments_batch_0001.csv");
        export::write_rows(&proposals_file, &[first.clone(), second.clone()]).unwrap();

        let adjustments = Arc::new(PanicOnWrite {
            inner: store.clone(),
            poisoned: second.adjustment_id,
        });
        let ctx = MigrationContext::new(store.clone(), adjustments, Default::default()).unwrap();
        let summary = apply_proposals(&ctx, &proposals_file).await.unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.patched, 1);
        assert_eq!(summary.failed, 1);

        let rows: Vec<ApplyAuditRow> = export::read_rows(&summary.audit_file).unwrap();
        let crashed = rows.iter().find(|r| r.adjustment_id == second.adjustment_id).unwrap();
        assert_eq!(crashed.status, AuditStatus::Failed);
        assert!(crashed.note.starts_with("worker panicked"), "{}", crashed.note);
        assert_eq!(store.amount_of(first.adjustment_id).await, Some(Amount::new(dec!(20))));
    }
}
