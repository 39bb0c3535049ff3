//! Dry-run orchestration
//!
//! Lists claims, filters and sorts them, cuts them into fixed-size batches
//! and reconciles each batch on the worker pool. Every batch is fully
//! collected before its proposals and backup rows are written; the
//! statistics file is written once at the end.
//!
//! ```text
//! list_claims -> filter -> sort -> batches
//!   batch: [claim -> remittances -> details (chunks of 50) -> engine] x N
//!          join -> Proposed_Adjustments_<batch>.csv + backup_<batch>.csv
//! end: Claim_Adjustment_Cap_Stats.csv
//! ```

use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

use core_kernel::{BatchId, ClaimId, PortError};
use domain_reconciliation::{
    AdjustmentDetail, CapStatistics, Claim, ClaimReconciliation, ClaimSource, ExcessSource, Proposal,
    ReconciliationEngine, Remittance,
};

use crate::context::{MigrationContext, ADJUSTMENT_CHUNK_SIZE};
use crate::error::MigrationError;
use crate::export;
use crate::filter::ClaimFilter;
use crate::pool::run_bounded;

/// What a dry run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DryRunReport {
    pub claims_selected: usize,
    pub batches: usize,
    pub proposals: usize,
    pub claims_with_statistics: usize,
    /// Claims skipped because a remote read failed
    pub failed_claims: Vec<ClaimId>,
    pub proposal_files: Vec<PathBuf>,
    pub backup_files: Vec<PathBuf>,
    pub stats_file: PathBuf,
}

enum ClaimOutcome {
    Reconciled(ClaimReconciliation),
    Failed { claim_id: ClaimId, error: String },
}

/// Runs a dry run over the selected claims
#[instrument(skip(ctx, filter))]
pub async fn dry_run(ctx: &MigrationContext, filter: &ClaimFilter) -> Result<DryRunReport, MigrationError> {
    let settings = &ctx.settings;
    settings.validate()?;
    let layout = settings.layout();
    let engine = ReconciliationEngine::new(settings.engine);

    let listed = ctx.claims.list_claims().await?;
    let listed_count = listed.len();
    let claims = filter.select(listed);
    info!(
        listed = listed_count,
        selected = claims.len(),
        batch_size = settings.batch_size,
        concurrency = settings.concurrency,
        "Starting dry run"
    );

    let mut report = DryRunReport {
        claims_selected: claims.len(),
        stats_file: layout.stats_file(),
        ..Default::default()
    };
    let mut statistics: Vec<CapStatistics> = Vec::new();

    for (index, batch) in claims.chunks(settings.batch_size).enumerate() {
        let batch_id = BatchId::from_index(index + 1);
        let source = ctx.claims.clone();
        let outcomes = run_bounded(
            batch.to_vec(),
            settings.concurrency,
            move |claim| {
                let source = source.clone();
                async move { reconcile_claim(source.as_ref(), &engine, claim).await }
            },
            |claim, message| ClaimOutcome::Failed {
                claim_id: claim.id,
                error: format!("worker panicked: {}", message),
            },
        )
        .await?;

        let mut reconciled = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome {
                ClaimOutcome::Reconciled(result) => reconciled.push(result),
                ClaimOutcome::Failed { claim_id, error } => {
                    warn!(batch = %batch_id, claim_id = %claim_id, error = %error, "Claim skipped after failure");
                    report.failed_claims.push(claim_id);
                }
            }
        }
        reconciled.sort_by_key(|r| r.claim_id);

        statistics.extend(
            reconciled
                .iter()
                .filter(|r| settings.stats.records(r.in_violation))
                .map(|r| r.statistics.clone()),
        );

        let proposals: Vec<Proposal> = reconciled
            .iter()
            .flat_map(|r| r.reductions.iter())
            .map(|reduction| Proposal::from_reduction(batch_id.clone(), reduction))
            .collect();

        // header-only files for a batch without proposals keep numbering contiguous
        let proposals_file = layout.proposals_file(&batch_id);
        let backup_file = layout.backup_file(&batch_id);
        let backups: Vec<_> = proposals.iter().map(Proposal::backup_row).collect();
        export::write_rows(&proposals_file, &proposals)?;
        export::write_rows(&backup_file, &backups)?;
        report.proposal_files.push(proposals_file);
        report.backup_files.push(backup_file);

        info!(
            batch = %batch_id,
            claims = batch.len(),
            proposals = proposals.len(),
            "Batch complete"
        );
        report.batches += 1;
        report.proposals += proposals.len();
    }

    statistics.sort_by_key(|s| s.claim_id);
    export::write_rows(&report.stats_file, &statistics)?;
    report.claims_with_statistics = statistics.len();
    report.failed_claims.sort();

    info!(
        batches = report.batches,
        proposals = report.proposals,
        statistics = report.claims_with_statistics,
        failed = report.failed_claims.len(),
        "Dry run complete"
    );
    Ok(report)
}

async fn reconcile_claim(source: &dyn ClaimSource, engine: &ReconciliationEngine, claim: Claim) -> ClaimOutcome {
    // the claim-level excess is known without any fetch
    if engine.policy().excess_source == ExcessSource::ClaimFields && !claim.is_in_violation() {
        debug!(claim_id = %claim.id, "Claim within cap");
        return ClaimOutcome::Reconciled(engine.reconcile(&claim, &[], &[]));
    }

    match fetch_claim_records(source, claim.id).await {
        Ok((remittances, details)) => {
            ClaimOutcome::Reconciled(engine.reconcile(&claim, &remittances, &details))
        }
        Err(error) => ClaimOutcome::Failed {
            claim_id: claim.id,
            error: error.to_string(),
        },
    }
}

async fn fetch_claim_records(
    source: &dyn ClaimSource,
    claim_id: ClaimId,
) -> Result<(Vec<Remittance>, Vec<AdjustmentDetail>), PortError> {
    let remittances = source.remittances_for_claim(claim_id).await?;
    let ids: Vec<_> = remittances.iter().map(|r| r.id).collect();

    let mut details = Vec::new();
    for chunk in ids.chunks(ADJUSTMENT_CHUNK_SIZE) {
        details.extend(source.adjustments_for_remittances(chunk).await?);
    }
    debug!(
        claim_id = %claim_id,
        remittances = remittances.len(),
        details = details.len(),
        "Fetched claim records"
    );
    Ok((remittances, details))
}
