//! Cap reconciliation engine
//!
//! Pure computation: given one claim, its remittances and their adjustment
//! details, decide which adjustment amounts to reduce and by how much.
//!
//! # Reduction Order
//!
//! ```text
//! rank (tertiary, then secondary)
//!   -> amount (largest first)
//!     -> creation timestamp (per TieBreak; missing sorts earliest)
//!       -> remittance processed date (latest first)
//!         -> adjustment id
//! ```
//!
//! Each visited detail gives up `min(amount, remainingExcess)` until the
//! excess is gone or the details run out.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use core_kernel::{AdjustmentId, Amount, ClaimId, RemittanceId};
use crate::model::{AdjustmentDetail, Claim, PayerRank, Remittance};
use crate::policy::{EnginePolicy, ExcessSource, TieBreak};

/// A single proposed reduction of one adjustment detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedReduction {
    pub claim_id: ClaimId,
    pub remittance_id: RemittanceId,
    pub adjustment_id: AdjustmentId,
    pub rank: PayerRank,
    pub current_amount: Amount,
    pub new_amount: Amount,
}

impl ProposedReduction {
    /// `new - current`, never positive
    pub fn delta(&self) -> Amount {
        self.new_amount - self.current_amount
    }

    pub fn reduction(&self) -> Amount {
        self.current_amount - self.new_amount
    }
}

/// Per-claim cap figures as exported to the statistics file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapStatistics {
    pub claim_id: ClaimId,
    pub claimed_amount: Amount,
    pub received_amount: Amount,
    pub patient_responsibility: Amount,
    pub pending_additional_payer: Amount,
    pub responsibility_amount: Amount,
    pub current_adjustment: Amount,
    pub adjustment_cap: Amount,
    pub amount_to_reduce: Amount,
    pub total_reduced: Amount,
    pub remaining_to_reduce: Amount,
}

/// Adjustment totals per payer rank against the lower rank's pending cap
///
/// Computed for every claim regardless of whether any reduction is proposed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankTotals {
    pub pending_cap_from_primary: Amount,
    pub total_secondary_adjustments: Amount,
    pub secondary_excess: Amount,
    pub pending_cap_from_secondary: Amount,
    pub total_tertiary_adjustments: Amount,
    pub tertiary_excess: Amount,
    pub remittance_count: usize,
    pub adjustment_count: usize,
}

impl RankTotals {
    /// Raw excess for a reducible rank; may be negative
    pub fn excess_for(&self, rank: PayerRank) -> Amount {
        match rank {
            PayerRank::Primary => Amount::ZERO,
            PayerRank::Secondary => self.secondary_excess,
            PayerRank::Tertiary => self.tertiary_excess,
        }
    }
}

/// Engine output for one claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReconciliation {
    pub claim_id: ClaimId,
    pub in_violation: bool,
    pub statistics: CapStatistics,
    pub rank_totals: RankTotals,
    /// Reductions in engine order
    pub reductions: Vec<ProposedReduction>,
}

impl ClaimReconciliation {
    pub fn has_reductions(&self) -> bool {
        !self.reductions.is_empty()
    }

    /// Sum of all deltas, never positive
    pub fn total_delta(&self) -> Amount {
        self.reductions.iter().map(ProposedReduction::delta).sum()
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    detail: &'a AdjustmentDetail,
    rank: PayerRank,
    processed_at: Option<DateTime<Utc>>,
}

/// The reconciliation engine
///
/// Stateless apart from its policy; one instance can be shared by every
/// worker task.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationEngine {
    policy: EnginePolicy,
}

impl ReconciliationEngine {
    pub fn new(policy: EnginePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> EnginePolicy {
        self.policy
    }

    /// Reconciles one claim
    ///
    /// Remittances owned by another claim, and details whose remittance is
    /// not among the claim's remittances, are ignored.
    pub fn reconcile(
        &self,
        claim: &Claim,
        remittances: &[Remittance],
        details: &[AdjustmentDetail],
    ) -> ClaimReconciliation {
        let owned: HashMap<RemittanceId, &Remittance> = remittances
            .iter()
            .filter(|r| r.claim_id == claim.id)
            .map(|r| (r.id, r))
            .collect();

        let linked: Vec<(&AdjustmentDetail, &Remittance)> = details
            .iter()
            .filter_map(|d| owned.get(&d.remittance_id).map(|r| (d, *r)))
            .collect();

        let rank_totals = Self::rank_totals(owned.values().copied(), &linked);
        let in_violation = claim.is_in_violation();

        let mut candidates: Vec<Candidate<'_>> = linked
            .iter()
            .filter(|(d, r)| r.rank.is_reducible() && d.amount.is_positive())
            .map(|(d, r)| Candidate {
                detail: d,
                rank: r.rank,
                processed_at: r.processed_at,
            })
            .collect();
        candidates.sort_by(|a, b| self.compare(a, b));

        let mut reductions = Vec::new();
        let (amount_to_reduce, remaining) = if !in_violation {
            (Amount::ZERO, Amount::ZERO)
        } else {
            match self.policy.excess_source {
                ExcessSource::ClaimFields => {
                    let excess = claim.excess();
                    let remaining = reduce(claim.id, excess, &candidates, &mut reductions);
                    (excess, remaining)
                }
                ExcessSource::RemittancePendingCaps => {
                    let mut to_reduce = Amount::ZERO;
                    let mut remaining = Amount::ZERO;
                    for rank in [PayerRank::Tertiary, PayerRank::Secondary] {
                        let excess = rank_totals.excess_for(rank).clamp_non_negative();
                        if !excess.is_positive() {
                            continue;
                        }
                        let group: Vec<Candidate<'_>> =
                            candidates.iter().copied().filter(|c| c.rank == rank).collect();
                        to_reduce = to_reduce + excess;
                        remaining = remaining + reduce(claim.id, excess, &group, &mut reductions);
                    }
                    (to_reduce, remaining)
                }
            }
        };

        let total_reduced: Amount = reductions.iter().map(ProposedReduction::reduction).sum();

        debug!(
            claim_id = %claim.id,
            in_violation,
            amount_to_reduce = %amount_to_reduce,
            total_reduced = %total_reduced,
            reductions = reductions.len(),
            "Claim reconciled"
        );

        ClaimReconciliation {
            claim_id: claim.id,
            in_violation,
            statistics: CapStatistics {
                claim_id: claim.id,
                claimed_amount: claim.claimed_amount,
                received_amount: claim.received_amount,
                patient_responsibility: claim.patient_responsibility,
                pending_additional_payer: claim.pending_additional_payer,
                responsibility_amount: claim.responsibility_amount(),
                current_adjustment: claim.current_adjustment,
                adjustment_cap: claim.adjustment_cap(),
                amount_to_reduce,
                total_reduced,
                remaining_to_reduce: remaining,
            },
            rank_totals,
            reductions,
        }
    }

    fn rank_totals<'a>(
        remittances: impl Iterator<Item = &'a Remittance>,
        linked: &[(&AdjustmentDetail, &Remittance)],
    ) -> RankTotals {
        let mut totals = RankTotals::default();

        for remittance in remittances {
            totals.remittance_count += 1;
            match remittance.rank {
                PayerRank::Primary => {
                    totals.pending_cap_from_primary =
                        totals.pending_cap_from_primary + remittance.pending_value();
                }
                PayerRank::Secondary => {
                    totals.pending_cap_from_secondary =
                        totals.pending_cap_from_secondary + remittance.pending_value();
                }
                PayerRank::Tertiary => {}
            }
        }

        for (detail, remittance) in linked {
            totals.adjustment_count += 1;
            match remittance.rank {
                PayerRank::Secondary => {
                    totals.total_secondary_adjustments =
                        totals.total_secondary_adjustments + detail.amount;
                }
                PayerRank::Tertiary => {
                    totals.total_tertiary_adjustments =
                        totals.total_tertiary_adjustments + detail.amount;
                }
                PayerRank::Primary => {}
            }
        }

        totals.secondary_excess = totals.total_secondary_adjustments - totals.pending_cap_from_primary;
        totals.tertiary_excess = totals.total_tertiary_adjustments - totals.pending_cap_from_secondary;
        totals
    }

    fn compare(&self, a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
        b.rank
            .cmp(&a.rank)
            .then_with(|| b.detail.amount.cmp(&a.detail.amount))
            .then_with(|| match self.policy.tie_break {
                TieBreak::EarliestFirst => a.detail.created_at.cmp(&b.detail.created_at),
                TieBreak::LatestFirst => b.detail.created_at.cmp(&a.detail.created_at),
            })
            .then_with(|| b.processed_at.cmp(&a.processed_at))
            .then_with(|| a.detail.id.cmp(&b.detail.id))
    }
}

/// Consumes `excess` from the candidates in order; returns what is left
fn reduce(
    claim_id: ClaimId,
    excess: Amount,
    candidates: &[Candidate<'_>],
    out: &mut Vec<ProposedReduction>,
) -> Amount {
    let mut remaining = excess;
    for candidate in candidates {
        if !remaining.is_positive() {
            break;
        }
        let current = candidate.detail.amount;
        let reduction = current.min(remaining);
        out.push(ProposedReduction {
            claim_id,
            remittance_id: candidate.detail.remittance_id,
            adjustment_id: candidate.detail.id,
            rank: candidate.rank,
            current_amount: current,
            new_amount: current - reduction,
        });
        remaining = remaining - reduction;
    }
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn amount(value: rust_decimal::Decimal) -> Amount {
        Amount::new(value)
    }

    fn remittance(claim: &Claim, rank: PayerRank, pending: Amount) -> Remittance {
        Remittance {
            id: RemittanceId::new(),
            claim_id: claim.id,
            rank,
            processed_at: None,
            patient_responsibility: Amount::ZERO,
            pending_additional_payer: pending,
        }
    }

    fn detail(remittance: &Remittance, value: Amount, created_day: Option<u32>) -> AdjustmentDetail {
        AdjustmentDetail {
            id: AdjustmentId::new(),
            remittance_id: remittance.id,
            amount: value,
            created_at: created_day.map(|d| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()),
        }
    }

    fn violating_claim(excess: Amount) -> Claim {
        Claim {
            claimed_amount: amount(dec!(1000)),
            received_amount: amount(dec!(400)),
            patient_responsibility: amount(dec!(50)),
            current_adjustment: amount(dec!(550)) + excess,
            ..Claim::new(ClaimId::new())
        }
    }

    #[test]
    fn test_end_to_end_example() {
        let claim = violating_claim(amount(dec!(50)));
        let tertiary = remittance(&claim, PayerRank::Tertiary, Amount::ZERO);
        let d40 = detail(&tertiary, amount(dec!(40)), Some(1));
        let d30 = detail(&tertiary, amount(dec!(30)), Some(2));

        let result = ReconciliationEngine::default().reconcile(
            &claim,
            &[tertiary.clone()],
            &[d30.clone(), d40.clone()],
        );

        assert_eq!(result.reductions.len(), 2);
        assert_eq!(result.reductions[0].adjustment_id, d40.id);
        assert_eq!(result.reductions[0].new_amount, Amount::ZERO);
        assert_eq!(result.reductions[0].delta(), amount(dec!(-40)));
        assert_eq!(result.reductions[1].adjustment_id, d30.id);
        assert_eq!(result.reductions[1].new_amount, amount(dec!(20)));
        assert_eq!(result.reductions[1].delta(), amount(dec!(-10)));
        assert_eq!(result.statistics.adjustment_cap, amount(dec!(550)));
        assert_eq!(result.statistics.amount_to_reduce, amount(dec!(50)));
        assert_eq!(result.statistics.remaining_to_reduce, Amount::ZERO);
    }

    #[test]
    fn test_tertiary_before_secondary() {
        let claim = violating_claim(amount(dec!(15)));
        let secondary = remittance(&claim, PayerRank::Secondary, Amount::ZERO);
        let tertiary = remittance(&claim, PayerRank::Tertiary, Amount::ZERO);
        let big_secondary = detail(&secondary, amount(dec!(100)), None);
        let small_tertiary = detail(&tertiary, amount(dec!(10)), None);

        let result = ReconciliationEngine::default().reconcile(
            &claim,
            &[secondary, tertiary],
            &[big_secondary.clone(), small_tertiary.clone()],
        );

        assert_eq!(result.reductions[0].adjustment_id, small_tertiary.id);
        assert_eq!(result.reductions[0].new_amount, Amount::ZERO);
        assert_eq!(result.reductions[1].adjustment_id, big_secondary.id);
        assert_eq!(result.reductions[1].new_amount, amount(dec!(95)));
    }

    #[test]
    fn test_primary_details_are_never_reduced() {
        let claim = violating_claim(amount(dec!(50)));
        let primary = remittance(&claim, PayerRank::Primary, Amount::ZERO);
        let d = detail(&primary, amount(dec!(500)), None);

        let result = ReconciliationEngine::default().reconcile(&claim, &[primary], &[d]);

        assert!(result.reductions.is_empty());
        assert_eq!(result.statistics.remaining_to_reduce, amount(dec!(50)));
    }

    #[test]
    fn test_tie_break_on_creation_time() {
        let claim = violating_claim(amount(dec!(5)));
        let tertiary = remittance(&claim, PayerRank::Tertiary, Amount::ZERO);
        let older = detail(&tertiary, amount(dec!(20)), Some(1));
        let newer = detail(&tertiary, amount(dec!(20)), Some(9));
        let details = [newer.clone(), older.clone()];

        let earliest = ReconciliationEngine::default().reconcile(&claim, &[tertiary.clone()], &details);
        assert_eq!(earliest.reductions[0].adjustment_id, older.id);

        let latest = ReconciliationEngine::new(EnginePolicy::default().with_tie_break(TieBreak::LatestFirst))
            .reconcile(&claim, &[tertiary], &details);
        assert_eq!(latest.reductions[0].adjustment_id, newer.id);
    }

    #[test]
    fn test_missing_timestamp_sorts_earliest() {
        let claim = violating_claim(amount(dec!(5)));
        let tertiary = remittance(&claim, PayerRank::Tertiary, Amount::ZERO);
        let dated = detail(&tertiary, amount(dec!(20)), Some(1));
        let undated = detail(&tertiary, amount(dec!(20)), None);

        let result = ReconciliationEngine::default().reconcile(&claim, &[tertiary], &[dated, undated.clone()]);
        assert_eq!(result.reductions[0].adjustment_id, undated.id);
    }

    #[test]
    fn test_full_tie_falls_back_to_adjustment_id() {
        let claim = violating_claim(amount(dec!(5)));
        let tertiary = remittance(&claim, PayerRank::Tertiary, Amount::ZERO);
        let mut low = detail(&tertiary, amount(dec!(20)), Some(3));
        let mut high = low.clone();
        low.id = AdjustmentId::from_uuid(Uuid::from_u128(1));
        high.id = AdjustmentId::from_uuid(Uuid::from_u128(2));

        let result = ReconciliationEngine::default().reconcile(&claim, &[tertiary], &[high, low.clone()]);
        assert_eq!(result.reductions[0].adjustment_id, low.id);
    }

    #[test]
    fn test_non_positive_and_foreign_details_skipped() {
        let claim = violating_claim(amount(dec!(50)));
        let tertiary = remittance(&claim, PayerRank::Tertiary, Amount::ZERO);
        let other_claim = Claim::new(ClaimId::new());
        let foreign = remittance(&other_claim, PayerRank::Tertiary, Amount::ZERO);

        let zero = detail(&tertiary, Amount::ZERO, None);
        let negative = detail(&tertiary, amount(dec!(-10)), None);
        let orphan = detail(&foreign, amount(dec!(100)), None);

        let result = ReconciliationEngine::default().reconcile(
            &claim,
            &[tertiary, foreign],
            &[zero, negative, orphan],
        );

        assert!(result.reductions.is_empty());
        assert_eq!(result.rank_totals.remittance_count, 1);
        assert_eq!(result.rank_totals.adjustment_count, 2);
    }

    #[test]
    fn test_claim_within_cap_gets_statistics_only() {
        let claim = violating_claim(Amount::ZERO);
        let tertiary = remittance(&claim, PayerRank::Tertiary, Amount::ZERO);
        let d = detail(&tertiary, amount(dec!(40)), None);

        let result = ReconciliationEngine::default().reconcile(&claim, &[tertiary], &[d]);

        assert!(!result.in_violation);
        assert!(!result.has_reductions());
        assert_eq!(result.rank_totals.total_tertiary_adjustments, amount(dec!(40)));
        assert_eq!(result.statistics.amount_to_reduce, Amount::ZERO);
    }

    #[test]
    fn test_remittance_pending_caps_reduce_each_rank_separately() {
        let claim = violating_claim(amount(dec!(1)));
        let primary = remittance(&claim, PayerRank::Primary, amount(dec!(30)));
        let secondary = remittance(&claim, PayerRank::Secondary, amount(dec!(10)));
        let tertiary = remittance(&claim, PayerRank::Tertiary, Amount::ZERO);

        let s1 = detail(&secondary, amount(dec!(25)), None);
        let s2 = detail(&secondary, amount(dec!(15)), None);
        let t1 = detail(&tertiary, amount(dec!(12)), None);

        let engine = ReconciliationEngine::new(
            EnginePolicy::default().with_excess_source(ExcessSource::RemittancePendingCaps),
        );
        let result = engine.reconcile(
            &claim,
            &[primary, secondary, tertiary],
            &[s1.clone(), s2.clone(), t1.clone()],
        );

        // tertiary: 12 - 10 = 2, secondary: 40 - 30 = 10
        assert_eq!(result.rank_totals.tertiary_excess, amount(dec!(2)));
        assert_eq!(result.rank_totals.secondary_excess, amount(dec!(10)));
        assert_eq!(result.reductions.len(), 2);
        assert_eq!(result.reductions[0].adjustment_id, t1.id);
        assert_eq!(result.reductions[0].new_amount, amount(dec!(10)));
        assert_eq!(result.reductions[1].adjustment_id, s1.id);
        assert_eq!(result.reductions[1].new_amount, amount(dec!(15)));
        assert_eq!(result.statistics.amount_to_reduce, amount(dec!(12)));
        assert_eq!(result.statistics.total_reduced, amount(dec!(12)));
    }

    #[test]
    fn test_remittance_pending_caps_still_gated_on_violation() {
        let claim = violating_claim(Amount::ZERO);
        let secondary = remittance(&claim, PayerRank::Secondary, Amount::ZERO);
        let d = detail(&secondary, amount(dec!(25)), None);

        let engine = ReconciliationEngine::new(
            EnginePolicy::default().with_excess_source(ExcessSource::RemittancePendingCaps),
        );
        let result = engine.reconcile(&claim, &[secondary], &[d]);

        assert_eq!(result.rank_totals.secondary_excess, amount(dec!(25)));
        assert!(result.reductions.is_empty());
    }

    #[test]
    fn test_partial_resolution_reports_remaining() {
        let claim = violating_claim(amount(dec!(100)));
        let tertiary = remittance(&claim, PayerRank::Tertiary, Amount::ZERO);
        let d = detail(&tertiary, amount(dec!(30)), None);

        let result = ReconciliationEngine::default().reconcile(&claim, &[tertiary], &[d]);

        assert_eq!(result.reductions[0].new_amount, Amount::ZERO);
        assert_eq!(result.statistics.total_reduced, amount(dec!(30)));
        assert_eq!(result.statistics.remaining_to_reduce, amount(dec!(70)));
        assert_eq!(result.total_delta(), amount(dec!(-30)));
    }
}
