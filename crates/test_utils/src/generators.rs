//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating amounts and claim scenarios
//! that keep the domain's structural invariants: every detail belongs to a
//! remittance of the same claim.

use chrono::{TimeZone, Utc};
use core_kernel::{AdjustmentId, Amount, ClaimId, RemittanceId};
use domain_reconciliation::PayerRank;
use proptest::prelude::*;

use crate::builders::{ClaimScenario, ClaimScenarioBuilder};

/// Strategy for generating amounts that may be negative
pub fn amount_strategy() -> impl Strategy<Value = Amount> {
    (-1_000_000i64..1_000_000i64).prop_map(Amount::from_cents)
}

/// Strategy for generating payer ranks
pub fn payer_rank_strategy() -> impl Strategy<Value = PayerRank> {
    prop_oneof![
        Just(PayerRank::Primary),
        Just(PayerRank::Secondary),
        Just(PayerRank::Tertiary),
    ]
}

/// Strategy for generating a claim with one to three remittances and up to
/// ten details, over or under its cap
pub fn claim_scenario_strategy() -> impl Strategy<Value = ClaimScenario> {
    (
        -20_000i64..20_000i64,
        prop::collection::vec(payer_rank_strategy(), 1..4),
        prop::collection::vec((0usize..3, amount_strategy(), prop::option::of(1u32..28)), 0..10),
    )
        .prop_map(|(excess_cents, ranks, details)| {
            let remittance_ids: Vec<RemittanceId> = ranks.iter().map(|_| RemittanceId::new()).collect();
            let mut builder = ClaimScenarioBuilder::new(ClaimId::new())
                .with_excess(Amount::from_cents(excess_cents));
            for (id, rank) in remittance_ids.iter().zip(ranks) {
                builder = builder.remittance(*id, rank);
            }
            for (index, amount, day) in details {
                let remittance_id = remittance_ids[index % remittance_ids.len()];
                builder = match day {
                    Some(day) => builder.detail_created(
                        AdjustmentId::new(),
                        remittance_id,
                        amount,
                        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
                    ),
                    None => builder.detail(AdjustmentId::new(), remittance_id, amount),
                };
            }
            builder.build()
        })
}
