//! Test Data Builders
//!
//! Provides builder patterns for constructing claims together with their
//! remittances and adjustment details. Tests specify only the relevant
//! fields and take the standard claim numbers for everything else.

use chrono::{DateTime, Utc};
use core_kernel::{AdjustmentId, Amount, ClaimId, RemittanceId};
use domain_reconciliation::{AdjustmentDetail, Claim, MockReconciliationStore, PayerRank, Remittance};

use crate::fixtures::AmountFixtures;

/// A claim with everything the engine reads for it
#[derive(Debug, Clone)]
pub struct ClaimScenario {
    pub claim: Claim,
    pub remittances: Vec<Remittance>,
    pub details: Vec<AdjustmentDetail>,
}

impl ClaimScenario {
    /// Returns the detail with the given id
    pub fn detail(&self, id: AdjustmentId) -> &AdjustmentDetail {
        self.details
            .iter()
            .find(|d| d.id == id)
            .expect("detail present in scenario")
    }

    /// Writes the scenario's records into a mock store
    pub async fn seed(&self, store: &MockReconciliationStore) {
        store.insert_claim(self.claim.clone()).await;
        for remittance in &self.remittances {
            store.insert_remittance(remittance.clone()).await;
        }
        for detail in &self.details {
            store.insert_detail(detail.clone()).await;
        }
    }
}

/// Builds a mock store holding all given scenarios
pub async fn seeded_store(scenarios: &[ClaimScenario]) -> MockReconciliationStore {
    let store = MockReconciliationStore::new();
    for scenario in scenarios {
        scenario.seed(&store).await;
    }
    store
}

/// Builder for constructing claim scenarios
///
/// Defaults to the standard claim (claimed 1000, received 400, patient
/// responsibility 50) sitting exactly at its 550 cap.
pub struct ClaimScenarioBuilder {
    claim: Claim,
    remittances: Vec<Remittance>,
    details: Vec<AdjustmentDetail>,
}

impl ClaimScenarioBuilder {
    /// Creates a new builder with default values
    pub fn new(id: ClaimId) -> Self {
        Self {
            claim: Claim {
                claimed_amount: AmountFixtures::claimed(),
                received_amount: AmountFixtures::received(),
                patient_responsibility: AmountFixtures::patient_responsibility(),
                pending_additional_payer: Amount::ZERO,
                current_adjustment: AmountFixtures::cap(),
                ..Claim::new(id)
            },
            remittances: Vec::new(),
            details: Vec::new(),
        }
    }

    /// Puts the claim `excess` over its cap
    pub fn with_excess(mut self, excess: Amount) -> Self {
        self.claim.current_adjustment = self.claim.adjustment_cap() + excess;
        self
    }

    pub fn with_current_adjustment(mut self, amount: Amount) -> Self {
        self.claim.current_adjustment = amount;
        self
    }

    pub fn with_claimed(mut self, amount: Amount) -> Self {
        self.claim.claimed_amount = amount;
        self
    }

    pub fn with_received(mut self, amount: Amount) -> Self {
        self.claim.received_amount = amount;
        self
    }

    pub fn with_patient_responsibility(mut self, amount: Amount) -> Self {
        self.claim.patient_responsibility = amount;
        self
    }

    pub fn with_pending_additional_payer(mut self, amount: Amount) -> Self {
        self.claim.pending_additional_payer = amount;
        self
    }

    /// Adds a remittance with no pending amounts
    pub fn remittance(self, id: RemittanceId, rank: PayerRank) -> Self {
        self.remittance_with_pending(id, rank, Amount::ZERO)
    }

    /// Adds a remittance whose pending value is `pending`
    pub fn remittance_with_pending(mut self, id: RemittanceId, rank: PayerRank, pending: Amount) -> Self {
        self.remittances.push(Remittance {
            id,
            claim_id: self.claim.id,
            rank,
            processed_at: None,
            patient_responsibility: Amount::ZERO,
            pending_additional_payer: pending,
        });
        self
    }

    /// Adds an adjustment detail without a creation timestamp
    pub fn detail(mut self, id: AdjustmentId, remittance_id: RemittanceId, amount: Amount) -> Self {
        self.details.push(AdjustmentDetail {
            id,
            remittance_id,
            amount,
            created_at: None,
        });
        self
    }

    /// Adds an adjustment detail created at `created_at`
    pub fn detail_created(
        mut self,
        id: AdjustmentId,
        remittance_id: RemittanceId,
        amount: Amount,
        created_at: DateTime<Utc>,
    ) -> Self {
        self.details.push(AdjustmentDetail {
            id,
            remittance_id,
            amount,
            created_at: Some(created_at),
        });
        self
    }

    pub fn build(self) -> ClaimScenario {
        ClaimScenario {
            claim: self.claim,
            remittances: self.remittances,
            details: self.details,
        }
    }
}
