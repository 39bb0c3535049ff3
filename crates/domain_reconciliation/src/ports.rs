//! Reconciliation Domain Ports
//!
//! Typed views over the record store used by the migration pipeline.
//!
//! # Architecture
//!
//! - `ClaimSource`: read side for the dry run (claims, remittances,
//!   adjustment details)
//! - `AdjustmentStore`: read-verify-write side for apply and rollback
//!
//! Adapters implementing these traits:
//!
//! - **Web API Adapter**: `infra_store` over the Dataverse Web API
//! - **Mock Adapter**: in-memory store with failure injection for tests

use async_trait::async_trait;

use core_kernel::{AdjustmentId, Amount, ClaimId, DomainPort, PortError, RemittanceId};
use crate::model::{AdjustmentDetail, Claim, Remittance};

/// Read access to claims and their remittance records
#[async_trait]
pub trait ClaimSource: DomainPort {
    /// Lists every claim having at least one remittance with at least one
    /// positive-amount adjustment detail
    async fn list_claims(&self) -> Result<Vec<Claim>, PortError>;

    /// Lists the remittances of one claim
    async fn remittances_for_claim(&self, claim_id: ClaimId) -> Result<Vec<Remittance>, PortError>;

    /// Lists the adjustment details under the given remittances
    async fn adjustments_for_remittances(
        &self,
        remittance_ids: &[RemittanceId],
    ) -> Result<Vec<AdjustmentDetail>, PortError>;
}

/// Single-record access to adjustment detail amounts
#[async_trait]
pub trait AdjustmentStore: DomainPort {
    /// Reads the live amount of one adjustment detail
    async fn current_amount(&self, id: AdjustmentId) -> Result<Amount, PortError>;

    /// Overwrites the amount of one adjustment detail
    async fn set_amount(&self, id: AdjustmentId, amount: Amount) -> Result<(), PortError>;
}

/// Mock implementation of the reconciliation ports for testing
///
/// Holds claims, remittances and details in memory. Failures can be queued
/// per adjustment (for reads and writes) or per claim (for remittance
/// fetches); each queued failure is returned once, in order.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
    use std::time::Duration;
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    /// A failure to return from the next call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum InjectedFailure {
        /// An HTTP error status, with an optional retry-after
        Status { status: u16, retry_after: Option<Duration> },
        /// A transport failure
        Connection,
    }

    impl InjectedFailure {
        pub fn status(status: u16) -> Self {
            InjectedFailure::Status { status, retry_after: None }
        }

        pub fn rate_limited(retry_after: Duration) -> Self {
            InjectedFailure::Status { status: 429, retry_after: Some(retry_after) }
        }

        fn into_error(self, resource: &str) -> PortError {
            match self {
                InjectedFailure::Status { status, retry_after } => {
                    PortError::from_status(status, resource, "injected failure", retry_after)
                }
                InjectedFailure::Connection => PortError::connection("injected connection failure"),
            }
        }
    }

    /// A recorded write
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WriteAttempt {
        pub id: AdjustmentId,
        pub amount: Amount,
        pub at: Instant,
        pub succeeded: bool,
    }

    /// In-memory mock implementation of `ClaimSource` and `AdjustmentStore`
    #[derive(Debug, Default)]
    pub struct MockReconciliationStore {
        claims: Mutex<BTreeMap<ClaimId, Claim>>,
        remittances: Mutex<Vec<Remittance>>,
        details: Mutex<HashMap<AdjustmentId, AdjustmentDetail>>,
        read_failures: Mutex<HashMap<AdjustmentId, VecDeque<InjectedFailure>>>,
        write_failures: Mutex<HashMap<AdjustmentId, VecDeque<InjectedFailure>>>,
        failing_claims: Mutex<HashSet<ClaimId>>,
        writes: Mutex<Vec<WriteAttempt>>,
        remittance_fetches: Mutex<Vec<ClaimId>>,
    }

    impl MockReconciliationStore {
        /// Creates an empty mock store
        pub fn new() -> Self {
            Self::default()
        }

        /// Pre-populates the store
        pub async fn with_records(
            claims: Vec<Claim>,
            remittances: Vec<Remittance>,
            details: Vec<AdjustmentDetail>,
        ) -> Self {
            let store = Self::new();
            for claim in claims {
                store.insert_claim(claim).await;
            }
            store.remittances.lock().await.extend(remittances);
            for detail in details {
                store.insert_detail(detail).await;
            }
            store
        }

        pub async fn insert_claim(&self, claim: Claim) {
            self.claims.lock().await.insert(claim.id, claim);
        }

        pub async fn insert_remittance(&self, remittance: Remittance) {
            self.remittances.lock().await.push(remittance);
        }

        pub async fn insert_detail(&self, detail: AdjustmentDetail) {
            self.details.lock().await.insert(detail.id, detail);
        }

        /// Queues failures for the next reads of one adjustment
        pub async fn fail_reads(&self, id: AdjustmentId, failures: Vec<InjectedFailure>) {
            self.read_failures.lock().await.entry(id).or_default().extend(failures);
        }

        /// Queues failures for the next writes of one adjustment
        pub async fn fail_writes(&self, id: AdjustmentId, failures: Vec<InjectedFailure>) {
            self.write_failures.lock().await.entry(id).or_default().extend(failures);
        }

        /// Makes every remittance fetch for the claim fail with a 503
        pub async fn fail_claim(&self, id: ClaimId) {
            self.failing_claims.lock().await.insert(id);
        }

        /// Returns the stored amount of one adjustment, bypassing failures
        pub async fn amount_of(&self, id: AdjustmentId) -> Option<Amount> {
            self.details.lock().await.get(&id).map(|d| d.amount)
        }

        /// Changes a stored amount without recording a write
        pub async fn overwrite_amount(&self, id: AdjustmentId, amount: Amount) {
            if let Some(detail) = self.details.lock().await.get_mut(&id) {
                detail.amount = amount;
            }
        }

        /// All write attempts in call order
        pub async fn writes(&self) -> Vec<WriteAttempt> {
            self.writes.lock().await.clone()
        }

        /// Claims whose remittances were fetched, in call order
        pub async fn remittance_fetches(&self) -> Vec<ClaimId> {
            self.remittance_fetches.lock().await.clone()
        }

        async fn take_failure(
            queue: &Mutex<HashMap<AdjustmentId, VecDeque<InjectedFailure>>>,
            id: AdjustmentId,
        ) -> Option<InjectedFailure> {
            queue.lock().await.get_mut(&id).and_then(VecDeque::pop_front)
        }
    }

    impl DomainPort for MockReconciliationStore {}

    #[async_trait]
    impl ClaimSource for MockReconciliationStore {
        async fn list_claims(&self) -> Result<Vec<Claim>, PortError> {
            let claims = self.claims.lock().await;
            let remittances = self.remittances.lock().await;
            let details = self.details.lock().await;

            let with_positive: HashSet<RemittanceId> = details
                .values()
                .filter(|d| d.amount.is_positive())
                .map(|d| d.remittance_id)
                .collect();
            let eligible: HashSet<ClaimId> = remittances
                .iter()
                .filter(|r| with_positive.contains(&r.id))
                .map(|r| r.claim_id)
                .collect();

            Ok(claims
                .values()
                .filter(|c| eligible.contains(&c.id))
                .cloned()
                .collect())
        }

        async fn remittances_for_claim(&self, claim_id: ClaimId) -> Result<Vec<Remittance>, PortError> {
            self.remittance_fetches.lock().await.push(claim_id);
            if self.failing_claims.lock().await.contains(&claim_id) {
                return Err(PortError::from_status(503, "smvs_patient_remittance", "", None));
            }
            Ok(self
                .remittances
                .lock()
                .await
                .iter()
                .filter(|r| r.claim_id == claim_id)
                .cloned()
                .collect())
        }

        async fn adjustments_for_remittances(
            &self,
            remittance_ids: &[RemittanceId],
        ) -> Result<Vec<AdjustmentDetail>, PortError> {
            let wanted: HashSet<&RemittanceId> = remittance_ids.iter().collect();
            let mut found: Vec<AdjustmentDetail> = self
                .details
                .lock()
                .await
                .values()
                .filter(|d| wanted.contains(&d.remittance_id))
                .cloned()
                .collect();
            found.sort_by_key(|d| d.id);
            Ok(found)
        }
    }

    #[async_trait]
    impl AdjustmentStore for MockReconciliationStore {
        async fn current_amount(&self, id: AdjustmentId) -> Result<Amount, PortError> {
            if let Some(failure) = Self::take_failure(&self.read_failures, id).await {
                return Err(failure.into_error(&id.to_string()));
            }
            self.amount_of(id)
                .await
                .ok_or_else(|| PortError::not_found("AdjustmentDetail", id))
        }

        async fn set_amount(&self, id: AdjustmentId, amount: Amount) -> Result<(), PortError> {
            let failure = Self::take_failure(&self.write_failures, id).await;
            let mut details = self.details.lock().await;
            let result = match (failure, details.get_mut(&id)) {
                (Some(failure), _) => Err(failure.into_error(&id.to_string())),
                (None, None) => Err(PortError::not_found("AdjustmentDetail", id)),
                (None, Some(detail)) => {
                    detail.amount = amount;
                    Ok(())
                }
            };
            self.writes.lock().await.push(WriteAttempt {
                id,
                amount,
                at: Instant::now(),
                succeeded: result.is_ok(),
            });
            result
        }
    }
}
