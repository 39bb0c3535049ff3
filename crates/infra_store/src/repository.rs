//! Domain port adapters over the record ports
//!
//! `DataverseClaimSource` and `DataverseAdjustmentStore` build the queries
//! for the reconciliation entities and project every returned row into a
//! typed entity before handing it to the domain.

use async_trait::async_trait;
use serde_json::{Number, Value};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use core_kernel::{
    AdjustmentId, Amount, ClaimId, Condition, DomainPort, LinkEntity, PortError, RecordFetchPort,
    RecordQuery, RecordWritePort, RemittanceId, ResourceRef, Row,
};
use domain_reconciliation::{AdjustmentDetail, AdjustmentStore, Claim, ClaimSource, PayerRank, Remittance};

use crate::projection;
use crate::schema::{self, adjustment, claim, remittance};

const CLAIM_PAGE_SIZE: u32 = 5000;
const REMITTANCE_PAGE_SIZE: u32 = 5000;
const ADJUSTMENT_PAGE_SIZE: u32 = 2000;

/// Claims having a remittance with at least one positive adjustment detail
pub fn claims_query() -> RecordQuery {
    RecordQuery::new(schema::CLAIM_ENTITY)
        .distinct()
        .attributes([
            claim::ID,
            claim::CLAIMED_AMOUNT,
            claim::RECEIVED_AMOUNT,
            claim::PATIENT_RESPONSIBILITY,
            claim::PENDING_ADDITIONAL_PAYER,
            claim::ADJUSTMENT_AMOUNT,
        ])
        .order_by(claim::ID, false)
        .link(
            LinkEntity::inner(schema::REMITTANCE_ENTITY, remittance::CLAIM, claim::ID, schema::REMITTANCE_ALIAS)
                .link(
                    LinkEntity::inner(
                        schema::ADJUSTMENT_ENTITY,
                        adjustment::REMITTANCE,
                        remittance::ID,
                        schema::ADJUSTMENT_ALIAS,
                    )
                    .condition(Condition::gt(adjustment::AMOUNT, 0)),
                ),
        )
}

/// Remittances of one claim, highest rank and latest processed first
pub fn remittances_query(claim_id: ClaimId) -> RecordQuery {
    RecordQuery::new(schema::REMITTANCE_ENTITY)
        .attributes([
            remittance::ID,
            remittance::CLAIM,
            remittance::RANK,
            remittance::PROCESSED_DATE,
            remittance::PATIENT_RESPONSIBILITY,
            remittance::PENDING_ADDITIONAL_PAYER,
        ])
        .condition(Condition::eq(remittance::CLAIM, claim_id.as_uuid()))
        .condition(Condition::is_in(
            remittance::RANK,
            [PayerRank::Primary, PayerRank::Secondary, PayerRank::Tertiary].map(|r| r.code()),
        ))
        .order_by(remittance::RANK, true)
        .order_by(remittance::PROCESSED_DATE, true)
}

/// Adjustment details under the given remittances
pub fn adjustments_query(remittance_ids: &[RemittanceId]) -> RecordQuery {
    RecordQuery::new(schema::ADJUSTMENT_ENTITY)
        .attributes([adjustment::ID, adjustment::AMOUNT, adjustment::CREATED_ON])
        .condition(Condition::is_in(
            adjustment::REMITTANCE,
            remittance_ids.iter().map(|id| *id.as_uuid()),
        ))
        .link(
            LinkEntity::inner(schema::REMITTANCE_ENTITY, remittance::ID, adjustment::REMITTANCE, schema::REMITTANCE_ALIAS)
                .attribute(remittance::ID)
                .attribute(remittance::RANK)
                .attribute(remittance::CLAIM),
        )
}

/// `ClaimSource` backed by any record fetch port
pub struct DataverseClaimSource {
    records: Arc<dyn RecordFetchPort>,
}

impl DataverseClaimSource {
    pub fn new(records: Arc<dyn RecordFetchPort>) -> Self {
        Self { records }
    }
}

impl DomainPort for DataverseClaimSource {}

#[async_trait]
impl ClaimSource for DataverseClaimSource {
    async fn list_claims(&self) -> Result<Vec<Claim>, PortError> {
        let rows = self.records.fetch(&claims_query(), CLAIM_PAGE_SIZE).await?;
        let claims = project(&rows, projection::claim_from_row)?;
        info!(count = claims.len(), "Listed claims with adjustment details");
        Ok(claims)
    }

    async fn remittances_for_claim(&self, claim_id: ClaimId) -> Result<Vec<Remittance>, PortError> {
        let rows = self
            .records
            .fetch(&remittances_query(claim_id), REMITTANCE_PAGE_SIZE)
            .await?;
        let remittances = project(&rows, |row| projection::remittance_from_row(row, claim_id))?;
        debug!(claim_id = %claim_id, count = remittances.len(), "Fetched remittances");
        Ok(remittances)
    }

    async fn adjustments_for_remittances(
        &self,
        remittance_ids: &[RemittanceId],
    ) -> Result<Vec<AdjustmentDetail>, PortError> {
        if remittance_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .records
            .fetch(&adjustments_query(remittance_ids), ADJUSTMENT_PAGE_SIZE)
            .await?;
        let details = project(&rows, projection::adjustment_from_row)?;
        debug!(remittances = remittance_ids.len(), count = details.len(), "Fetched adjustment details");
        Ok(details)
    }
}

/// `AdjustmentStore` backed by any record write port
pub struct DataverseAdjustmentStore {
    records: Arc<dyn RecordWritePort>,
}

impl DataverseAdjustmentStore {
    pub fn new(records: Arc<dyn RecordWritePort>) -> Self {
        Self { records }
    }

    fn resource(id: AdjustmentId) -> ResourceRef {
        ResourceRef::new(schema::ADJUSTMENT_ENTITY, id)
    }
}

impl DomainPort for DataverseAdjustmentStore {}

#[async_trait]
impl AdjustmentStore for DataverseAdjustmentStore {
    async fn current_amount(&self, id: AdjustmentId) -> Result<Amount, PortError> {
        let row = self
            .records
            .get(&Self::resource(id), &[adjustment::AMOUNT])
            .await?;
        projection::amount_field(schema::ADJUSTMENT_ENTITY, &row, adjustment::AMOUNT)
            .map_err(|e| PortError::transformation(e.to_string()))
    }

    async fn set_amount(&self, id: AdjustmentId, amount: Amount) -> Result<(), PortError> {
        let number = Number::from_str(&amount.to_fixed())
            .map_err(|e| PortError::validation(format!("amount {} is not representable: {}", amount, e)))?;
        let mut body = Row::new();
        body.insert(adjustment::AMOUNT.to_string(), Value::Number(number));
        self.records.patch(&Self::resource(id), body).await
    }
}

fn project<T, F>(rows: &[Row], map: F) -> Result<Vec<T>, PortError>
where
    F: Fn(&Row) -> Result<T, domain_reconciliation::ReconciliationError>,
{
    rows.iter()
        .map(|row| map(row).map_err(|e| PortError::transformation(e.to_string())))
        .collect()
}
