//! Typed projection of store rows
//!
//! Rows are mapped into domain entities right after fetch. Missing or null
//! numeric fields read as zero; identifiers are required; anything present
//! but malformed is a projection error.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use core_kernel::{AdjustmentId, Amount, ClaimId, RemittanceId, Row};
use domain_reconciliation::{AdjustmentDetail, Claim, PayerRank, ReconciliationError, Remittance};

use crate::schema::{self, adjustment, claim, remittance};

/// Maps a claim row
pub fn claim_from_row(row: &Row) -> Result<Claim, ReconciliationError> {
    const ENTITY: &str = schema::CLAIM_ENTITY;
    Ok(Claim {
        id: ClaimId::from_uuid(read_uuid(ENTITY, row, &[claim::ID.to_string()])?),
        claimed_amount: read_amount(ENTITY, row, claim::CLAIMED_AMOUNT)?,
        received_amount: read_amount(ENTITY, row, claim::RECEIVED_AMOUNT)?,
        patient_responsibility: read_amount(ENTITY, row, claim::PATIENT_RESPONSIBILITY)?,
        pending_additional_payer: read_amount(ENTITY, row, claim::PENDING_ADDITIONAL_PAYER)?,
        current_adjustment: read_amount(ENTITY, row, claim::ADJUSTMENT_AMOUNT)?,
    })
}

/// Maps a remittance row
///
/// The owning claim is read from the row when present and otherwise taken
/// from `queried_claim`, the claim the query was filtered by.
pub fn remittance_from_row(row: &Row, queried_claim: ClaimId) -> Result<Remittance, ReconciliationError> {
    const ENTITY: &str = schema::REMITTANCE_ENTITY;
    let claim_keys = [remittance::CLAIM.to_string(), schema::lookup_value(remittance::CLAIM)];
    let claim_id = match find(row, &claim_keys) {
        Some(_) => ClaimId::from_uuid(read_uuid(ENTITY, row, &claim_keys)?),
        None => queried_claim,
    };

    Ok(Remittance {
        id: RemittanceId::from_uuid(read_uuid(ENTITY, row, &[remittance::ID.to_string()])?),
        claim_id,
        rank: read_rank(ENTITY, row, &[remittance::RANK.to_string()])?,
        processed_at: read_timestamp(ENTITY, row, remittance::PROCESSED_DATE)?,
        patient_responsibility: read_amount(ENTITY, row, remittance::PATIENT_RESPONSIBILITY)?,
        pending_additional_payer: read_amount(ENTITY, row, remittance::PENDING_ADDITIONAL_PAYER)?,
    })
}

/// Maps an adjustment detail row
///
/// The parent remittance comes from the `rem.` link column, or from the
/// lookup value when the query had no link.
pub fn adjustment_from_row(row: &Row) -> Result<AdjustmentDetail, ReconciliationError> {
    const ENTITY: &str = schema::ADJUSTMENT_ENTITY;
    let parent_keys = [
        schema::aliased(schema::REMITTANCE_ALIAS, remittance::ID),
        schema::lookup_value(adjustment::REMITTANCE),
        adjustment::REMITTANCE.to_string(),
    ];

    Ok(AdjustmentDetail {
        id: AdjustmentId::from_uuid(read_uuid(ENTITY, row, &[adjustment::ID.to_string()])?),
        remittance_id: RemittanceId::from_uuid(read_uuid(ENTITY, row, &parent_keys)?),
        amount: read_amount(ENTITY, row, adjustment::AMOUNT)?,
        created_at: read_timestamp(ENTITY, row, adjustment::CREATED_ON)?,
    })
}

/// Reads an amount field of a single-record response
pub fn amount_field(entity: &str, row: &Row, field: &str) -> Result<Amount, ReconciliationError> {
    match row.get(field) {
        None | Some(Value::Null) => Err(ReconciliationError::projection(
            entity,
            format!("field '{}' missing from response", field),
        )),
        Some(_) => read_amount(entity, row, field),
    }
}

fn find<'a>(row: &'a Row, keys: &[String]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| row.get(k.as_str()))
        .find(|v| !v.is_null())
}

fn read_uuid(entity: &str, row: &Row, keys: &[String]) -> Result<Uuid, ReconciliationError> {
    match find(row, keys) {
        Some(Value::String(text)) => Uuid::parse_str(text.trim()).map_err(|e| {
            ReconciliationError::projection(entity, format!("'{}' is not a GUID: {}", keys[0], e))
        }),
        Some(other) => Err(ReconciliationError::projection(
            entity,
            format!("'{}' has unexpected value {}", keys[0], other),
        )),
        None => Err(ReconciliationError::projection(
            entity,
            format!("'{}' is missing", keys[0]),
        )),
    }
}

fn read_amount(entity: &str, row: &Row, key: &str) -> Result<Amount, ReconciliationError> {
    let text = match row.get(key) {
        None | Some(Value::Null) => return Ok(Amount::ZERO),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(ReconciliationError::projection(
                entity,
                format!("'{}' has unexpected value {}", key, other),
            ))
        }
    };
    Amount::parse(&text).map_err(|e| ReconciliationError::projection(entity, format!("'{}': {}", key, e)))
}

fn read_rank(entity: &str, row: &Row, keys: &[String]) -> Result<PayerRank, ReconciliationError> {
    let code = match find(row, keys) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    match code {
        Some(code) => PayerRank::from_code(code),
        None => Err(ReconciliationError::projection(
            entity,
            format!("'{}' is missing or not an integer", keys[0]),
        )),
    }
}

fn read_timestamp(entity: &str, row: &Row, key: &str) -> Result<Option<DateTime<Utc>>, ReconciliationError> {
    match row.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.trim().is_empty() => Ok(None),
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(text.trim())
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| ReconciliationError::projection(entity, format!("'{}': {}", key, e))),
        Some(other) => Err(ReconciliationError::projection(
            entity,
            format!("'{}' has unexpected value {}", key, other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("test rows are objects"),
        }
    }

    #[test]
    fn test_claim_projection() {
        let id = Uuid::new_v4();
        let claim = claim_from_row(&row(json!({
            "smvs_claimid": id.to_string(),
            "smvs_claimed_amount": 1000,
            "smvs_recieved_amount": "400.00",
            "smvs_patient_responsible_payment": 50.5,
            "smvs_adjustment_amount": 600,
        })))
        .unwrap();

        assert_eq!(*claim.id.as_uuid(), id);
        assert_eq!(claim.received_amount, Amount::new(dec!(400)));
        assert_eq!(claim.patient_responsibility, Amount::new(dec!(50.5)));
        assert_eq!(claim.pending_additional_payer, Amount::ZERO);
    }

    #[test]
    fn test_claim_without_id_is_rejected() {
        let err = claim_from_row(&row(json!({ "smvs_claimed_amount": 1 }))).unwrap_err();
        assert!(err.to_string().contains("smvs_claimid"));
    }

    #[test]
    fn test_malformed_amount_is_rejected() {
        let err = claim_from_row(&row(json!({
            "smvs_claimid": Uuid::new_v4().to_string(),
            "smvs_claimed_amount": "lots",
        })))
        .unwrap_err();
        assert!(matches!(err, ReconciliationError::Projection { .. }));
    }

    #[test]
    fn test_remittance_projection_uses_lookup_value() {
        let claim_id = Uuid::new_v4();
        let remittance = remittance_from_row(
            &row(json!({
                "smvs_patient_remittanceid": Uuid::new_v4().to_string(),
                "_smvs_claim_id_value": claim_id.to_string(),
                "smvs_remit_type_indicator": 622490002,
                "smvs_check_processed_date": "2024-02-15T09:30:00Z",
                "smvs_pending_from_additional_payer": 12.25,
            })),
            ClaimId::new(),
        )
        .unwrap();

        assert_eq!(*remittance.claim_id.as_uuid(), claim_id);
        assert_eq!(remittance.rank, PayerRank::Tertiary);
        assert!(remittance.processed_at.is_some());
        assert_eq!(remittance.pending_value(), Amount::new(dec!(12.25)));
    }

    #[test]
    fn test_remittance_falls_back_to_queried_claim() {
        let queried = ClaimId::new();
        let remittance = remittance_from_row(
            &row(json!({
                "smvs_patient_remittanceid": Uuid::new_v4().to_string(),
                "smvs_remit_type_indicator": "622490000",
            })),
            queried,
        )
        .unwrap();
        assert_eq!(remittance.claim_id, queried);
        assert_eq!(remittance.rank, PayerRank::Primary);
    }

    #[test]
    fn test_unknown_rank_code() {
        let err = remittance_from_row(
            &row(json!({
                "smvs_patient_remittanceid": Uuid::new_v4().to_string(),
                "smvs_remit_type_indicator": 5,
            })),
            ClaimId::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ReconciliationError::UnknownPayerRank(5)));
    }

    #[test]
    fn test_adjustment_projection_from_link_alias() {
        let parent = Uuid::new_v4();
        let detail = adjustment_from_row(&row(json!({
            "smvs_claim_adjustment_detailid": Uuid::new_v4().to_string(),
            "smvs_amount": 40,
            "createdon": "2024-01-01T00:00:00Z",
            "rem.smvs_patient_remittanceid": parent.to_string(),
        })))
        .unwrap();

        assert_eq!(*detail.remittance_id.as_uuid(), parent);
        assert_eq!(detail.amount, Amount::new(dec!(40)));
        assert!(detail.created_at.is_some());
    }

    #[test]
    fn test_adjustment_bad_timestamp() {
        let err = adjustment_from_row(&row(json!({
            "smvs_claim_adjustment_detailid": Uuid::new_v4().to_string(),
            "_smvs_patient_remittance_value": Uuid::new_v4().to_string(),
            "createdon": "yesterday",
        })))
        .unwrap_err();
        assert!(err.to_string().contains("createdon"));
    }

    #[test]
    fn test_amount_field_requires_presence() {
        let r = row(json!({ "smvs_amount": null }));
        assert!(amount_field("e", &r, "smvs_amount").is_err());
        let r = row(json!({ "smvs_amount": 7.5 }));
        assert_eq!(amount_field("e", &r, "smvs_amount").unwrap(), Amount::new(dec!(7.5)));
    }

    #[test]
    fn test_amount_keeps_every_wire_digit() {
        let r: Row = serde_json::from_str(r#"{ "smvs_amount": 1234567890.123456789 }"#).unwrap();
        assert_eq!(
            amount_field("e", &r, "smvs_amount").unwrap(),
            Amount::new(dec!(1234567890.123456789))
        );
    }
}
