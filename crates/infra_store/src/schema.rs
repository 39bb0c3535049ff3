//! Logical entity and attribute names in the record store

pub const CLAIM_ENTITY: &str = "smvs_claim";
pub const REMITTANCE_ENTITY: &str = "smvs_patient_remittance";
pub const ADJUSTMENT_ENTITY: &str = "smvs_claim_adjustment_detail";

pub mod claim {
    pub const ID: &str = "smvs_claimid";
    pub const CLAIMED_AMOUNT: &str = "smvs_claimed_amount";
    /// Spelled as in the store schema
    pub const RECEIVED_AMOUNT: &str = "smvs_recieved_amount";
    pub const PATIENT_RESPONSIBILITY: &str = "smvs_patient_responsible_payment";
    pub const PENDING_ADDITIONAL_PAYER: &str = "smvs_pending_from_additional_payer";
    pub const ADJUSTMENT_AMOUNT: &str = "smvs_adjustment_amount";
}

pub mod remittance {
    pub const ID: &str = "smvs_patient_remittanceid";
    pub const CLAIM: &str = "smvs_claim_id";
    pub const RANK: &str = "smvs_remit_type_indicator";
    pub const PROCESSED_DATE: &str = "smvs_check_processed_date";
    pub const PATIENT_RESPONSIBILITY: &str = "smvs_patient_responsibility";
    pub const PENDING_ADDITIONAL_PAYER: &str = "smvs_pending_from_additional_payer";
}

pub mod adjustment {
    pub const ID: &str = "smvs_claim_adjustment_detailid";
    pub const REMITTANCE: &str = "smvs_patient_remittance";
    pub const AMOUNT: &str = "smvs_amount";
    pub const CREATED_ON: &str = "createdon";
}

/// Alias of the remittance link on adjustment queries
pub const REMITTANCE_ALIAS: &str = "rem";
/// Alias of the adjustment link on claim and remittance queries
pub const ADJUSTMENT_ALIAS: &str = "cad";

/// Web API name of a lookup column's value, e.g. `_smvs_claim_id_value`
pub fn lookup_value(attribute: &str) -> String {
    format!("_{}_value", attribute)
}

/// Column name of a linked attribute, e.g. `rem.smvs_claim_id`
pub fn aliased(alias: &str, attribute: &str) -> String {
    format!("{}.{}", alias, attribute)
}
