//! Pre-built Test Fixtures
//!
//! Provides ready-to-use values for reconciliation tests. These fixtures are
//! consistent and predictable so expected outputs can be written by hand.

use chrono::{DateTime, TimeZone, Utc};
use core_kernel::{AdjustmentId, Amount, ClaimId, RemittanceId};
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Fixture for amount test data
pub struct AmountFixtures;

impl AmountFixtures {
    pub fn claimed() -> Amount {
        Amount::new(dec!(1000.00))
    }

    pub fn received() -> Amount {
        Amount::new(dec!(400.00))
    }

    pub fn patient_responsibility() -> Amount {
        Amount::new(dec!(50.00))
    }

    /// Cap for the standard claim: 1000 - 400 - max(0, 50)
    pub fn cap() -> Amount {
        Amount::new(dec!(550.00))
    }

    /// Current adjustment that puts the standard claim 50.00 over its cap
    pub fn violating_adjustment() -> Amount {
        Amount::new(dec!(600.00))
    }

    /// Parses a decimal literal, panicking on malformed text
    pub fn of(text: &str) -> Amount {
        Amount::parse(text).expect("valid amount literal")
    }
}

/// Fixture for temporal test data
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// Midnight UTC on the given day of January 2024
    pub fn january(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    pub fn processed_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 15, 9, 30, 0).unwrap()
    }
}

/// Fixture for deterministic identifiers
///
/// Ids built from small integers sort in numeric order, which keeps
/// id-ordered outputs predictable.
pub struct IdFixtures;

impl IdFixtures {
    pub fn claim(n: u128) -> ClaimId {
        ClaimId::from_uuid(Uuid::from_u128(0x1000_0000 + n))
    }

    pub fn remittance(n: u128) -> RemittanceId {
        RemittanceId::from_uuid(Uuid::from_u128(0x2000_0000 + n))
    }

    pub fn adjustment(n: u128) -> AdjustmentId {
        AdjustmentId::from_uuid(Uuid::from_u128(0x3000_0000 + n))
    }
}
