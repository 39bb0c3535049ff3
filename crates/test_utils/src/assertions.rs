//! Custom Test Assertions
//!
//! Provides assertion helpers for amounts and exported rows that give more
//! meaningful failure messages than plain `assert_eq!`.

use core_kernel::{AdjustmentId, Amount};
use domain_reconciliation::{ApplyAuditRow, AuditStatus, Proposal};

/// Asserts exact equality of two amounts, reporting both at file precision
pub fn assert_amount_eq(actual: Amount, expected: Amount) {
    assert!(
        actual == expected,
        "Amounts differ: actual={} ({:?}), expected={} ({:?})",
        actual,
        actual.value(),
        expected,
        expected.value()
    );
}

/// Asserts that a proposal reduces `current` to `new`
pub fn assert_proposal(proposal: &Proposal, id: AdjustmentId, current: Amount, new: Amount) {
    assert_eq!(proposal.adjustment_id, id, "Unexpected adjustment in proposal");
    assert_amount_eq(proposal.current_amount, current);
    assert_amount_eq(proposal.new_amount, new);
    assert_amount_eq(proposal.delta, new - current);
}

/// Asserts the audit status recorded for one adjustment
pub fn assert_audit_status(rows: &[ApplyAuditRow], id: AdjustmentId, expected: AuditStatus) {
    let row = rows
        .iter()
        .find(|r| r.adjustment_id == id)
        .unwrap_or_else(|| panic!("No audit row for {}", id));
    assert_eq!(
        row.status, expected,
        "Audit status for {} was {} (note: '{}'), expected {}",
        id, row.status, row.note, expected
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_assert_amount_eq_passes_on_scale_difference() {
        assert_amount_eq(Amount::new(dec!(20)), Amount::new(dec!(20.00)));
    }

    #[test]
    #[should_panic(expected = "Amounts differ")]
    fn test_assert_amount_eq_fails_on_tiny_difference() {
        assert_amount_eq(Amount::new(dec!(20.00)), Amount::new(dec!(20.001)));
    }
}
