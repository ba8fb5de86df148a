use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{AwardRecord, DisbursementStatus, Semester};

/// Derived disbursement figures for one award record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisbursementTotals {
    pub total_disbursed: Decimal,
    pub remaining_balance: Decimal,
    pub status: DisbursementStatus,
}

/// Roll the per-semester amounts up into the derived columns.
///
/// Invariant: total_disbursed is the sum of the non-null semester amounts,
/// remaining_balance is award minus disbursed, and status is pending at zero
/// disbursed, complete once nothing remains, partial in between.
pub fn derive_disbursement(
    total_award_amount: Decimal,
    semesters: [Option<Decimal>; 4],
) -> DisbursementTotals {
    let total_disbursed: Decimal = semesters.iter().flatten().sum();
    let remaining_balance = total_award_amount - total_disbursed;

    let status = if total_disbursed.is_zero() {
        DisbursementStatus::Pending
    } else if remaining_balance > Decimal::ZERO {
        DisbursementStatus::Partial
    } else {
        DisbursementStatus::Complete
    };

    DisbursementTotals {
        total_disbursed,
        remaining_balance,
        status,
    }
}

/// Record one semester's disbursement on a ledger entry and re-derive the
/// totals. Setting the same semester twice overwrites the prior figure.
pub fn record_disbursement(
    record: &mut AwardRecord,
    semester: Semester,
    amount: Decimal,
    date: NaiveDate,
) {
    match semester {
        Semester::Fall => {
            record.fall_disbursement = Some(amount);
            record.fall_disbursement_date = Some(date);
        }
        Semester::Winter => {
            record.winter_disbursement = Some(amount);
            record.winter_disbursement_date = Some(date);
        }
        Semester::Spring => {
            record.spring_disbursement = Some(amount);
            record.spring_disbursement_date = Some(date);
        }
        Semester::Summer => {
            record.summer_disbursement = Some(amount);
            record.summer_disbursement_date = Some(date);
        }
    }
    apply_derived(record);
}

pub fn apply_derived(record: &mut AwardRecord) {
    let derived = derive_disbursement(
        record.total_award_amount,
        [
            record.fall_disbursement,
            record.winter_disbursement,
            record.spring_disbursement,
            record.summer_disbursement,
        ],
    );
    record.total_disbursed = derived.total_disbursed;
    record.remaining_balance = derived.remaining_balance;
    record.disbursement_status = derived.status;
}
