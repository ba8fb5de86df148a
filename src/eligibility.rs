use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::models::{AwardRecord, AwardType, EducationLevel};

/// Lifetime award policy. Undergrad draws from a $15k sub-allocation,
/// graduate from a $9k base plus whatever undergrad money went unused, and
/// the $24k lifetime cap binds everything.
pub const TOTAL_LIFETIME_LIMIT: Decimal = dec!(24000.00);
pub const UNDERGRAD_ALLOCATION: Decimal = dec!(15000.00);
pub const GRAD_BASE_ALLOCATION: Decimal = dec!(9000.00);
pub const WARNING_THRESHOLD: Decimal = dec!(0.80);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LifetimeTotals {
    pub undergrad: Decimal,
    pub grad: Decimal,
}

impl LifetimeTotals {
    pub fn lifetime(&self) -> Decimal {
        self.undergrad + self.grad
    }
}

/// Sum a student's ledger entries into per-level lifetime totals.
///
/// Only `regular` awards count toward the caps; arpa and combined lines are
/// skipped entirely, as are entries with no education level (a data-quality
/// concern for the admin layer, not an error here).
pub fn recalculate(entries: &[AwardRecord]) -> LifetimeTotals {
    let mut totals = LifetimeTotals::default();

    for entry in entries {
        if entry.award_type != AwardType::Regular {
            continue;
        }
        match entry.education_level {
            Some(EducationLevel::Undergraduate) => totals.undergrad += entry.total_award_amount,
            Some(EducationLevel::Graduate) => totals.grad += entry.total_award_amount,
            None => {}
        }
    }

    totals
}

/// Graduate allocation after rollover: $9k base plus unused undergrad funds.
pub fn effective_grad_allocation(totals: LifetimeTotals) -> Decimal {
    let unused_undergrad = (UNDERGRAD_ALLOCATION - totals.undergrad).max(Decimal::ZERO);
    GRAD_BASE_ALLOCATION + unused_undergrad
}

pub fn remaining_undergrad(totals: LifetimeTotals) -> Decimal {
    let undergrad_cap_remaining = UNDERGRAD_ALLOCATION - totals.undergrad;
    let lifetime_cap_remaining = TOTAL_LIFETIME_LIMIT - totals.lifetime();
    undergrad_cap_remaining
        .min(lifetime_cap_remaining)
        .max(Decimal::ZERO)
}

pub fn remaining_grad(totals: LifetimeTotals) -> Decimal {
    let grad_cap_remaining = effective_grad_allocation(totals) - totals.grad;
    let lifetime_cap_remaining = TOTAL_LIFETIME_LIMIT - totals.lifetime();
    grad_cap_remaining
        .min(lifetime_cap_remaining)
        .max(Decimal::ZERO)
}

pub fn remaining_lifetime(totals: LifetimeTotals) -> Decimal {
    (TOTAL_LIFETIME_LIMIT - totals.lifetime()).max(Decimal::ZERO)
}

pub fn approaching_undergrad(totals: LifetimeTotals) -> bool {
    if totals.undergrad.is_zero() {
        return false;
    }
    totals.undergrad >= UNDERGRAD_ALLOCATION * WARNING_THRESHOLD
}

/// Uses the effective (rollover-inclusive) allocation, so the threshold is
/// student-specific. The undergrad check above uses the fixed allocation;
/// that asymmetry is policy, not an oversight.
pub fn approaching_grad(totals: LifetimeTotals) -> bool {
    if totals.grad.is_zero() {
        return false;
    }
    totals.grad >= effective_grad_allocation(totals) * WARNING_THRESHOLD
}

pub fn approaching_lifetime(totals: LifetimeTotals) -> bool {
    totals.lifetime() >= TOTAL_LIFETIME_LIMIT * WARNING_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AwardSource, DisbursementStatus};
    use uuid::Uuid;

    fn entry(
        award_type: AwardType,
        level: Option<EducationLevel>,
        amount: Decimal,
    ) -> AwardRecord {
        AwardRecord {
            id: Uuid::new_v4(),
            tribal_id: "TR-1001".to_string(),
            application_key: "2025-001".to_string(),
            award_year: 2025,
            award_type,
            award_source: AwardSource::DigitalApplication,
            education_level: level,
            total_award_amount: amount,
            fall_disbursement: None,
            fall_disbursement_date: None,
            winter_disbursement: None,
            winter_disbursement_date: None,
            spring_disbursement: None,
            spring_disbursement_date: None,
            summer_disbursement: None,
            summer_disbursement_date: None,
            total_disbursed: Decimal::ZERO,
            remaining_balance: amount,
            disbursement_status: DisbursementStatus::Pending,
            note: String::new(),
        }
    }

    fn totals(undergrad: Decimal, grad: Decimal) -> LifetimeTotals {
        LifetimeTotals { undergrad, grad }
    }

    #[test]
    fn recalculate_groups_regular_awards_by_level() {
        let entries = vec![
            entry(
                AwardType::Regular,
                Some(EducationLevel::Undergraduate),
                dec!(6000),
            ),
            entry(
                AwardType::Regular,
                Some(EducationLevel::Undergraduate),
                dec!(5000),
            ),
            entry(AwardType::Regular, Some(EducationLevel::Graduate), dec!(2500)),
        ];
        let totals = recalculate(&entries);
        assert_eq!(totals.undergrad, dec!(11000));
        assert_eq!(totals.grad, dec!(2500));
        assert_eq!(totals.lifetime(), dec!(13500));
    }

    #[test]
    fn arpa_and_combined_never_count_toward_totals() {
        let entries = vec![
            entry(
                AwardType::Regular,
                Some(EducationLevel::Undergraduate),
                dec!(4000),
            ),
            entry(AwardType::Arpa, Some(EducationLevel::Undergraduate), dec!(9999)),
            entry(
                AwardType::Combined,
                Some(EducationLevel::Graduate),
                dec!(5000),
            ),
        ];
        let totals = recalculate(&entries);
        assert_eq!(totals.undergrad, dec!(4000));
        assert_eq!(totals.grad, Decimal::ZERO);
        assert!(!approaching_undergrad(totals));
        assert!(!approaching_grad(totals));
    }

    #[test]
    fn missing_education_level_is_excluded_from_both_groups() {
        let entries = vec![entry(AwardType::Regular, None, dec!(8000))];
        let totals = recalculate(&entries);
        assert_eq!(totals.undergrad, Decimal::ZERO);
        assert_eq!(totals.grad, Decimal::ZERO);
    }

    #[test]
    fn fresh_student_gets_base_grad_allocation() {
        let t = totals(Decimal::ZERO, Decimal::ZERO);
        assert_eq!(remaining_grad(t), dec!(9000.00));
        assert_eq!(remaining_undergrad(t), dec!(15000.00));
        assert_eq!(remaining_lifetime(t), dec!(24000.00));
    }

    #[test]
    fn unused_undergrad_rolls_into_grad_allocation() {
        let t = totals(dec!(10000), Decimal::ZERO);
        // 9000 base + 5000 unused undergrad, lifetime headroom also 14000
        assert_eq!(remaining_grad(t), dec!(14000.00));
    }

    #[test]
    fn fully_used_student_has_nothing_remaining() {
        let t = totals(dec!(15000), dec!(9000));
        assert_eq!(remaining_undergrad(t), Decimal::ZERO);
        assert_eq!(remaining_grad(t), Decimal::ZERO);
        assert_eq!(remaining_lifetime(t), Decimal::ZERO);
    }

    #[test]
    fn lifetime_cap_binds_before_sub_allocations() {
        // Heavy grad spend leaves lifetime headroom below the undergrad cap.
        let t = totals(dec!(2000), dec!(21000));
        assert_eq!(remaining_lifetime(t), dec!(1000));
        assert_eq!(remaining_undergrad(t), dec!(1000));
    }

    #[test]
    fn remaining_figures_never_go_negative() {
        let t = totals(dec!(16000), dec!(10000));
        assert_eq!(remaining_undergrad(t), Decimal::ZERO);
        assert_eq!(remaining_grad(t), Decimal::ZERO);
        assert_eq!(remaining_lifetime(t), Decimal::ZERO);
    }

    #[test]
    fn cap_invariant_holds_below_the_limit() {
        let t = totals(dec!(7000), dec!(3000));
        assert_eq!(remaining_lifetime(t) + t.lifetime(), TOTAL_LIFETIME_LIMIT);
    }

    #[test]
    fn undergrad_warning_threshold_edges() {
        assert!(approaching_undergrad(totals(dec!(12000.00), Decimal::ZERO)));
        assert!(!approaching_undergrad(totals(dec!(11999.99), Decimal::ZERO)));
        assert!(!approaching_undergrad(totals(Decimal::ZERO, Decimal::ZERO)));
    }

    #[test]
    fn grad_warning_uses_effective_allocation() {
        // No undergrad spend: effective allocation 24000, threshold 19200.
        assert!(!approaching_grad(totals(Decimal::ZERO, dec!(9000))));
        assert!(approaching_grad(totals(Decimal::ZERO, dec!(19200))));
        // Full undergrad spend: effective allocation 9000, threshold 7200.
        assert!(approaching_grad(totals(dec!(15000), dec!(7200))));
        assert!(!approaching_grad(totals(dec!(15000), dec!(7199.99))));
        assert!(!approaching_grad(totals(dec!(15000), Decimal::ZERO)));
    }

    #[test]
    fn lifetime_warning_threshold() {
        assert!(approaching_lifetime(totals(dec!(12000), dec!(7200))));
        assert!(!approaching_lifetime(totals(dec!(12000), dec!(7199))));
    }

    #[test]
    fn two_undergrad_awards_plus_arpa_snapshot() {
        // Student with 6000 + 5000 regular undergrad and a 3000 arpa award.
        let entries = vec![
            entry(
                AwardType::Regular,
                Some(EducationLevel::Undergraduate),
                dec!(6000),
            ),
            entry(
                AwardType::Regular,
                Some(EducationLevel::Undergraduate),
                dec!(5000),
            ),
            entry(AwardType::Arpa, Some(EducationLevel::Undergraduate), dec!(3000)),
        ];
        let totals = recalculate(&entries);
        assert_eq!(totals.undergrad, dec!(11000));
        assert_eq!(totals.grad, Decimal::ZERO);
        assert_eq!(remaining_undergrad(totals), dec!(4000));
        assert_eq!(remaining_grad(totals), dec!(9000));
        assert_eq!(remaining_lifetime(totals), dec!(13000));
        assert!(!approaching_undergrad(totals));
        assert!(!approaching_grad(totals));
        assert!(!approaching_lifetime(totals));
    }

    #[test]
    fn normalized_combined_award_feeds_the_calculator_split() {
        // A combined award reaches the ledger as two lines; only the regular
        // line moves the totals.
        let normalized = crate::normalize::normalize_award(
            AwardType::Combined,
            Some(dec!(4000)),
            Some(dec!(1500)),
            None,
        );
        let entries: Vec<AwardRecord> = normalized
            .ledger_requests
            .iter()
            .map(|request| {
                entry(
                    request.award_type,
                    Some(EducationLevel::Undergraduate),
                    request.amount,
                )
            })
            .collect();
        let totals = recalculate(&entries);
        assert_eq!(totals.undergrad, dec!(4000));
        assert_eq!(totals.grad, Decimal::ZERO);
    }

    #[test]
    fn recalculate_is_deterministic() {
        let entries = vec![
            entry(
                AwardType::Regular,
                Some(EducationLevel::Undergraduate),
                dec!(6000),
            ),
            entry(AwardType::Arpa, Some(EducationLevel::Undergraduate), dec!(3000)),
        ];
        assert_eq!(recalculate(&entries), recalculate(&entries));
    }
}
