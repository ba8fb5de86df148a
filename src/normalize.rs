use rust_decimal::Decimal;

use crate::models::{AwardRecordRequest, AwardType, NormalizedAward};

/// Resolve an award event's amounts by type and decide which ledger lines to
/// post.
///
/// Legacy paper records are often incomplete, so missing components stay
/// `None` rather than erroring. Combined awards come back as two separate
/// requests (one regular, one arpa) so the lifetime-cap math can ignore the
/// ARPA portion without ever inspecting a mixed line.
pub fn normalize_award(
    award_type: AwardType,
    regular_amount: Option<Decimal>,
    arpa_amount: Option<Decimal>,
    total: Option<Decimal>,
) -> NormalizedAward {
    let regular_amount = regular_amount.map(clamp_non_negative);
    let arpa_amount = arpa_amount.map(clamp_non_negative);
    let total = total.map(clamp_non_negative);

    let (regular_amount, arpa_amount, total) = match award_type {
        AwardType::Regular => {
            // Regular awards never carry an ARPA portion.
            let regular = regular_amount.or(total);
            (regular, None, regular)
        }
        AwardType::Arpa => {
            let arpa = arpa_amount.or(total);
            (None, arpa, arpa)
        }
        AwardType::Combined => {
            // When both components are known the total is derived, not
            // independently authored.
            let total = match (regular_amount, arpa_amount) {
                (Some(regular), Some(arpa)) => Some(regular + arpa),
                _ => total.or(regular_amount).or(arpa_amount),
            };
            (regular_amount, arpa_amount, total)
        }
    };

    let mut ledger_requests = Vec::new();
    if let Some(amount) = regular_amount {
        if amount > Decimal::ZERO {
            ledger_requests.push(AwardRecordRequest {
                award_type: AwardType::Regular,
                amount,
            });
        }
    }
    if let Some(amount) = arpa_amount {
        if amount > Decimal::ZERO {
            ledger_requests.push(AwardRecordRequest {
                award_type: AwardType::Arpa,
                amount,
            });
        }
    }

    NormalizedAward {
        regular_amount,
        arpa_amount,
        total,
        ledger_requests,
    }
}

fn clamp_non_negative(amount: Decimal) -> Decimal {
    amount.max(Decimal::ZERO)
}
