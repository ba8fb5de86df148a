use std::fmt::Write;

use rust_decimal::Decimal;

use crate::eligibility::{self, LifetimeTotals};
use crate::models::{AwardRecord, AwardType, AwardTypeSummary, StudentRecord};

pub fn summarize_by_type(records: &[AwardRecord]) -> Vec<AwardTypeSummary> {
    let mut summaries: Vec<AwardTypeSummary> = Vec::new();

    for record in records {
        match summaries
            .iter_mut()
            .find(|summary| summary.award_type == record.award_type)
        {
            Some(summary) => {
                summary.count += 1;
                summary.total_amount += record.total_award_amount;
            }
            None => summaries.push(AwardTypeSummary {
                award_type: record.award_type,
                count: 1,
                total_amount: record.total_award_amount,
            }),
        }
    }

    summaries.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
    summaries
}

pub fn build_report(
    award_year: Option<i32>,
    students: &[StudentRecord],
    records: &[AwardRecord],
) -> String {
    let summaries = summarize_by_type(records);

    let mut output = String::new();
    let scope_label = award_year
        .map(|year| year.to_string())
        .unwrap_or_else(|| "all years".to_string());

    let _ = writeln!(output, "# Scholarship Award Report");
    let _ = writeln!(output, "Generated for {scope_label}");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Award Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No award records in this scope.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} records totaling ${}",
                summary.award_type.as_str(),
                summary.count,
                summary.total_amount
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Students Approaching Limits");

    if students.is_empty() {
        let _ = writeln!(output, "No students are approaching their lifetime limits.");
    } else {
        for student in students.iter() {
            let totals = LifetimeTotals {
                undergrad: student.total_undergrad_awarded,
                grad: student.total_grad_awarded,
            };
            let _ = writeln!(
                output,
                "- {} ({}): ${} undergrad / ${} grad, ${} lifetime remaining",
                student.full_name(),
                student.tribal_id,
                student.total_undergrad_awarded,
                student.total_grad_awarded,
                eligibility::remaining_lifetime(totals)
            );
        }
    }

    let mut outstanding: Vec<&AwardRecord> = records
        .iter()
        .filter(|record| record.remaining_balance > Decimal::ZERO)
        .collect();
    outstanding.sort_by(|a, b| b.remaining_balance.cmp(&a.remaining_balance));

    let _ = writeln!(output);
    let _ = writeln!(output, "## Outstanding Disbursements");

    if outstanding.is_empty() {
        let _ = writeln!(output, "All awards in this scope are fully disbursed.");
    } else {
        for record in outstanding.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} ({}, {}): ${} of ${} remaining ({})",
                record.application_key,
                record.tribal_id,
                record.award_year,
                record.remaining_balance,
                record.total_award_amount,
                record.disbursement_status.as_str()
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AwardSource, DisbursementStatus, EducationLevel};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn record(award_type: AwardType, amount: Decimal, remaining: Decimal) -> AwardRecord {
        AwardRecord {
            id: Uuid::new_v4(),
            tribal_id: "TR-1001".to_string(),
            application_key: "HIST-2023-001".to_string(),
            award_year: 2023,
            award_type,
            award_source: AwardSource::HistoricalImport,
            education_level: Some(EducationLevel::Undergraduate),
            total_award_amount: amount,
            fall_disbursement: None,
            fall_disbursement_date: None,
            winter_disbursement: None,
            winter_disbursement_date: None,
            spring_disbursement: None,
            spring_disbursement_date: None,
            summer_disbursement: None,
            summer_disbursement_date: None,
            total_disbursed: amount - remaining,
            remaining_balance: remaining,
            disbursement_status: if remaining.is_zero() {
                DisbursementStatus::Complete
            } else {
                DisbursementStatus::Partial
            },
            note: String::new(),
        }
    }

    #[test]
    fn summarizes_records_by_award_type() {
        let records = vec![
            record(AwardType::Regular, dec!(5000), Decimal::ZERO),
            record(AwardType::Regular, dec!(3000), Decimal::ZERO),
            record(AwardType::Arpa, dec!(2000), Decimal::ZERO),
        ];
        let summaries = summarize_by_type(&records);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].award_type, AwardType::Regular);
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[0].total_amount, dec!(8000));
        assert_eq!(summaries[1].total_amount, dec!(2000));
    }

    #[test]
    fn report_lists_outstanding_balances() {
        let records = vec![record(AwardType::Regular, dec!(5000), dec!(2500))];
        let report = build_report(Some(2023), &[], &records);
        assert!(report.contains("# Scholarship Award Report"));
        assert!(report.contains("Generated for 2023"));
        assert!(report.contains("$2500 of $5000 remaining"));
    }

    #[test]
    fn empty_scope_reports_cleanly() {
        let report = build_report(None, &[], &[]);
        assert!(report.contains("Generated for all years"));
        assert!(report.contains("No award records in this scope."));
        assert!(report.contains("No students are approaching their lifetime limits."));
    }
}
