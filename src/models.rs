use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardType {
    Regular,
    Arpa,
    Combined,
}

impl AwardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AwardType::Regular => "regular",
            AwardType::Arpa => "arpa",
            AwardType::Combined => "combined",
        }
    }

    pub fn parse(value: &str) -> Option<AwardType> {
        match value {
            "regular" => Some(AwardType::Regular),
            "arpa" => Some(AwardType::Arpa),
            "combined" => Some(AwardType::Combined),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwardSource {
    DigitalApplication,
    HistoricalImport,
}

impl AwardSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AwardSource::DigitalApplication => "digital_application",
            AwardSource::HistoricalImport => "historical_import",
        }
    }

    pub fn parse(value: &str) -> Option<AwardSource> {
        match value {
            "digital_application" => Some(AwardSource::DigitalApplication),
            "historical_import" => Some(AwardSource::HistoricalImport),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EducationLevel {
    Undergraduate,
    Graduate,
}

impl EducationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EducationLevel::Undergraduate => "undergraduate",
            EducationLevel::Graduate => "graduate",
        }
    }

    pub fn parse(value: &str) -> Option<EducationLevel> {
        match value {
            "undergraduate" => Some(EducationLevel::Undergraduate),
            "graduate" => Some(EducationLevel::Graduate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisbursementStatus {
    Pending,
    Partial,
    Complete,
}

impl DisbursementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisbursementStatus::Pending => "pending",
            DisbursementStatus::Partial => "partial",
            DisbursementStatus::Complete => "complete",
        }
    }

    pub fn parse(value: &str) -> Option<DisbursementStatus> {
        match value {
            "pending" => Some(DisbursementStatus::Pending),
            "partial" => Some(DisbursementStatus::Partial),
            "complete" => Some(DisbursementStatus::Complete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semester {
    Fall,
    Winter,
    Spring,
    Summer,
}

impl Semester {
    pub fn parse(value: &str) -> Option<Semester> {
        match value {
            "fall" => Some(Semester::Fall),
            "winter" => Some(Semester::Winter),
            "spring" => Some(Semester::Spring),
            "summer" => Some(Semester::Summer),
            _ => None,
        }
    }
}

/// One disbursement-tracking entry. The ledger these rows form is the source
/// of truth for all lifetime eligibility math.
#[derive(Debug, Clone)]
pub struct AwardRecord {
    pub id: Uuid,
    pub tribal_id: String,
    pub application_key: String,
    pub award_year: i32,
    pub award_type: AwardType,
    pub award_source: AwardSource,
    pub education_level: Option<EducationLevel>,
    pub total_award_amount: Decimal,
    pub fall_disbursement: Option<Decimal>,
    pub fall_disbursement_date: Option<NaiveDate>,
    pub winter_disbursement: Option<Decimal>,
    pub winter_disbursement_date: Option<NaiveDate>,
    pub spring_disbursement: Option<Decimal>,
    pub spring_disbursement_date: Option<NaiveDate>,
    pub summer_disbursement: Option<Decimal>,
    pub summer_disbursement_date: Option<NaiveDate>,
    pub total_disbursed: Decimal,
    pub remaining_balance: Decimal,
    pub disbursement_status: DisbursementStatus,
    pub note: String,
}

/// A ledger line the normalizer asks to be posted. Combined awards decompose
/// into one regular and one arpa request so the cap math never sees a mixed
/// line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardRecordRequest {
    pub award_type: AwardType,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct NormalizedAward {
    pub regular_amount: Option<Decimal>,
    pub arpa_amount: Option<Decimal>,
    pub total: Option<Decimal>,
    pub ledger_requests: Vec<AwardRecordRequest>,
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub tribal_id: String,
    pub first_name: String,
    pub middle_initial: Option<String>,
    pub last_name: String,
    pub total_undergrad_awarded: Decimal,
    pub total_grad_awarded: Decimal,
    pub close_to_undergrad_limit: bool,
    pub close_to_grad_limit: bool,
}

impl StudentRecord {
    pub fn full_name(&self) -> String {
        let mut parts = vec![self.first_name.as_str()];
        if let Some(mi) = self.middle_initial.as_deref() {
            parts.push(mi);
        }
        parts.push(self.last_name.as_str());
        parts.join(" ")
    }
}

#[derive(Debug, Clone)]
pub struct AwardTypeSummary {
    pub award_type: AwardType,
    pub count: usize,
    pub total_amount: Decimal,
}

/// Everything the admin layer needs to display a student's standing against
/// the lifetime limits.
#[derive(Debug, Clone)]
pub struct EligibilitySnapshot {
    pub tribal_id: String,
    pub undergrad_total: Decimal,
    pub grad_total: Decimal,
    pub arpa_total: Decimal,
    pub remaining_undergrad: Decimal,
    pub remaining_grad: Decimal,
    pub remaining_lifetime: Decimal,
    pub approaching_undergrad: bool,
    pub approaching_grad: bool,
    pub approaching_lifetime: bool,
}
