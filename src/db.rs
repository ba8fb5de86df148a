use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::PgConnection;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::eligibility;
use crate::ledger;
use crate::models::{
    AwardRecord, AwardSource, AwardType, DisbursementStatus, EducationLevel, EligibilitySnapshot,
    NormalizedAward, Semester, StudentRecord,
};
use crate::normalize::normalize_award;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        ("TR-1001", "Marcella", Some("J"), "Whitefeather"),
        ("TR-1002", "Daniel", None, "Kingbird"),
        ("TR-1003", "Lena", Some("R"), "Morningstar"),
    ];

    let mut tx = pool.begin().await?;
    for (tribal_id, first, middle, last) in students {
        upsert_student(&mut tx, tribal_id, first, middle, last).await?;
    }
    tx.commit().await?;

    // Historical awards post through the same normalize-and-decompose path
    // as CSV imports, so the seeded combined award lands as split lines.
    let awards = vec![
        (
            "TR-1001",
            2022,
            AwardType::Regular,
            Some(Decimal::new(600000, 2)),
            None,
            EducationLevel::Undergraduate,
        ),
        (
            "TR-1001",
            2023,
            AwardType::Combined,
            Some(Decimal::new(500000, 2)),
            Some(Decimal::new(300000, 2)),
            EducationLevel::Undergraduate,
        ),
        (
            "TR-1002",
            2023,
            AwardType::Regular,
            Some(Decimal::new(1000000, 2)),
            None,
            EducationLevel::Graduate,
        ),
        (
            "TR-1003",
            2024,
            AwardType::Arpa,
            None,
            Some(Decimal::new(250000, 2)),
            EducationLevel::Undergraduate,
        ),
    ];

    for (tribal_id, year, award_type, regular, arpa, level) in awards {
        let normalized = normalize_award(award_type, regular, arpa, None);
        import_award(pool, tribal_id, year, Some(level), &normalized, "Seed data").await?;
    }

    Ok(())
}

pub async fn upsert_student(
    tx: &mut Transaction<'_, Postgres>,
    tribal_id: &str,
    first_name: &str,
    middle_initial: Option<&str>,
    last_name: &str,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO scholarship_tracker.students (id, tribal_id, first_name, middle_initial, last_name)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (tribal_id) DO UPDATE
        SET first_name = EXCLUDED.first_name,
            middle_initial = EXCLUDED.middle_initial,
            last_name = EXCLUDED.last_name
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(tribal_id)
    .bind(first_name)
    .bind(middle_initial)
    .bind(last_name)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn row_to_student(row: &sqlx::postgres::PgRow) -> StudentRecord {
    StudentRecord {
        tribal_id: row.get("tribal_id"),
        first_name: row.get::<Option<String>, _>("first_name").unwrap_or_default(),
        middle_initial: row.get("middle_initial"),
        last_name: row.get::<Option<String>, _>("last_name").unwrap_or_default(),
        total_undergrad_awarded: row.get("total_undergrad_awarded"),
        total_grad_awarded: row.get("total_grad_awarded"),
        close_to_undergrad_limit: row.get("close_to_undergrad_limit"),
        close_to_grad_limit: row.get("close_to_grad_limit"),
    }
}

const STUDENT_COLUMNS: &str = "tribal_id, first_name, middle_initial, last_name, \
     total_undergrad_awarded, total_grad_awarded, close_to_undergrad_limit, close_to_grad_limit";

pub async fn fetch_student(pool: &PgPool, tribal_id: &str) -> anyhow::Result<Option<StudentRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {STUDENT_COLUMNS} FROM scholarship_tracker.students WHERE tribal_id = $1"
    ))
    .bind(tribal_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(row_to_student))
}

pub async fn fetch_students_approaching_limits(pool: &PgPool) -> anyhow::Result<Vec<StudentRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {STUDENT_COLUMNS} FROM scholarship_tracker.students \
         WHERE close_to_undergrad_limit OR close_to_grad_limit \
            OR (total_undergrad_awarded + total_grad_awarded) >= $1 \
         ORDER BY (total_undergrad_awarded + total_grad_awarded) DESC"
    ))
    .bind(eligibility::TOTAL_LIFETIME_LIMIT * eligibility::WARNING_THRESHOLD)
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(row_to_student).collect())
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> anyhow::Result<AwardRecord> {
    let award_type: String = row.get("award_type");
    let award_source: String = row.get("award_source");
    let education_level: Option<String> = row.get("education_level");
    let disbursement_status: String = row.get("disbursement_status");

    Ok(AwardRecord {
        id: row.get("id"),
        tribal_id: row.get("tribal_id"),
        application_key: row.get("application_key"),
        award_year: row.get("award_year"),
        award_type: AwardType::parse(&award_type)
            .with_context(|| format!("unknown award_type '{award_type}'"))?,
        award_source: AwardSource::parse(&award_source)
            .with_context(|| format!("unknown award_source '{award_source}'"))?,
        education_level: education_level.as_deref().and_then(EducationLevel::parse),
        total_award_amount: row.get("total_award_amount"),
        fall_disbursement: row.get("fall_disbursement"),
        fall_disbursement_date: row.get("fall_disbursement_date"),
        winter_disbursement: row.get("winter_disbursement"),
        winter_disbursement_date: row.get("winter_disbursement_date"),
        spring_disbursement: row.get("spring_disbursement"),
        spring_disbursement_date: row.get("spring_disbursement_date"),
        summer_disbursement: row.get("summer_disbursement"),
        summer_disbursement_date: row.get("summer_disbursement_date"),
        total_disbursed: row.get("total_disbursed"),
        remaining_balance: row.get("remaining_balance"),
        disbursement_status: DisbursementStatus::parse(&disbursement_status)
            .with_context(|| format!("unknown disbursement_status '{disbursement_status}'"))?,
        note: row.get::<Option<String>, _>("notes").unwrap_or_default(),
    })
}

const RECORD_COLUMNS: &str = "id, tribal_id, application_key, award_year, award_type, \
     award_source, education_level, total_award_amount, \
     fall_disbursement, fall_disbursement_date, winter_disbursement, winter_disbursement_date, \
     spring_disbursement, spring_disbursement_date, summer_disbursement, summer_disbursement_date, \
     total_disbursed, remaining_balance, disbursement_status, notes";

async fn fetch_records_for_student(
    conn: &mut PgConnection,
    tribal_id: &str,
) -> anyhow::Result<Vec<AwardRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM scholarship_tracker.award_records \
         WHERE tribal_id = $1 ORDER BY award_year, application_key"
    ))
    .bind(tribal_id)
    .fetch_all(conn)
    .await?;

    rows.iter().map(row_to_record).collect()
}

pub async fn fetch_records(
    pool: &PgPool,
    tribal_id: Option<&str>,
    award_year: Option<i32>,
) -> anyhow::Result<Vec<AwardRecord>> {
    let mut query =
        format!("SELECT {RECORD_COLUMNS} FROM scholarship_tracker.award_records WHERE TRUE");
    if tribal_id.is_some() {
        query.push_str(" AND tribal_id = $1");
    }
    if award_year.is_some() {
        if tribal_id.is_some() {
            query.push_str(" AND award_year = $2");
        } else {
            query.push_str(" AND award_year = $1");
        }
    }
    query.push_str(" ORDER BY award_year, tribal_id, application_key");

    let mut rows = sqlx::query(&query);
    if let Some(value) = tribal_id {
        rows = rows.bind(value);
    }
    if let Some(value) = award_year {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    records.iter().map(row_to_record).collect()
}

/// Recompute the student's cached lifetime totals and warning flags from the
/// full ledger and persist them, inside the caller's transaction.
///
/// This is the only writer of the cached columns. Always a full recompute,
/// never an increment, so the cache self-heals after bulk edits.
pub async fn refresh_student(
    tx: &mut Transaction<'_, Postgres>,
    tribal_id: &str,
) -> anyhow::Result<EligibilitySnapshot> {
    let records = fetch_records_for_student(&mut *tx, tribal_id).await?;
    let totals = eligibility::recalculate(&records);

    let arpa_total: Decimal = records
        .iter()
        .filter(|record| record.award_type == AwardType::Arpa)
        .map(|record| record.total_award_amount)
        .sum();

    let approaching_undergrad = eligibility::approaching_undergrad(totals);
    let approaching_grad = eligibility::approaching_grad(totals);

    sqlx::query(
        r#"
        UPDATE scholarship_tracker.students
        SET total_undergrad_awarded = $2,
            total_grad_awarded = $3,
            close_to_undergrad_limit = $4,
            close_to_grad_limit = $5
        WHERE tribal_id = $1
        "#,
    )
    .bind(tribal_id)
    .bind(totals.undergrad)
    .bind(totals.grad)
    .bind(approaching_undergrad)
    .bind(approaching_grad)
    .execute(&mut **tx)
    .await
    .context("failed to persist lifetime totals")?;

    Ok(EligibilitySnapshot {
        tribal_id: tribal_id.to_string(),
        undergrad_total: totals.undergrad,
        grad_total: totals.grad,
        arpa_total,
        remaining_undergrad: eligibility::remaining_undergrad(totals),
        remaining_grad: eligibility::remaining_grad(totals),
        remaining_lifetime: eligibility::remaining_lifetime(totals),
        approaching_undergrad,
        approaching_grad,
        approaching_lifetime: eligibility::approaching_lifetime(totals),
    })
}

/// Refresh is idempotent, so the read-only eligibility view just runs it.
pub async fn refresh_student_eligibility(
    pool: &PgPool,
    tribal_id: &str,
) -> anyhow::Result<EligibilitySnapshot> {
    let mut tx = pool.begin().await?;
    let snapshot = refresh_student(&mut tx, tribal_id).await?;
    tx.commit().await?;
    Ok(snapshot)
}

/// Next key in the year's sequence: YYYY-NNN for digital applications,
/// HIST-YYYY-NNN for historical imports.
async fn next_application_key(
    conn: &mut PgConnection,
    year: i32,
    source: AwardSource,
) -> anyhow::Result<String> {
    let prefix = match source {
        AwardSource::DigitalApplication => format!("{year}-"),
        AwardSource::HistoricalImport => format!("HIST-{year}-"),
    };

    let last_key: Option<String> = sqlx::query_scalar(
        "SELECT application_key FROM scholarship_tracker.award_records \
         WHERE application_key LIKE $1 ORDER BY application_key DESC LIMIT 1",
    )
    .bind(format!("{prefix}%"))
    .fetch_optional(conn)
    .await?;

    let next_seq = match last_key {
        Some(key) => {
            let last_seq: u32 = key
                .rsplit('-')
                .next()
                .unwrap_or("0")
                .parse()
                .with_context(|| format!("malformed application key '{key}'"))?;
            last_seq + 1
        }
        None => 1,
    };

    Ok(format!("{prefix}{next_seq:03}"))
}

#[allow(clippy::too_many_arguments)]
fn new_record(
    tribal_id: &str,
    application_key: &str,
    award_year: i32,
    award_type: AwardType,
    award_source: AwardSource,
    education_level: Option<EducationLevel>,
    amount: Decimal,
    note: &str,
) -> AwardRecord {
    let mut record = AwardRecord {
        id: Uuid::new_v4(),
        tribal_id: tribal_id.to_string(),
        application_key: application_key.to_string(),
        award_year,
        award_type,
        award_source,
        education_level,
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
        note: note.to_string(),
    };
    ledger::apply_derived(&mut record);
    record
}

async fn insert_record(conn: &mut PgConnection, record: &AwardRecord) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO scholarship_tracker.award_records
        (id, tribal_id, application_key, award_year, award_type, award_source,
         education_level, total_award_amount,
         fall_disbursement, fall_disbursement_date,
         winter_disbursement, winter_disbursement_date,
         spring_disbursement, spring_disbursement_date,
         summer_disbursement, summer_disbursement_date,
         total_disbursed, remaining_balance, disbursement_status, notes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
        "#,
    )
    .bind(record.id)
    .bind(&record.tribal_id)
    .bind(&record.application_key)
    .bind(record.award_year)
    .bind(record.award_type.as_str())
    .bind(record.award_source.as_str())
    .bind(record.education_level.map(|level| level.as_str()))
    .bind(record.total_award_amount)
    .bind(record.fall_disbursement)
    .bind(record.fall_disbursement_date)
    .bind(record.winter_disbursement)
    .bind(record.winter_disbursement_date)
    .bind(record.spring_disbursement)
    .bind(record.spring_disbursement_date)
    .bind(record.summer_disbursement)
    .bind(record.summer_disbursement_date)
    .bind(record.total_disbursed)
    .bind(record.remaining_balance)
    .bind(record.disbursement_status.as_str())
    .bind(&record.note)
    .execute(conn)
    .await?;
    Ok(())
}

/// Post the ledger lines for an approved digital application and refresh the
/// student, all in one transaction. Returns the generated application key
/// and the resulting eligibility snapshot.
pub async fn approve_application(
    pool: &PgPool,
    tribal_id: &str,
    award_year: i32,
    education_level: EducationLevel,
    normalized: &NormalizedAward,
) -> anyhow::Result<(String, EligibilitySnapshot)> {
    let mut tx = pool.begin().await?;

    let exists: Option<String> = sqlx::query_scalar(
        "SELECT tribal_id FROM scholarship_tracker.students WHERE tribal_id = $1",
    )
    .bind(tribal_id)
    .fetch_optional(&mut *tx)
    .await?;
    if exists.is_none() {
        anyhow::bail!("no student on file with tribal id {tribal_id}");
    }

    let key = next_application_key(&mut tx, award_year, AwardSource::DigitalApplication).await?;

    for request in &normalized.ledger_requests {
        let record = new_record(
            tribal_id,
            &key,
            award_year,
            request.award_type,
            AwardSource::DigitalApplication,
            Some(education_level),
            request.amount,
            "Digital application approval",
        );
        insert_record(&mut tx, &record).await?;
    }

    let snapshot = refresh_student(&mut tx, tribal_id).await?;
    tx.commit().await?;
    Ok((key, snapshot))
}

/// Post historical-import ledger lines. Historical money is already out the
/// door, so each line lands fully disbursed.
async fn import_award(
    pool: &PgPool,
    tribal_id: &str,
    award_year: i32,
    education_level: Option<EducationLevel>,
    normalized: &NormalizedAward,
    note: &str,
) -> anyhow::Result<(String, usize)> {
    let mut tx = pool.begin().await?;
    let key = next_application_key(&mut tx, award_year, AwardSource::HistoricalImport).await?;

    // Paper records without a level are treated as undergraduate.
    let level = education_level.unwrap_or(EducationLevel::Undergraduate);

    let mut inserted = 0usize;
    for request in &normalized.ledger_requests {
        let mut record = new_record(
            tribal_id,
            &key,
            award_year,
            request.award_type,
            AwardSource::HistoricalImport,
            Some(level),
            request.amount,
            &format!(
                "Imported from historical paper records ({}). {}",
                request.award_type.as_str().to_uppercase(),
                note
            ),
        );
        record.total_disbursed = request.amount;
        record.remaining_balance = Decimal::ZERO;
        record.disbursement_status = DisbursementStatus::Complete;
        insert_record(&mut tx, &record).await?;
        inserted += 1;
    }

    refresh_student(&mut tx, tribal_id).await?;
    tx.commit().await?;
    Ok((key, inserted))
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        tribal_id: String,
        first_name: String,
        middle_initial: Option<String>,
        last_name: String,
        application_year: i32,
        education_level: Option<String>,
        award_type: String,
        regular_amount: Option<Decimal>,
        arpa_amount: Option<Decimal>,
        amount_awarded: Option<Decimal>,
        notes: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let award_type = AwardType::parse(&row.award_type)
            .with_context(|| format!("unknown award_type '{}'", row.award_type))?;
        let education_level = row.education_level.as_deref().and_then(EducationLevel::parse);

        let mut tx = pool.begin().await?;
        upsert_student(
            &mut tx,
            &row.tribal_id,
            &row.first_name,
            row.middle_initial.as_deref(),
            &row.last_name,
        )
        .await?;
        tx.commit().await?;

        let normalized = normalize_award(
            award_type,
            row.regular_amount,
            row.arpa_amount,
            row.amount_awarded,
        );
        if normalized.ledger_requests.is_empty() {
            continue;
        }

        let (_, lines) = import_award(
            pool,
            &row.tribal_id,
            row.application_year,
            education_level,
            &normalized,
            row.notes.as_deref().unwrap_or(""),
        )
        .await?;
        inserted += lines;
    }

    Ok(inserted)
}

/// Record one semester's disbursement on a ledger entry, then refresh the
/// owning student inside the same transaction.
pub async fn record_disbursement(
    pool: &PgPool,
    record_id: Uuid,
    semester: Semester,
    amount: Decimal,
    date: NaiveDate,
) -> anyhow::Result<EligibilitySnapshot> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM scholarship_tracker.award_records WHERE id = $1 FOR UPDATE"
    ))
    .bind(record_id)
    .fetch_optional(&mut *tx)
    .await?
    .with_context(|| format!("no award record with id {record_id}"))?;
    let mut record = row_to_record(&row)?;

    ledger::record_disbursement(&mut record, semester, amount, date);

    sqlx::query(
        r#"
        UPDATE scholarship_tracker.award_records
        SET fall_disbursement = $2, fall_disbursement_date = $3,
            winter_disbursement = $4, winter_disbursement_date = $5,
            spring_disbursement = $6, spring_disbursement_date = $7,
            summer_disbursement = $8, summer_disbursement_date = $9,
            total_disbursed = $10, remaining_balance = $11, disbursement_status = $12
        WHERE id = $1
        "#,
    )
    .bind(record.id)
    .bind(record.fall_disbursement)
    .bind(record.fall_disbursement_date)
    .bind(record.winter_disbursement)
    .bind(record.winter_disbursement_date)
    .bind(record.spring_disbursement)
    .bind(record.spring_disbursement_date)
    .bind(record.summer_disbursement)
    .bind(record.summer_disbursement_date)
    .bind(record.total_disbursed)
    .bind(record.remaining_balance)
    .bind(record.disbursement_status.as_str())
    .execute(&mut *tx)
    .await?;

    let snapshot = refresh_student(&mut tx, &record.tribal_id).await?;
    tx.commit().await?;
    Ok(snapshot)
}

/// Remove every ledger line under an application key (cascading removal of a
/// digital or historical application) and refresh the affected student.
pub async fn remove_application(
    pool: &PgPool,
    application_key: &str,
) -> anyhow::Result<Option<EligibilitySnapshot>> {
    let mut tx = pool.begin().await?;

    let tribal_id: Option<String> = sqlx::query_scalar(
        "SELECT tribal_id FROM scholarship_tracker.award_records \
         WHERE application_key = $1 LIMIT 1",
    )
    .bind(application_key)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(tribal_id) = tribal_id else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM scholarship_tracker.award_records WHERE application_key = $1")
        .bind(application_key)
        .execute(&mut *tx)
        .await?;

    let snapshot = refresh_student(&mut tx, &tribal_id).await?;
    tx.commit().await?;
    Ok(Some(snapshot))
}

pub async fn export_csv(
    pool: &PgPool,
    out: &std::path::Path,
    tribal_id: Option<&str>,
    award_year: Option<i32>,
) -> anyhow::Result<usize> {
    let records = fetch_records(pool, tribal_id, award_year).await?;

    let mut writer = csv::Writer::from_path(out)?;
    writer.write_record([
        "tribal_id",
        "application_key",
        "award_year",
        "award_type",
        "award_source",
        "education_level",
        "total_award_amount",
        "total_disbursed",
        "remaining_balance",
        "disbursement_status",
    ])?;

    for record in &records {
        writer.write_record([
            record.tribal_id.as_str(),
            record.application_key.as_str(),
            &record.award_year.to_string(),
            record.award_type.as_str(),
            record.award_source.as_str(),
            record.education_level.map(|l| l.as_str()).unwrap_or(""),
            &record.total_award_amount.to_string(),
            &record.total_disbursed.to_string(),
            &record.remaining_balance.to_string(),
            record.disbursement_status.as_str(),
        ])?;
    }
    writer.flush()?;

    Ok(records.len())
}
