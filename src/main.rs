use std::path::PathBuf;

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Utc};
use clap::{ArgGroup, Parser, Subcommand};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod db;
mod eligibility;
mod ledger;
mod models;
mod normalize;
mod report;

use models::{AwardType, EducationLevel, EligibilitySnapshot, Semester};

#[derive(Parser)]
#[command(name = "award-tracker")]
#[command(about = "Scholarship award intake and lifetime eligibility tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import historical paper awards from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Approve a digital application and post its award to the ledger
    #[command(group(
        ArgGroup::new("amounts")
            .args(["regular_amount", "arpa_amount"])
            .multiple(true)
            .required(true)
    ))]
    Approve {
        #[arg(long)]
        tribal_id: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, value_parser = parse_level, default_value = "undergraduate")]
        level: EducationLevel,
        #[arg(long)]
        regular_amount: Option<Decimal>,
        #[arg(long)]
        arpa_amount: Option<Decimal>,
    },
    /// Record one semester's disbursement on an award record
    Disburse {
        #[arg(long)]
        record_id: Uuid,
        #[arg(long, value_parser = parse_semester)]
        semester: Semester,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Remove an application's ledger lines by application key
    Remove {
        #[arg(long)]
        application_key: String,
    },
    /// Show a student's lifetime totals and remaining eligibility
    Eligibility {
        #[arg(long)]
        tribal_id: String,
    },
    /// Export award records to a CSV file
    Export {
        #[arg(long)]
        tribal_id: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value = "awards.csv")]
        out: PathBuf,
    },
    /// Generate a markdown award report
    Report {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn parse_level(value: &str) -> Result<EducationLevel, String> {
    EducationLevel::parse(value).ok_or_else(|| format!("'{value}' is not a valid education level"))
}

fn parse_semester(value: &str) -> Result<Semester, String> {
    Semester::parse(value).ok_or_else(|| format!("'{value}' is not a valid semester"))
}

/// The approval path tags the award by which amounts were authored, then the
/// normalizer decomposes combined awards into split ledger lines.
fn determine_award_type(regular: Option<Decimal>, arpa: Option<Decimal>) -> AwardType {
    match (regular, arpa) {
        (Some(_), Some(_)) => AwardType::Combined,
        (None, Some(_)) => AwardType::Arpa,
        _ => AwardType::Regular,
    }
}

fn print_snapshot(snapshot: &EligibilitySnapshot) {
    println!("Eligibility for {}:", snapshot.tribal_id);
    println!(
        "  awarded: ${} undergrad, ${} grad (${} ARPA, not cap-relevant)",
        snapshot.undergrad_total, snapshot.grad_total, snapshot.arpa_total
    );
    println!(
        "  remaining: ${} undergrad, ${} grad, ${} lifetime",
        snapshot.remaining_undergrad, snapshot.remaining_grad, snapshot.remaining_lifetime
    );
    if snapshot.approaching_undergrad {
        println!("  WARNING: approaching undergraduate limit");
    }
    if snapshot.approaching_grad {
        println!("  WARNING: approaching graduate limit");
    }
    if snapshot.approaching_lifetime {
        println!("  WARNING: approaching lifetime limit");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Posted {inserted} award lines from {}.", csv.display());
        }
        Commands::Approve {
            tribal_id,
            year,
            level,
            regular_amount,
            arpa_amount,
        } => {
            let year = year.unwrap_or_else(|| Utc::now().year());
            let award_type = determine_award_type(regular_amount, arpa_amount);
            let normalized =
                normalize::normalize_award(award_type, regular_amount, arpa_amount, None);
            let (key, snapshot) =
                db::approve_application(&pool, &tribal_id, year, level, &normalized).await?;
            println!(
                "Approved application {key} ({} award line{}).",
                normalized.ledger_requests.len(),
                if normalized.ledger_requests.len() == 1 {
                    ""
                } else {
                    "s"
                }
            );
            print_snapshot(&snapshot);
        }
        Commands::Disburse {
            record_id,
            semester,
            amount,
            date,
        } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let snapshot = db::record_disbursement(&pool, record_id, semester, amount, date).await?;
            println!("Disbursement recorded on {record_id}.");
            print_snapshot(&snapshot);
        }
        Commands::Remove { application_key } => {
            match db::remove_application(&pool, &application_key).await? {
                Some(snapshot) => {
                    println!("Removed award lines for {application_key}.");
                    print_snapshot(&snapshot);
                }
                None => println!("No award lines found for {application_key}."),
            }
        }
        Commands::Eligibility { tribal_id } => {
            if db::fetch_student(&pool, &tribal_id).await?.is_none() {
                println!("No student on file with tribal id {tribal_id}.");
                return Ok(());
            }
            let snapshot = db::refresh_student_eligibility(&pool, &tribal_id).await?;
            print_snapshot(&snapshot);
        }
        Commands::Export {
            tribal_id,
            year,
            out,
        } => {
            let exported = db::export_csv(&pool, &out, tribal_id.as_deref(), year).await?;
            println!("Exported {exported} award records to {}.", out.display());
        }
        Commands::Report { year, out } => {
            let students = db::fetch_students_approaching_limits(&pool).await?;
            let records = db::fetch_records(&pool, None, year).await?;
            let report = report::build_report(year, &students, &records);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
