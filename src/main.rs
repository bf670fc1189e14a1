use std::path::PathBuf;

use anyhow::Context;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use groupscholar_grade_averages::models::{Grade, Period, Snapshot};
use groupscholar_grade_averages::report::{format_average, format_difference};
use groupscholar_grade_averages::{
    db, main_custom_average, period, report, grade_impact, AverageCalculator, OwnCoefficients,
    Scope, SubjectTree,
};

#[derive(Parser)]
#[command(name = "grade-averages")]
#[command(about = "Weighted grade averages for Group Scholar students", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a realistic preset student
    Seed,
    /// Import grades from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show the general average or one subject's average
    Average {
        #[arg(long)]
        email: String,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show a custom average (the pinned one by default)
    Custom {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        period: Option<String>,
    },
    /// Show how much one grade moves an average
    #[command(group(
        ArgGroup::new("scope")
            .args(["subject", "custom"])
            .multiple(false)
    ))]
    Impact {
        #[arg(long)]
        email: String,
        #[arg(long)]
        grade: Uuid,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        custom: Option<String>,
        #[arg(long)]
        period: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        email: String,
        #[arg(long)]
        period: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

/// Grades counted for `period_name`, or every grade when no period is given.
fn scoped_grades<'s>(
    snapshot: &'s Snapshot,
    period_name: Option<&str>,
) -> anyhow::Result<(Option<&'s Period>, Vec<Grade>)> {
    let Some(name) = period_name else {
        return Ok((None, snapshot.grades.clone()));
    };
    let selected = snapshot
        .period_named(name)
        .with_context(|| format!("no period named {name}"))?;
    let grades = period::grades_in_scope(selected, &snapshot.periods, &snapshot.grades)
        .into_iter()
        .cloned()
        .collect();
    Ok((Some(selected), grades))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grade_averages=info,groupscholar_grade_averages=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

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
            println!("Inserted {inserted} grades from {}.", csv.display());
        }
        Commands::Average {
            email,
            period,
            subject,
            json,
        } => {
            let snapshot = db::fetch_snapshot(&pool, &email).await?;
            let (_, grades) = scoped_grades(&snapshot, period.as_deref())?;
            let tree = SubjectTree::build(&snapshot.subjects)
                .context("stored subject tree is corrupt")?;
            let calculator = AverageCalculator::new(&tree, &grades, OwnCoefficients);

            let (label, average) = match subject.as_deref() {
                Some(name) => {
                    let subject = snapshot
                        .subject_named(name)
                        .with_context(|| format!("no subject named {name}"))?;
                    (subject.name.clone(), calculator.subject_average(subject.id)?)
                }
                None => ("General average".to_string(), calculator.general_average()),
            };

            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "label": label,
                        "average": average,
                    }))?
                );
            } else {
                println!("{}: {}", label, format_average(average));
            }
        }
        Commands::Custom {
            email,
            name,
            period,
        } => {
            let snapshot = db::fetch_snapshot(&pool, &email).await?;
            let custom = match name.as_deref() {
                Some(name) => snapshot
                    .custom_average_named(name)
                    .with_context(|| format!("no custom average named {name}"))?,
                None => main_custom_average(&snapshot.custom_averages)
                    .context("no custom average is pinned; pass --name")?,
            };
            let (_, grades) = scoped_grades(&snapshot, period.as_deref())?;
            let tree = SubjectTree::build(&snapshot.subjects)
                .context("stored subject tree is corrupt")?;
            let average = AverageCalculator::new(&tree, &grades, OwnCoefficients)
                .custom_average(custom)
                .with_context(|| format!("custom average {} is out of date", custom.name))?;
            println!("{}: {}", custom.name, format_average(average));
        }
        Commands::Impact {
            email,
            grade,
            subject,
            custom,
            period,
            json,
        } => {
            let snapshot = db::fetch_snapshot(&pool, &email).await?;
            let (_, grades) = scoped_grades(&snapshot, period.as_deref())?;
            let tree = SubjectTree::build(&snapshot.subjects)
                .context("stored subject tree is corrupt")?;

            let scope = match (subject.as_deref(), custom.as_deref()) {
                (Some(name), _) => Scope::Subject(
                    snapshot
                        .subject_named(name)
                        .with_context(|| format!("no subject named {name}"))?
                        .id,
                ),
                (None, Some(name)) => Scope::Custom(
                    snapshot
                        .custom_average_named(name)
                        .with_context(|| format!("no custom average named {name}"))?,
                ),
                (None, None) => Scope::General,
            };

            let impact = grade_impact(grade, scope, &tree, &grades)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&impact)?);
            } else {
                match impact {
                    Some(impact) => println!("Impact: {}", format_difference(&impact.difference)),
                    None => println!("Grade {grade} is not part of this period."),
                }
            }
        }
        Commands::Report { email, period, out } => {
            let snapshot = db::fetch_snapshot(&pool, &email).await?;
            let (selected, grades) = scoped_grades(&snapshot, period.as_deref())?;
            let report = report::build_report(
                &email,
                selected,
                &snapshot.subjects,
                &grades,
                &snapshot.custom_averages,
            )?;
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
