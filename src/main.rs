use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

mod aggregate;
mod breakdown;
mod classify;
mod config;
mod db;
mod delivery;
mod dump;
mod error;
#[cfg(test)]
mod fixtures;
mod geo;
mod models;
mod ranking;
mod render;
mod roles;
mod telemetry;
mod window;

use aggregate::{AggregateOptions, ReportAggregator};
use config::AppConfig;
use delivery::{Dispatcher, OutboxDispatcher};
use error::ConfigError;
use geo::GeoHierarchyIndex;
use render::CsvStyle;
use roles::RoleDirectory;
use window::{ReportWindow, WindowMode};

#[derive(Parser)]
#[command(name = "field-visit-reports")]
#[command(about = "Periodic reports on SMS school-visit submissions", long_about = None)]
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
    /// Import submissions from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Aggregate a window of submissions into a CSV report and queue it for delivery
    #[command(group(
        ArgGroup::new("span")
            .args(["window", "from"])
            .required(true)
            .multiple(false)
    ))]
    Report {
        /// Rolling window ending today: weekly or monthly
        #[arg(long)]
        window: Option<WindowMode>,
        /// First day of an explicit window (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        /// Last day of an explicit window (YYYY-MM-DD)
        #[arg(long, requires = "from", conflicts_with = "window")]
        to: Option<NaiveDate>,
        /// Report recipient; repeat for several. Defaults to REPORT_RECIPIENTS
        #[arg(long = "recipient")]
        recipients: Vec<String>,
        /// Add per-member detail sections for both reporting roles
        #[arg(long)]
        role_details: bool,
        #[arg(long)]
        out: Option<PathBuf>,
        /// legacy (unquoted) or quoted. Defaults to REPORT_CSV_STYLE
        #[arg(long)]
        csv_style: Option<CsvStyle>,
    },
    /// Export one day of raw submissions
    Dump {
        /// Day to export, today when omitted
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

/// A fully validated `report` invocation.
#[derive(Debug)]
struct ReportPlan {
    window: ReportWindow,
    recipients: Vec<String>,
    out: PathBuf,
    csv_style: CsvStyle,
    options: AggregateOptions,
}

#[allow(clippy::too_many_arguments)]
fn plan_report(
    config: &AppConfig,
    window: Option<WindowMode>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    recipients: Vec<String>,
    role_details: bool,
    out: Option<PathBuf>,
    csv_style: Option<CsvStyle>,
) -> anyhow::Result<ReportPlan> {
    let window = match (window, from, to) {
        (Some(mode), None, None) => ReportWindow::rolling_from_now(mode),
        (None, Some(start), Some(end)) => ReportWindow::explicit(start, end)?,
        (Some(_), _, _) => return Err(ConfigError::Conflict("--window", "--from/--to").into()),
        (None, _, _) => return Err(ConfigError::Missing("--window or --from/--to").into()),
    };

    let recipients = if recipients.is_empty() {
        config.recipients.clone()
    } else {
        recipients
    };
    if recipients.is_empty() {
        return Err(ConfigError::Missing("--recipient or REPORT_RECIPIENTS").into());
    }

    let out = out.unwrap_or_else(|| {
        config
            .output_dir
            .join(format!("report_{}.csv", window.label()))
    });

    Ok(ReportPlan {
        window,
        recipients,
        out,
        csv_style: csv_style.unwrap_or(config.csv_style),
        options: AggregateOptions {
            role_details,
            join_separator: config.join_separator.clone(),
            ..AggregateOptions::default()
        },
    })
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = config.database_url()?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn run_report(pool: &PgPool, config: &AppConfig, plan: ReportPlan) -> anyhow::Result<()> {
    let mut tx = db::begin_snapshot(pool).await?;
    let (boundaries, schools) = db::fetch_geography(&mut tx).await?;
    let (users, memberships) = db::fetch_directory(&mut tx).await?;
    let snapshot = db::fetch_snapshot(&mut tx, &plan.window).await?;
    tx.commit().await?;

    let geo = GeoHierarchyIndex::new(boundaries, schools);
    let roles = RoleDirectory::new(users, memberships, &config.role_a, &config.role_b);
    let report = ReportAggregator::new(&geo, &roles, &config.exclusions, plan.options)
        .compute(&snapshot, &plan.window);

    let bytes = render::render(&report.sections(), plan.csv_style)?;
    render::write_atomic(&plan.out, &bytes)?;

    OutboxDispatcher::new(config.outbox_dir.clone()).dispatch(
        &plan.out,
        &plan.recipients,
        &format!("Field visit report {}", plan.window),
    )?;

    println!(
        "Report for {} written to {} and queued for {} recipients.",
        plan.window,
        plan.out.display(),
        plan.recipients.len()
    );
    Ok(())
}

async fn run_dump(pool: &PgPool, day: NaiveDate, out_dir: PathBuf) -> anyhow::Result<()> {
    let mut tx = db::begin_snapshot(pool).await?;
    let (boundaries, schools) = db::fetch_geography(&mut tx).await?;
    let records = db::fetch_states_on(&mut tx, day).await?;
    tx.commit().await?;
    let geo = GeoHierarchyIndex::new(boundaries, schools);

    let out = out_dir.join(dump::file_name(day));
    render::write_atomic(&out, dump::render_day(&records, &geo).as_bytes())?;
    info!(day = %day, records = records.len(), "daily dump written");
    println!("Exported {} submissions to {}.", records.len(), out.display());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.log_level)?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} submissions from {}.", csv.display());
        }
        Commands::Report {
            window,
            from,
            to,
            recipients,
            role_details,
            out,
            csv_style,
        } => {
            let plan = plan_report(
                &config,
                window,
                from,
                to,
                recipients,
                role_details,
                out,
                csv_style,
            )?;
            let pool = connect(&config).await?;
            run_report(&pool, &config, plan).await?;
        }
        Commands::Dump { date, out_dir } => {
            let day = date.unwrap_or_else(|| Local::now().date_naive());
            let out_dir = out_dir.unwrap_or_else(|| config.output_dir.join("daily"));
            let pool = connect(&config).await?;
            run_dump(&pool, day, out_dir).await?;
        }
    }

    Ok(())
}
