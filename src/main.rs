//! Loan Report - command line front end
//!
//! Loads the loan CSV, applies one filter and prints the summary as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use loan_report::{FilterSpec, Measure, ReportConfig, Reporter, SummaryRequest};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "loan-report",
    about = "Summarize a loan CSV into dashboard-ready JSON"
)]
struct Cli {
    /// TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Loan CSV. Overrides the config file.
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Two-letter state code.
    #[arg(long)]
    state: Option<String>,

    /// Loan grade, e.g. B.
    #[arg(long)]
    grade: Option<String>,

    /// Loan purpose, e.g. car.
    #[arg(long)]
    purpose: Option<String>,

    /// First issue month (YYYY-MM).
    #[arg(long)]
    from: Option<String>,

    /// Last issue month (YYYY-MM).
    #[arg(long)]
    to: Option<String>,

    /// Measure for the monthly trend: total_apps, total_funded, total_received, avg_int_rate.
    #[arg(long, default_value = "total_funded")]
    measure: Measure,

    /// Print compact JSON instead of pretty-printed.
    #[arg(long, default_value_t = false)]
    compact: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ReportConfig::from_file(path)?,
        None => ReportConfig::default(),
    };
    if let Some(csv) = cli.csv {
        config.csv_path = csv;
    }

    let csv_path = config.csv_path.clone();
    let reporter = Reporter::load(config)
        .with_context(|| format!("Failed to load loans from {}", csv_path.display()))?;

    let request = SummaryRequest {
        filter: FilterSpec {
            state: cli.state,
            grade: cli.grade,
            purpose: cli.purpose,
            from_month: cli.from,
            to_month: cli.to,
        },
        measure: cli.measure,
    };
    let view = reporter.summary(&request)?;

    let json = if cli.compact {
        serde_json::to_string(&view)?
    } else {
        serde_json::to_string_pretty(&view)?
    };
    println!("{json}");

    Ok(())
}
