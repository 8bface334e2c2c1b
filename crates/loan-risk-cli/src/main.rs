mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::export::ExportArgs;
use commands::portfolio::{CohortArgs, HighRiskArgs, SourceArgs, TopVintagesArgs};

/// Loan portfolio risk analytics
#[derive(Parser)]
#[command(
    name = "lra",
    version,
    about = "Loan portfolio risk categorisation and vintage cohort analysis",
    long_about = "A CLI over an embedded-finance loan book: normalizes heterogeneous \
                  loan CSVs, classifies each advance into one risk category, and rolls \
                  loans up into funding-quarter cohorts and platform risk cross-tabs."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize and classify the loan table
    Normalize(SourceArgs),
    /// Vintage (funding quarter) cohort roll-up
    Cohorts(CohortArgs),
    /// Risk category percentages by platform, with headline counts
    RiskSummary(SourceArgs),
    /// Portfolio headline metrics and per-platform repayment spread
    Overview(SourceArgs),
    /// Vintages with the highest share of a risk category
    TopVintages(TopVintagesArgs),
    /// At-risk loans, most severe first
    HighRisk(HighRiskArgs),
    /// Export the filtered loan table as CSV
    Export(ExportArgs),
    /// Risk category definitions
    Categories,
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Normalize(args) => commands::portfolio::run_normalize(args),
        Commands::Cohorts(args) => commands::portfolio::run_cohorts(args),
        Commands::RiskSummary(args) => commands::portfolio::run_risk_summary(args),
        Commands::Overview(args) => commands::portfolio::run_overview(args),
        Commands::TopVintages(args) => commands::portfolio::run_top_vintages(args),
        Commands::HighRisk(args) => commands::portfolio::run_high_risk(args),
        Commands::Export(args) => commands::export::run_export(args),
        Commands::Categories => commands::reference::run_categories(),
        Commands::Version => {
            println!("lra {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(serde_json::Value::Null) => process::exit(0),
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
