use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use loan_risk_core::cohort::{self, CohortSummary, GroupBy};
use loan_risk_core::config::{FieldScales, NormalizerConfig};
use loan_risk_core::filter::{apply_filter, LoanFilter};
use loan_risk_core::loan::AnalyzedLoan;
use loan_risk_core::pipeline::{envelope, LoadReport, LoanBook};
use loan_risk_core::risk::RiskCategory;
use loan_risk_core::summary;

use crate::input;

/// Source table, normalizer settings and view filter shared by every
/// portfolio command.
#[derive(Args)]
pub struct SourceArgs {
    /// Path to the loan CSV (reads stdin when omitted)
    #[arg(long)]
    pub input: Option<String>,

    /// Normalizer config file (JSON or YAML)
    #[arg(long)]
    pub config: Option<String>,

    /// Scale factor applied to every money column (e.g. 10 for a /10 snapshot)
    #[arg(long)]
    pub scale_amounts: Option<Decimal>,

    /// Keep only these platforms (repeatable)
    #[arg(long = "platform")]
    pub platforms: Vec<String>,

    /// Case-insensitive search across all loan columns
    #[arg(long)]
    pub search: Option<String>,
}

/// Arguments for cohort aggregation
#[derive(Args)]
pub struct CohortArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Break each vintage down by platform
    #[arg(long)]
    pub by_platform: bool,
}

/// Arguments for the highest-risk vintage ranking
#[derive(Args)]
pub struct TopVintagesArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Risk category to rank by
    #[arg(long, default_value = "Non-Payment Risk")]
    pub category: RiskCategory,

    /// Number of vintages to return
    #[arg(long, default_value_t = 3)]
    pub limit: usize,
}

/// Arguments for the at-risk loan list
#[derive(Args)]
pub struct HighRiskArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Maximum loans to return
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

/// A loaded book plus the settings it was loaded under.
pub struct LoadedSource {
    pub book: LoanBook,
    pub config: NormalizerConfig,
    pub filter: LoanFilter,
    pub started: Instant,
}

impl LoadedSource {
    pub fn visible_loans(&self) -> Vec<AnalyzedLoan> {
        apply_filter(&self.book.loans, &self.filter)
    }

    pub fn wrap<T: Serialize>(
        &self,
        group_by: GroupBy,
        result: T,
    ) -> Result<Value, Box<dyn std::error::Error>> {
        let output = envelope(
            &self.book,
            &self.config,
            &self.filter,
            group_by,
            result,
            self.started,
        );
        Ok(serde_json::to_value(output)?)
    }
}

pub fn load_source(args: &SourceArgs) -> Result<LoadedSource, Box<dyn std::error::Error>> {
    let started = Instant::now();

    let mut config = match args.config {
        Some(ref path) => input::file::read_config(path)?,
        None => NormalizerConfig::default(),
    };
    if let Some(factor) = args.scale_amounts {
        config.scale = FieldScales::uniform(factor);
    }

    let table = if let Some(ref path) = args.input {
        input::file::read_csv_table(path)?
    } else if let Some(table) = input::stdin::read_stdin()? {
        table
    } else {
        return Err("--input CSV file is required (or pipe CSV on stdin)".into());
    };

    let book = LoanBook::load(&table, &config)?;
    log::info!(
        "loaded {} loans across {} platforms",
        book.loans.len(),
        book.platforms.len()
    );

    Ok(LoadedSource {
        book,
        config,
        filter: LoanFilter {
            platforms: args.platforms.clone(),
            search: args.search.clone(),
        },
        started,
    })
}

#[derive(Serialize)]
struct NormalizedView {
    loans: Vec<AnalyzedLoan>,
    platforms: Vec<String>,
    report: LoadReport,
}

#[derive(Serialize)]
struct TopVintagesView {
    category: RiskCategory,
    ranked: Vec<CohortSummary>,
    /// At-risk loans of the top-ranked vintage.
    highest_vintage_loans: Vec<AnalyzedLoan>,
}

pub fn run_normalize(args: SourceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let src = load_source(&args)?;
    let view = NormalizedView {
        loans: src.visible_loans(),
        platforms: src.book.platforms.clone(),
        report: src.book.report.clone(),
    };
    src.wrap(GroupBy::Vintage, view)
}

pub fn run_cohorts(args: CohortArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let src = load_source(&args.source)?;
    let group_by = if args.by_platform {
        GroupBy::VintagePlatform
    } else {
        GroupBy::Vintage
    };
    let cohorts = cohort::aggregate_cohorts(&src.visible_loans(), group_by);
    src.wrap(group_by, cohorts)
}

pub fn run_risk_summary(args: SourceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let src = load_source(&args)?;
    src.wrap(GroupBy::Vintage, summary::summarize_risk(&src.visible_loans()))
}

pub fn run_overview(args: SourceArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let src = load_source(&args)?;
    src.wrap(GroupBy::Vintage, summary::portfolio_overview(&src.visible_loans()))
}

pub fn run_top_vintages(args: TopVintagesArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let src = load_source(&args.source)?;
    let loans = src.visible_loans();
    let cohorts = cohort::aggregate_cohorts(&loans, GroupBy::Vintage);
    let ranked = cohort::rank_vintages(&cohorts, args.category, args.limit);

    let highest_vintage_loans = ranked
        .first()
        .map(|top| cohort::loans_in_vintage(&loans, top.vintage, Some(args.category), 10))
        .unwrap_or_default();

    let view = TopVintagesView {
        category: args.category,
        ranked,
        highest_vintage_loans,
    };
    src.wrap(GroupBy::Vintage, view)
}

pub fn run_high_risk(args: HighRiskArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let src = load_source(&args.source)?;
    src.wrap(
        GroupBy::Vintage,
        summary::high_risk_loans(&src.visible_loans(), args.limit),
    )
}
