use clap::Args;
use serde_json::{json, Value};
use std::fs;
use std::io;

use loan_risk_core::cohort::GroupBy;
use loan_risk_core::export::{self, LoanColumn};

use super::portfolio::{load_source, SourceArgs};

/// Arguments for exporting the filtered loan table
#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Comma-separated columns, in output order (default: business_name,
    /// platform, amount, repaid_amount, risk_category)
    #[arg(long, default_value = "")]
    pub columns: String,

    /// Destination file; CSV goes to stdout when omitted
    #[arg(long)]
    pub out: Option<String>,
}

/// Write the filtered table as CSV. Returns `Value::Null` when the CSV itself
/// went to stdout, so nothing else is printed after it.
pub fn run_export(args: ExportArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let columns: Vec<LoanColumn> = export::parse_columns(&args.columns)?;
    let src = load_source(&args.source)?;
    let loans = src.visible_loans();

    match args.out {
        Some(ref path) => {
            let file = fs::File::create(path)
                .map_err(|e| format!("Failed to create '{}': {}", path, e))?;
            export::write_loans_csv(&loans, &columns, file)?;
            log::info!("exported {} rows to {}", loans.len(), path);
            src.wrap(
                GroupBy::Vintage,
                json!({
                    "path": path,
                    "rows": loans.len(),
                    "columns": columns.iter().map(|c| c.header()).collect::<Vec<_>>(),
                }),
            )
        }
        None => {
            export::write_loans_csv(&loans, &columns, io::stdout().lock())?;
            Ok(Value::Null)
        }
    }
}
