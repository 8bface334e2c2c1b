//! CSV read/write at the edges of the pipeline.
//!
//! Reading produces the untyped [`RawTable`] the normalizer expects; writing
//! emits exactly the selected loan-table columns in the selected order.

use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;

use crate::loan::AnalyzedLoan;
use crate::table::RawTable;
use crate::{LoanRiskError, LoanRiskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanColumn {
    BusinessName,
    Platform,
    Amount,
    Fees,
    RepaidAmount,
    FundedDate,
    LiquidityRisk,
    RevenueDropRisk,
    NonPaymentRisk,
    RiskCategory,
    Vintage,
    RepaymentRate,
}

/// Columns shown when the caller has not picked any.
pub const DEFAULT_COLUMNS: [LoanColumn; 5] = [
    LoanColumn::BusinessName,
    LoanColumn::Platform,
    LoanColumn::Amount,
    LoanColumn::RepaidAmount,
    LoanColumn::RiskCategory,
];

impl LoanColumn {
    pub const ALL: [LoanColumn; 12] = [
        LoanColumn::BusinessName,
        LoanColumn::Platform,
        LoanColumn::Amount,
        LoanColumn::Fees,
        LoanColumn::RepaidAmount,
        LoanColumn::FundedDate,
        LoanColumn::LiquidityRisk,
        LoanColumn::RevenueDropRisk,
        LoanColumn::NonPaymentRisk,
        LoanColumn::RiskCategory,
        LoanColumn::Vintage,
        LoanColumn::RepaymentRate,
    ];

    pub fn header(self) -> &'static str {
        match self {
            LoanColumn::BusinessName => "business_name",
            LoanColumn::Platform => "platform",
            LoanColumn::Amount => "amount",
            LoanColumn::Fees => "fees",
            LoanColumn::RepaidAmount => "repaid_amount",
            LoanColumn::FundedDate => "funded_date",
            LoanColumn::LiquidityRisk => "liquidity_risk",
            LoanColumn::RevenueDropRisk => "revenue_drop_risk",
            LoanColumn::NonPaymentRisk => "non_payment_risk",
            LoanColumn::RiskCategory => "risk_category",
            LoanColumn::Vintage => "vintage",
            LoanColumn::RepaymentRate => "repayment_rate",
        }
    }

    pub fn render(self, loan: &AnalyzedLoan) -> String {
        let r = &loan.record;
        match self {
            LoanColumn::BusinessName => r.business_name.clone(),
            LoanColumn::Platform => r.platform.clone(),
            LoanColumn::Amount => r.amount.to_string(),
            LoanColumn::Fees => r.fees.to_string(),
            LoanColumn::RepaidAmount => r.repaid_amount.to_string(),
            LoanColumn::FundedDate => r
                .funded_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            LoanColumn::LiquidityRisk => r.flags.liquidity_risk.to_string(),
            LoanColumn::RevenueDropRisk => r.flags.revenue_drop_risk.to_string(),
            LoanColumn::NonPaymentRisk => r.flags.non_payment_risk.to_string(),
            LoanColumn::RiskCategory => loan.risk_category.to_string(),
            LoanColumn::Vintage => loan.vintage.to_string(),
            LoanColumn::RepaymentRate => loan.repayment_rate.normalize().to_string(),
        }
    }
}

impl FromStr for LoanColumn {
    type Err = LoanRiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        LoanColumn::ALL
            .into_iter()
            .find(|c| c.header().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| LoanRiskError::InvalidInput {
                field: "columns".into(),
                reason: format!("unknown column '{wanted}'"),
            })
    }
}

/// Parse a comma-separated column list. Blank input selects the defaults.
pub fn parse_columns(list: &str) -> LoanRiskResult<Vec<LoanColumn>> {
    if list.trim().is_empty() {
        return Ok(DEFAULT_COLUMNS.to_vec());
    }
    list.split(',').map(LoanColumn::from_str).collect()
}

/// Write `loans` as CSV with a header row of the selected columns.
pub fn write_loans_csv<W: Write>(
    loans: &[AnalyzedLoan],
    columns: &[LoanColumn],
    writer: W,
) -> LoanRiskResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(columns.iter().map(|c| c.header()))?;
    for loan in loans {
        wtr.write_record(columns.iter().map(|c| c.render(loan)))?;
    }
    wtr.flush().map_err(|e| LoanRiskError::Csv(e.to_string()))?;
    Ok(())
}

pub fn loans_to_csv_string(
    loans: &[AnalyzedLoan],
    columns: &[LoanColumn],
) -> LoanRiskResult<String> {
    let mut buf = Vec::new();
    write_loans_csv(loans, columns, &mut buf)?;
    String::from_utf8(buf).map_err(|e| LoanRiskError::Csv(e.to_string()))
}

/// Read CSV into a [`RawTable`]. Rows keep whatever cell count they have;
/// the normalizer decides what to do with ragged ones.
pub fn read_raw_table<R: Read>(reader: R) -> LoanRiskResult<RawTable> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(RawTable::new(headers, rows))
}
