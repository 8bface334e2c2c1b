//! End-to-end pipeline: normalize → classify once per source, then
//! filter → aggregate → reduce on every view change.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::cohort::{aggregate_cohorts, CohortSummary, GroupBy};
use crate::config::{CanonicalField, NormalizerConfig};
use crate::filter::{apply_filter, LoanFilter};
use crate::loan::AnalyzedLoan;
use crate::normalize::{normalize, NormalizedTable, RowIssue};
use crate::summary::{portfolio_overview, summarize_risk, PortfolioOverview, RiskSummary};
use crate::table::RawTable;
use crate::types::{with_metadata, ComputationOutput};
use crate::{LoanRiskError, LoanRiskResult};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub schema_version: String,
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
    pub rows_defaulted: usize,
    pub resolved_columns: BTreeMap<CanonicalField, String>,
    pub unresolved_optional: Vec<CanonicalField>,
    pub issues: Vec<RowIssue>,
    pub warnings: Vec<String>,
}

/// The analyzed loan table for one source. Built once, then only read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBook {
    pub loans: Vec<AnalyzedLoan>,
    /// Distinct platforms, sorted.
    pub platforms: Vec<String>,
    pub report: LoadReport,
}

impl LoanBook {
    pub fn load(table: &RawTable, config: &NormalizerConfig) -> LoanRiskResult<Self> {
        let normalized = normalize(table, config)?;
        Ok(Self::from_normalized(normalized, &config.schema_version))
    }

    pub fn from_normalized(normalized: NormalizedTable, schema_version: &str) -> Self {
        let warnings = normalized.summary_warnings();
        let NormalizedTable {
            records,
            issues,
            rows_read,
            rows_dropped,
            rows_defaulted,
            resolved_columns,
            unresolved_optional,
        } = normalized;

        let loans: Vec<AnalyzedLoan> = records.into_iter().map(AnalyzedLoan::from_record).collect();
        let platforms: Vec<String> = loans
            .iter()
            .map(|l| l.record.platform.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self {
            report: LoadReport {
                schema_version: schema_version.to_string(),
                rows_read,
                rows_kept: loans.len(),
                rows_dropped,
                rows_defaulted,
                resolved_columns,
                unresolved_optional,
                issues,
                warnings,
            },
            loans,
            platforms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }
}

/// Everything the presentation layer renders for one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub loans: Vec<AnalyzedLoan>,
    pub cohorts: Vec<CohortSummary>,
    pub risk_summary: RiskSummary,
    pub overview: PortfolioOverview,
    /// Set when the load failed; outputs are then empty but well-formed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub diagnostic: Option<String>,
}

impl PipelineOutput {
    /// Empty-state result for a load that could not be completed.
    pub fn failed(err: &LoanRiskError) -> Self {
        let mut out = run_pipeline(&LoanBook::default(), &LoanFilter::default(), GroupBy::Vintage);
        out.diagnostic = Some(err.to_string());
        out
    }

    pub fn is_failed(&self) -> bool {
        self.diagnostic.is_some()
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Pure projection of `book` under `filter`. Same inputs, same output.
pub fn run_pipeline(book: &LoanBook, filter: &LoanFilter, group_by: GroupBy) -> PipelineOutput {
    let loans = apply_filter(&book.loans, filter);
    PipelineOutput {
        cohorts: aggregate_cohorts(&loans, group_by),
        risk_summary: summarize_risk(&loans),
        overview: portfolio_overview(&loans),
        loans,
        diagnostic: None,
    }
}

/// Load `table` and run one view over it, wrapped in the standard envelope.
pub fn analyze_portfolio(
    table: &RawTable,
    config: &NormalizerConfig,
    filter: &LoanFilter,
    group_by: GroupBy,
) -> LoanRiskResult<ComputationOutput<PipelineOutput>> {
    let start = Instant::now();
    let book = LoanBook::load(table, config)?;
    let output = run_pipeline(&book, filter, group_by);
    Ok(envelope(&book, config, filter, group_by, output, start))
}

/// Like [`analyze_portfolio`] but never fails: a load error becomes an
/// empty result carrying the diagnostic.
pub fn analyze_or_empty(
    table: &RawTable,
    config: &NormalizerConfig,
    filter: &LoanFilter,
    group_by: GroupBy,
) -> ComputationOutput<PipelineOutput> {
    let start = Instant::now();
    match LoanBook::load(table, config) {
        Ok(book) => {
            let output = run_pipeline(&book, filter, group_by);
            envelope(&book, config, filter, group_by, output, start)
        }
        Err(e) => {
            log::warn!("load failed: {e}");
            let mut out = envelope(
                &LoanBook::default(),
                config,
                filter,
                group_by,
                PipelineOutput::failed(&e),
                start,
            );
            out.warnings.push(e.to_string());
            out
        }
    }
}

/// Wrap a view result in the standard envelope, recording the load and
/// filter assumptions it was computed under.
pub fn envelope<T: Serialize>(
    book: &LoanBook,
    config: &NormalizerConfig,
    filter: &LoanFilter,
    group_by: GroupBy,
    result: T,
    start: Instant,
) -> ComputationOutput<T> {
    let assumptions = serde_json::json!({
        "schema_version": config.schema_version,
        "scale": config.scale,
        "default_platform": config.default_platform,
        "risk_precedence": ["Non-Payment Risk", "Revenue Drop Risk", "Liquidity Risk", "No Risk"],
        "group_by": group_by,
        "filter": filter,
        "rows_read": book.report.rows_read,
        "rows_dropped": book.report.rows_dropped,
    });
    with_metadata(
        "Loan Risk Categorisation & Vintage Cohort Analysis",
        &assumptions,
        book.report.warnings.clone(),
        start.elapsed().as_micros() as u64,
        result,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskCategory;
    use rust_decimal_macros::dec;

    fn table() -> RawTable {
        RawTable::from_rows(
            &[
                "SMB Name",
                "Embedded Platform Name",
                "Loan Amount",
                "Loan Funded On",
                "Repaid Total So Far",
                "Non-Payment Risk",
            ],
            &[
                &["Acme", "Toast", "1000", "2024-01-15", "500", "0"],
                &["Bolt", "Shopify", "2000", "2024-02-01", "1000", "1"],
                &["Crux", "Toast", "x", "2024-02-01", "1000", "1"],
            ],
        )
    }

    #[test]
    fn test_book_load_report() {
        let book = LoanBook::load(&table(), &NormalizerConfig::default()).unwrap();
        assert_eq!(book.loans.len(), 2);
        assert_eq!(book.platforms, vec!["Shopify", "Toast"]);
        assert_eq!(book.report.rows_read, 3);
        assert_eq!(book.report.rows_dropped, 1);
        assert_eq!(book.report.rows_kept, 2);
        assert_eq!(book.report.warnings.len(), 1 + book.report.unresolved_optional.len());
    }

    #[test]
    fn test_run_pipeline_respects_filter() {
        let book = LoanBook::load(&table(), &NormalizerConfig::default()).unwrap();
        let out = run_pipeline(&book, &LoanFilter::platform("Shopify"), GroupBy::Vintage);
        assert_eq!(out.loans.len(), 1);
        assert_eq!(out.cohorts.len(), 1);
        assert_eq!(out.cohorts[0].total_amount, dec!(2000));
        assert_eq!(out.risk_summary.metrics.total_at_risk, 1);
        assert_eq!(
            out.risk_summary.overall.breakdown.pct(RiskCategory::NonPaymentRisk),
            dec!(100)
        );
        // the book itself is untouched
        assert_eq!(book.loans.len(), 2);
    }

    #[test]
    fn test_failed_load_is_empty_but_well_formed() {
        let bad = RawTable::from_rows(&["name", "value"], &[&["a", "1"]]);
        let out = analyze_or_empty(
            &bad,
            &NormalizerConfig::default(),
            &LoanFilter::default(),
            GroupBy::Vintage,
        );
        assert!(out.result.is_failed());
        assert!(out.result.loans.is_empty());
        assert!(out.result.cohorts.is_empty());
        assert_eq!(out.result.risk_summary.categories.len(), 4);
        assert!(out.warnings.iter().any(|w| w.contains("business_name")));
    }

    #[test]
    fn test_analyze_portfolio_propagates_schema_error() {
        let bad = RawTable::from_rows(&["name"], &[]);
        let err = analyze_portfolio(
            &bad,
            &NormalizerConfig::default(),
            &LoanFilter::default(),
            GroupBy::Vintage,
        )
        .unwrap_err();
        assert!(err.is_schema());
    }
}
