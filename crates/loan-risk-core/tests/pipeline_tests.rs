use loan_risk_core::cohort::{aggregate_cohorts, rank_vintages, GroupBy};
use loan_risk_core::config::{FieldScales, NormalizerConfig};
use loan_risk_core::filter::LoanFilter;
use loan_risk_core::normalize::MAX_MONEY;
use loan_risk_core::pipeline::{analyze_portfolio, run_pipeline, LoanBook};
use loan_risk_core::risk::RiskCategory;
use loan_risk_core::summary::summarize_risk;
use loan_risk_core::table::RawTable;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Fixtures
// ===========================================================================

fn portfolio() -> RawTable {
    RawTable::from_rows(
        &[
            "SMB Name",
            "Embedded Platform Name",
            "Loan Amount",
            "Pipe Fees",
            "Loan Funded On",
            "Repaid Total So Far",
            "Liquidity Risk",
            "Revenue Drop Risk",
            "Non-Payment Risk",
        ],
        &[
            &["Maple Dental", "Shopify", "1000", "50", "2024-01-15", "500", "0", "0", "0"],
            &["Oak Coffee", "Shopify", "2000", "100", "2024-03-31", "1000", "1", "0", "0"],
            &["Pine Bikes", "Toast", "5000", "250", "2024-04-01", "6000", "0", "1", "1"],
            &["Elm Books", "Toast", "0", "0", "2023-12-31", "0", "0", "1", "0"],
            &["Ash Tailor", "Mindbody", "3000", "", "unknown", "300", "1", "1", "0"],
            &["Birch Salon", "Mindbody", "not-a-number", "0", "2024-02-02", "0", "0", "0", "1"],
        ],
    )
}

fn book() -> LoanBook {
    LoanBook::load(&portfolio(), &NormalizerConfig::default()).unwrap()
}

// ===========================================================================
// End-to-end properties
// ===========================================================================

#[test]
fn test_pipeline_drops_and_counts_bad_rows() {
    let b = book();
    assert_eq!(b.report.rows_read, 6);
    assert_eq!(b.report.rows_dropped, 1);
    assert_eq!(b.loans.len(), 5);
    assert!(b.loans.iter().all(|l| l.record.business_name != "Birch Salon"));
}

#[test]
fn test_vintages_in_chronological_order() {
    let out = run_pipeline(&book(), &LoanFilter::default(), GroupBy::Vintage);
    let keys: Vec<String> = out.cohorts.iter().map(|c| c.vintage.to_string()).collect();
    assert_eq!(keys, vec!["Q4 2023", "Q1 2024", "Q2 2024", "Unknown"]);
}

#[test]
fn test_cohort_totals_for_q1() {
    let out = run_pipeline(&book(), &LoanFilter::default(), GroupBy::Vintage);
    let q1 = out
        .cohorts
        .iter()
        .find(|c| c.vintage.to_string() == "Q1 2024")
        .unwrap();
    assert_eq!(q1.total_amount, dec!(3000));
    assert_eq!(q1.total_repaid, dec!(1500));
    assert_eq!(q1.repayment_rate, dec!(0.5));
    assert_eq!(q1.loan_count, 2);
    assert_eq!(q1.risk_breakdown.count(RiskCategory::LiquidityRisk), 1);
    assert_eq!(q1.risk_breakdown.count(RiskCategory::NonPaymentRisk), 0);
}

#[test]
fn test_zero_amount_cohort_is_safe() {
    let out = run_pipeline(&book(), &LoanFilter::default(), GroupBy::Vintage);
    let q4 = &out.cohorts[0];
    assert_eq!(q4.total_amount, Decimal::ZERO);
    assert_eq!(q4.repayment_rate, Decimal::ZERO);
}

#[test]
fn test_over_repayment_is_valid() {
    let b = book();
    let pine = b
        .loans
        .iter()
        .find(|l| l.record.business_name == "Pine Bikes")
        .unwrap();
    assert_eq!(pine.repayment_rate, dec!(1.2));
    assert_eq!(pine.risk_category, RiskCategory::NonPaymentRisk);
}

#[test]
fn test_every_breakdown_is_complete() {
    let out = run_pipeline(&book(), &LoanFilter::default(), GroupBy::VintagePlatform);
    for cohort in &out.cohorts {
        let keys: Vec<RiskCategory> = cohort.risk_breakdown.iter().map(|(c, _)| *c).collect();
        assert_eq!(keys, RiskCategory::ALL.to_vec());
    }
}

#[test]
fn test_percentage_closure_per_platform() {
    let summary = summarize_risk(&book().loans);
    for row in &summary.by_platform {
        let total: Decimal = RiskCategory::ALL.iter().map(|c| row.breakdown.pct(*c)).sum();
        assert!((total - dec!(100)).abs() < dec!(0.000001), "{}", row.platform);
    }
}

#[test]
fn test_headline_metrics() {
    let out = run_pipeline(&book(), &LoanFilter::default(), GroupBy::Vintage);
    let m = &out.risk_summary.metrics;
    assert_eq!(m.total_loans, 5);
    assert_eq!(m.total_at_risk, 4);
    assert_eq!(m.category_counts[&RiskCategory::RevenueDropRisk], 2);
    assert_eq!(out.overview.total_deployed, dec!(11000));
    assert_eq!(out.overview.loans_at_risk, 4);
}

#[test]
fn test_idempotent_over_same_input() {
    let b = book();
    let filter = LoanFilter::default().with_search("shopify");
    let first = run_pipeline(&b, &filter, GroupBy::VintagePlatform);
    let second = run_pipeline(&b, &filter, GroupBy::VintagePlatform);
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    let reloaded = book();
    assert_eq!(b, reloaded);
}

#[test]
fn test_empty_input_every_component() {
    let empty = RawTable::default();
    let out = analyze_portfolio(
        &empty,
        &NormalizerConfig::default(),
        &LoanFilter::default(),
        GroupBy::VintagePlatform,
    )
    .unwrap();
    let r = &out.result;
    assert!(r.loans.is_empty());
    assert!(r.cohorts.is_empty());
    assert!(r.risk_summary.by_platform.is_empty());
    assert_eq!(r.risk_summary.categories, RiskCategory::ALL.to_vec());
    assert_eq!(r.overview.active_advances, 0);
    assert_eq!(r.overview.overall_repayment_rate, Decimal::ZERO);
    assert!(!r.is_failed());
}

#[test]
fn test_header_only_input_is_empty_not_error() {
    let header_only = RawTable::from_rows(
        &["SMB Name", "Loan Amount", "Repaid Amount", "Loan Funded On"],
        &[],
    );
    let b = LoanBook::load(&header_only, &NormalizerConfig::default()).unwrap();
    assert!(b.is_empty());
    assert!(aggregate_cohorts(&b.loans, GroupBy::Vintage).is_empty());
}

#[test]
fn test_filter_by_platform_and_rank() {
    let out = run_pipeline(&book(), &LoanFilter::platform("Toast"), GroupBy::Vintage);
    assert_eq!(out.loans.len(), 2);
    let ranked = rank_vintages(&out.cohorts, RiskCategory::NonPaymentRisk, 3);
    assert_eq!(ranked[0].vintage.to_string(), "Q2 2024");
    assert_eq!(ranked[0].risk_breakdown.pct(RiskCategory::NonPaymentRisk), dec!(100));
}

#[test]
fn test_envelope_carries_warnings() {
    let out = analyze_portfolio(
        &portfolio(),
        &NormalizerConfig::default(),
        &LoanFilter::default(),
        GroupBy::Vintage,
    )
    .unwrap();
    assert!(out.warnings.iter().any(|w| w.contains("1 of 6 rows dropped")));
    assert_eq!(out.assumptions["rows_dropped"], 1);
    assert_eq!(out.metadata.precision, "rust_decimal_128bit");
}

// ===========================================================================
// Extreme but well-formed money values
// ===========================================================================

fn extreme_portfolio() -> RawTable {
    RawTable::from_rows(
        &["SMB Name", "Loan Amount", "Repaid Amount", "Loan Funded On", "Non-Payment Risk"],
        &[
            &["Dust Mite Co", "0.000000000000000001", "100000000000", "2023-11-10", "0"],
            &["Max Out LLC", "79228162514264337593543950335", "0", "2024-01-11", "1"],
            &["Whale One", "1000000000000000", "1000000000000000", "2024-02-01", "1"],
            &["Whale Two", "1000000000000000", "0", "2024-02-02", "0"],
            &["Whale Three", "5e28", "0", "2024-02-03", "0"],
        ],
    )
}

#[test]
fn test_extreme_values_never_fault_after_load() {
    let b = LoanBook::load(&extreme_portfolio(), &NormalizerConfig::default()).unwrap();
    assert_eq!(b.report.rows_read, 5);
    assert_eq!(b.report.rows_dropped, 2);
    assert_eq!(b.loans.len(), 3);
    assert!(b.loans.iter().all(|l| l.record.amount <= MAX_MONEY));

    let dust = &b.loans[0];
    assert_eq!(dust.record.business_name, "Dust Mite Co");
    assert_eq!(dust.repayment_rate, Decimal::ZERO);

    for group_by in [GroupBy::Vintage, GroupBy::VintagePlatform] {
        let out = run_pipeline(&b, &LoanFilter::default(), group_by);
        assert_eq!(out.loans.len(), 3);
        let deployed = out.overview.total_deployed;
        assert!(deployed >= dec!(2000000000000000) && deployed < dec!(2000000000000001));
        assert_eq!(out.risk_summary.metrics.total_at_risk, 1);
    }

    let cohorts = aggregate_cohorts(&b.loans, GroupBy::Vintage);
    assert_eq!(cohorts[1].total_amount, dec!(2000000000000000));
    assert_eq!(cohorts[1].repayment_rate, dec!(0.5));
}

#[test]
fn test_scale_overflow_is_counted_not_raised() {
    let config = NormalizerConfig::default().with_scale(FieldScales::uniform(dec!(10)));
    let out = analyze_portfolio(
        &extreme_portfolio(),
        &config,
        &LoanFilter::default(),
        GroupBy::Vintage,
    )
    .unwrap();
    assert_eq!(out.result.loans.len(), 1);
    assert_eq!(out.result.loans[0].repayment_rate, Decimal::ZERO);
    assert_eq!(out.assumptions["rows_dropped"], 4);
    assert!(out.warnings.iter().any(|w| w.contains("4 of 5 rows dropped")));
}
