//! Risk summary reducer and portfolio headline metrics.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::cohort::RiskBreakdown;
use crate::loan::AnalyzedLoan;
use crate::risk::RiskCategory;
use crate::types::{safe_ratio, saturating_sum, Money, Rate};

/// Label of the all-platforms row.
pub const OVERALL: &str = "All Platforms";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRiskRow {
    pub platform: String,
    pub loan_count: u64,
    pub breakdown: RiskBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagCounts {
    pub liquidity_risk: u64,
    pub revenue_drop_risk: u64,
    pub non_payment_risk: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub total_loans: u64,
    /// Loans whose category is anything but No Risk.
    pub total_at_risk: u64,
    pub category_counts: BTreeMap<RiskCategory, u64>,
    /// Raw upstream flag counts, before precedence is applied. A loan with
    /// two flags is counted under both.
    pub flag_counts: FlagCounts,
}

/// Platform × category cross-tab of percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    /// Column order of the cross-tab. Always the four categories.
    pub categories: Vec<RiskCategory>,
    pub by_platform: Vec<PlatformRiskRow>,
    pub overall: PlatformRiskRow,
    pub metrics: RiskMetrics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateDistribution {
    pub count: u64,
    pub min: Rate,
    pub median: Rate,
    pub max: Rate,
    pub mean: Rate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRepayment {
    pub platform: String,
    pub loan_count: u64,
    pub total_amount: Money,
    pub total_repaid: Money,
    pub repayment_rate: Rate,
    /// Spread of per-loan repayment rates.
    pub rate_distribution: RateDistribution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioOverview {
    pub total_deployed: Money,
    pub active_advances: u64,
    pub total_repaid: Money,
    pub total_fees: Money,
    pub overall_repayment_rate: Rate,
    pub loans_at_risk: u64,
    pub platforms: Vec<PlatformRepayment>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Cross-tabulate risk category against platform. Percentages in every
/// non-empty row sum to 100. Empty input yields no platform rows, an
/// all-zero overall row and the full category column list.
pub fn summarize_risk(loans: &[AnalyzedLoan]) -> RiskSummary {
    let by_platform = group_by_platform(loans)
        .into_iter()
        .map(|(platform, members)| PlatformRiskRow {
            platform: platform.to_string(),
            loan_count: members.len() as u64,
            breakdown: RiskBreakdown::from_loans(members),
        })
        .collect();

    let overall = PlatformRiskRow {
        platform: OVERALL.to_string(),
        loan_count: loans.len() as u64,
        breakdown: RiskBreakdown::from_loans(loans),
    };

    RiskSummary {
        categories: RiskCategory::ALL.to_vec(),
        by_platform,
        metrics: risk_metrics(loans),
        overall,
    }
}

pub fn risk_metrics(loans: &[AnalyzedLoan]) -> RiskMetrics {
    let mut category_counts: BTreeMap<RiskCategory, u64> =
        RiskCategory::ALL.into_iter().map(|c| (c, 0)).collect();
    let mut flag_counts = FlagCounts::default();

    for loan in loans {
        *category_counts.entry(loan.risk_category).or_default() += 1;
        let f = &loan.record.flags;
        flag_counts.liquidity_risk += u64::from(f.liquidity_risk);
        flag_counts.revenue_drop_risk += u64::from(f.revenue_drop_risk);
        flag_counts.non_payment_risk += u64::from(f.non_payment_risk);
    }

    RiskMetrics {
        total_loans: loans.len() as u64,
        total_at_risk: loans.iter().filter(|l| l.risk_category.is_at_risk()).count() as u64,
        category_counts,
        flag_counts,
    }
}

/// Headline portfolio figures plus per-platform repayment spread.
pub fn portfolio_overview(loans: &[AnalyzedLoan]) -> PortfolioOverview {
    let total_deployed: Money = saturating_sum(loans.iter().map(|l| l.record.amount));
    let total_repaid: Money = saturating_sum(loans.iter().map(|l| l.record.repaid_amount));
    let total_fees: Money = saturating_sum(loans.iter().map(|l| l.record.fees));

    let platforms = group_by_platform(loans)
        .into_iter()
        .map(|(platform, members)| {
            let amount: Money = saturating_sum(members.iter().map(|l| l.record.amount));
            let repaid: Money = saturating_sum(members.iter().map(|l| l.record.repaid_amount));
            let rates: Vec<Rate> = members.iter().map(|l| l.repayment_rate).collect();
            PlatformRepayment {
                platform: platform.to_string(),
                loan_count: members.len() as u64,
                total_amount: amount,
                total_repaid: repaid,
                repayment_rate: safe_ratio(repaid, amount),
                rate_distribution: distribution(rates),
            }
        })
        .collect();

    PortfolioOverview {
        total_deployed,
        active_advances: loans.len() as u64,
        total_repaid,
        total_fees,
        overall_repayment_rate: safe_ratio(total_repaid, total_deployed),
        loans_at_risk: loans.iter().filter(|l| l.risk_category.is_at_risk()).count() as u64,
        platforms,
    }
}

/// At-risk loans, most severe category first, then by business name.
pub fn high_risk_loans(loans: &[AnalyzedLoan], limit: usize) -> Vec<AnalyzedLoan> {
    let mut at_risk: Vec<&AnalyzedLoan> =
        loans.iter().filter(|l| l.risk_category.is_at_risk()).collect();
    at_risk.sort_by(|a, b| {
        b.risk_category
            .severity()
            .cmp(&a.risk_category.severity())
            .then_with(|| a.record.business_name.cmp(&b.record.business_name))
    });
    at_risk.into_iter().take(limit).cloned().collect()
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn group_by_platform(loans: &[AnalyzedLoan]) -> BTreeMap<&str, Vec<&AnalyzedLoan>> {
    let mut groups: BTreeMap<&str, Vec<&AnalyzedLoan>> = BTreeMap::new();
    for loan in loans {
        groups.entry(loan.record.platform.as_str()).or_default().push(loan);
    }
    groups
}

fn distribution(mut rates: Vec<Rate>) -> RateDistribution {
    if rates.is_empty() {
        return RateDistribution {
            count: 0,
            min: Decimal::ZERO,
            median: Decimal::ZERO,
            max: Decimal::ZERO,
            mean: Decimal::ZERO,
        };
    }
    rates.sort();
    let n = rates.len();
    let median = if n % 2 == 1 {
        rates[n / 2]
    } else {
        rates[n / 2 - 1].saturating_add(rates[n / 2]) / dec!(2)
    };
    let sum = saturating_sum(rates.iter().copied());
    RateDistribution {
        count: n as u64,
        min: rates[0],
        median,
        max: rates[n - 1],
        mean: sum / Decimal::from(n as u64),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
