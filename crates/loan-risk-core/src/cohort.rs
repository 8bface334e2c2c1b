//! Vintage cohort aggregation.
//!
//! Groups analyzed loans by funding quarter (optionally also platform) and
//! rolls up sums, counts, the repayment rate and a complete risk breakdown.
//! Output order is chronological by decoded `(year, quarter)`, then
//! platform name; `Unknown` vintages come last.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::loan::AnalyzedLoan;
use crate::risk::RiskCategory;
use crate::types::{percent_of, safe_ratio, saturating_sum, Money, Percent, Rate};
use crate::vintage::Vintage;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Vintage,
    VintagePlatform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub count: u64,
    /// Share of the group, 0..=100. 0 for an empty group.
    pub pct: Percent,
}

/// Count and share per risk category. Always holds all four categories,
/// zero-filled where a group has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RiskBreakdown(BTreeMap<RiskCategory, CategoryShare>);

impl RiskBreakdown {
    pub fn from_loans<'a>(loans: impl IntoIterator<Item = &'a AnalyzedLoan>) -> Self {
        let mut counts = [0u64; 4];
        for loan in loans {
            counts[loan.risk_category.severity() as usize] += 1;
        }
        Self::from_counts(counts)
    }

    /// `counts` indexed by [`RiskCategory::severity`].
    pub fn from_counts(counts: [u64; 4]) -> Self {
        let total: u64 = counts.iter().sum();
        let map = RiskCategory::ALL
            .into_iter()
            .map(|c| {
                let count = counts[c.severity() as usize];
                (
                    c,
                    CategoryShare {
                        count,
                        pct: percent_of(count, total),
                    },
                )
            })
            .collect();
        Self(map)
    }

    pub fn count(&self, category: RiskCategory) -> u64 {
        self.0.get(&category).map(|s| s.count).unwrap_or(0)
    }

    pub fn pct(&self, category: RiskCategory) -> Percent {
        self.0.get(&category).map(|s| s.pct).unwrap_or(Decimal::ZERO)
    }

    pub fn total(&self) -> u64 {
        self.0.values().map(|s| s.count).sum()
    }

    pub fn at_risk(&self) -> u64 {
        self.total() - self.count(RiskCategory::NoRisk)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RiskCategory, &CategoryShare)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub vintage: Vintage,
    /// Present only for platform-level groupings.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub platform: Option<String>,
    pub loan_count: u64,
    pub total_amount: Money,
    pub total_repaid: Money,
    pub total_fees: Money,
    /// total_repaid / total_amount; 0 when nothing was funded.
    pub repayment_rate: Rate,
    pub risk_breakdown: RiskBreakdown,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Roll loans up into cohorts. Empty input yields an empty vector.
pub fn aggregate_cohorts(loans: &[AnalyzedLoan], group_by: GroupBy) -> Vec<CohortSummary> {
    let mut groups: BTreeMap<(Vintage, Option<&str>), Vec<&AnalyzedLoan>> = BTreeMap::new();
    for loan in loans {
        let platform = match group_by {
            GroupBy::Vintage => None,
            GroupBy::VintagePlatform => Some(loan.record.platform.as_str()),
        };
        groups.entry((loan.vintage, platform)).or_default().push(loan);
    }

    groups
        .into_iter()
        .map(|((vintage, platform), members)| summarize(vintage, platform, &members))
        .collect()
}

fn summarize(
    vintage: Vintage,
    platform: Option<&str>,
    members: &[&AnalyzedLoan],
) -> CohortSummary {
    let total_amount: Money = saturating_sum(members.iter().map(|l| l.record.amount));
    let total_repaid: Money =
        saturating_sum(members.iter().map(|l| l.record.repaid_amount));
    let total_fees: Money = saturating_sum(members.iter().map(|l| l.record.fees));

    CohortSummary {
        vintage,
        platform: platform.map(str::to_string),
        loan_count: members.len() as u64,
        total_amount,
        total_repaid,
        total_fees,
        repayment_rate: safe_ratio(total_repaid, total_amount),
        risk_breakdown: RiskBreakdown::from_loans(members.iter().copied()),
    }
}

/// Cohorts ordered by the share of `category`, highest first. Ties keep
/// chronological order. At most `limit` entries.
pub fn rank_vintages(
    cohorts: &[CohortSummary],
    category: RiskCategory,
    limit: usize,
) -> Vec<CohortSummary> {
    let mut ranked: Vec<CohortSummary> = cohorts.to_vec();
    ranked.sort_by(|a, b| {
        b.risk_breakdown
            .pct(category)
            .cmp(&a.risk_breakdown.pct(category))
            .then_with(|| a.vintage.cmp(&b.vintage))
            .then_with(|| a.platform.cmp(&b.platform))
    });
    ranked.truncate(limit);
    ranked
}

/// Drill-down rows for one vintage, optionally restricted to a category.
pub fn loans_in_vintage(
    loans: &[AnalyzedLoan],
    vintage: Vintage,
    category: Option<RiskCategory>,
    limit: usize,
) -> Vec<AnalyzedLoan> {
    loans
        .iter()
        .filter(|l| l.vintage == vintage)
        .filter(|l| category.map_or(true, |c| l.risk_category == c))
        .take(limit)
        .cloned()
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
