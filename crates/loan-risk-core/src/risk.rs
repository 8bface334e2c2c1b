//! Risk classification.
//!
//! Upstream signal detection raises three independent flags per loan. The
//! classifier collapses them into exactly one category, highest severity
//! first: non-payment, then revenue drop, then liquidity.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::LoanRiskError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskCategory {
    #[serde(rename = "No Risk")]
    NoRisk,
    #[serde(rename = "Liquidity Risk")]
    LiquidityRisk,
    #[serde(rename = "Revenue Drop Risk")]
    RevenueDropRisk,
    #[serde(rename = "Non-Payment Risk")]
    NonPaymentRisk,
}

impl RiskCategory {
    /// All categories, ascending severity. Every breakdown and cross-tab is
    /// keyed by exactly these four.
    pub const ALL: [RiskCategory; 4] = [
        RiskCategory::NoRisk,
        RiskCategory::LiquidityRisk,
        RiskCategory::RevenueDropRisk,
        RiskCategory::NonPaymentRisk,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RiskCategory::NoRisk => "No Risk",
            RiskCategory::LiquidityRisk => "Liquidity Risk",
            RiskCategory::RevenueDropRisk => "Revenue Drop Risk",
            RiskCategory::NonPaymentRisk => "Non-Payment Risk",
        }
    }

    /// 0 for no risk, 3 for non-payment.
    pub fn severity(self) -> u8 {
        match self {
            RiskCategory::NoRisk => 0,
            RiskCategory::LiquidityRisk => 1,
            RiskCategory::RevenueDropRisk => 2,
            RiskCategory::NonPaymentRisk => 3,
        }
    }

    pub fn is_at_risk(self) -> bool {
        self != RiskCategory::NoRisk
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for RiskCategory {
    type Err = LoanRiskError;

    /// Accepts display labels ("Non-Payment Risk") and snake_case names
    /// ("non_payment_risk"), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded = s.trim().to_ascii_lowercase().replace(['_', '-'], " ");
        let category = match folded.as_str() {
            "no risk" | "none" => RiskCategory::NoRisk,
            "liquidity risk" | "liquidity" => RiskCategory::LiquidityRisk,
            "revenue drop risk" | "revenue drop" => RiskCategory::RevenueDropRisk,
            "non payment risk" | "non payment" => RiskCategory::NonPaymentRisk,
            _ => {
                return Err(LoanRiskError::InvalidInput {
                    field: "risk_category".into(),
                    reason: format!("unknown risk category '{s}'"),
                })
            }
        };
        Ok(category)
    }
}

/// Distress signals as they arrive from upstream detection. Not assumed to
/// be mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RiskFlags {
    pub liquidity_risk: bool,
    pub revenue_drop_risk: bool,
    pub non_payment_risk: bool,
}

impl RiskFlags {
    /// Arguments follow field order: liquidity, revenue drop, non-payment.
    pub fn new(liquidity_risk: bool, revenue_drop_risk: bool, non_payment_risk: bool) -> Self {
        Self {
            liquidity_risk,
            revenue_drop_risk,
            non_payment_risk,
        }
    }
}

/// Collapse the flags into a single category. Total: every flag
/// combination maps to exactly one category.
pub fn classify(flags: &RiskFlags) -> RiskCategory {
    if flags.non_payment_risk {
        RiskCategory::NonPaymentRisk
    } else if flags.revenue_drop_risk {
        RiskCategory::RevenueDropRisk
    } else if flags.liquidity_risk {
        RiskCategory::LiquidityRisk
    } else {
        RiskCategory::NoRisk
    }
}

// ---------------------------------------------------------------------------
// Reference table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCategoryDefinition {
    pub category: RiskCategory,
    pub definition: String,
    pub severity: Severity,
}

/// Plain-language definitions of the at-risk categories, mildest first.
pub fn risk_category_table() -> Vec<RiskCategoryDefinition> {
    vec![
        RiskCategoryDefinition {
            category: RiskCategory::LiquidityRisk,
            definition: "Revenue is stable but overall cash-flow health is deteriorating: \
                         the business may be overleveraged or carrying high expenses. \
                         Repayments still arrive at the expected percentage."
                .into(),
            severity: Severity::Mild,
        },
        RiskCategoryDefinition {
            category: RiskCategory::RevenueDropRisk,
            definition: "Revenue has dropped 50% or more for multiple months, so the \
                         ability to repay is significantly reduced. Some repayments \
                         are still being made."
                .into(),
            severity: Severity::Moderate,
        },
        RiskCategoryDefinition {
            category: RiskCategory::NonPaymentRisk,
            definition: "No revenue for 60+ days and no repayments occurring. Suggests \
                         closure, a platform switch, or severe distress."
                .into(),
            severity: Severity::Severe,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_all_combinations() {
        for np in [false, true] {
            for rd in [false, true] {
                for lq in [false, true] {
                    let got = classify(&RiskFlags::new(lq, rd, np));
                    let expected = if np {
                        RiskCategory::NonPaymentRisk
                    } else if rd {
                        RiskCategory::RevenueDropRisk
                    } else if lq {
                        RiskCategory::LiquidityRisk
                    } else {
                        RiskCategory::NoRisk
                    };
                    assert_eq!(got, expected, "flags np={np} rd={rd} lq={lq}");
                }
            }
        }
    }

    #[test]
    fn test_non_payment_dominates() {
        assert_eq!(
            classify(&RiskFlags::new(true, true, true)),
            RiskCategory::NonPaymentRisk
        );
        assert_eq!(
            classify(&RiskFlags::new(true, true, false)),
            RiskCategory::RevenueDropRisk
        );
        assert_eq!(
            classify(&RiskFlags::new(true, false, false)),
            RiskCategory::LiquidityRisk
        );
        assert_eq!(classify(&RiskFlags::default()), RiskCategory::NoRisk);
    }

    #[test]
    fn test_new_takes_flags_in_field_order() {
        let flags = RiskFlags::new(true, false, false);
        assert!(flags.liquidity_risk);
        assert!(!flags.non_payment_risk);
        assert_eq!(classify(&flags), RiskCategory::LiquidityRisk);
    }

    #[test]
    fn test_label_round_trips_through_from_str() {
        for c in RiskCategory::ALL {
            assert_eq!(c.label().parse::<RiskCategory>().unwrap(), c);
        }
        assert_eq!(
            "non_payment_risk".parse::<RiskCategory>().unwrap(),
            RiskCategory::NonPaymentRisk
        );
        assert!("critical".parse::<RiskCategory>().is_err());
    }

    #[test]
    fn test_serializes_as_label() {
        let json = serde_json::to_string(&RiskCategory::RevenueDropRisk).unwrap();
        assert_eq!(json, "\"Revenue Drop Risk\"");
    }

    #[test]
    fn test_category_table_ordered_by_severity() {
        let table = risk_category_table();
        assert_eq!(table.len(), 3);
        assert!(table
            .windows(2)
            .all(|w| w[0].category.severity() < w[1].category.severity()));
        assert!(table.iter().all(|d| d.category.is_at_risk()));
    }
}
