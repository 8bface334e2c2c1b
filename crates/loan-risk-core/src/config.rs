//! Normalizer configuration: the versioned column-alias table and the
//! explicit unit scale per money field.
//!
//! Source snapshots have shipped with different column spellings and with
//! currency both in raw units and divided by ten. Neither is ever guessed
//! from the data; the caller states it here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{LoanRiskError, LoanRiskResult};

/// Canonical loan-record fields the normalizer resolves from source columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    BusinessName,
    Platform,
    Amount,
    Fees,
    RepaidAmount,
    FundedDate,
    LiquidityRisk,
    RevenueDropRisk,
    NonPaymentRisk,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 9] = [
        CanonicalField::BusinessName,
        CanonicalField::Platform,
        CanonicalField::Amount,
        CanonicalField::Fees,
        CanonicalField::RepaidAmount,
        CanonicalField::FundedDate,
        CanonicalField::LiquidityRisk,
        CanonicalField::RevenueDropRisk,
        CanonicalField::NonPaymentRisk,
    ];

    /// Required fields fail the load when no alias resolves.
    pub fn is_required(self) -> bool {
        matches!(
            self,
            CanonicalField::BusinessName
                | CanonicalField::Amount
                | CanonicalField::RepaidAmount
                | CanonicalField::FundedDate
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::BusinessName => "business_name",
            CanonicalField::Platform => "platform",
            CanonicalField::Amount => "amount",
            CanonicalField::Fees => "fees",
            CanonicalField::RepaidAmount => "repaid_amount",
            CanonicalField::FundedDate => "funded_date",
            CanonicalField::LiquidityRisk => "liquidity_risk",
            CanonicalField::RevenueDropRisk => "revenue_drop_risk",
            CanonicalField::NonPaymentRisk => "non_payment_risk",
        }
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// Config types
// ---------------------------------------------------------------------------

/// Prioritized source-column names per canonical field. First match wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnAliases {
    pub business_name: Vec<String>,
    pub platform: Vec<String>,
    pub amount: Vec<String>,
    pub fees: Vec<String>,
    pub repaid_amount: Vec<String>,
    pub funded_date: Vec<String>,
    pub liquidity_risk: Vec<String>,
    pub revenue_drop_risk: Vec<String>,
    pub non_payment_risk: Vec<String>,
}

/// Multiplier applied to each money field: canonical = raw * scale.
/// A snapshot stored in tenths of a unit uses 10.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldScales {
    pub amount: Decimal,
    pub fees: Decimal,
    pub repaid_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub schema_version: String,
    pub aliases: ColumnAliases,
    pub scale: FieldScales,
    /// chrono format strings, tried in order.
    pub date_formats: Vec<String>,
    pub default_platform: String,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            business_name: names(&["SMB Name", "Business Name", "business_name"]),
            platform: names(&["Embedded Platform Name", "Platform", "platform"]),
            amount: names(&["Loan Amount", "Amount", "amount"]),
            fees: names(&["Pipe Fees", "Fees", "fees"]),
            repaid_amount: names(&[
                "Repaid Total So Far",
                "Repaid Amount",
                "repaid_amount",
                "repayment_amount",
            ]),
            funded_date: names(&["Loan Funded On", "Funded Date", "funded_date", "loan_funded_on"]),
            liquidity_risk: names(&["Liquidity Risk", "liquidity_risk", "liquidity_risk_flag"]),
            revenue_drop_risk: names(&[
                "Revenue Drop Risk",
                "revenue_drop_risk",
                "revenue_drop_flag",
            ]),
            non_payment_risk: names(&[
                "Non-Payment Risk",
                "non_payment_risk",
                "non_payment_flag",
            ]),
        }
    }
}

impl ColumnAliases {
    pub fn for_field(&self, field: CanonicalField) -> &[String] {
        match field {
            CanonicalField::BusinessName => &self.business_name,
            CanonicalField::Platform => &self.platform,
            CanonicalField::Amount => &self.amount,
            CanonicalField::Fees => &self.fees,
            CanonicalField::RepaidAmount => &self.repaid_amount,
            CanonicalField::FundedDate => &self.funded_date,
            CanonicalField::LiquidityRisk => &self.liquidity_risk,
            CanonicalField::RevenueDropRisk => &self.revenue_drop_risk,
            CanonicalField::NonPaymentRisk => &self.non_payment_risk,
        }
    }
}

impl Default for FieldScales {
    fn default() -> Self {
        Self {
            amount: Decimal::ONE,
            fees: Decimal::ONE,
            repaid_amount: Decimal::ONE,
        }
    }
}

impl FieldScales {
    /// Same factor for every money field.
    pub fn uniform(factor: Decimal) -> Self {
        Self {
            amount: factor,
            fees: factor,
            repaid_amount: factor,
        }
    }

    pub fn for_field(&self, field: CanonicalField) -> Decimal {
        match field {
            CanonicalField::Amount => self.amount,
            CanonicalField::Fees => self.fees,
            CanonicalField::RepaidAmount => self.repaid_amount,
            _ => Decimal::ONE,
        }
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            schema_version: "pipe-risk-v2".to_string(),
            aliases: ColumnAliases::default(),
            scale: FieldScales::default(),
            date_formats: names(&["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d-%b-%Y"]),
            default_platform: "Unknown Platform".to_string(),
        }
    }
}

impl NormalizerConfig {
    pub fn with_scale(mut self, scale: FieldScales) -> Self {
        self.scale = scale;
        self
    }

    /// Reject configs the normalizer cannot apply unambiguously.
    pub fn validate(&self) -> LoanRiskResult<()> {
        for field in CanonicalField::ALL {
            if field.is_required() && self.aliases.for_field(field).is_empty() {
                return Err(LoanRiskError::InvalidConfig(format!(
                    "required field '{field}' has no column aliases"
                )));
            }
        }

        for field in [
            CanonicalField::Amount,
            CanonicalField::Fees,
            CanonicalField::RepaidAmount,
        ] {
            if self.scale.for_field(field) <= Decimal::ZERO {
                return Err(LoanRiskError::InvalidConfig(format!(
                    "scale factor for '{field}' must be positive"
                )));
            }
        }

        if self.date_formats.is_empty() {
            return Err(LoanRiskError::InvalidConfig(
                "at least one date format is required".into(),
            ));
        }

        if self.default_platform.trim().is_empty() {
            return Err(LoanRiskError::InvalidConfig(
                "default_platform must not be blank".into(),
            ));
        }

        Ok(())
    }
}
