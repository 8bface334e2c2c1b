use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::risk::{classify, RiskCategory, RiskFlags};
use crate::types::{safe_ratio, Money, Rate};
use crate::vintage::{vintage_of, Vintage};

/// One funded advance after normalization. Every instance satisfies the
/// schema: non-empty platform, non-negative money fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub business_name: String,
    pub platform: String,
    pub amount: Money,
    pub fees: Money,
    /// Cumulative repayments; may exceed `amount`.
    pub repaid_amount: Money,
    /// `None` when the source date could not be parsed.
    pub funded_date: Option<NaiveDate>,
    pub flags: RiskFlags,
}

/// A loan record plus the values derived from it. This is the row shape of
/// the loan table handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzedLoan {
    #[serde(flatten)]
    pub record: LoanRecord,
    pub risk_category: RiskCategory,
    pub vintage: Vintage,
    pub repayment_rate: Rate,
}

impl AnalyzedLoan {
    pub fn from_record(record: LoanRecord) -> Self {
        let risk_category = classify(&record.flags);
        let vintage = vintage_of(record.funded_date);
        let repayment_rate = safe_ratio(record.repaid_amount, record.amount);
        Self {
            record,
            risk_category,
            vintage,
            repayment_rate,
        }
    }
}
