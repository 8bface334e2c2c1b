//! Caller-owned view filter. The pipeline never stores a selection; each
//! call passes the current one in.

use serde::{Deserialize, Serialize};

use crate::loan::AnalyzedLoan;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanFilter {
    /// Platforms to keep. Empty keeps every platform.
    pub platforms: Vec<String>,
    /// Case-insensitive substring matched against every rendered column.
    pub search: Option<String>,
}

impl LoanFilter {
    pub fn platform(name: impl Into<String>) -> Self {
        Self {
            platforms: vec![name.into()],
            search: None,
        }
    }

    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn matches(&self, loan: &AnalyzedLoan) -> bool {
        if !self.platforms.is_empty() && !self.platforms.iter().any(|p| *p == loan.record.platform)
        {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let needle = term.to_lowercase();
                searchable_cells(loan)
                    .iter()
                    .any(|cell| cell.to_lowercase().contains(&needle))
            }
        }
    }
}

fn searchable_cells(loan: &AnalyzedLoan) -> Vec<String> {
    let r = &loan.record;
    vec![
        r.business_name.clone(),
        r.platform.clone(),
        r.amount.to_string(),
        r.fees.to_string(),
        r.repaid_amount.to_string(),
        r.funded_date.map(|d| d.to_string()).unwrap_or_default(),
        loan.risk_category.to_string(),
        loan.vintage.to_string(),
    ]
}

/// Loans passing `filter`, in source order.
pub fn apply_filter(loans: &[AnalyzedLoan], filter: &LoanFilter) -> Vec<AnalyzedLoan> {
    loans.iter().filter(|l| filter.matches(l)).cloned().collect()
}
