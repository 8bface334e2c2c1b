//! Vintage keys: the calendar quarter a loan was funded in.
//!
//! Ordering always goes through the decoded `(year, quarter)` pair, never
//! through the display string, so "Q4 2023" < "Q1 2024" and `Unknown`
//! sorts after every dated cohort.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::LoanRiskError;

pub const UNKNOWN_VINTAGE: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Vintage {
    Quarter { year: i32, quarter: u8 },
    Unknown,
}

impl Vintage {
    pub fn from_date(date: NaiveDate) -> Self {
        Vintage::Quarter {
            year: date.year(),
            quarter: ((date.month() - 1) / 3 + 1) as u8,
        }
    }
}

/// Vintage for an optional funded date; missing dates map to `Unknown`.
pub fn vintage_of(date: Option<NaiveDate>) -> Vintage {
    date.map(Vintage::from_date).unwrap_or(Vintage::Unknown)
}

impl std::fmt::Display for Vintage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Vintage::Quarter { year, quarter } => write!(f, "Q{quarter} {year}"),
            Vintage::Unknown => write!(f, "{UNKNOWN_VINTAGE}"),
        }
    }
}

impl FromStr for Vintage {
    type Err = LoanRiskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(UNKNOWN_VINTAGE) {
            return Ok(Vintage::Unknown);
        }

        let invalid = || LoanRiskError::InvalidInput {
            field: "vintage".into(),
            reason: format!("expected 'Q<1-4> <year>' or '{UNKNOWN_VINTAGE}', got '{s}'"),
        };

        let (q, year) = s.split_once(char::is_whitespace).ok_or_else(invalid)?;
        let quarter: u8 = q
            .strip_prefix(['Q', 'q'])
            .and_then(|n| n.parse().ok())
            .filter(|n| (1..=4).contains(n))
            .ok_or_else(invalid)?;
        let year: i32 = year.trim().parse().map_err(|_| invalid())?;

        Ok(Vintage::Quarter { year, quarter })
    }
}

impl From<Vintage> for String {
    fn from(v: Vintage) -> Self {
        v.to_string()
    }
}

impl TryFrom<String> for Vintage {
    type Error = LoanRiskError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
