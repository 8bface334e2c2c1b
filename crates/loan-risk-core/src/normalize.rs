//! Record normalization: raw source table → schema-conforming loan records.
//!
//! This is the only fallible stage of the pipeline. Column resolution
//! failures are fatal for the load; cell-level coercion failures either drop
//! the row (required fields) or default the value (optional fields), and
//! every such decision is recorded as a [`RowIssue`].

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::config::{CanonicalField, NormalizerConfig};
use crate::loan::LoanRecord;
use crate::risk::RiskFlags;
use crate::table::RawTable;
use crate::types::Money;
use crate::{LoanRiskError, LoanRiskResult};

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueAction {
    Dropped,
    Defaulted,
}

/// One coercion decision taken for a source row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssue {
    /// Zero-based data row index (header excluded).
    pub row: usize,
    /// `None` when the whole row was malformed.
    pub field: Option<CanonicalField>,
    pub value: String,
    pub action: IssueAction,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTable {
    pub records: Vec<LoanRecord>,
    pub issues: Vec<RowIssue>,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub rows_defaulted: usize,
    /// Source column actually used for each resolved field.
    pub resolved_columns: BTreeMap<CanonicalField, String>,
    /// Optional fields with no matching column; every row got the default.
    pub unresolved_optional: Vec<CanonicalField>,
}

impl NormalizedTable {
    /// Short human-readable lines describing what coercion did.
    pub fn summary_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.rows_dropped > 0 {
            warnings.push(format!(
                "{} of {} rows dropped: required values missing or unparseable.",
                self.rows_dropped, self.rows_read
            ));
        }
        if self.rows_defaulted > 0 {
            warnings.push(format!(
                "{} rows had optional values defaulted (fees 0, flags false, date Unknown).",
                self.rows_defaulted
            ));
        }
        for field in &self.unresolved_optional {
            warnings.push(format!("No column found for optional field '{field}'; defaulted."));
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Resolve columns and coerce every row of `table` into a [`LoanRecord`].
///
/// A table with no header and no rows is treated as an empty load and
/// yields an empty result; a table whose header lacks a required field
/// fails with [`LoanRiskError::Schema`] even when it has no rows.
pub fn normalize(table: &RawTable, config: &NormalizerConfig) -> LoanRiskResult<NormalizedTable> {
    config.validate()?;

    if table.headers.is_empty() && table.rows.is_empty() {
        return Ok(NormalizedTable::default());
    }

    let columns = resolve_columns(table, config)?;
    let mut out = NormalizedTable {
        rows_read: table.rows.len(),
        resolved_columns: columns
            .iter()
            .map(|(f, idx)| (*f, table.headers[*idx].clone()))
            .collect(),
        unresolved_optional: CanonicalField::ALL
            .into_iter()
            .filter(|f| !columns.contains_key(f))
            .collect(),
        ..NormalizedTable::default()
    };

    for (row_idx, row) in table.rows.iter().enumerate() {
        if row.len() != table.headers.len() {
            out.issues.push(RowIssue {
                row: row_idx,
                field: None,
                value: row.join(","),
                action: IssueAction::Dropped,
                reason: format!(
                    "expected {} cells, found {}",
                    table.headers.len(),
                    row.len()
                ),
            });
            out.rows_dropped += 1;
            log::debug!("row {row_idx}: dropped, ragged row");
            continue;
        }

        let mut coercer = RowCoercer {
            row_idx,
            row,
            columns: &columns,
            config,
            issues: Vec::new(),
        };

        match coercer.coerce() {
            Some(record) => {
                if !coercer.issues.is_empty() {
                    out.rows_defaulted += 1;
                }
                out.records.push(record);
            }
            None => out.rows_dropped += 1,
        }
        out.issues.append(&mut coercer.issues);
    }

    if out.rows_dropped > 0 {
        log::warn!(
            "normalize: dropped {} of {} rows (schema {})",
            out.rows_dropped,
            out.rows_read,
            config.schema_version
        );
    }
    log::info!(
        "normalize: {} records kept, {} defaulted, {} dropped",
        out.records.len(),
        out.rows_defaulted,
        out.rows_dropped
    );

    Ok(out)
}

/// Map each canonical field to a column index. First alias wins; exact
/// header matches are preferred over loose ones.
pub fn resolve_columns(
    table: &RawTable,
    config: &NormalizerConfig,
) -> LoanRiskResult<BTreeMap<CanonicalField, usize>> {
    let mut columns = BTreeMap::new();
    for field in CanonicalField::ALL {
        let aliases = config.aliases.for_field(field);
        let found = aliases
            .iter()
            .find_map(|a| table.column_index(a))
            .or_else(|| aliases.iter().find_map(|a| table.column_index_loose(a)));

        match found {
            Some(idx) => {
                columns.insert(field, idx);
            }
            None if field.is_required() => {
                return Err(LoanRiskError::Schema {
                    field: field.name().to_string(),
                    tried: aliases.to_vec(),
                });
            }
            None => {}
        }
    }
    Ok(columns)
}

// ---------------------------------------------------------------------------
// Cell coercion
// ---------------------------------------------------------------------------

/// Largest accepted money value after scaling. Keeps every downstream sum
/// and ratio inside `Decimal` range.
pub const MAX_MONEY: Money = dec!(1000000000000000);

/// Parse a money cell: optional `$`, thousands separators and whitespace are
/// accepted; negatives and non-numbers are rejected.
pub fn parse_money(raw: &str) -> Option<Money> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let value = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;
    if value < Decimal::ZERO {
        None
    } else {
        Some(value)
    }
}

/// Parse a date cell with the configured formats. Date-time values keep
/// their date part.
pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let try_formats =
        |text: &str| formats.iter().find_map(|f| NaiveDate::parse_from_str(text, f).ok());

    try_formats(s).or_else(|| {
        let date_part = s.split(['T', ' ']).next()?;
        if date_part.len() < s.len() {
            try_formats(date_part)
        } else {
            None
        }
    })
}

/// Parse a flag cell. Blank is false; `None` means unrecognised.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" => Some(false),
        "1" | "1.0" | "true" | "yes" | "y" | "t" => Some(true),
        "0" | "0.0" | "false" | "no" | "n" | "f" => Some(false),
        _ => None,
    }
}

struct RowCoercer<'a> {
    row_idx: usize,
    row: &'a [String],
    columns: &'a BTreeMap<CanonicalField, usize>,
    config: &'a NormalizerConfig,
    issues: Vec<RowIssue>,
}

impl<'a> RowCoercer<'a> {
    fn cell(&self, field: CanonicalField) -> Option<&'a str> {
        let row: &'a [String] = self.row;
        self.columns.get(&field).map(|idx| row[*idx].as_str())
    }

    fn note(&mut self, field: CanonicalField, value: &str, action: IssueAction, reason: &str) {
        log::debug!(
            "row {}: {:?} {field} (value {value:?}): {reason}",
            self.row_idx,
            action
        );
        self.issues.push(RowIssue {
            row: self.row_idx,
            field: Some(field),
            value: value.to_string(),
            action,
            reason: reason.to_string(),
        });
    }

    /// Parse and scale one money cell.
    fn money(&self, field: CanonicalField, raw: &str) -> Result<Money, &'static str> {
        let value = parse_money(raw).ok_or("not a non-negative number")?;
        value
            .checked_mul(self.config.scale.for_field(field))
            .filter(|scaled| *scaled <= MAX_MONEY)
            .map(|scaled| scaled.normalize())
            .ok_or("exceeds the maximum money value after scaling")
    }

    fn required_money(&mut self, field: CanonicalField) -> Option<Money> {
        let raw = self.cell(field).unwrap_or_default().to_string();
        match self.money(field, &raw) {
            Ok(v) => Some(v),
            Err(reason) => {
                self.note(field, &raw, IssueAction::Dropped, reason);
                None
            }
        }
    }

    fn optional_money(&mut self, field: CanonicalField) -> Money {
        let Some(raw) = self.cell(field).map(str::to_string) else {
            return Decimal::ZERO;
        };
        if raw.trim().is_empty() {
            return Decimal::ZERO;
        }
        match self.money(field, &raw) {
            Ok(v) => v,
            Err(reason) => {
                self.note(field, &raw, IssueAction::Defaulted, reason);
                Decimal::ZERO
            }
        }
    }

    fn flag(&mut self, field: CanonicalField) -> bool {
        let Some(raw) = self.cell(field).map(str::to_string) else {
            return false;
        };
        parse_flag(&raw).unwrap_or_else(|| {
            self.note(field, &raw, IssueAction::Defaulted, "not a recognised boolean");
            false
        })
    }

    /// Returns `None` when a required value fails; the issue is recorded
    /// before returning.
    fn coerce(&mut self) -> Option<LoanRecord> {
        let business_name = self
            .cell(CanonicalField::BusinessName)
            .unwrap_or_default()
            .trim()
            .to_string();
        if business_name.is_empty() {
            self.note(
                CanonicalField::BusinessName,
                "",
                IssueAction::Dropped,
                "blank business name",
            );
            return None;
        }

        let amount = self.required_money(CanonicalField::Amount)?;
        let repaid_amount = self.required_money(CanonicalField::RepaidAmount)?;
        let fees = self.optional_money(CanonicalField::Fees);

        let platform = match self.cell(CanonicalField::Platform).map(str::trim) {
            Some(p) if !p.is_empty() => p.to_string(),
            Some(p) => {
                let p = p.to_string();
                self.note(CanonicalField::Platform, &p, IssueAction::Defaulted, "blank platform");
                self.config.default_platform.clone()
            }
            None => self.config.default_platform.clone(),
        };

        let raw_date = self
            .cell(CanonicalField::FundedDate)
            .unwrap_or_default()
            .to_string();
        let funded_date = parse_date(&raw_date, &self.config.date_formats);
        if funded_date.is_none() {
            self.note(
                CanonicalField::FundedDate,
                &raw_date,
                IssueAction::Defaulted,
                "unparseable date; vintage Unknown",
            );
        }

        let flags = RiskFlags {
            liquidity_risk: self.flag(CanonicalField::LiquidityRisk),
            revenue_drop_risk: self.flag(CanonicalField::RevenueDropRisk),
            non_payment_risk: self.flag(CanonicalField::NonPaymentRisk),
        };

        Some(LoanRecord {
            business_name,
            platform,
            amount,
            fees,
            repaid_amount,
            funded_date,
            flags,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldScales;

    const HEADERS: [&str; 9] = [
        "SMB Name",
        "Embedded Platform Name",
        "Loan Amount",
        "Pipe Fees",
        "Loan Funded On",
        "Repaid Total So Far",
        "Liquidity Risk",
        "Revenue Drop Risk",
        "Non-Payment Risk",
    ];

    fn table(rows: &[&[&str]]) -> RawTable {
        RawTable::from_rows(&HEADERS, rows)
    }

    #[test]
    fn test_parse_money_variants() {
        assert_eq!(parse_money("1,250.50"), Some(dec!(1250.50)));
        assert_eq!(parse_money(" $300 "), Some(dec!(300)));
        assert_eq!(parse_money("1e3"), Some(dec!(1000)));
        assert_eq!(parse_money("0"), Some(Decimal::ZERO));
        assert_eq!(parse_money("-5"), None);
        assert_eq!(parse_money("n/a"), None);
        assert_eq!(parse_money(""), None);
    }

    #[test]
    fn test_parse_date_formats_and_datetime() {
        let formats = NormalizerConfig::default().date_formats;
        let expected = NaiveDate::from_ymd_opt(2024, 3, 31);
        assert_eq!(parse_date("2024-03-31", &formats), expected);
        assert_eq!(parse_date("03/31/2024", &formats), expected);
        assert_eq!(parse_date("2024-03-31 14:05:00", &formats), expected);
        assert_eq!(parse_date("2024-03-31T14:05:00Z", &formats), expected);
        assert_eq!(parse_date("31st March", &formats), None);
        assert_eq!(parse_date("", &formats), None);
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("0.0"), Some(false));
        assert_eq!(parse_flag(""), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_normalize_happy_path() {
        let t = table(&[&[
            "Acme Bakery", "Shopify", "10000", "500", "2024-02-10", "4000", "0", "1", "0",
        ]]);
        let out = normalize(&t, &NormalizerConfig::default()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.rows_dropped, 0);
        let r = &out.records[0];
        assert_eq!(r.business_name, "Acme Bakery");
        assert_eq!(r.platform, "Shopify");
        assert_eq!(r.amount, dec!(10000));
        assert_eq!(r.fees, dec!(500));
        assert_eq!(r.repaid_amount, dec!(4000));
        assert!(r.flags.revenue_drop_risk);
        assert!(!r.flags.non_payment_risk);
        assert_eq!(
            out.resolved_columns.get(&CanonicalField::Amount).map(String::as_str),
            Some("Loan Amount")
        );
    }

    #[test]
    fn test_missing_required_column_is_schema_error() {
        let t = RawTable::from_rows(&["SMB Name", "Loan Funded On", "Repaid Amount"], &[]);
        match normalize(&t, &NormalizerConfig::default()).unwrap_err() {
            LoanRiskError::Schema { field, tried } => {
                assert_eq!(field, "amount");
                assert!(tried.contains(&"Loan Amount".to_string()));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_table_is_empty_result() {
        let out = normalize(&RawTable::default(), &NormalizerConfig::default()).unwrap();
        assert!(out.records.is_empty());
        assert_eq!(out.rows_read, 0);
    }

    #[test]
    fn test_optional_columns_default() {
        let t = RawTable::from_rows(
            &["business_name", "amount", "repaid_amount", "funded_date"],
            &[&["Corner Cafe", "800", "100", "2023-11-02"]],
        );
        let out = normalize(&t, &NormalizerConfig::default()).unwrap();
        let r = &out.records[0];
        assert_eq!(r.platform, "Unknown Platform");
        assert_eq!(r.fees, Decimal::ZERO);
        assert_eq!(r.flags, RiskFlags::default());
        assert!(out.unresolved_optional.contains(&CanonicalField::Platform));
        assert!(out.unresolved_optional.contains(&CanonicalField::Fees));
        assert_eq!(out.rows_defaulted, 0);
    }

    #[test]
    fn test_bad_required_value_drops_row_and_counts() {
        let t = table(&[
            &["A", "Shopify", "abc", "0", "2024-01-01", "0", "0", "0", "0"],
            &["B", "Shopify", "100", "0", "2024-01-01", "", "0", "0", "0"],
            &["C", "Shopify", "100", "0", "2024-01-01", "20", "0", "0", "0"],
        ]);
        let out = normalize(&t, &NormalizerConfig::default()).unwrap();
        assert_eq!(out.rows_read, 3);
        assert_eq!(out.rows_dropped, 2);
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].business_name, "C");
        let dropped: Vec<_> = out
            .issues
            .iter()
            .filter(|i| i.action == IssueAction::Dropped)
            .map(|i| (i.row, i.field))
            .collect();
        assert_eq!(
            dropped,
            vec![
                (0, Some(CanonicalField::Amount)),
                (1, Some(CanonicalField::RepaidAmount)),
            ]
        );
        assert!(out.summary_warnings()[0].contains("2 of 3 rows dropped"));
    }

    #[test]
    fn test_unparseable_date_kept_as_unknown() {
        let t = table(&[&["A", "Shopify", "100", "", "not a date", "10", "0", "0", "0"]]);
        let out = normalize(&t, &NormalizerConfig::default()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].funded_date, None);
        assert_eq!(out.rows_defaulted, 1);
    }

    #[test]
    fn test_bad_optional_values_defaulted() {
        let t = table(&[&["A", "  ", "100", "lots", "2024-01-01", "10", "maybe", "0", "1"]]);
        let out = normalize(&t, &NormalizerConfig::default()).unwrap();
        let r = &out.records[0];
        assert_eq!(r.fees, Decimal::ZERO);
        assert_eq!(r.platform, "Unknown Platform");
        assert!(!r.flags.liquidity_risk);
        assert!(r.flags.non_payment_risk);
        assert_eq!(out.rows_defaulted, 1);
        assert_eq!(out.issues.len(), 3);
        assert!(out.issues.iter().all(|i| i.action == IssueAction::Defaulted));
    }

    #[test]
    fn test_ragged_row_dropped() {
        let t = table(&[&["A", "Shopify", "100"]]);
        let out = normalize(&t, &NormalizerConfig::default()).unwrap();
        assert_eq!(out.rows_dropped, 1);
        assert_eq!(out.issues[0].field, None);
    }

    #[test]
    fn test_scale_factor_applied_per_field() {
        let t = table(&[&["A", "Shopify", "100", "5", "2024-01-01", "25.5", "0", "0", "0"]]);
        let cfg = NormalizerConfig::default().with_scale(FieldScales::uniform(dec!(10)));
        let r = &normalize(&t, &cfg).unwrap().records[0];
        assert_eq!(r.amount, dec!(1000));
        assert_eq!(r.fees, dec!(50));
        assert_eq!(r.repaid_amount, dec!(255));
    }

    #[test]
    fn test_scaled_overflow_drops_row() {
        let huge = "79228162514264337593543950335";
        let t = table(&[
            &["A", "Shopify", huge, "0", "2024-01-01", "0", "0", "0", "0"],
            &["B", "Shopify", "100", "0", "2024-01-01", "10", "0", "0", "0"],
        ]);
        let cfg = NormalizerConfig::default().with_scale(FieldScales::uniform(dec!(10)));
        let out = normalize(&t, &cfg).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].business_name, "B");
        assert_eq!(out.issues[0].field, Some(CanonicalField::Amount));
        assert_eq!(out.issues[0].action, IssueAction::Dropped);
        assert!(out.issues[0].reason.contains("maximum"));
    }

    #[test]
    fn test_money_above_cap_rejected_but_cap_itself_kept() {
        let (cap, over) = ("1000000000000000", "1000000000000001");
        let t = table(&[
            &["A", "Shopify", cap, over, "2024-01-01", "0", "0", "0", "0"],
            &["B", "Shopify", over, "0", "2024-01-01", "0", "0", "0", "0"],
        ]);
        let out = normalize(&t, &NormalizerConfig::default()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].amount, MAX_MONEY);
        assert_eq!(out.records[0].fees, Decimal::ZERO);
        assert_eq!(out.rows_defaulted, 1);
        assert_eq!(out.rows_dropped, 1);
    }

    #[test]
    fn test_first_alias_wins() {
        // Both "Loan Amount" and "amount" are present; "Loan Amount" is listed first.
        let t = RawTable::from_rows(
            &["SMB Name", "amount", "Loan Amount", "Repaid Amount", "Loan Funded On"],
            &[&["A", "1", "2", "0", "2024-01-01"]],
        );
        let out = normalize(&t, &NormalizerConfig::default()).unwrap();
        assert_eq!(out.records[0].amount, dec!(2));
    }

    #[test]
    fn test_loose_header_match() {
        let t = RawTable::from_rows(
            &["smb_name", "LOAN AMOUNT", "repaid total so far", "Loan-Funded-On"],
            &[&["A", "10", "1", "2024-07-04"]],
        );
        let out = normalize(&t, &NormalizerConfig::default()).unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].amount, dec!(10));
    }
}
