use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Ratios expressed as decimals (0.5 = 50%).
pub type Rate = Decimal;

/// Percentages expressed on a 0..=100 scale.
pub type Percent = Decimal;

/// Zero-denominator policy shared by every rate in the pipeline: a ratio
/// over nothing is 0, never an error and never NaN. A quotient too large to
/// represent is also 0.
pub fn safe_ratio(numerator: Decimal, denominator: Decimal) -> Rate {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
    }
}

/// Sum that saturates at `Decimal::MAX` instead of overflowing.
pub fn saturating_sum<I: IntoIterator<Item = Decimal>>(values: I) -> Decimal {
    values
        .into_iter()
        .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v))
}

/// `part / whole * 100`, with the same zero policy as [`safe_ratio`].
pub fn percent_of(part: u64, whole: u64) -> Percent {
    safe_ratio(Decimal::from(part), Decimal::from(whole)) * dec!(100)
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_ratio_zero_denominator() {
        assert_eq!(safe_ratio(dec!(10), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(safe_ratio(dec!(1500), dec!(3000)), dec!(0.5));
    }

    #[test]
    fn test_safe_ratio_overflow_is_zero() {
        let tiny = Decimal::new(1, 18);
        assert_eq!(safe_ratio(dec!(100000000000), tiny), Decimal::ZERO);
    }

    #[test]
    fn test_saturating_sum_caps_at_max() {
        let big = dec!(50000000000000000000000000000);
        assert_eq!(saturating_sum([big, big]), Decimal::MAX);
        assert_eq!(saturating_sum([dec!(1.5), dec!(2)]), dec!(3.5));
        assert_eq!(saturating_sum(Vec::new()), Decimal::ZERO);
    }

    #[test]
    fn test_percent_of_empty_whole() {
        assert_eq!(percent_of(0, 0), Decimal::ZERO);
        assert_eq!(percent_of(1, 4), dec!(25));
    }
}
