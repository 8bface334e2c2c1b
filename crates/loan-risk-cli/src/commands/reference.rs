use serde_json::Value;

use loan_risk_core::risk;

/// Definitions and severities of the at-risk categories.
pub fn run_categories() -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::to_value(risk::risk_category_table())?)
}
