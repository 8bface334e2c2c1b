use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoanRiskError {
    #[error("Schema error: required field '{field}' not found (tried: {})", .tried.join(", "))]
    Schema { field: String, tried: Vec<String> },

    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid normalizer config: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for LoanRiskError {
    fn from(e: serde_json::Error) -> Self {
        LoanRiskError::SerializationError(e.to_string())
    }
}

#[cfg(feature = "csv")]
impl From<csv::Error> for LoanRiskError {
    fn from(e: csv::Error) -> Self {
        LoanRiskError::Csv(e.to_string())
    }
}

impl LoanRiskError {
    /// True when the error means the source table itself is unusable, as
    /// opposed to a bad request against an otherwise loadable table.
    pub fn is_schema(&self) -> bool {
        matches!(self, LoanRiskError::Schema { .. })
    }
}
