pub mod cache;
pub mod cohort;
pub mod config;
pub mod error;
pub mod filter;
pub mod loan;
pub mod normalize;
pub mod pipeline;
pub mod risk;
pub mod summary;
pub mod table;
pub mod types;
pub mod vintage;

#[cfg(feature = "csv")]
pub mod export;

pub use error::LoanRiskError;
pub use types::*;

/// Standard result type for all loan-risk operations
pub type LoanRiskResult<T> = Result<T, LoanRiskError>;
