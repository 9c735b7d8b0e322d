//! Error types shared across SheetSync crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while interpreting shared domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Invalid file type '{0}': expected 'main' or 'side'")]
    InvalidFileRole(String),

    #[error("Invalid task status '{0}'")]
    InvalidTaskStatus(String),

    #[error("Invalid expiry date '{0}': expected YYYY-MM-DD")]
    InvalidExpiryDate(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
