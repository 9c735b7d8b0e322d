//! Errors raised while reading and transforming tabular data

use thiserror::Error;

/// The uploaded file could not be turned into rows
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Line {line}: expected {expected} fields, saw {found}")]
    RaggedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    #[error("Unreadable spreadsheet: {0}")]
    Spreadsheet(String),

    #[error("Workbook contains no worksheets")]
    NoWorksheet,

    #[error("No columns to parse from file")]
    Empty,
}

/// Rows could not be run through the category rules
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Row {index} is not an object (found {found})")]
    NonObjectRow { index: usize, found: &'static str },

    #[error("A rule for category '{0}' is already registered")]
    DuplicateCategory(String),
}
