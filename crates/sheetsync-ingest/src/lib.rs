//! SheetSync Ingest Library
//!
//! Pure building blocks of the conversion pipeline: reading tabular files
//! into rows and applying category rules to them. Nothing in this crate
//! touches the network or the datastore.
//!
//! - **tabular**: CSV and spreadsheet readers, selected by file extension
//! - **transform**: header normalization, missing-value policy and the
//!   category rule registry
//!
//! # Example
//!
//! ```no_run
//! use sheetsync_ingest::{tabular::{self, TabularFormat}, transform::TransformEngine};
//!
//! fn main() -> anyhow::Result<()> {
//!     let bytes = std::fs::read("./ledger.csv")?;
//!     let rows = tabular::parse(&bytes, TabularFormat::from_file_name("ledger.csv"))?;
//!     let output = TransformEngine::builtin().transform(rows, "financial");
//!     println!("{}", serde_json::to_string_pretty(&output)?);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod tabular;
pub mod transform;

pub use error::{ParseError, TransformError};
pub use tabular::TabularFormat;
pub use transform::{Row, RuleRegistry, TransformEngine};
