//! SheetSync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging and error handling for the SheetSync workspace.
//!
//! # Overview
//!
//! This crate provides the vocabulary shared by every workspace member:
//!
//! - **Error Handling**: [`CommonError`] for malformed domain values
//! - **Logging**: centralized `tracing` subscriber setup
//! - **Types**: task lifecycle status, file roles and expiry dates
//!
//! # Example
//!
//! ```no_run
//! use sheetsync_common::types::{FileRole, TaskStatus};
//!
//! let role: FileRole = "side".parse().unwrap();
//! assert!(role.is_side());
//! assert!(TaskStatus::Completed.is_terminal());
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{ExpiryDate, FileRole, TaskStatus};
