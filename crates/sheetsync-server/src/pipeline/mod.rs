//! Ingestion and reconciliation orchestrators
//!
//! Each orchestrator drives one job from start to finish and reports an
//! outcome instead of an error: failures are recorded in the task ledger
//! and the log, never propagated to whoever scheduled the job.

use sheetsync_ingest::ParseError;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::publisher::PublishError;
use crate::storage::FetchError;

pub mod ingest;
pub mod reconcile;

pub use ingest::{IngestOrchestrator, IngestOutcome};
pub use reconcile::{ReconcileOrchestrator, ReconcileOutcome};

/// Anything that ends an ingestion in the `error` state
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to parse file: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Scratch file error: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("Parser worker failed: {0}")]
    Worker(String),
}

impl PipelineError {
    /// Whether records may already be committed when this error is raised.
    ///
    /// Publishing and the final ledger update are the only steps that run
    /// after the first batch is written.
    pub fn after_publish_started(&self) -> bool {
        matches!(self, PipelineError::Publish(_) | PipelineError::Ledger(_))
    }
}
