use uuid::Uuid;

use crate::ledger::{LedgerError, ProcessingTask, TaskLedger};

#[derive(Debug, thiserror::Error)]
pub enum GetTaskError {
    #[error("'{0}' is not a valid task id")]
    InvalidId(String),
    #[error("Task '{0}' not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[tracing::instrument(skip(ledger))]
pub async fn handle(ledger: &dyn TaskLedger, id: &str) -> Result<ProcessingTask, GetTaskError> {
    let id = Uuid::parse_str(id.trim()).map_err(|_| GetTaskError::InvalidId(id.to_string()))?;
    ledger.get(id).await?.ok_or(GetTaskError::NotFound(id))
}
