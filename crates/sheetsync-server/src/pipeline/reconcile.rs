use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument};

use crate::ledger::{TaskId, TaskLedger};
use crate::store::{purge_source, RecordStore, MAX_BATCH_WRITES};

/// How one deletion ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// No such task; nothing to do
    NotFound,
    Removed {
        records_removed: usize,
    },
    /// Stopped part way; whatever was deleted stays deleted
    Failed {
        records_removed: usize,
        message: String,
    },
}

/// Removes every record a task published, then the task itself
pub struct ReconcileOrchestrator {
    ledger: Arc<dyn TaskLedger>,
    records: Arc<dyn RecordStore>,
    batch_size: usize,
}

impl ReconcileOrchestrator {
    pub fn new(ledger: Arc<dyn TaskLedger>, records: Arc<dyn RecordStore>, batch_size: usize) -> Self {
        Self {
            ledger,
            records,
            batch_size: batch_size.clamp(1, MAX_BATCH_WRITES),
        }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, task_id: TaskId, requested_by: &str) -> ReconcileOutcome {
        match self.ledger.get(task_id).await {
            Ok(Some(_)) => {},
            Ok(None) => {
                info!(%task_id, "Task not found, nothing to delete");
                return ReconcileOutcome::NotFound;
            },
            Err(e) => {
                error!(%task_id, error = %e, "Failed to look up task for deletion");
                return ReconcileOutcome::Failed {
                    records_removed: 0,
                    message: e.to_string(),
                };
            },
        }

        let records_removed =
            match purge_source(self.records.as_ref(), task_id, self.batch_size).await {
                Ok(removed) => removed,
                Err(e) => return self.failed(task_id, e.removed, e.source.to_string()),
            };

        if let Err(e) = self.ledger.delete(task_id).await {
            return self.failed(task_id, records_removed, e.to_string());
        }

        info!(%task_id, records_removed, "Deleted task and its records");
        ReconcileOutcome::Removed { records_removed }
    }

    fn failed(&self, task_id: TaskId, records_removed: usize, message: String) -> ReconcileOutcome {
        error!(%task_id, records_removed, error = %message, "Deletion stopped");
        ReconcileOutcome::Failed {
            records_removed,
            message,
        }
    }
}
