use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sheetsync_ingest::{tabular, TabularFormat, TransformEngine};
use tempfile::NamedTempFile;
use tracing::{error, info, instrument, warn};

use super::PipelineError;
use crate::ledger::{NewTask, TaskId, TaskLedger, TaskUpdate};
use crate::notifier::{notify_best_effort, DataUpdateEvent, Notifier};
use crate::publisher::{BulkPublisher, PublishSummary};
use crate::storage::ObjectFetcher;

/// How one ingestion ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Completed {
        task_id: TaskId,
        record_count: usize,
        published_count: usize,
    },
    Failed {
        task_id: TaskId,
        message: String,
    },
    /// The task could not even be created; nothing was fetched
    Aborted {
        message: String,
    },
}

impl IngestOutcome {
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            IngestOutcome::Completed { task_id, .. } | IngestOutcome::Failed { task_id, .. } => {
                Some(*task_id)
            },
            IngestOutcome::Aborted { .. } => None,
        }
    }
}

/// Moves one uploaded file through fetch, parse, transform, publish,
/// finalize and notify
pub struct IngestOrchestrator {
    ledger: Arc<dyn TaskLedger>,
    fetcher: Arc<dyn ObjectFetcher>,
    engine: Arc<TransformEngine>,
    publisher: Arc<BulkPublisher>,
    notifier: Arc<dyn Notifier>,
    scratch_dir: PathBuf,
}

impl IngestOrchestrator {
    pub fn new(
        ledger: Arc<dyn TaskLedger>,
        fetcher: Arc<dyn ObjectFetcher>,
        engine: Arc<TransformEngine>,
        publisher: Arc<BulkPublisher>,
        notifier: Arc<dyn Notifier>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ledger,
            fetcher,
            engine,
            publisher,
            notifier,
            scratch_dir: scratch_dir.into(),
        }
    }

    #[instrument(
        skip(self, task),
        fields(file_name = %task.file_name, category = %task.category, user_id = %task.uploaded_by)
    )]
    pub async fn run(&self, task: NewTask) -> IngestOutcome {
        let task_id = match self.ledger.create(task.clone()).await {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "Failed to create processing task");
                return IngestOutcome::Aborted {
                    message: e.to_string(),
                };
            },
        };
        info!(%task_id, role = %task.file_role, "Processing task created");

        let summary = match self.process(task_id, &task).await {
            Ok(summary) => summary,
            Err(e) => {
                let message = e.to_string();
                error!(%task_id, error = %message, "Ingestion failed");
                if e.after_publish_started() {
                    self.retract_partial(task_id).await;
                }
                if let Err(record_err) = self
                    .ledger
                    .update(
                        task_id,
                        TaskUpdate::Failed {
                            error_message: message.clone(),
                        },
                    )
                    .await
                {
                    error!(%task_id, error = %record_err, "Failed to record ingestion failure");
                }
                return IngestOutcome::Failed { task_id, message };
            },
        };

        info!(
            %task_id,
            records = summary.total_rows,
            published = summary.published,
            batches = summary.batches,
            "Task completed"
        );

        let event = DataUpdateEvent::new(task.category.clone(), task.custom_name.clone(), task_id);
        notify_best_effort(self.notifier.as_ref(), &event).await;

        IngestOutcome::Completed {
            task_id,
            record_count: summary.total_rows,
            published_count: summary.published,
        }
    }

    /// Steps that end in `error` when they fail. The scratch file is
    /// removed when this returns, whichever way it exits.
    async fn process(&self, task_id: TaskId, task: &NewTask) -> Result<PublishSummary, PipelineError> {
        let scratch = self.scratch_file(task_id, &task.file_name)?;

        let bytes = self.fetcher.fetch_to(&task.source_path, scratch.path()).await?;
        info!(%task_id, bytes, backend = self.fetcher.backend_name(), "Fetched source file");

        let contents = tokio::fs::read(scratch.path())
            .await
            .map_err(PipelineError::Scratch)?;
        let format = TabularFormat::from_file_name(&task.file_name);
        let rows = tokio::task::spawn_blocking(move || tabular::parse(&contents, format))
            .await
            .map_err(|e| PipelineError::Worker(e.to_string()))??;

        let rows = self.engine.transform(rows, &task.category);
        let summary = self
            .publisher
            .publish(rows, task_id, &task.category, task.custom_name.as_deref())
            .await?;
        if summary.truncated() > 0 {
            warn!(%task_id, dropped = summary.truncated(), "Not every row was published");
        }

        // "sent" means attempted: the flag is set before the push goes out
        self.ledger
            .update(
                task_id,
                TaskUpdate::Completed {
                    record_count: summary.total_rows as i64,
                    published_count: summary.published as i64,
                    notification_sent: true,
                },
            )
            .await?;

        drop(scratch);
        Ok(summary)
    }

    /// A failed task must not leave some of its rows readable
    async fn retract_partial(&self, task_id: TaskId) {
        match self.publisher.retract(task_id).await {
            Ok(0) => {},
            Ok(removed) => warn!(%task_id, removed, "Removed records of a failed ingestion"),
            Err(e) => error!(
                %task_id,
                removed = e.removed,
                error = %e.source,
                "Failed to remove records of a failed ingestion"
            ),
        }
    }

    fn scratch_file(&self, task_id: TaskId, file_name: &str) -> Result<NamedTempFile, PipelineError> {
        let suffix = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        tempfile::Builder::new()
            .prefix(&format!("{task_id}-"))
            .suffix(&suffix)
            .tempfile_in(&self.scratch_dir)
            .map_err(PipelineError::Scratch)
    }
}
