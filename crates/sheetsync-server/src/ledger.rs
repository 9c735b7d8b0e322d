//! Task ledger
//!
//! Durable record of each ingestion job's lifecycle. A task is created in
//! `processing` before any remote I/O and moves exactly once to a terminal
//! status. Implementations must refuse any other transition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sheetsync_common::{ExpiryDate, FileRole, TaskStatus};
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

pub type TaskId = Uuid;

/// One ingestion job as stored in `processing_tasks`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingTask {
    pub id: TaskId,
    pub file_name: String,
    pub source_path: String,
    pub uploaded_by: String,
    pub category: String,
    #[serde(rename = "type")]
    pub file_role: FileRole,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<ExpiryDate>,
    pub notification_sent: bool,
    pub record_count: Option<i64>,
    pub published_count: Option<i64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProcessingTask {
    /// Name shown to clients; only side files carry one
    pub fn display_name(&self) -> Option<&str> {
        self.custom_name.as_deref()
    }
}

/// Everything known about a task when it is opened
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub file_name: String,
    pub source_path: String,
    pub uploaded_by: String,
    pub category: String,
    pub file_role: FileRole,
    pub custom_name: Option<String>,
    pub expiry_date: Option<ExpiryDate>,
}

impl NewTask {
    pub fn main(
        file_name: impl Into<String>,
        source_path: impl Into<String>,
        uploaded_by: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            source_path: source_path.into(),
            uploaded_by: uploaded_by.into(),
            category: category.into(),
            file_role: FileRole::Main,
            custom_name: None,
            expiry_date: None,
        }
    }

    /// A side file; display name and expiry only exist for this role
    pub fn side(
        file_name: impl Into<String>,
        source_path: impl Into<String>,
        uploaded_by: impl Into<String>,
        category: impl Into<String>,
        custom_name: Option<String>,
        expiry_date: Option<ExpiryDate>,
    ) -> Self {
        Self {
            file_role: FileRole::Side,
            custom_name: custom_name.filter(|name| !name.trim().is_empty()),
            expiry_date,
            ..Self::main(file_name, source_path, uploaded_by, category)
        }
    }

    /// Materialize as a freshly opened `processing` task
    pub fn into_task(self, id: TaskId, now: DateTime<Utc>) -> ProcessingTask {
        ProcessingTask {
            id,
            file_name: self.file_name,
            source_path: self.source_path,
            uploaded_by: self.uploaded_by,
            category: self.category,
            file_role: self.file_role,
            status: TaskStatus::Processing,
            custom_name: self.custom_name,
            expiry_date: self.expiry_date,
            notification_sent: false,
            record_count: None,
            published_count: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The only two mutations a task ever receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskUpdate {
    Completed {
        record_count: i64,
        published_count: i64,
        notification_sent: bool,
    },
    Failed {
        error_message: String,
    },
}

impl TaskUpdate {
    pub fn target_status(&self) -> TaskStatus {
        match self {
            TaskUpdate::Completed { .. } => TaskStatus::Completed,
            TaskUpdate::Failed { .. } => TaskStatus::Error,
        }
    }

    /// Apply to an in-memory task, enforcing the lifecycle
    pub fn apply(self, task: &mut ProcessingTask, now: DateTime<Utc>) -> Result<(), LedgerError> {
        let to = self.target_status();
        if !task.status.can_transition_to(to) {
            return Err(LedgerError::InvalidTransition {
                task_id: task.id,
                from: task.status,
                to,
            });
        }

        match self {
            TaskUpdate::Completed {
                record_count,
                published_count,
                notification_sent,
            } => {
                task.record_count = Some(record_count);
                task.published_count = Some(published_count);
                task.notification_sent = notification_sent;
            },
            TaskUpdate::Failed { error_message } => {
                task.error_message = Some(error_message);
            },
        }
        task.status = to;
        task.updated_at = now;
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Task '{0}' not found")]
    NotFound(TaskId),

    #[error("Task '{task_id}' cannot move from {from} to {to}")]
    InvalidTransition {
        task_id: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::Store(StoreError::Database(err))
    }
}

#[async_trait]
pub trait TaskLedger: Send + Sync {
    /// Persist a new task in `processing` and return its id
    async fn create(&self, task: NewTask) -> Result<TaskId, LedgerError>;

    /// Move a `processing` task to its terminal status
    async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<(), LedgerError>;

    async fn get(&self, id: TaskId) -> Result<Option<ProcessingTask>, LedgerError>;

    /// Remove the task; `false` when it did not exist
    async fn delete(&self, id: TaskId) -> Result<bool, LedgerError>;

    /// Cheap round trip used by the readiness probe
    async fn ping(&self) -> Result<(), LedgerError>;
}
