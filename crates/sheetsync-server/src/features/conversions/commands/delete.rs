use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::{DispatchError, Job, JobDispatcher, JobId};

/// Body of `POST /delete-cloud`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCommand {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub message: String,
    pub job_id: JobId,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error("{0} is required and cannot be empty")]
    Required(&'static str),
    #[error("taskId '{0}' is not a valid task id")]
    InvalidTaskId(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl DeleteCommand {
    pub fn validate(&self) -> Result<(Uuid, String), DeleteError> {
        let task_id = self.task_id.trim();
        if task_id.is_empty() {
            return Err(DeleteError::Required("taskId"));
        }
        let task_id =
            Uuid::parse_str(task_id).map_err(|_| DeleteError::InvalidTaskId(task_id.to_string()))?;

        let user_id = self.user_id.trim();
        if user_id.is_empty() {
            return Err(DeleteError::Required("userId"));
        }

        Ok((task_id, user_id.to_string()))
    }
}

/// Schedule removal of a task and its records.
///
/// An unknown task id is accepted; the job finds nothing and ends quietly.
#[tracing::instrument(skip(dispatcher, command), fields(task_id = %command.task_id))]
pub fn handle(dispatcher: &JobDispatcher, command: DeleteCommand) -> Result<DeleteResponse, DeleteError> {
    let (task_id, requested_by) = command.validate()?;
    let ticket = dispatcher.submit(Job::Reconcile {
        task_id,
        requested_by,
    })?;

    Ok(DeleteResponse {
        message: "Deletion started".to_string(),
        job_id: ticket.job_id,
    })
}
