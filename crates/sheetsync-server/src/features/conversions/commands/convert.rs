use serde::{Deserialize, Serialize};
use sheetsync_common::{CommonError, ExpiryDate, FileRole};

use crate::jobs::{DispatchError, Job, JobDispatcher, JobId};
use crate::ledger::NewTask;

/// Body of `POST /convert`
///
/// Required fields default to empty so that a missing field reports the
/// same validation error as a blank one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertCommand {
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub custom_name: Option<String>,
    #[serde(default)]
    pub expiry_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    pub message: String,
    pub file: String,
    pub job_id: JobId,
}

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("{0} is required and cannot be empty")]
    Required(&'static str),
    #[error(transparent)]
    InvalidField(#[from] CommonError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

fn required(value: &str, field: &'static str) -> Result<String, ConvertError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConvertError::Required(field));
    }
    Ok(trimmed.to_string())
}

impl ConvertCommand {
    /// Check the request and turn it into the task to open.
    ///
    /// Display name and expiry are only read for side files.
    pub fn validate(&self) -> Result<NewTask, ConvertError> {
        let file_path = required(&self.file_path, "filePath")?;
        let file_name = required(&self.file_name, "fileName")?;
        let user_id = required(&self.user_id, "userId")?;
        let category = required(&self.category, "category")?;
        let role: FileRole = self.file_type.parse()?;

        match role {
            FileRole::Main => Ok(NewTask::main(file_name, file_path, user_id, category)),
            FileRole::Side => {
                let expiry_date = self
                    .expiry_date
                    .as_deref()
                    .filter(|d| !d.trim().is_empty())
                    .map(str::parse::<ExpiryDate>)
                    .transpose()?;
                Ok(NewTask::side(
                    file_name,
                    file_path,
                    user_id,
                    category,
                    self.custom_name.clone(),
                    expiry_date,
                ))
            },
        }
    }
}

#[tracing::instrument(skip(dispatcher, command), fields(file_name = %command.file_name))]
pub fn handle(
    dispatcher: &JobDispatcher,
    command: ConvertCommand,
) -> Result<ConvertResponse, ConvertError> {
    let task = command.validate()?;
    let file = task.file_name.clone();

    // the ticket is dropped; the outcome is recorded in the task ledger
    let ticket = dispatcher.submit(Job::Ingest(task))?;

    Ok(ConvertResponse {
        message: "Conversion started".to_string(),
        file,
        job_id: ticket.job_id,
    })
}
