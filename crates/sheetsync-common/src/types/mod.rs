//! Domain types shared between the converter and the server

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// Lifecycle status of a processing task.
///
/// Transitions only ever go `Processing -> Completed` or
/// `Processing -> Error`; both are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Processing,
    Completed,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }

    /// Whether moving from `self` to `next` is a legal lifecycle step
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Processing, TaskStatus::Completed) | (TaskStatus::Processing, TaskStatus::Error)
        )
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "error" => Ok(TaskStatus::Error),
            other => Err(CommonError::InvalidTaskStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of an uploaded file.
///
/// `Side` files carry a user-supplied display name and may expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Main,
    Side,
}

impl FileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRole::Main => "main",
            FileRole::Side => "side",
        }
    }

    pub fn is_side(&self) -> bool {
        matches!(self, FileRole::Side)
    }
}

impl std::str::FromStr for FileRole {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "main" => Ok(FileRole::Main),
            "side" => Ok(FileRole::Side),
            other => Err(CommonError::InvalidFileRole(other.to_string())),
        }
    }
}

impl std::fmt::Display for FileRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar date after which a side file's data may be discarded
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExpiryDate(NaiveDate);

impl ExpiryDate {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for ExpiryDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl std::str::FromStr for ExpiryDate {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // chrono accepts unpadded fields, the wire format does not
        if trimmed.len() != 10 {
            return Err(CommonError::InvalidExpiryDate(s.to_string()));
        }
        NaiveDate::parse_from_str(trimmed, Self::FORMAT)
            .map(ExpiryDate)
            .map_err(|_| CommonError::InvalidExpiryDate(s.to_string()))
    }
}

impl TryFrom<String> for ExpiryDate {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExpiryDate> for String {
    fn from(value: ExpiryDate) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ExpiryDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}
