//! Task status routes
//!
//! - `GET /api/v1/tasks/:id` - one processing task

use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};

use super::queries::GetTaskError;
use crate::api::response::ApiResponse;
use crate::bootstrap::AppServices;
use crate::error::AppError;
use crate::ledger::ProcessingTask;

pub fn tasks_routes() -> Router<AppServices> {
    Router::new().route("/:id", get(get_task))
}

/// # Response
///
/// - `200 OK` - Task document
/// - `400 Bad Request` - Malformed id
/// - `404 Not Found` - No such task
async fn get_task(
    State(services): State<AppServices>,
    Path(id): Path<String>,
) -> Result<ApiResponse<ProcessingTask>, AppError> {
    let task = super::queries::get::handle(services.ledger.as_ref(), &id).await?;

    tracing::debug!(task_id = %task.id, status = %task.status, "Task retrieved via API");

    Ok(ApiResponse::success(task))
}

impl From<GetTaskError> for AppError {
    fn from(err: GetTaskError) -> Self {
        match err {
            GetTaskError::InvalidId(_) => AppError::Validation(err.to_string()),
            GetTaskError::NotFound(_) => AppError::NotFound(err.to_string()),
            GetTaskError::Ledger(e) => AppError::Ledger(e),
        }
    }
}
