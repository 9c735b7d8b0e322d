//! Conversion intake routes
//!
//! - `POST /convert` - queue an ingestion, respond `202 Accepted`
//! - `POST /delete-cloud` - queue removal of a task and its records
//!
//! Both return as soon as the job is queued. The job's result is only
//! visible through the task ledger.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};

use super::commands::{ConvertCommand, ConvertError, DeleteCommand, DeleteError};
use crate::bootstrap::AppServices;
use crate::error::AppError;

pub fn conversions_routes() -> Router<AppServices> {
    Router::new()
        .route("/convert", post(convert))
        .route("/delete-cloud", post(delete_cloud))
}

/// Queue a file for conversion
///
/// # Request Body
///
/// ```json
/// {
///   "filePath": "uploads/u1/ledger.csv",
///   "fileName": "ledger.csv",
///   "userId": "u1",
///   "category": "financial",
///   "fileType": "side",
///   "customName": "Q3 Promo",
///   "expiryDate": "2026-12-31"
/// }
/// ```
///
/// # Response
///
/// - `202 Accepted` - `{"message": "Conversion started", "file": ..., "jobId": ...}`
/// - `400 Bad Request` - Validation error
/// - `503 Service Unavailable` - Job queue full
async fn convert(
    State(services): State<AppServices>,
    payload: Result<Json<ConvertCommand>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(command) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let response = super::commands::convert::handle(&services.dispatcher, command)?;

    tracing::info!(
        job_id = %response.job_id,
        file = %response.file,
        "Conversion queued via API"
    );

    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}

/// Queue deletion of a task's records
///
/// # Request Body
///
/// ```json
/// { "taskId": "6f1c2a1e-8a5b-4c1e-9f3e-2b7d5c9a0e11", "userId": "u1" }
/// ```
///
/// # Response
///
/// - `200 OK` - `{"message": "Deletion started", "jobId": ...}`
/// - `400 Bad Request` - Validation error
/// - `503 Service Unavailable` - Job queue full
async fn delete_cloud(
    State(services): State<AppServices>,
    payload: Result<Json<DeleteCommand>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(command) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let response = super::commands::delete::handle(&services.dispatcher, command)?;

    tracing::info!(job_id = %response.job_id, "Deletion queued via API");

    Ok((StatusCode::OK, Json(response)).into_response())
}

impl From<ConvertError> for AppError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::Dispatch(e) => AppError::Dispatch(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<DeleteError> for AppError {
    fn from(err: DeleteError) -> Self {
        match err {
            DeleteError::Dispatch(e) => AppError::Dispatch(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}
