//! Published record routes
//!
//! - `GET /api/v1/records?sourceFileId=&category=&limit=&offset=`

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Router,
};
use serde_json::json;

use super::queries::{ListRecordsError, ListRecordsQuery};
use crate::api::response::ApiResponse;
use crate::bootstrap::AppServices;
use crate::error::AppError;
use crate::store::PublishedRecord;

pub fn records_routes() -> Router<AppServices> {
    Router::new().route("/", get(list_records))
}

/// Records ordered by source file, then row.
///
/// `limit` defaults to 100 and may not exceed 1000.
async fn list_records(
    State(services): State<AppServices>,
    query: Result<Query<ListRecordsQuery>, QueryRejection>,
) -> Result<ApiResponse<Vec<PublishedRecord>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;

    let response = super::queries::list::handle(services.records.as_ref(), query).await?;

    tracing::debug!(count = response.items.len(), "Records listed via API");

    let meta = json!({
        "limit": response.limit,
        "offset": response.offset,
        "count": response.items.len(),
    });
    Ok(ApiResponse::success_with_meta(response.items, meta))
}

impl From<ListRecordsError> for AppError {
    fn from(err: ListRecordsError) -> Self {
        match err {
            ListRecordsError::Store(e) => AppError::Store(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}
