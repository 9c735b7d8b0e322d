use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{PublishedRecord, RecordQuery, RecordStore, StoreError, MAX_PAGE_SIZE};

pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Query string of `GET /records`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordsQuery {
    pub source_file_id: Option<Uuid>,
    pub category: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListRecordsResponse {
    pub items: Vec<PublishedRecord>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ListRecordsError {
    #[error("limit must be between 1 and {}", MAX_PAGE_SIZE)]
    LimitOutOfRange,
    #[error("offset cannot be negative")]
    NegativeOffset,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ListRecordsQuery {
    pub fn validate(&self) -> Result<RecordQuery, ListRecordsError> {
        let limit = self.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(ListRecordsError::LimitOutOfRange);
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(ListRecordsError::NegativeOffset);
        }

        Ok(RecordQuery {
            source_file_id: self.source_file_id,
            category: self.category.clone().filter(|c| !c.trim().is_empty()),
            limit,
            offset,
        })
    }
}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: &dyn RecordStore,
    query: ListRecordsQuery,
) -> Result<ListRecordsResponse, ListRecordsError> {
    let query = query.validate()?;
    let items = store.list(&query).await?;

    Ok(ListRecordsResponse {
        items,
        limit: query.limit,
        offset: query.offset,
    })
}
