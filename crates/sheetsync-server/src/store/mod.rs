//! Record store
//!
//! Published records live in the shared `app_data` collection, one record
//! per transformed row, tagged with the id of the task that produced it.
//! Writes happen in atomic batches no larger than [`MAX_BATCH_WRITES`].
//!
//! Both backends implement [`RecordStore`] and [`TaskLedger`]:
//!
//! - [`PgStore`]: PostgreSQL via sqlx
//! - [`MemoryStore`]: process-local, for development and tests
//!
//! [`TaskLedger`]: crate::ledger::TaskLedger

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sheetsync_ingest::Row;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Most operations the store accepts in one atomic commit
pub const MAX_BATCH_WRITES: usize = 500;

/// Largest page the read path hands out
pub const MAX_PAGE_SIZE: i64 = 1000;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database query failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Batch of {size} writes exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Stored value could not be decoded: {0}")]
    Decode(String),
}

/// A purge that stopped part way
#[derive(Error, Debug)]
#[error("Removed {removed} records before failing: {source}")]
pub struct PurgeError {
    pub removed: usize,
    #[source]
    pub source: StoreError,
}

/// One transformed row as stored in `app_data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedRecord {
    pub id: Uuid,
    pub source_file_id: Uuid,
    pub row_index: i64,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    pub data: Row,
    pub updated_at: DateTime<Utc>,
}

/// Filters for the read path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub source_file_id: Option<Uuid>,
    pub category: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl RecordQuery {
    pub fn matches(&self, record: &PublishedRecord) -> bool {
        self.source_file_id.is_none_or(|id| id == record.source_file_id)
            && self.category.as_deref().is_none_or(|c| c == record.category)
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Write every record or none of them.
    ///
    /// Fails with [`StoreError::BatchTooLarge`] above [`MAX_BATCH_WRITES`].
    async fn commit_batch(&self, records: Vec<PublishedRecord>) -> Result<usize, StoreError>;

    /// Up to `limit` record ids attributed to `source_file_id`
    async fn list_ids_by_source(
        &self,
        source_file_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Uuid>, StoreError>;

    /// Delete the given ids atomically, returning how many existed
    async fn delete_batch(&self, ids: &[Uuid]) -> Result<usize, StoreError>;

    async fn count_by_source(&self, source_file_id: Uuid) -> Result<i64, StoreError>;

    async fn list(&self, query: &RecordQuery) -> Result<Vec<PublishedRecord>, StoreError>;
}

/// Delete every record attributed to `source_file_id`, `batch_size` at a time.
///
/// Each batch is atomic; batches deleted before a failure stay deleted.
pub async fn purge_source(
    store: &dyn RecordStore,
    source_file_id: Uuid,
    batch_size: usize,
) -> Result<usize, PurgeError> {
    let batch_size = batch_size.clamp(1, MAX_BATCH_WRITES);
    let mut removed = 0;
    loop {
        let ids = store
            .list_ids_by_source(source_file_id, batch_size)
            .await
            .map_err(|source| PurgeError { removed, source })?;
        if ids.is_empty() {
            return Ok(removed);
        }

        removed += store
            .delete_batch(&ids)
            .await
            .map_err(|source| PurgeError { removed, source })?;
    }
}

pub(crate) fn check_batch_size(size: usize) -> Result<(), StoreError> {
    if size > MAX_BATCH_WRITES {
        return Err(StoreError::BatchTooLarge {
            size,
            limit: MAX_BATCH_WRITES,
        });
    }
    Ok(())
}
