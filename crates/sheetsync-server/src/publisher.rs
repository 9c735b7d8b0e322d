//! Bulk publisher
//!
//! Writes transformed rows into the record store in batches that never
//! exceed the store's atomic-write ceiling. Every record is tagged with the
//! id of the task that produced it, the category and the display name.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sheetsync_ingest::Row;
use thiserror::Error;
use uuid::Uuid;

use crate::store::{purge_source, PublishedRecord, PurgeError, RecordStore, StoreError, MAX_BATCH_WRITES};

/// Rows kept by [`PublishPolicy::LegacyTruncate`] unless configured otherwise
pub const DEFAULT_LEGACY_ROW_CAP: usize = 400;

/// How many of a file's rows get published
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum PublishPolicy {
    /// Every row, in as many batches as needed
    #[default]
    Chunked,
    /// Only the first `row_cap` rows; the rest are dropped with a warning
    LegacyTruncate { row_cap: usize },
}

impl PublishPolicy {
    /// Parse the `PUBLISH_POLICY` setting
    pub fn parse(mode: &str, legacy_row_cap: usize) -> Option<Self> {
        match mode.trim().to_lowercase().as_str() {
            "chunked" => Some(PublishPolicy::Chunked),
            "legacy_truncate" | "legacy-truncate" => Some(PublishPolicy::LegacyTruncate {
                row_cap: legacy_row_cap,
            }),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PublishPolicy::Chunked => "chunked",
            PublishPolicy::LegacyTruncate { .. } => "legacy_truncate",
        }
    }
}

/// What a publish call wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishSummary {
    /// Rows handed to the publisher
    pub total_rows: usize,
    /// Records actually committed
    pub published: usize,
    pub batches: usize,
}

impl PublishSummary {
    pub fn truncated(&self) -> usize {
        self.total_rows - self.published
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Publishing batch {batch} failed after {published} records were written: {source}")]
    BatchFailed {
        batch: usize,
        published: usize,
        #[source]
        source: StoreError,
    },
}

pub struct BulkPublisher {
    store: Arc<dyn RecordStore>,
    policy: PublishPolicy,
    batch_size: usize,
}

impl BulkPublisher {
    /// `batch_size` is clamped to `1..=MAX_BATCH_WRITES`
    pub fn new(store: Arc<dyn RecordStore>, policy: PublishPolicy, batch_size: usize) -> Self {
        Self {
            store,
            policy,
            batch_size: batch_size.clamp(1, MAX_BATCH_WRITES),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Publish `rows` attributed to `source_file_id`.
    ///
    /// Each batch commits atomically; a failed batch leaves earlier
    /// batches in place.
    #[tracing::instrument(skip(self, rows), fields(rows = rows.len(), policy = self.policy.name()))]
    pub async fn publish(
        &self,
        rows: Vec<Row>,
        source_file_id: Uuid,
        category: &str,
        display_name: Option<&str>,
    ) -> Result<PublishSummary, PublishError> {
        let total_rows = rows.len();
        let keep = match self.policy {
            PublishPolicy::Chunked => total_rows,
            PublishPolicy::LegacyTruncate { row_cap } => total_rows.min(row_cap),
        };
        if keep < total_rows {
            tracing::warn!(
                %source_file_id,
                total_rows,
                published = keep,
                dropped = total_rows - keep,
                "Legacy publish policy dropped rows beyond the cap"
            );
        }

        let now = Utc::now();
        let mut records = rows.into_iter().take(keep).enumerate().map(|(idx, data)| PublishedRecord {
            id: Uuid::new_v4(),
            source_file_id,
            row_index: idx as i64,
            category: category.to_string(),
            custom_name: display_name.map(str::to_string),
            data,
            updated_at: now,
        });

        let mut published = 0;
        let mut batches = 0;
        loop {
            let batch: Vec<PublishedRecord> = records.by_ref().take(self.batch_size).collect();
            if batch.is_empty() {
                break;
            }

            let written = self.store.commit_batch(batch).await.map_err(|source| {
                PublishError::BatchFailed {
                    batch: batches,
                    published,
                    source,
                }
            })?;
            published += written;
            batches += 1;
            tracing::debug!(%source_file_id, batch = batches, published, "Committed record batch");
        }

        Ok(PublishSummary {
            total_rows,
            published,
            batches,
        })
    }

    /// Remove everything published for `source_file_id`
    pub async fn retract(&self, source_file_id: Uuid) -> Result<usize, PurgeError> {
        purge_source(self.store.as_ref(), source_file_id, self.batch_size).await
    }
}
