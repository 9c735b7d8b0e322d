//! Process-local store
//!
//! Holds tasks and records behind `tokio` locks. Nothing survives a
//! restart; use it for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{check_batch_size, PublishedRecord, RecordQuery, RecordStore, StoreError};
use crate::ledger::{LedgerError, NewTask, ProcessingTask, TaskId, TaskLedger, TaskUpdate};

#[derive(Debug, Default)]
pub struct MemoryStore {
    tasks: RwLock<HashMap<TaskId, ProcessingTask>>,
    records: RwLock<Vec<PublishedRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records across every source
    pub async fn record_count(&self) -> usize {
        self.records.read().await.len()
    }

    /// Snapshot of every task, in no particular order
    pub async fn tasks(&self) -> Vec<ProcessingTask> {
        self.tasks.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl TaskLedger for MemoryStore {
    async fn create(&self, task: NewTask) -> Result<TaskId, LedgerError> {
        let id = Uuid::new_v4();
        self.tasks.write().await.insert(id, task.into_task(id, Utc::now()));
        Ok(id)
    }

    async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<(), LedgerError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(LedgerError::NotFound(id))?;
        update.apply(task, Utc::now())
    }

    async fn get(&self, id: TaskId) -> Result<Option<ProcessingTask>, LedgerError> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: TaskId) -> Result<bool, LedgerError> {
        Ok(self.tasks.write().await.remove(&id).is_some())
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn commit_batch(&self, records: Vec<PublishedRecord>) -> Result<usize, StoreError> {
        check_batch_size(records.len())?;
        let written = records.len();
        self.records.write().await.extend(records);
        Ok(written)
    }

    async fn list_ids_by_source(
        &self,
        source_file_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Uuid>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.source_file_id == source_file_id)
            .take(limit)
            .map(|r| r.id)
            .collect())
    }

    async fn delete_batch(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        check_batch_size(ids.len())?;
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|r| !ids.contains(&r.id));
        Ok(before - records.len())
    }

    async fn count_by_source(&self, source_file_id: Uuid) -> Result<i64, StoreError> {
        let count = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.source_file_id == source_file_id)
            .count();
        Ok(count as i64)
    }

    async fn list(&self, query: &RecordQuery) -> Result<Vec<PublishedRecord>, StoreError> {
        let mut matching: Vec<PublishedRecord> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            (a.source_file_id, a.row_index).cmp(&(b.source_file_id, b.row_index))
        });

        Ok(matching
            .into_iter()
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect())
    }
}
