//! PostgreSQL store
//!
//! Tasks live in `processing_tasks`, records in `app_data` with the row
//! payload in a JSONB column. Terminal updates are guarded with
//! `WHERE status = 'processing'` so a finished task can never change again.

use async_trait::async_trait;
use chrono::NaiveDate;
use sheetsync_common::{CommonError, ExpiryDate, TaskStatus};
use sheetsync_ingest::Row as DataRow;
use sqlx::{postgres::PgRow, types::Json, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{check_batch_size, PublishedRecord, RecordQuery, RecordStore, StoreError};
use crate::ledger::{LedgerError, NewTask, ProcessingTask, TaskId, TaskLedger, TaskUpdate};

const TASK_COLUMNS: &str = "id, file_name, source_path, uploaded_by, category, file_role, status, \
     custom_name, expiry_date, notification_sent, record_count, published_count, error_message, \
     created_at, updated_at";

const RECORD_COLUMNS: &str =
    "id, source_file_id, row_index, category, custom_name, data, updated_at";

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_err(err: CommonError) -> StoreError {
    StoreError::Decode(err.to_string())
}

fn task_from_row(row: &PgRow) -> Result<ProcessingTask, StoreError> {
    let file_role: String = row.try_get("file_role")?;
    let status: String = row.try_get("status")?;
    let expiry_date: Option<NaiveDate> = row.try_get("expiry_date")?;

    Ok(ProcessingTask {
        id: row.try_get("id")?,
        file_name: row.try_get("file_name")?,
        source_path: row.try_get("source_path")?,
        uploaded_by: row.try_get("uploaded_by")?,
        category: row.try_get("category")?,
        file_role: file_role.parse().map_err(decode_err)?,
        status: status.parse().map_err(decode_err)?,
        custom_name: row.try_get("custom_name")?,
        expiry_date: expiry_date.map(ExpiryDate::from),
        notification_sent: row.try_get("notification_sent")?,
        record_count: row.try_get("record_count")?,
        published_count: row.try_get("published_count")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn record_from_row(row: &PgRow) -> Result<PublishedRecord, StoreError> {
    let Json(data): Json<DataRow> = row.try_get("data")?;

    Ok(PublishedRecord {
        id: row.try_get("id")?,
        source_file_id: row.try_get("source_file_id")?,
        row_index: row.try_get("row_index")?,
        category: row.try_get("category")?,
        custom_name: row.try_get("custom_name")?,
        data,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl TaskLedger for PgStore {
    #[tracing::instrument(skip(self, task), fields(file_name = %task.file_name))]
    async fn create(&self, task: NewTask) -> Result<TaskId, LedgerError> {
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO processing_tasks
                (id, file_name, source_path, uploaded_by, category, file_role, status,
                 custom_name, expiry_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(id)
        .bind(&task.file_name)
        .bind(&task.source_path)
        .bind(&task.uploaded_by)
        .bind(&task.category)
        .bind(task.file_role.as_str())
        .bind(TaskStatus::Processing.as_str())
        .bind(&task.custom_name)
        .bind(task.expiry_date.map(|d| d.date()))
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    #[tracing::instrument(skip(self, update))]
    async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<(), LedgerError> {
        let to = update.target_status();

        let result = match &update {
            TaskUpdate::Completed {
                record_count,
                published_count,
                notification_sent,
            } => {
                sqlx::query(
                    r#"
                    UPDATE processing_tasks
                    SET status = $2, record_count = $3, published_count = $4,
                        notification_sent = $5, updated_at = NOW()
                    WHERE id = $1 AND status = 'processing'
                    "#,
                )
                .bind(id)
                .bind(to.as_str())
                .bind(*record_count)
                .bind(*published_count)
                .bind(*notification_sent)
                .execute(&self.pool)
                .await?
            },
            TaskUpdate::Failed { error_message } => {
                sqlx::query(
                    r#"
                    UPDATE processing_tasks
                    SET status = $2, error_message = $3, updated_at = NOW()
                    WHERE id = $1 AND status = 'processing'
                    "#,
                )
                .bind(id)
                .bind(to.as_str())
                .bind(error_message)
                .execute(&self.pool)
                .await?
            },
        };

        if result.rows_affected() > 0 {
            return Ok(());
        }

        let current: Option<String> =
            sqlx::query_scalar("SELECT status FROM processing_tasks WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        match current {
            None => Err(LedgerError::NotFound(id)),
            Some(status) => Err(LedgerError::InvalidTransition {
                task_id: id,
                from: status.parse().map_err(decode_err)?,
                to,
            }),
        }
    }

    async fn get(&self, id: TaskId) -> Result<Option<ProcessingTask>, LedgerError> {
        let row = sqlx::query(&format!("SELECT {TASK_COLUMNS} FROM processing_tasks WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(task_from_row).transpose()?)
    }

    async fn delete(&self, id: TaskId) -> Result<bool, LedgerError> {
        let result = sqlx::query("DELETE FROM processing_tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for PgStore {
    #[tracing::instrument(skip(self, records), fields(batch = records.len()))]
    async fn commit_batch(&self, records: Vec<PublishedRecord>) -> Result<usize, StoreError> {
        check_batch_size(records.len())?;
        if records.is_empty() {
            return Ok(0);
        }
        let written = records.len();

        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "INSERT INTO app_data ({RECORD_COLUMNS}) "
        ));
        builder.push_values(records, |mut b, record| {
            b.push_bind(record.id)
                .push_bind(record.source_file_id)
                .push_bind(record.row_index)
                .push_bind(record.category)
                .push_bind(record.custom_name)
                .push_bind(Json(record.data))
                .push_bind(record.updated_at);
        });

        let mut tx = self.pool.begin().await?;
        builder.build().execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(written)
    }

    async fn list_ids_by_source(
        &self,
        source_file_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Uuid>, StoreError> {
        let ids = sqlx::query_scalar(
            "SELECT id FROM app_data WHERE source_file_id = $1 ORDER BY row_index LIMIT $2",
        )
        .bind(source_file_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    #[tracing::instrument(skip(self, ids), fields(batch = ids.len()))]
    async fn delete_batch(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        check_batch_size(ids.len())?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM app_data WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() as usize)
    }

    async fn count_by_source(&self, source_file_id: Uuid) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM app_data WHERE source_file_id = $1")
            .bind(source_file_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list(&self, query: &RecordQuery) -> Result<Vec<PublishedRecord>, StoreError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {RECORD_COLUMNS} FROM app_data WHERE TRUE"));

        if let Some(source_file_id) = query.source_file_id {
            builder.push(" AND source_file_id = ").push_bind(source_file_id);
        }
        if let Some(category) = &query.category {
            builder.push(" AND category = ").push_bind(category.clone());
        }
        builder
            .push(" ORDER BY source_file_id, row_index LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }
}
