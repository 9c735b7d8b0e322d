//! End-to-end pipeline tests
//!
//! Every test goes through the job dispatcher, the orchestrators and the
//! in-memory store, with objects read from a temporary directory.

mod helpers;

use std::sync::Arc;

use helpers::{
    amount_csv, xlsx_workbook, FailingNotifier, FaultyLedger, FaultyRecords, TestHarness,
};
use serde_json::json;
use sheetsync_common::TaskStatus;
use sheetsync_server::ledger::{NewTask, TaskLedger};
use sheetsync_server::pipeline::{IngestOutcome, ReconcileOutcome};
use sheetsync_server::publisher::PublishPolicy;
use sheetsync_server::store::{MemoryStore, RecordQuery, RecordStore};
use uuid::Uuid;

fn completed_id(outcome: &IngestOutcome) -> Uuid {
    match outcome {
        IngestOutcome::Completed { task_id, .. } => *task_id,
        other => panic!("expected a completed ingestion, got {other:?}"),
    }
}

async fn records_for(harness: &TestHarness, source: Uuid) -> Vec<serde_json::Value> {
    harness
        .store
        .list(&RecordQuery {
            source_file_id: Some(source),
            limit: 1000,
            ..Default::default()
        })
        .await
        .unwrap()
        .into_iter()
        .map(|r| serde_json::Value::Object(r.data))
        .collect()
}

#[tokio::test]
async fn test_financial_csv_with_missing_amount() {
    let harness = TestHarness::new();
    harness.put_object(
        "uploads/u1/ledger.csv",
        "Date,Amount,Description\n2026-01-01,100,Coffee\n2026-01-02,,Lunch\n2026-01-03,12.5,Books\n",
    );

    let outcome = harness
        .ingest(NewTask::main("ledger.csv", "uploads/u1/ledger.csv", "u1", "financial"))
        .await;
    let task_id = completed_id(&outcome);
    assert_eq!(
        outcome,
        IngestOutcome::Completed {
            task_id,
            record_count: 3,
            published_count: 3
        }
    );

    let task = harness.store.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.record_count, Some(3));
    assert!(task.notification_sent);

    let records = records_for(&harness, task_id).await;
    assert_eq!(
        records,
        vec![
            json!({"date": "2026-01-01", "amount": 100, "description": "Coffee"}),
            json!({"date": "2026-01-02", "amount": 0, "description": "Lunch"}),
            json!({"date": "2026-01-03", "amount": 12.5, "description": "Books"}),
        ]
    );

    let events = harness.notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source_id, task_id);
    assert_eq!(events[0].body(), "Updated financial: Main File");

    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn test_missing_object_fails_task_and_cleans_scratch() {
    let harness = TestHarness::new();

    let outcome = harness
        .ingest(NewTask::main("gone.csv", "uploads/u1/gone.csv", "u1", "financial"))
        .await;

    let IngestOutcome::Failed { task_id, message } = outcome else {
        panic!("expected a failed ingestion, got {outcome:?}");
    };
    assert!(!message.is_empty());

    let task = harness.store.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(task.error_message.as_deref(), Some(message.as_str()));
    assert!(!task.notification_sent);

    assert_eq!(harness.store.record_count().await, 0);
    assert_eq!(harness.scratch_entries(), 0);
    assert!(harness.notifier.events().is_empty());
}

#[tokio::test]
async fn test_corrupt_spreadsheet_fails_task() {
    let harness = TestHarness::new();
    harness.put_object("uploads/broken.xlsx", b"this is not a workbook");

    let outcome = harness
        .ingest(NewTask::main("broken.xlsx", "uploads/broken.xlsx", "u1", "inventory"))
        .await;

    let IngestOutcome::Failed { task_id, .. } = outcome else {
        panic!("expected a failed ingestion, got {outcome:?}");
    };
    assert_eq!(
        harness.store.get(task_id).await.unwrap().unwrap().status,
        TaskStatus::Error
    );
    assert_eq!(harness.store.record_count().await, 0);
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn test_traversal_path_is_rejected() {
    let harness = TestHarness::new();

    let outcome = harness
        .ingest(NewTask::main("passwd.csv", "../../etc/passwd", "u1", "financial"))
        .await;

    assert!(matches!(outcome, IngestOutcome::Failed { .. }));
    assert_eq!(harness.store.record_count().await, 0);
}

#[tokio::test]
async fn test_side_file_inventory_carries_display_name() {
    let harness = TestHarness::new();
    harness.put_object("uploads/promo.csv", "SKU,Stock\nA-1,3\nA-2,40\n");

    let outcome = harness
        .ingest(NewTask::side(
            "promo.csv",
            "uploads/promo.csv",
            "u1",
            "inventory",
            Some("Q3 Promo".to_string()),
            Some("2026-12-31".parse().unwrap()),
        ))
        .await;
    let task_id = completed_id(&outcome);

    let published = harness
        .store
        .list(&RecordQuery {
            source_file_id: Some(task_id),
            limit: 10,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(published.len(), 2);
    assert!(published
        .iter()
        .all(|r| r.category == "inventory" && r.custom_name.as_deref() == Some("Q3 Promo")));
    assert_eq!(published[0].data["low_stock_alert"], json!(true));
    assert_eq!(published[1].data["low_stock_alert"], json!(false));

    let events = harness.notifier.events();
    assert_eq!(events[0].body(), "Updated inventory: Q3 Promo");
}

#[tokio::test]
async fn test_delete_removes_records_and_is_idempotent() {
    let harness = TestHarness::new();
    harness.put_object("uploads/fifty.csv", amount_csv(50));
    let task_id = completed_id(
        &harness
            .ingest(NewTask::main("fifty.csv", "uploads/fifty.csv", "u1", "financial"))
            .await,
    );
    assert_eq!(harness.store.count_by_source(task_id).await.unwrap(), 50);

    // records of another task must survive
    harness.put_object("uploads/other.csv", amount_csv(5));
    let other_id = completed_id(
        &harness
            .ingest(NewTask::main("other.csv", "uploads/other.csv", "u1", "financial"))
            .await,
    );

    assert_eq!(
        harness.reconcile(task_id).await,
        ReconcileOutcome::Removed {
            records_removed: 50
        }
    );
    assert_eq!(harness.store.count_by_source(task_id).await.unwrap(), 0);
    assert!(harness.store.get(task_id).await.unwrap().is_none());

    assert_eq!(harness.reconcile(task_id).await, ReconcileOutcome::NotFound);
    assert_eq!(harness.store.count_by_source(other_id).await.unwrap(), 5);
}

#[tokio::test]
async fn test_chunked_policy_publishes_every_row() {
    let harness = TestHarness::with_policy(PublishPolicy::Chunked);
    harness.put_object("uploads/big.csv", amount_csv(1201));

    let outcome = harness
        .ingest(NewTask::main("big.csv", "uploads/big.csv", "u1", "financial"))
        .await;
    let task_id = completed_id(&outcome);

    assert_eq!(harness.store.count_by_source(task_id).await.unwrap(), 1201);
    let task = harness.store.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.record_count, Some(1201));
    assert_eq!(task.published_count, Some(1201));
}

#[tokio::test]
async fn test_legacy_policy_truncates_but_counts_every_row() {
    let harness = TestHarness::with_policy(PublishPolicy::LegacyTruncate { row_cap: 400 });
    harness.put_object("uploads/big.csv", amount_csv(450));

    let outcome = harness
        .ingest(NewTask::main("big.csv", "uploads/big.csv", "u1", "financial"))
        .await;
    let task_id = completed_id(&outcome);
    assert_eq!(
        outcome,
        IngestOutcome::Completed {
            task_id,
            record_count: 450,
            published_count: 400
        }
    );

    assert_eq!(harness.store.count_by_source(task_id).await.unwrap(), 400);
    let task = harness.store.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.record_count, Some(450));
    assert_eq!(task.published_count, Some(400));
}

#[tokio::test]
async fn test_notifier_failure_does_not_fail_task() {
    let harness = TestHarness::with_notifier(Arc::new(FailingNotifier));
    harness.put_object("uploads/ledger.csv", amount_csv(2));

    let outcome = harness
        .ingest(NewTask::main("ledger.csv", "uploads/ledger.csv", "u1", "financial"))
        .await;
    let task_id = completed_id(&outcome);

    let task = harness.store.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.notification_sent);
}

#[tokio::test]
async fn test_concurrent_same_name_uploads_do_not_collide() {
    let harness = TestHarness::new();
    harness.put_object("a/report.csv", amount_csv(3));
    harness.put_object("b/report.csv", amount_csv(7));

    let (first, second) = tokio::join!(
        harness.ingest(NewTask::main("report.csv", "a/report.csv", "u1", "financial")),
        harness.ingest(NewTask::main("report.csv", "b/report.csv", "u2", "financial")),
    );

    let (first, second) = (completed_id(&first), completed_id(&second));
    assert_eq!(harness.store.count_by_source(first).await.unwrap(), 3);
    assert_eq!(harness.store.count_by_source(second).await.unwrap(), 7);
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn test_every_record_points_at_a_known_task() {
    let harness = TestHarness::new();
    harness.put_object("uploads/one.csv", amount_csv(4));
    harness.put_object("uploads/two.csv", "SKU,Stock\nA,1\n");

    let ids = [
        completed_id(
            &harness
                .ingest(NewTask::main("one.csv", "uploads/one.csv", "u1", "financial"))
                .await,
        ),
        completed_id(
            &harness
                .ingest(NewTask::main("two.csv", "uploads/two.csv", "u1", "inventory"))
                .await,
        ),
    ];

    let all = harness
        .store
        .list(&RecordQuery {
            limit: 1000,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(all.len(), 5);
    assert!(all.iter().all(|r| ids.contains(&r.source_file_id)));
}

#[tokio::test]
async fn test_xlsx_inventory_upload() {
    let harness = TestHarness::new();
    harness.put_object(
        "uploads/u1/stock.xlsx",
        xlsx_workbook(&[
            vec![json!("SKU"), json!("Stock")],
            vec![json!("A-1"), json!(3)],
            vec![json!("B-2"), json!(25)],
        ]),
    );

    let outcome = harness
        .ingest(NewTask::main("stock.xlsx", "uploads/u1/stock.xlsx", "u1", "inventory"))
        .await;
    let task_id = completed_id(&outcome);

    assert_eq!(
        records_for(&harness, task_id).await,
        vec![
            json!({"sku": "A-1", "stock": 3.0, "low_stock_alert": true}),
            json!({"sku": "B-2", "stock": 25.0, "low_stock_alert": false}),
        ]
    );
    assert_eq!(harness.scratch_entries(), 0);
}

#[tokio::test]
async fn test_task_creation_failure_aborts_before_fetch() {
    let harness = TestHarness::with_backends(
        |_| {},
        |store: Arc<MemoryStore>| {
            (
                Arc::new(FaultyLedger::failing_create(store.clone())) as Arc<dyn TaskLedger>,
                store as Arc<dyn RecordStore>,
            )
        },
    );
    harness.put_object("uploads/ledger.csv", amount_csv(3));

    let outcome = harness
        .ingest(NewTask::main("ledger.csv", "uploads/ledger.csv", "u1", "financial"))
        .await;

    let IngestOutcome::Aborted { message } = &outcome else {
        panic!("expected an aborted ingestion, got {outcome:?}");
    };
    assert!(!message.is_empty());
    assert_eq!(outcome.task_id(), None);
    assert!(harness.store.tasks().await.is_empty());
    assert_eq!(harness.store.record_count().await, 0);
    assert_eq!(harness.scratch_entries(), 0);
    assert!(harness.notifier.events().is_empty());
}

#[tokio::test]
async fn test_failed_batch_removes_batches_already_written() {
    let harness = TestHarness::with_backends(
        |_| {},
        |store: Arc<MemoryStore>| {
            (
                store.clone() as Arc<dyn TaskLedger>,
                Arc::new(FaultyRecords::failing_commit_from(store, 1)) as Arc<dyn RecordStore>,
            )
        },
    );
    harness.put_object("uploads/big.csv", amount_csv(600));

    let outcome = harness
        .ingest(NewTask::main("big.csv", "uploads/big.csv", "u1", "financial"))
        .await;

    let IngestOutcome::Failed { task_id, message } = outcome else {
        panic!("expected a failed ingestion, got {outcome:?}");
    };
    assert!(message.contains("batch 1 failed after 500 records"), "{message}");

    let task = harness.store.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(task.record_count, None);
    assert_eq!(harness.store.count_by_source(task_id).await.unwrap(), 0);
    assert_eq!(harness.scratch_entries(), 0);
    assert!(harness.notifier.events().is_empty());
}

#[tokio::test]
async fn test_completion_failure_ends_in_error_without_records() {
    let harness = TestHarness::with_backends(
        |_| {},
        |store: Arc<MemoryStore>| {
            (
                Arc::new(FaultyLedger::failing_completion(store.clone())) as Arc<dyn TaskLedger>,
                store as Arc<dyn RecordStore>,
            )
        },
    );
    harness.put_object("uploads/ledger.csv", amount_csv(3));

    let outcome = harness
        .ingest(NewTask::main("ledger.csv", "uploads/ledger.csv", "u1", "financial"))
        .await;

    let IngestOutcome::Failed { task_id, message } = outcome else {
        panic!("expected a failed ingestion, got {outcome:?}");
    };
    let task = harness.store.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(task.error_message.as_deref(), Some(message.as_str()));
    assert!(!task.notification_sent);
    assert_eq!(harness.store.count_by_source(task_id).await.unwrap(), 0);
    assert!(harness.notifier.events().is_empty());
}

#[tokio::test]
async fn test_delete_failure_keeps_what_was_already_removed() {
    let harness = TestHarness::with_backends(
        |config| config.pipeline.publish_batch_size = 20,
        |store: Arc<MemoryStore>| {
            (
                store.clone() as Arc<dyn TaskLedger>,
                Arc::new(FaultyRecords::failing_delete_from(store, 1)) as Arc<dyn RecordStore>,
            )
        },
    );
    harness.put_object("uploads/fifty.csv", amount_csv(50));
    let task_id = completed_id(
        &harness
            .ingest(NewTask::main("fifty.csv", "uploads/fifty.csv", "u1", "financial"))
            .await,
    );

    let outcome = harness.reconcile(task_id).await;

    let ReconcileOutcome::Failed {
        records_removed,
        message,
    } = outcome
    else {
        panic!("expected a failed deletion, got {outcome:?}");
    };
    assert_eq!(records_removed, 20);
    assert!(!message.is_empty());

    // no rollback, and the task stays until its records are gone
    assert_eq!(harness.store.count_by_source(task_id).await.unwrap(), 30);
    let task = harness.store.get(task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
}
