//! Test helpers for SheetSync server integration tests
//!
//! Builds a complete service stack on the in-memory store and a local
//! object directory, so pipeline and HTTP tests need no Docker.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use sheetsync_server::bootstrap::AppServices;
use sheetsync_server::config::{Config, ObjectBackend, StoreBackend};
use sheetsync_server::jobs::{Job, JobOutcome};
use sheetsync_server::ledger::{LedgerError, NewTask, ProcessingTask, TaskId, TaskLedger, TaskUpdate};
use sheetsync_server::notifier::{DataUpdateEvent, Notifier, NotifyError};
use sheetsync_server::pipeline::{IngestOutcome, ReconcileOutcome};
use sheetsync_server::publisher::PublishPolicy;
use sheetsync_server::storage::LocalObjectFetcher;
use sheetsync_server::store::{MemoryStore, PublishedRecord, RecordQuery, RecordStore, StoreError};
use tempfile::TempDir;
use uuid::Uuid;

/// Initialize tracing for tests; safe to call more than once
pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,sheetsync_server=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

/// Keeps every event it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<DataUpdateEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<DataUpdateEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, event: &DataUpdateEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

/// Rejects every event
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _event: &DataUpdateEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected {
            status: 503,
            body: "gateway down".to_string(),
        })
    }

    fn channel_name(&self) -> &str {
        "failing"
    }
}

fn outage() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

/// Ledger over a [`MemoryStore`] that refuses selected writes
pub struct FaultyLedger {
    inner: Arc<MemoryStore>,
    fail_create: bool,
    fail_completion: bool,
}

impl FaultyLedger {
    /// No task can be opened
    pub fn failing_create(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_create: true,
            fail_completion: false,
        }
    }

    /// Tasks open and fail normally but can never be marked completed
    pub fn failing_completion(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_create: false,
            fail_completion: true,
        }
    }
}

#[async_trait]
impl TaskLedger for FaultyLedger {
    async fn create(&self, task: NewTask) -> Result<TaskId, LedgerError> {
        if self.fail_create {
            return Err(outage().into());
        }
        self.inner.create(task).await
    }

    async fn update(&self, id: TaskId, update: TaskUpdate) -> Result<(), LedgerError> {
        if self.fail_completion && matches!(update, TaskUpdate::Completed { .. }) {
            return Err(outage().into());
        }
        self.inner.update(id, update).await
    }

    async fn get(&self, id: TaskId) -> Result<Option<ProcessingTask>, LedgerError> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: TaskId) -> Result<bool, LedgerError> {
        self.inner.delete(id).await
    }

    async fn ping(&self) -> Result<(), LedgerError> {
        self.inner.ping().await
    }
}

/// Record store over a [`MemoryStore`] whose commits or deletes start
/// failing from the given call (counted from zero)
pub struct FaultyRecords {
    inner: Arc<MemoryStore>,
    fail_commit_from: Option<usize>,
    fail_delete_from: Option<usize>,
    commits: AtomicUsize,
    deletes: AtomicUsize,
}

impl FaultyRecords {
    pub fn failing_commit_from(inner: Arc<MemoryStore>, call: usize) -> Self {
        Self {
            inner,
            fail_commit_from: Some(call),
            fail_delete_from: None,
            commits: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    pub fn failing_delete_from(inner: Arc<MemoryStore>, call: usize) -> Self {
        Self {
            inner,
            fail_commit_from: None,
            fail_delete_from: Some(call),
            commits: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    fn trips(counter: &AtomicUsize, fail_from: Option<usize>) -> bool {
        let call = counter.fetch_add(1, Ordering::SeqCst);
        fail_from.is_some_and(|from| call >= from)
    }
}

#[async_trait]
impl RecordStore for FaultyRecords {
    async fn commit_batch(&self, records: Vec<PublishedRecord>) -> Result<usize, StoreError> {
        if Self::trips(&self.commits, self.fail_commit_from) {
            return Err(outage());
        }
        self.inner.commit_batch(records).await
    }

    async fn list_ids_by_source(
        &self,
        source_file_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Uuid>, StoreError> {
        self.inner.list_ids_by_source(source_file_id, limit).await
    }

    async fn delete_batch(&self, ids: &[Uuid]) -> Result<usize, StoreError> {
        if Self::trips(&self.deletes, self.fail_delete_from) {
            return Err(outage());
        }
        self.inner.delete_batch(ids).await
    }

    async fn count_by_source(&self, source_file_id: Uuid) -> Result<i64, StoreError> {
        self.inner.count_by_source(source_file_id).await
    }

    async fn list(&self, query: &RecordQuery) -> Result<Vec<PublishedRecord>, StoreError> {
        self.inner.list(query).await
    }
}

type Backends = (Arc<dyn TaskLedger>, Arc<dyn RecordStore>);

fn memory_backends(store: Arc<MemoryStore>) -> Backends {
    (store.clone() as Arc<dyn TaskLedger>, store as Arc<dyn RecordStore>)
}

/// Services wired to temporary directories
pub struct TestHarness {
    pub services: AppServices,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    objects: TempDir,
    scratch: TempDir,
}

pub fn test_config(objects: &Path, scratch: &Path) -> Config {
    let mut config = Config::default();
    config.store.backend = StoreBackend::Memory;
    config.objects.backend = ObjectBackend::Local;
    config.objects.local_root = objects.to_path_buf();
    config.pipeline.scratch_dir = scratch.to_path_buf();
    config.pipeline.worker_threads = 2;
    config.pipeline.queue_capacity = 16;
    config
}

impl TestHarness {
    pub fn new() -> Self {
        Self::build(|_| {}, None, memory_backends)
    }

    pub fn with_policy(policy: PublishPolicy) -> Self {
        Self::build(move |config| config.pipeline.publish_policy = policy, None, memory_backends)
    }

    pub fn with_notifier(notifier: Arc<dyn Notifier>) -> Self {
        Self::build(|_| {}, Some(notifier), memory_backends)
    }

    /// Put a ledger and record store of the test's choosing in front of
    /// the shared [`MemoryStore`]
    pub fn with_backends(
        customize: impl FnOnce(&mut Config),
        backends: impl FnOnce(Arc<MemoryStore>) -> Backends,
    ) -> Self {
        Self::build(customize, None, backends)
    }

    fn build(
        customize: impl FnOnce(&mut Config),
        notifier: Option<Arc<dyn Notifier>>,
        backends: impl FnOnce(Arc<MemoryStore>) -> Backends,
    ) -> Self {
        init_test_tracing();

        let objects = TempDir::new().expect("Failed to create object root");
        let scratch = TempDir::new().expect("Failed to create scratch dir");
        let mut config = test_config(objects.path(), scratch.path());
        customize(&mut config);

        let store = Arc::new(MemoryStore::new());
        let recording = Arc::new(RecordingNotifier::default());
        let notifier = notifier.unwrap_or_else(|| recording.clone() as Arc<dyn Notifier>);

        let (ledger, records) = backends(store.clone());
        let services = AppServices::from_parts(
            config,
            ledger,
            records,
            Arc::new(LocalObjectFetcher::new(objects.path())),
            notifier,
        );

        Self {
            services,
            store,
            notifier: recording,
            objects,
            scratch,
        }
    }

    /// Place an object where the local fetcher will find it
    pub fn put_object(&self, path: &str, contents: impl AsRef<[u8]>) {
        let target = self.objects.path().join(path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create object dir");
        }
        std::fs::write(target, contents).expect("Failed to write object");
    }

    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch.path().to_path_buf()
    }

    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.scratch.path())
            .expect("Failed to read scratch dir")
            .count()
    }

    pub async fn ingest(&self, task: NewTask) -> IngestOutcome {
        let ticket = self
            .services
            .dispatcher
            .submit(Job::Ingest(task))
            .expect("Failed to queue ingestion");
        match ticket.outcome.await.expect("Job dropped its outcome") {
            JobOutcome::Ingest(outcome) => outcome,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    pub async fn reconcile(&self, task_id: Uuid) -> ReconcileOutcome {
        let ticket = self
            .services
            .dispatcher
            .submit(Job::Reconcile {
                task_id,
                requested_by: "user-1".to_string(),
            })
            .expect("Failed to queue deletion");
        match ticket.outcome.await.expect("Job dropped its outcome") {
            JobOutcome::Reconcile(outcome) => outcome,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}

/// `n` data rows under an `amount` header
pub fn amount_csv(n: usize) -> String {
    let mut csv = String::from("Date,Amount\n");
    for i in 0..n {
        csv.push_str(&format!("2026-01-01,{i}\n"));
    }
    csv
}

fn column_letter(idx: usize) -> char {
    char::from(b'A' + u8::try_from(idx).expect("fixture wider than 26 columns"))
}

/// Single-sheet xlsx workbook; strings, numbers and booleans become typed
/// cells and nulls are left out
pub fn xlsx_workbook(rows: &[Vec<Value>]) -> Vec<u8> {
    let mut sheet = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        let n = r + 1;
        sheet.push_str(&format!(r#"<row r="{n}">"#));
        for (c, value) in row.iter().enumerate() {
            let reference = format!("{}{n}", column_letter(c));
            match value {
                Value::String(text) => sheet.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{text}</t></is></c>"#
                )),
                Value::Number(num) => {
                    sheet.push_str(&format!(r#"<c r="{reference}"><v>{num}</v></c>"#))
                },
                Value::Bool(b) => sheet.push_str(&format!(
                    r#"<c r="{reference}" t="b"><v>{}</v></c>"#,
                    u8::from(*b)
                )),
                _ => {},
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");

    let parts = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/></Types>"#.to_string(),
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
        ),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
        ),
        ("xl/worksheets/sheet1.xml", sheet),
    ];

    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, body) in parts {
        writer.start_file(name, options).expect("Failed to start workbook part");
        writer.write_all(body.as_bytes()).expect("Failed to write workbook part");
    }
    writer.finish().expect("Failed to finish workbook").into_inner()
}
