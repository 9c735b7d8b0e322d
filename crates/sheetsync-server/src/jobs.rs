//! Background job pool
//!
//! Conversion and deletion requests are acknowledged immediately and run
//! here: a bounded `mpsc` queue drained by a fixed number of tokio workers.
//! Every submitted job gets a ticket whose receiver resolves to the job's
//! outcome, so callers that care can await it and everyone else can drop it.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};
use uuid::Uuid;

use crate::ledger::{NewTask, TaskId};
use crate::pipeline::{IngestOrchestrator, IngestOutcome, ReconcileOrchestrator, ReconcileOutcome};

pub type JobId = Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    Ingest(NewTask),
    Reconcile { task_id: TaskId, requested_by: String },
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::Ingest(_) => "ingest",
            Job::Reconcile { .. } => "reconcile",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobOutcome {
    Ingest(IngestOutcome),
    Reconcile(ReconcileOutcome),
    /// The handler panicked; the worker survives
    Panicked { message: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Job queue is full")]
    QueueFull,

    #[error("Job dispatcher is shut down")]
    ShutDown,
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job_id: JobId, job: Job) -> JobOutcome;
}

/// Routes each job to its orchestrator
pub struct Pipelines {
    pub ingest: IngestOrchestrator,
    pub reconcile: ReconcileOrchestrator,
}

#[async_trait]
impl JobHandler for Pipelines {
    async fn handle(&self, _job_id: JobId, job: Job) -> JobOutcome {
        match job {
            Job::Ingest(task) => JobOutcome::Ingest(self.ingest.run(task).await),
            Job::Reconcile {
                task_id,
                requested_by,
            } => JobOutcome::Reconcile(self.reconcile.run(task_id, &requested_by).await),
        }
    }
}

/// Handle on a submitted job
#[derive(Debug)]
pub struct JobTicket {
    pub job_id: JobId,
    pub outcome: oneshot::Receiver<JobOutcome>,
}

struct Envelope {
    job_id: JobId,
    job: Job,
    reply: oneshot::Sender<JobOutcome>,
}

pub struct JobDispatcher {
    sender: RwLock<Option<mpsc::Sender<Envelope>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl JobDispatcher {
    /// Spawn `workers` tasks draining a queue of `capacity` pending jobs.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(handler: Arc<dyn JobHandler>, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let handler = Arc::clone(&handler);
                tokio::spawn(worker_loop(worker, receiver, handler))
            })
            .collect();

        info!(workers = workers.max(1), capacity = capacity.max(1), "Job dispatcher started");

        Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(handles),
        }
    }

    /// Queue `job` without waiting; fails fast when the queue is full
    pub fn submit(&self, job: Job) -> Result<JobTicket, DispatchError> {
        let guard = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let sender = guard.as_ref().ok_or(DispatchError::ShutDown)?;

        let job_id = Uuid::new_v4();
        let kind = job.kind();
        let (reply, outcome) = oneshot::channel();

        sender
            .try_send(Envelope { job_id, job, reply })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DispatchError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => DispatchError::ShutDown,
            })?;

        debug!(%job_id, kind, "Job queued");
        Ok(JobTicket { job_id, outcome })
    }

    /// Stop accepting jobs and wait for queued and running ones to finish
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Job worker exited abnormally");
            }
        }
        info!("Job dispatcher stopped");
    }
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Envelope>>>,
    handler: Arc<dyn JobHandler>,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(Envelope { job_id, job, reply }) = next else {
            break;
        };

        let span = tracing::info_span!("job", %job_id, kind = job.kind(), worker);
        let outcome = AssertUnwindSafe(handler.handle(job_id, job))
            .catch_unwind()
            .instrument(span)
            .await
            .unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(%job_id, %message, "Job panicked");
                JobOutcome::Panicked { message }
            });

        // the submitter may have dropped its ticket
        let _ = reply.send(outcome);
    }
    debug!(worker, "Job worker stopped");
}
