//! Process-wide services
//!
//! Builds the store, object fetcher, notifier and job pool once at startup
//! and hands them to the HTTP layer as shared state.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sheetsync_ingest::TransformEngine;
use tracing::info;

use crate::config::{Config, ObjectBackend, StoreBackend};
use crate::db;
use crate::jobs::{JobDispatcher, Pipelines};
use crate::ledger::TaskLedger;
use crate::notifier::{LogNotifier, Notifier, PushNotifier};
use crate::pipeline::{IngestOrchestrator, ReconcileOrchestrator};
use crate::publisher::BulkPublisher;
use crate::storage::{LocalObjectFetcher, ObjectFetcher, S3ObjectFetcher};
use crate::store::{MemoryStore, PgStore, RecordStore};

/// Shared state behind every request handler
#[derive(Clone)]
pub struct AppServices {
    pub config: Arc<Config>,
    pub ledger: Arc<dyn TaskLedger>,
    pub records: Arc<dyn RecordStore>,
    pub dispatcher: Arc<JobDispatcher>,
}

impl AppServices {
    /// Connect to every backend named in `config` and start the job pool
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let (ledger, records): (Arc<dyn TaskLedger>, Arc<dyn RecordStore>) =
            match config.store.backend {
                StoreBackend::Postgres => {
                    let pool = db::create_pool(&config.store.database)
                        .await
                        .context("Failed to connect to the database")?;
                    db::run_migrations(&pool).await?;
                    let store = Arc::new(PgStore::new(pool));
                    (store.clone() as Arc<dyn TaskLedger>, store as Arc<dyn RecordStore>)
                },
                StoreBackend::Memory => {
                    tracing::warn!("Using the in-memory store; nothing survives a restart");
                    let store = Arc::new(MemoryStore::new());
                    (store.clone() as Arc<dyn TaskLedger>, store as Arc<dyn RecordStore>)
                },
            };

        let fetcher: Arc<dyn ObjectFetcher> = match config.objects.backend {
            ObjectBackend::S3 => Arc::new(S3ObjectFetcher::new(&config.objects.s3).await),
            ObjectBackend::Local => {
                Arc::new(LocalObjectFetcher::new(config.objects.local_root.clone()))
            },
        };

        let notifier: Arc<dyn Notifier> = match &config.notify.endpoint {
            Some(endpoint) => Arc::new(
                PushNotifier::new(
                    endpoint.clone(),
                    config.notify.auth_token.clone(),
                    config.notify.topic.clone(),
                    Duration::from_secs(config.notify.timeout_secs),
                )
                .context("Failed to build push notifier")?,
            ),
            None => Arc::new(LogNotifier),
        };

        tokio::fs::create_dir_all(&config.pipeline.scratch_dir)
            .await
            .with_context(|| {
                format!(
                    "Failed to create scratch directory {}",
                    config.pipeline.scratch_dir.display()
                )
            })?;

        info!(
            store = ?config.store.backend,
            objects = fetcher.backend_name(),
            notifier = notifier.channel_name(),
            policy = config.pipeline.publish_policy.name(),
            "Services initialized"
        );

        Ok(Self::from_parts(config, ledger, records, fetcher, notifier))
    }

    /// Assemble services from already-built backends.
    ///
    /// Must be called inside a tokio runtime; starts the job pool.
    pub fn from_parts(
        config: Config,
        ledger: Arc<dyn TaskLedger>,
        records: Arc<dyn RecordStore>,
        fetcher: Arc<dyn ObjectFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let pipeline = &config.pipeline;
        let publisher = Arc::new(BulkPublisher::new(
            records.clone(),
            pipeline.publish_policy,
            pipeline.publish_batch_size,
        ));

        let handler = Arc::new(Pipelines {
            ingest: IngestOrchestrator::new(
                ledger.clone(),
                fetcher,
                Arc::new(TransformEngine::builtin()),
                publisher,
                notifier,
                pipeline.scratch_dir.clone(),
            ),
            reconcile: ReconcileOrchestrator::new(
                ledger.clone(),
                records.clone(),
                pipeline.publish_batch_size,
            ),
        });
        let dispatcher = Arc::new(JobDispatcher::start(
            handler,
            pipeline.worker_threads,
            pipeline.queue_capacity,
        ));

        Self {
            config: Arc::new(config),
            ledger,
            records,
            dispatcher,
        }
    }

    /// Drain the job pool; call after the listener stops
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }
}
