//! Configuration management
//!
//! Everything is read from the environment (after `.env`), falling back to
//! the `DEFAULT_*` constants below.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::publisher::{PublishPolicy, DEFAULT_LEGACY_ROW_CAP};
use crate::storage::S3Config;
use crate::store::MAX_BATCH_WRITES;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/sheetsync";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default database idle timeout in seconds (10 minutes).
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default root for the local object backend.
pub const DEFAULT_LOCAL_OBJECT_ROOT: &str = "./data/objects";

/// Default directory for job-scoped scratch files.
pub const DEFAULT_SCRATCH_DIR: &str = "./data/scratch";

/// Default records per atomic publish batch.
pub const DEFAULT_PUBLISH_BATCH_SIZE: usize = MAX_BATCH_WRITES;

/// Default number of concurrent ingestion workers.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Default number of jobs that may wait for a worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default push request timeout in seconds.
pub const DEFAULT_NOTIFY_TIMEOUT_SECS: u64 = 10;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub objects: ObjectConfig,
    pub pipeline: PipelineConfig,
    pub notify: NotifyConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("Unknown STORE_BACKEND '{other}': expected 'postgres' or 'memory'"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database: DatabaseConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectBackend {
    S3,
    Local,
}

impl FromStr for ObjectBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s3" => Ok(ObjectBackend::S3),
            "local" => Ok(ObjectBackend::Local),
            other => anyhow::bail!("Unknown OBJECT_BACKEND '{other}': expected 's3' or 'local'"),
        }
    }
}

/// Where uploaded files are fetched from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub backend: ObjectBackend,
    pub local_root: PathBuf,
    pub s3: S3Config,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub scratch_dir: PathBuf,
    pub publish_policy: PublishPolicy,
    pub publish_batch_size: usize,
    pub worker_threads: usize,
    pub queue_capacity: usize,
}

/// Push gateway settings; no endpoint means notifications are only logged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub endpoint: Option<String>,
    #[serde(skip_serializing)]
    pub auth_token: Option<String>,
    pub topic: String,
    pub timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        let store_backend = match env_nonempty("STORE_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.store.backend,
        };
        let object_backend = match env_nonempty("OBJECT_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.objects.backend,
        };

        let legacy_row_cap = env_or("PUBLISH_LEGACY_ROW_CAP", DEFAULT_LEGACY_ROW_CAP);
        let publish_policy = match env_nonempty("PUBLISH_POLICY") {
            Some(mode) => PublishPolicy::parse(&mode, legacy_row_cap).ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown PUBLISH_POLICY '{mode}': expected 'chunked' or 'legacy_truncate'"
                )
            })?,
            None => defaults.pipeline.publish_policy,
        };

        let config = Config {
            server: ServerConfig {
                host: std::env::var("SHEETSYNC_HOST").unwrap_or(defaults.server.host),
                port: env_or("SHEETSYNC_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "SHEETSYNC_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            store: StoreConfig {
                backend: store_backend,
                database: DatabaseConfig {
                    url: std::env::var("DATABASE_URL").unwrap_or(defaults.store.database.url),
                    max_connections: env_or(
                        "DATABASE_MAX_CONNECTIONS",
                        DEFAULT_DATABASE_MAX_CONNECTIONS,
                    ),
                    min_connections: env_or(
                        "DATABASE_MIN_CONNECTIONS",
                        DEFAULT_DATABASE_MIN_CONNECTIONS,
                    ),
                    connect_timeout_secs: env_or(
                        "DATABASE_CONNECT_TIMEOUT",
                        DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                    ),
                    idle_timeout_secs: env_or(
                        "DATABASE_IDLE_TIMEOUT",
                        DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                    ),
                },
            },
            objects: ObjectConfig {
                backend: object_backend,
                local_root: env_nonempty("LOCAL_OBJECT_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.objects.local_root),
                s3: S3Config::from_env(),
            },
            pipeline: PipelineConfig {
                scratch_dir: env_nonempty("SCRATCH_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.pipeline.scratch_dir),
                publish_policy,
                publish_batch_size: env_or("PUBLISH_BATCH_SIZE", DEFAULT_PUBLISH_BATCH_SIZE),
                worker_threads: env_or("INGEST_WORKER_THREADS", DEFAULT_WORKER_THREADS),
                queue_capacity: env_or("INGEST_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
            },
            notify: NotifyConfig {
                endpoint: env_nonempty("NOTIFY_ENDPOINT"),
                auth_token: env_nonempty("NOTIFY_AUTH_TOKEN"),
                topic: env_nonempty("NOTIFY_TOPIC").unwrap_or(defaults.notify.topic),
                timeout_secs: env_or("NOTIFY_TIMEOUT_SECS", DEFAULT_NOTIFY_TIMEOUT_SECS),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", true),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.store.backend == StoreBackend::Postgres {
            let db = &self.store.database;
            if db.url.is_empty() {
                anyhow::bail!("Database URL cannot be empty");
            }
            if db.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }
            if db.min_connections > db.max_connections {
                anyhow::bail!(
                    "Database min_connections ({}) cannot be greater than max_connections ({})",
                    db.min_connections,
                    db.max_connections
                );
            }
        }

        if self.objects.backend == ObjectBackend::S3 && self.objects.s3.bucket.trim().is_empty() {
            anyhow::bail!("S3_BUCKET cannot be empty when OBJECT_BACKEND is 's3'");
        }

        let pipeline = &self.pipeline;
        if !(1..=MAX_BATCH_WRITES).contains(&pipeline.publish_batch_size) {
            anyhow::bail!(
                "PUBLISH_BATCH_SIZE must be between 1 and {MAX_BATCH_WRITES}, got {}",
                pipeline.publish_batch_size
            );
        }
        if let PublishPolicy::LegacyTruncate { row_cap } = pipeline.publish_policy {
            if row_cap == 0 {
                anyhow::bail!("PUBLISH_LEGACY_ROW_CAP must be greater than 0");
            }
            // the legacy policy writes its rows in a single batch
            if row_cap > pipeline.publish_batch_size {
                anyhow::bail!(
                    "PUBLISH_LEGACY_ROW_CAP ({row_cap}) cannot exceed PUBLISH_BATCH_SIZE ({})",
                    pipeline.publish_batch_size
                );
            }
        }
        if pipeline.worker_threads == 0 {
            anyhow::bail!("INGEST_WORKER_THREADS must be greater than 0");
        }
        if pipeline.queue_capacity == 0 {
            anyhow::bail!("INGEST_QUEUE_CAPACITY must be greater than 0");
        }

        if self.notify.endpoint.is_none() {
            tracing::warn!("NOTIFY_ENDPOINT not set - change notifications will only be logged");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            store: StoreConfig {
                backend: StoreBackend::Postgres,
                database: DatabaseConfig {
                    url: DEFAULT_DATABASE_URL.to_string(),
                    max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                    min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                    connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                    idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                },
            },
            objects: ObjectConfig {
                backend: ObjectBackend::S3,
                local_root: PathBuf::from(DEFAULT_LOCAL_OBJECT_ROOT),
                s3: S3Config::default(),
            },
            pipeline: PipelineConfig {
                scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
                publish_policy: PublishPolicy::default(),
                publish_batch_size: DEFAULT_PUBLISH_BATCH_SIZE,
                worker_threads: DEFAULT_WORKER_THREADS,
                queue_capacity: DEFAULT_QUEUE_CAPACITY,
            },
            notify: NotifyConfig {
                endpoint: None,
                auth_token: None,
                topic: crate::notifier::DEFAULT_TOPIC.to_string(),
                timeout_secs: DEFAULT_NOTIFY_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
        }
    }
}
