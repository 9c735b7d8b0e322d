//! SheetSync Server Library
//!
//! Accepts requests to convert uploaded spreadsheets into records, runs
//! the conversions on a background worker pool and publishes the results.
//!
//! # Architecture
//!
//! - **features**: HTTP intake (`/convert`, `/delete-cloud`) and read
//!   endpoints, organized as command/query slices
//! - **jobs**: bounded worker pool that runs accepted requests
//! - **pipeline**: ingestion and reconciliation orchestrators
//! - **ledger** / **store**: task lifecycle and published records, in
//!   PostgreSQL or in memory
//! - **publisher**: batched record writes
//! - **storage**: fetching uploaded objects from S3 or a local directory
//! - **notifier**: best-effort change notifications
//! - **bootstrap**: builds all of the above once from [`config::Config`]
//!
//! # Example
//!
//! ```no_run
//! use sheetsync_server::{api, bootstrap::AppServices, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let services = AppServices::build(Config::load()?).await?;
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await?;
//!     axum::serve(listener, api::router(services.clone())).await?;
//!     services.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod jobs;
pub mod ledger;
pub mod middleware;
pub mod notifier;
pub mod pipeline;
pub mod publisher;
pub mod storage;
pub mod store;

pub use bootstrap::AppServices;
pub use error::AppError;
