//! Object storage access
//!
//! Uploaded files are addressed by a path relative to the configured
//! backend. An [`ObjectFetcher`] copies one object into a local file so the
//! parsers can read it.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub mod config;
pub mod local;
pub mod s3;

pub use config::S3Config;
pub use local::LocalObjectFetcher;
pub use s3::S3ObjectFetcher;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Object '{0}' not found")]
    NotFound(String),

    #[error("Invalid object path '{0}'")]
    InvalidPath(String),

    #[error("Failed to fetch '{path}': {message}")]
    Remote { path: String, message: String },

    #[error("Failed to write scratch file: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Copy the object at `path` into `dest`, returning the bytes written
    async fn fetch_to(&self, path: &str, dest: &Path) -> Result<u64, FetchError>;

    fn backend_name(&self) -> &str;
}
