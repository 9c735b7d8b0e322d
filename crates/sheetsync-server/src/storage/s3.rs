use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{Credentials, Region},
    Client,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use super::{FetchError, ObjectFetcher, S3Config};

#[derive(Clone, Debug)]
pub struct S3ObjectFetcher {
    client: Client,
    bucket: String,
}

impl S3ObjectFetcher {
    /// Static credentials when configured, otherwise the AWS default chain
    pub async fn new(config: &S3Config) -> Self {
        let mut builder = if config.has_static_credentials() {
            let credentials = Credentials::new(
                &config.access_key,
                &config.secret_key,
                None,
                None,
                "sheetsync-storage",
            );
            aws_sdk_s3::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(credentials)
                .region(Region::new(config.region.clone()))
        } else {
            let shared = aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(config.region.clone()))
                .load()
                .await;
            aws_sdk_s3::config::Builder::from(&shared)
        };

        builder = builder.force_path_style(config.path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        info!(bucket = %config.bucket, "S3 object fetcher initialized");

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ObjectFetcher for S3ObjectFetcher {
    #[instrument(skip(self, dest))]
    async fn fetch_to(&self, path: &str, dest: &Path) -> Result<u64, FetchError> {
        let key = path.trim_start_matches('/');
        if key.is_empty() {
            return Err(FetchError::InvalidPath(path.to_string()));
        }
        debug!("Downloading s3://{}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    FetchError::NotFound(path.to_string())
                } else {
                    FetchError::Remote {
                        path: path.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let mut body = response.body.into_async_read();
        let mut file = tokio::fs::File::create(dest).await?;
        let written = tokio::io::copy(&mut body, &mut file).await?;
        file.flush().await?;

        debug!(bytes = written, "Downloaded s3://{}/{}", self.bucket, key);
        Ok(written)
    }

    fn backend_name(&self) -> &str {
        "s3"
    }
}
