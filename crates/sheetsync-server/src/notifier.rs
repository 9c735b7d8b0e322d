//! Change notifications
//!
//! After a file's records are published, subscribed clients get a
//! `DATA_UPDATE` push on the `data_updates` topic. Delivery is best effort:
//! failures are logged and never change the outcome of an ingestion.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

/// Topic every client subscribes to
pub const DEFAULT_TOPIC: &str = "data_updates";

/// Value of the `type` data field
pub const DATA_UPDATE: &str = "DATA_UPDATE";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Push gateway returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A change to one source file's records
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUpdateEvent {
    pub category: String,
    pub display_name: Option<String>,
    pub source_id: Uuid,
}

impl DataUpdateEvent {
    pub fn new(category: impl Into<String>, display_name: Option<String>, source_id: Uuid) -> Self {
        Self {
            category: category.into(),
            display_name,
            source_id,
        }
    }

    pub fn title(&self) -> &'static str {
        "New Data Synced"
    }

    pub fn body(&self) -> String {
        format!(
            "Updated {}: {}",
            self.category,
            self.display_name.as_deref().unwrap_or("Main File")
        )
    }

    /// Machine-readable part of the message
    pub fn data(&self) -> Value {
        json!({
            "type": DATA_UPDATE,
            "categoryId": self.category,
            "sourceId": self.source_id.to_string(),
        })
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: &DataUpdateEvent) -> Result<(), NotifyError>;

    fn channel_name(&self) -> &str;
}

/// Posts messages to a push gateway
#[derive(Debug)]
pub struct PushNotifier {
    endpoint: String,
    auth_token: Option<String>,
    topic: String,
    client: reqwest::Client,
}

impl PushNotifier {
    pub fn new(
        endpoint: impl Into<String>,
        auth_token: Option<String>,
        topic: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(NotifyError::Config("push endpoint cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            auth_token,
            topic: topic.into(),
            client,
        })
    }

    /// Message envelope sent to the gateway
    pub fn payload(&self, event: &DataUpdateEvent) -> Value {
        json!({
            "message": {
                "topic": self.topic,
                "notification": {
                    "title": event.title(),
                    "body": event.body(),
                },
                "data": event.data(),
            }
        })
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    async fn send(&self, event: &DataUpdateEvent) -> Result<(), NotifyError> {
        let mut request = self.client.post(&self.endpoint).json(&self.payload(event));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(
            endpoint = %self.endpoint,
            topic = %self.topic,
            source_id = %event.source_id,
            "Push notification delivered"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "push"
    }
}

/// Records events in the log only; used when no gateway is configured
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, event: &DataUpdateEvent) -> Result<(), NotifyError> {
        tracing::info!(
            category = %event.category,
            source_id = %event.source_id,
            body = %event.body(),
            "Data update (no push gateway configured)"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

/// Send `event`, logging and swallowing any failure.
///
/// Returns whether delivery succeeded.
pub async fn notify_best_effort(notifier: &dyn Notifier, event: &DataUpdateEvent) -> bool {
    match notifier.send(event).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                channel = notifier.channel_name(),
                source_id = %event.source_id,
                error = %e,
                "Failed to send change notification"
            );
            false
        },
    }
}
