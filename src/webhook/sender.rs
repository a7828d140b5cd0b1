//! Sending delivery tasks as JSON webhooks.

use std::future::Future;

use chrono::Utc;
use tracing::{debug, instrument};

use super::error::SendError;
use super::retry::{RetryConfig, retry_with_backoff};
use crate::types::DeliveryTask;

/// Delivers one task to a webhook target.
///
/// A send either succeeds (the target acknowledged with 2xx) or fails; the
/// caller decides what a failure means for the task.
pub trait WebhookSender: Send + Sync + 'static {
    /// The error type returned by this sender.
    type Error: std::error::Error + Send + Sync + 'static;

    fn send(
        &self,
        task: &DeliveryTask,
        target_url: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// [`WebhookSender`] that POSTs a [`WebhookPayload`](crate::types::WebhookPayload)
/// with reqwest, retrying transient failures with backoff.
#[derive(Debug, Clone)]
pub struct HttpWebhookSender {
    client: reqwest::Client,
    retry: RetryConfig,
}

impl HttpWebhookSender {
    pub fn new(retry: RetryConfig) -> Result<Self, SendError> {
        let client = reqwest::Client::builder()
            .timeout(retry.timeout)
            .build()
            .map_err(SendError::Client)?;
        Ok(HttpWebhookSender { client, retry })
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry
    }
}

impl WebhookSender for HttpWebhookSender {
    type Error = SendError;

    #[instrument(skip(self, task), fields(task_id = %task.id))]
    async fn send(&self, task: &DeliveryTask, target_url: &str) -> Result<(), SendError> {
        let payload = task.payload(Utc::now());
        let payload = &payload;
        let client = &self.client;

        retry_with_backoff(self.retry, move || async move {
            let response = client.post(target_url).json(payload).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(SendError::Status { status });
            }
            debug!(%status, "Webhook delivered");
            Ok(())
        })
        .await
        .into_result()
    }
}
