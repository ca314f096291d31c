use async_trait::async_trait;
use thiserror::Error;

use convey_db::repositories::RepositoryError;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification webhook returned status {0}")]
    Status(u16),
    #[error("notification transport failure: {0}")]
    Transport(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[async_trait]
pub trait NotifyChannel: Send + Sync {
    async fn send(&self, payload: serde_json::Value) -> Result<(), NotifyError>;
}

pub struct WebhookChannel {
    http: reqwest::Client,
    endpoint: String,
}

impl WebhookChannel {
    pub fn new(endpoint: String) -> Self {
        Self { http: reqwest::Client::new(), endpoint }
    }
}

#[async_trait]
impl NotifyChannel for WebhookChannel {
    async fn send(&self, payload: serde_json::Value) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }

        Ok(())
    }
}

/// Stands in when no notification webhook is configured.
pub struct NoopChannel;

#[async_trait]
impl NotifyChannel for NoopChannel {
    async fn send(&self, _payload: serde_json::Value) -> Result<(), NotifyError> {
        Ok(())
    }
}
