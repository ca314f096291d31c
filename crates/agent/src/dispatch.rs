use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use convey_core::config::DispatchConfig;

/// One conversation turn forwarded to the external AI responder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchRequest {
    #[serde(rename = "routingKey")]
    pub routing_key: String,
    #[serde(rename = "agentName")]
    pub agent_name: String,
    #[serde(rename = "systemPrompt")]
    pub system_prompt: String,
    pub message: String,
}

/// The only response shape the responder may return; anything else is a
/// dispatch failure.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DispatchReply {
    pub reply: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatch request timed out")]
    Timeout,
    #[error("dispatch endpoint returned status {0}")]
    Status(u16),
    #[error("dispatch transport failure: {0}")]
    Transport(String),
    #[error("malformed dispatch response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait DispatchClient: Send + Sync {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReply, DispatchError>;
}

pub struct HttpDispatchClient {
    http: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
}

impl HttpDispatchClient {
    pub fn new(config: &DispatchConfig) -> Result<Self, DispatchError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.webhook_url.clone(),
            auth_token: config.auth_token.as_ref().map(|t| t.expose_secret().to_string()),
        })
    }
}

#[async_trait]
impl DispatchClient for HttpDispatchClient {
    async fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReply, DispatchError> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|error| {
            if error.is_timeout() {
                DispatchError::Timeout
            } else {
                DispatchError::Transport(error.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Status(status.as_u16()));
        }

        let body = response.text().await.map_err(|error| {
            if error.is_timeout() {
                DispatchError::Timeout
            } else {
                DispatchError::Transport(error.to_string())
            }
        })?;

        parse_reply(&body)
    }
}

fn parse_reply(body: &str) -> Result<DispatchReply, DispatchError> {
    serde_json::from_str::<DispatchReply>(body)
        .map_err(|error| DispatchError::Malformed(error.to_string()))
}
