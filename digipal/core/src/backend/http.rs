//! HTTP Backend Implementation
//!
//! Talks to the pet chat service over HTTP. One request per message:
//!
//! - `POST {endpoint}` with `{"message": "..."}`
//! - `200` with `{"messages": [...], "changes": [{"attribute", "value"}]}`
//!
//! Non-success statuses, transport failures, and unparseable bodies are all
//! mapped onto [`BackendError`] so the retry loop can decide what to do.

use std::time::Duration;

use async_trait::async_trait;

use super::traits::{BackendError, ChatRequest, PetBackend, PetReply};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP chat backend client
#[derive(Clone, Debug)]
pub struct HttpBackend {
    /// Chat endpoint URL
    endpoint: String,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a backend posting to `endpoint`
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            http_client,
        })
    }

    /// The endpoint this backend posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn map_transport_error(e: &reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_decode() {
        BackendError::Malformed(e.to_string())
    } else {
        BackendError::Connection(e.to_string())
    }
}

/// Parse a response body into a reply
pub(crate) fn parse_reply(body: &str) -> Result<PetReply, BackendError> {
    serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))
}

#[async_trait]
impl PetBackend for HttpBackend {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn send(&self, request: &ChatRequest) -> Result<PetReply, BackendError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(&e))?;
        let reply = parse_reply(&body)?;

        tracing::debug!(
            messages = reply.messages.len(),
            changes = reply.changes.len(),
            "Backend replied"
        );
        Ok(reply)
    }
}
