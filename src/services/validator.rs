use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;

use crate::models::record::RecordBatch;
use crate::models::validation::ChunkResponse;

/// Client for the external AI text validation service.
///
/// Implementations own their retry, backoff and auth policy. Callers treat
/// an `Err` as final for that chunk and never retry it themselves.
#[async_trait]
pub trait TextValidator: Send + Sync {
    /// Validate one chunk of `{id: text}` records.
    async fn process_chunk(&self, chunk: &RecordBatch) -> Result<ChunkResponse, ValidatorError>;
}

/// HTTP implementation posting `{"records": {...}}` to `{base_url}/validate`.
pub struct HttpTextValidator {
    http: Client,
    endpoint: String,
    api_token: Option<String>,
    max_retries: u32,
    backoff: Duration,
}

impl HttpTextValidator {
    pub fn new(
        base_url: &str,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ValidatorError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("qc-tool/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/validate", base_url.trim_end_matches('/')),
            api_token,
            max_retries: 2,
            backoff: Duration::from_millis(500),
        })
    }

    /// Extra attempts on transient failures, with backoff doubling from `backoff`.
    pub fn with_retry_policy(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    async fn send_once(&self, chunk: &RecordBatch) -> Result<ChunkResponse, ValidatorError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "records": chunk }));
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ValidatorError::Status { status, body });
        }

        serde_json::from_str(&body).map_err(ValidatorError::Parse)
    }
}

#[async_trait]
impl TextValidator for HttpTextValidator {
    async fn process_chunk(&self, chunk: &RecordBatch) -> Result<ChunkResponse, ValidatorError> {
        let mut attempt = 0;
        loop {
            match self.send_once(chunk).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let delay = self.backoff.saturating_mul(1u32 << attempt.min(10));
                    tracing::warn!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Validation request failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidatorError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Validation service returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Failed to parse validation response: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ValidatorError {
    /// Whether another attempt might succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ValidatorError::Http(_) => true,
            ValidatorError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ValidatorError::Parse(_) => false,
        }
    }
}
