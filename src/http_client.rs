use std::time::Duration;

use reqwest::{Client, Response};
use tokio::time::{sleep, timeout};

use crate::error::ValidationError;

/// Configuration for remote schema downloads
#[derive(Debug, Clone, PartialEq)]
pub struct HttpClientConfig {
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Number of retry attempts
    pub retry_attempts: u32,
    /// Initial retry delay in milliseconds
    pub retry_delay_ms: u64,
    /// Maximum retry delay in milliseconds (for exponential backoff cap)
    pub max_retry_delay_ms: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 30000,
            user_agent: format!("xsd-check/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Longest a download can take with every retry and backoff used up
    pub fn worst_case_duration(&self) -> Duration {
        let requests = Duration::from_secs(self.timeout_seconds) * (self.retry_attempts + 1);
        let backoff: u64 = (0..self.retry_attempts)
            .map(|attempt| backoff_delay_ms(self, attempt))
            .sum();
        requests + Duration::from_millis(backoff)
    }
}

fn backoff_delay_ms(config: &HttpClientConfig, attempt: u32) -> u64 {
    config
        .retry_delay_ms
        .saturating_mul(2_u64.saturating_pow(attempt))
        .min(config.max_retry_delay_ms)
}

/// Async HTTP client for downloading remote schemas
#[derive(Debug, Clone)]
pub struct AsyncHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl AsyncHttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, ValidationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self { client, config })
    }

    /// Download a schema, retrying transient failures with capped exponential backoff
    pub async fn download_schema(&self, url: &str) -> Result<Vec<u8>, ValidationError> {
        let response = self.response_with_retry(url).await?;
        let bytes = response.bytes().await?;
        tracing::debug!(url, size = bytes.len(), "Downloaded remote schema");
        Ok(bytes.to_vec())
    }

    async fn response_with_retry(&self, url: &str) -> Result<Response, ValidationError> {
        let mut attempt = 0;

        loop {
            let error = match self.send(url).await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    let error = ValidationError::HttpStatus {
                        url: url.to_string(),
                        status: status.as_u16(),
                        message: status.canonical_reason().unwrap_or("Unknown").to_string(),
                    };
                    // 4xx will not get better by asking again
                    if !status.is_server_error() {
                        return Err(error);
                    }
                    error
                }
                Err(error) if Self::is_retryable(&error) => error,
                Err(error) => return Err(error),
            };

            if attempt >= self.config.retry_attempts {
                return Err(error);
            }
            tracing::debug!(url, attempt, error = %error, "Retrying schema download");
            sleep(self.backoff(attempt)).await;
            attempt += 1;
        }
    }

    async fn send(&self, url: &str) -> Result<Response, ValidationError> {
        timeout(
            Duration::from_secs(self.config.timeout_seconds),
            self.client.get(url).send(),
        )
        .await
        .map_err(|_| ValidationError::Timeout {
            url: url.to_string(),
            timeout_seconds: self.config.timeout_seconds,
        })?
        .map_err(ValidationError::from)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_millis(backoff_delay_ms(&self.config, attempt))
    }

    fn is_retryable(error: &ValidationError) -> bool {
        match error {
            ValidationError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ValidationError::Timeout { .. } => true,
            _ => false,
        }
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}
