// src/llm/http_client.rs
// Shared HTTP client configuration for all LLM providers

use anyhow::{Result, anyhow};
use reqwest::Client;
use std::time::Duration;
use tracing::warn;

/// Default maximum retry attempts for transient failures
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base backoff duration between retries (doubles each attempt)
const DEFAULT_BASE_BACKOFF_SECS: u64 = 1;

/// Shared HTTP client configuration for all LLM providers
pub struct LlmHttpClient {
    client: Client,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl LlmHttpClient {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: Duration::from_secs(DEFAULT_BASE_BACKOFF_SECS),
        }
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// POST a JSON body with retry on transient failures (429 and 5xx).
    /// `headers` carries provider-specific auth (Bearer token or API-key header).
    /// Returns the response body as text on success.
    pub async fn post_with_retry(
        &self,
        request_id: &str,
        url: &str,
        headers: &[(&str, &str)],
        body: String,
    ) -> Result<String> {
        let mut attempts = 0;
        let mut backoff = self.base_backoff;

        loop {
            let mut request = self
                .client
                .post(url)
                .header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            match request.body(body.clone()).send().await {
                Ok(response) => {
                    let status = response.status();
                    if !status.is_success() {
                        let error_body = response.text().await.unwrap_or_default();

                        if attempts < self.max_attempts
                            && (status.as_u16() == 429 || status.is_server_error())
                        {
                            warn!(
                                request_id = %request_id,
                                status = %status,
                                error = %error_body,
                                "Transient error, retrying in {:?}...",
                                backoff
                            );
                            tokio::time::sleep(backoff).await;
                            attempts += 1;
                            backoff *= 2;
                            continue;
                        }

                        return Err(anyhow!("API error {}: {}", status, error_body));
                    }

                    return Ok(response.text().await?);
                }
                Err(e) => {
                    if attempts < self.max_attempts {
                        warn!(
                            request_id = %request_id,
                            error = %e,
                            "Request failed, retrying in {:?}...",
                            backoff
                        );
                        tokio::time::sleep(backoff).await;
                        attempts += 1;
                        backoff *= 2;
                        continue;
                    }
                    return Err(anyhow!("Request failed after retries: {}", e));
                }
            }
        }
    }
}
