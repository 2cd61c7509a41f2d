use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{GatewayConfig, RetryPolicy};
use crate::constants::{
    HEADER_CORRELATION_ID, HEADER_UPSTREAM_API_KEY, HEADER_UPSTREAM_VERSION, UPSTREAM_API_VERSION,
    UPSTREAM_MESSAGES_PATH, UPSTREAM_VERSION_PREFIX,
};
use crate::error::ProxyError;
use crate::http::breaker::CircuitBreaker;
use crate::http::error::map_reqwest_error;
use crate::translate::UpstreamRequest;

/// Messages endpoint for a configured base URL, with or without a trailing `/v1`.
pub fn upstream_messages_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with(UPSTREAM_VERSION_PREFIX) {
        format!("{}{}", base, UPSTREAM_MESSAGES_PATH)
    } else {
        format!(
            "{}{}{}",
            base, UPSTREAM_VERSION_PREFIX, UPSTREAM_MESSAGES_PATH
        )
    }
}

/// Authenticated sender for the upstream messages API.
///
/// The API key is attached here and nowhere else; inbound credentials are
/// never forwarded.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    messages_url: String,
    api_key: String,
    timeout: Duration,
    retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl UpstreamClient {
    pub fn new(client: reqwest::Client, config: &GatewayConfig, breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            client,
            messages_url: upstream_messages_url(&config.upstream_base_url),
            api_key: config.api_key.clone(),
            timeout: config.request_timeout(),
            retry: config.upstream_retry,
            breaker,
        }
    }

    pub fn messages_url(&self) -> &str {
        &self.messages_url
    }

    /// Sends the translated request, retrying transport failures and
    /// retryable upstream statuses with exponential backoff.
    ///
    /// A non-retryable upstream status is returned as `Ok`; the caller
    /// translates the body.
    pub async fn send_messages(
        &self,
        body: &UpstreamRequest,
        correlation_id: Option<&str>,
        shutdown: &CancellationToken,
    ) -> Result<reqwest::Response, ProxyError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if !self.breaker.allow_request() {
                return Err(ProxyError::circuit_open());
            }

            let outcome = self.send_once(body, correlation_id).await;
            let retry_reason = match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status.is_server_error() || status.as_u16() == 429 {
                        if status.is_server_error() {
                            self.breaker.record_failure();
                        }
                        if attempt >= max_attempts {
                            return Ok(response);
                        }
                        format!("upstream answered {}", status)
                    } else {
                        self.breaker.record_success();
                        return Ok(response);
                    }
                }
                Err(e) => {
                    if e.is_transport() {
                        self.breaker.record_failure();
                    }
                    if !e.is_retryable() || attempt >= max_attempts {
                        return Err(e);
                    }
                    e.message
                }
            };

            let delay = self.retry.delay_for(attempt);
            log::warn!(
                "attempt {}/{} failed ({}), retrying in {:?}",
                attempt,
                max_attempts,
                retry_reason,
                delay
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => return Err(ProxyError::shutting_down()),
            }
        }
    }

    async fn send_once(
        &self,
        body: &UpstreamRequest,
        correlation_id: Option<&str>,
    ) -> Result<reqwest::Response, ProxyError> {
        let mut request = self
            .client
            .post(&self.messages_url)
            .header(HEADER_UPSTREAM_API_KEY, &self.api_key)
            .header(HEADER_UPSTREAM_VERSION, UPSTREAM_API_VERSION)
            .json(body);
        if let Some(id) = correlation_id {
            request = request.header(HEADER_CORRELATION_ID, id);
        }

        if body.stream {
            // streamed bodies are bounded by the idle timeout instead; only
            // the wait for response headers is capped here
            match tokio::time::timeout(self.timeout, request.send()).await {
                Ok(result) => result.map_err(map_reqwest_error),
                Err(_) => Err(ProxyError::upstream_timeout()),
            }
        } else {
            request
                .timeout(self.timeout)
                .send()
                .await
                .map_err(map_reqwest_error)
        }
    }
}
