//! Health checker — cheap liveness/auth probe against each provider.
//!
//! Probes `GET {baseUrl}/v1/models` with its own timeout (shorter than
//! discovery's). Results are never cached. `check_all` fans the probes
//! out concurrently, so the whole sweep takes about as long as the
//! slowest single probe, bounded by the timeout.

use futures::future::join_all;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{classify_http, ClassifiedError, ErrorCode};
use crate::providers::Provider;

#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    pub provider_key: String,
    pub healthy: bool,
    /// Wall-clock time until a response arrived; `None` when none did.
    pub latency_ms: Option<u64>,
    pub error: Option<ClassifiedError>,
}

impl HealthCheckResult {
    fn healthy(provider_key: &str, latency_ms: u64) -> Self {
        Self {
            provider_key: provider_key.to_string(),
            healthy: true,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn unhealthy(provider_key: &str, latency_ms: Option<u64>, error: ClassifiedError) -> Self {
        Self {
            provider_key: provider_key.to_string(),
            healthy: false,
            latency_ms,
            error: Some(error),
        }
    }
}

pub struct HealthChecker {
    client: reqwest::Client,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(reqwest::Client::new(), timeout)
    }

    pub fn with_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe one provider. Never fails; every outcome is a result.
    pub async fn check_health(&self, provider: &Provider) -> HealthCheckResult {
        let key = provider.key();
        let mut request = self.client.get(provider.models_url());
        if let Some(token) = provider.auth_token() {
            request = request.bearer_auth(token);
        }

        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, request.send()).await;
        let latency = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Err(_) => HealthCheckResult::unhealthy(
                key,
                None,
                ClassifiedError::new(
                    ErrorCode::ConnectionTimeout,
                    format!(
                        "Health check for {} timed out after {}ms",
                        key,
                        self.timeout.as_millis()
                    ),
                ),
            ),
            Ok(Err(e)) => HealthCheckResult::unhealthy(key, None, classify_http(e)),
            Ok(Ok(resp)) => {
                let status = resp.status();
                if status.is_success() {
                    HealthCheckResult::healthy(key, latency)
                } else {
                    HealthCheckResult::unhealthy(key, Some(latency), status_error(status))
                }
            }
        };

        debug!(
            provider = %key,
            healthy = result.healthy,
            latency_ms = ?result.latency_ms,
            "Health check finished"
        );
        result
    }

    /// Probe every provider concurrently. Results come back in input
    /// order once each probe has finished or timed out.
    pub async fn check_all<'a, I>(&self, providers: I) -> Vec<HealthCheckResult>
    where
        I: IntoIterator<Item = &'a Provider>,
    {
        join_all(providers.into_iter().map(|p| self.check_health(p))).await
    }
}

/// 401/403 are auth failures; anything else non-2xx means the provider
/// is up but not serving.
fn status_error(status: StatusCode) -> ClassifiedError {
    let raw = format!(
        "HTTP {}: {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("error")
    );
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClassifiedError::new(
            ErrorCode::AuthInvalid,
            format!("{}: {}", ErrorCode::AuthInvalid.summary(), raw),
        ),
        _ => ClassifiedError::new(
            ErrorCode::ProviderUnavailable,
            format!("{}: {}", ErrorCode::ProviderUnavailable.summary(), raw),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_mapping() {
        assert_eq!(status_error(StatusCode::UNAUTHORIZED).code(), ErrorCode::AuthInvalid);
        assert_eq!(status_error(StatusCode::FORBIDDEN).code(), ErrorCode::AuthInvalid);
        assert_eq!(status_error(StatusCode::NOT_FOUND).code(), ErrorCode::ProviderUnavailable);
        assert_eq!(
            status_error(StatusCode::SERVICE_UNAVAILABLE).code(),
            ErrorCode::ProviderUnavailable
        );
        assert!(status_error(StatusCode::BAD_GATEWAY).message().contains("HTTP 502"));
    }
}
