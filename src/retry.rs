//! HTTP send with retry for provider calls.
//!
//! Transient failures are retried with exponential backoff:
//! - network errors and timeouts → retry
//! - HTTP 429 and 5xx → retry (honouring `Retry-After` when present)
//! - any other non-success status → fail immediately

use std::future::Future;
use std::time::Duration;

const BASE_BACKOFF_MS: u64 = 500;
const MAX_BACKOFF_MS: u64 = 8_000;

/// Why a request ultimately failed.
#[derive(Debug)]
pub(crate) enum SendError {
    Network(String),
    Status { status: u16, body: String },
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Network(e) => write!(f, "request failed: {}", e),
            SendError::Status { status, body } => write!(f, "HTTP {}: {}", status, body),
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    let ms = BASE_BACKOFF_MS.saturating_mul(1 << attempt.min(5));
    Duration::from_millis(ms.min(MAX_BACKOFF_MS))
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    let value = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?;
    parse_retry_after(value)
}

/// Delay-seconds form only, capped at the maximum backoff.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let secs = value.trim().parse::<u64>().ok()?;
    Some(Duration::from_millis(secs.saturating_mul(1000).min(MAX_BACKOFF_MS)))
}

fn is_transient(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Send a request built by `f`, retrying up to `max_retries` times.
///
/// Returns the first successful response. `label` names the provider in logs.
pub(crate) async fn send_with_retry<F, Fut>(
    label: &str,
    max_retries: u32,
    mut f: F,
) -> Result<reqwest::Response, SendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let delay = match f().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                let status = response.status();
                let delay = retry_after(&response).unwrap_or_else(|| backoff(attempt));
                let body = response.text().await.unwrap_or_default();
                if !is_transient(status) || attempt >= max_retries {
                    return Err(SendError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                tracing::warn!(provider = label, %status, attempt, "transient API error, retrying");
                delay
            }
            Err(e) => {
                if attempt >= max_retries {
                    return Err(SendError::Network(e.to_string()));
                }
                tracing::warn!(provider = label, error = %e, attempt, "request failed, retrying");
                backoff(attempt)
            }
        };
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
