//! Shared HTTP plumbing: response decoding and bounded retry.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::de::DeserializeOwned;

use crate::config::RetryPolicy;
use crate::error::ApiError;

/// Decode a JSON response body, mapping transport failures to [`ApiError`].
///
/// The body is read as text first so a parse failure can be logged with the
/// payload that caused it.
pub(crate) async fn decode_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(ApiError::RateLimited(retry_after));
    }

    let body = response.text().await?;

    if !status.is_success() {
        tracing::error!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "backend returned non-success status"
        );
        return Err(ApiError::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::error!(
            error = %e,
            body = %body.chars().take(500).collect::<String>(),
            "failed to parse backend response"
        );
        ApiError::Parse(e)
    })
}

/// Whether a failure is worth retrying for an idempotent request.
///
/// Client-side misuse (4xx) and malformed bodies will not improve on retry.
const fn is_transient(err: &ApiError) -> bool {
    match err {
        ApiError::Http(_) | ApiError::RateLimited(_) => true,
        ApiError::Status { status, .. } => *status >= 500,
        ApiError::Parse(_) => false,
    }
}

/// Run an idempotent request with bounded exponential backoff and jitter.
///
/// Only reads go through this helper. Non-idempotent requests (order
/// creation, cart replace) are issued exactly once by their callers.
pub(crate) async fn retry_idempotent<T, F, Fut>(
    policy: RetryPolicy,
    operation: &str,
    mut request: F,
) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match request().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_transient(&err) => {
                let delay = backoff_delay(policy, attempt, &err);
                tracing::warn!(
                    operation,
                    attempt,
                    error = %err,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying idempotent request"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Exponential backoff capped at `max_delay`, with up to 50% added jitter so
/// concurrent clients do not retry in lockstep. A `Retry-After` hint from the
/// backend takes precedence.
fn backoff_delay(policy: RetryPolicy, attempt: u32, err: &ApiError) -> Duration {
    if let ApiError::RateLimited(secs) = err {
        return Duration::from_secs(*secs).min(policy.max_delay);
    }

    let exp = policy
        .base_delay
        .saturating_mul(2_u32.saturating_pow(attempt.saturating_sub(1)));
    let capped = exp.min(policy.max_delay);
    let cap_ms = u64::try_from(capped.as_millis()).unwrap_or(u64::MAX);
    let jitter = rand::rng().random_range(0..=cap_ms / 2);
    capped + Duration::from_millis(jitter)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_up_to_the_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, ApiError> = retry_idempotent(fast_policy(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ApiError::Status {
                        status: 503,
                        body: String::new(),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), ApiError> = retry_idempotent(fast_policy(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(ApiError::Status {
                    status: 404,
                    body: String::new(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_respects_retry_after() {
        let delay = backoff_delay(fast_policy(), 1, &ApiError::RateLimited(60));
        assert_eq!(delay, Duration::from_millis(5));
    }
}
