//! One retrying-POST helper shared by every capability client (spec §5:
//! "retry policy component parameterised per capability" rather than one
//! ad-hoc loop per call site).

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{RequestBuilder, StatusCode, header::RETRY_AFTER};
use tracing::warn;

use crate::util::error::is_retryable;
use crate::util::retry::{RetryConfig, rate_limit_delay};

/// Sends a request built fresh on every attempt (so a consumed body can be
/// re-serialized), retrying transient failures and honouring `Retry-After`
/// on 429 per `retry`. Returns the deserialized JSON body on success.
pub(crate) async fn send_json<F, T>(build: F, retry: RetryConfig) -> Result<T>
where
    F: Fn() -> RequestBuilder,
    T: serde::de::DeserializeOwned,
{
    let mut attempt = 0usize;
    loop {
        let delay = retry.delay_for_attempt(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) if response.status().is_success() => {
                return response
                    .json::<T>()
                    .await
                    .context("failed to deserialize capability response");
            }
            Ok(response) => {
                let status = response.status();
                attempt += 1;

                if status == StatusCode::TOO_MANY_REQUESTS && retry.can_retry(attempt) {
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse::<u64>().ok())
                        .map(Duration::from_secs);
                    let wait = rate_limit_delay(retry_after);
                    warn!(%status, wait_ms = wait.as_millis() as u64, "capability rate-limited");
                    tokio::time::sleep(wait).await;
                    continue;
                }

                if status.is_server_error() && retry.can_retry(attempt) {
                    continue;
                }

                let body = response.text().await.unwrap_or_default();
                return Err(anyhow!("capability returned status {status}: {body}"));
            }
            Err(error) => {
                attempt += 1;
                let wrapped = anyhow::Error::new(error);
                if is_retryable(&wrapped) && retry.can_retry(attempt) {
                    continue;
                }
                return Err(wrapped).context("capability request failed");
            }
        }
    }
}
