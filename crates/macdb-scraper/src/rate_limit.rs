//! Retry with exponential backoff and jitter for page fetches.
//!
//! Transient failures (network errors, 429, 5xx) are retried; everything
//! else is returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::ScraperError;

/// Upper bound on a single backoff sleep.
const MAX_DELAY_MS: u64 = 30_000;

/// Returns `true` if `err` is worth retrying after a backoff delay.
///
/// Retriable:
/// - [`ScraperError::RateLimited`]: the server asked us to back off.
/// - [`ScraperError::Http`]: connection reset, timeout, DNS failure.
/// - [`ScraperError::HttpStatus`] with a 5xx status.
///
/// 404 and other 4xx responses, parse failures, and URL validation errors
/// are returned immediately.
pub(crate) fn is_retriable(err: &ScraperError) -> bool {
    match err {
        ScraperError::RateLimited { .. } | ScraperError::Http(_) => true,
        ScraperError::HttpStatus { status, .. } => *status >= 500,
        ScraperError::Deserialize { .. }
        | ScraperError::MissingPayload { .. }
        | ScraperError::InvalidUrl { .. }
        | ScraperError::NoValidCategories { .. } => false,
    }
}

/// Executes `operation`, retrying transient errors up to `max_retries` times.
///
/// | Attempt | Sleep before next attempt          |
/// |---------|------------------------------------|
/// | 1       | base × 2⁰ ± 25 % jitter            |
/// | 2       | base × 2¹ ± 25 % jitter            |
/// | 3       | base × 2² ± 25 % jitter            |
///
/// A rate-limit response with a `Retry-After` longer than the computed delay
/// sleeps for the server-requested duration instead (still capped).
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ScraperError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScraperError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let delay_ms = backoff_delay_ms(backoff_base_ms, attempt, &err);
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient fetch error, retrying after backoff"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

fn backoff_delay_ms(backoff_base_ms: u64, attempt: u32, err: &ScraperError) -> u64 {
    let computed = backoff_base_ms
        .saturating_mul(1u64 << (attempt.saturating_sub(1)).min(10))
        .min(MAX_DELAY_MS);
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (computed as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;

    match err {
        ScraperError::RateLimited {
            retry_after_secs, ..
        } => jittered
            .max(retry_after_secs.saturating_mul(1000))
            .min(MAX_DELAY_MS),
        _ => jittered,
    }
}
