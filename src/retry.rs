//! Retry logic with linear backoff
//!
//! Failed attempts are retried after `base_delay * attempt`, so with the default
//! configuration the waits are 1s then 2s before the third and final attempt.
//! Cancellation is checked before each attempt and interrupts the wait between
//! attempts; it is never retried.
//!
//! # Example
//!
//! ```no_run
//! use modman::retry::retry_with_backoff;
//! use modman::config::RetryConfig;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> modman::Result<()> {
//! let config = RetryConfig::default();
//! let cancel = CancellationToken::new();
//! let body = retry_with_backoff(&config, &cancel, |_attempt| async {
//!     // Your operation here
//!     Ok::<_, modman::Error>(vec![0u8; 4])
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Trait for errors that can be classified as retryable or not
pub trait IsRetryable {
    /// Returns true if the operation should be attempted again
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Transport and HTTP status failures are all worth another attempt;
            // artifact hosts return 5xx and 429 transiently
            Error::Network(_) => true,
            Error::Io(_) => true,
            // Cancellation must propagate immediately
            Error::Cancelled => false,
            Error::Config { .. } => false,
            Error::Extraction(_) => false,
            Error::Serialization(_) => false,
            Error::NotFound(_) => false,
            Error::Other(_) => false,
        }
    }
}

/// Delay before the attempt following failed attempt `attempt` (1-indexed)
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    config.base_delay.saturating_mul(attempt)
}

/// Execute an async operation with linear backoff retry logic
///
/// `operation` receives the 1-indexed attempt number. Returns the first success,
/// or the error of the last attempt once `config.max_attempts` attempts have failed.
/// A non-retryable error is returned immediately; cancellation returns
/// [`Error::Cancelled`] without waiting out the current delay.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<Error> = None;

    for attempt in 1..=config.max_attempts {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if !e.is_retryable() => {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
            Err(e) => {
                if attempt < config.max_attempts {
                    let delay = backoff_delay(config, attempt);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Operation failed, retrying"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                } else {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| Error::Other("no download attempt was made".to_string())))
}
