//! Retry logic with exponential backoff
//!
//! Provider calls that are safe to repeat (status polls, download URL lookups,
//! downloads, the speech request before any audio has been consumed) are wrapped
//! in [`with_retry`]. Validation failures and video submissions are never retried.
//!
//! # Example
//!
//! ```no_run
//! use shortgen::retry::{IsRetryable, with_retry};
//! use shortgen::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let result = with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (network timeouts, rate limiting, upstream 5xx) should return `true`.
/// Permanent failures (bad credentials, empty script, rejected task) should return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::Interrupted
            ),
            // Rate limiting and upstream failures clear up on their own
            Error::Provider {
                status: Some(status),
                ..
            } => *status == 429 || (500..600).contains(status),
            Error::Provider { status: None, .. } => false,
            Error::Config { .. }
            | Error::EmptyScript
            | Error::Submission(_)
            | Error::Poll { .. }
            | Error::Retrieval { .. }
            | Error::VideoGenerationFailed { .. }
            | Error::Timeout { .. }
            | Error::Mux(_)
            | Error::ExternalTool(_)
            | Error::Cancelled
            | Error::Serialization(_) => false,
        }
    }
}

/// Run `operation`, retrying retryable failures with exponential backoff
///
/// At most `config.max_attempts` retries follow the first call. The delay
/// starts at `initial_delay`, grows by `backoff_multiplier` and is capped at
/// `max_delay`; with `jitter` each sleep is stretched by up to 100%.
/// Non-retryable errors and the error of the final attempt are returned as is.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut delay = config.initial_delay;
    let mut retry = 0;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if retry > 0 {
                    tracing::info!(retries = retry, "provider call recovered");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if !error.is_retryable() {
            tracing::debug!(error = %error, "not retrying");
            return Err(error);
        }
        if retry >= config.max_attempts {
            tracing::error!(error = %error, retries = retry, "giving up after retries");
            return Err(error);
        }

        let sleep_for = if config.jitter { add_jitter(delay) } else { delay };
        tracing::warn!(
            error = %error,
            attempt = retry + 1,
            max_attempts = config.max_attempts,
            delay_ms = sleep_for.as_millis() as u64,
            "transient provider failure, retrying"
        );
        tokio::time::sleep(sleep_for).await;
        delay = delay.mul_f64(config.backoff_multiplier).min(config.max_delay);
        retry += 1;
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
