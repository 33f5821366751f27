//! Retry logic with exponential backoff for transient errors.

use crate::error::{Error, Result};
use crate::types::RetryConfig;
use std::thread;

/// Callback trait for retry progress notifications.
pub trait RetryCallback {
    /// Called when an operation is being retried.
    ///
    /// # Arguments
    /// * `attempt` - Current attempt number (1-indexed)
    /// * `max_attempts` - Maximum number of attempts
    /// * `error` - The error that triggered the retry
    /// * `delay_secs` - Seconds until next attempt
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_secs: u64);
}

/// Callback that reports retries through the `log` facade.
pub struct LogCallback;

impl RetryCallback for LogCallback {
    fn on_retry(&self, attempt: u32, max_attempts: u32, error: &Error, delay_secs: u64) {
        log::warn!(
            "Attempt {attempt}/{max_attempts} failed ({}): {error}. Retrying in {delay_secs}s...",
            error.category().description()
        );
    }
}

/// Run `operation`, relaunching it after network failures.
///
/// Makes at most `config.max_attempts` launches (at least one), sleeping
/// [`RetryConfig::delay_for_attempt`] in between. Any other error, including
/// [`Error::Locked`], is returned from the attempt that produced it.
pub fn with_retry<T>(
    config: &RetryConfig,
    callback: Option<&dyn RetryCallback>,
    mut operation: impl FnMut() -> Result<T>,
) -> Result<T> {
    let budget = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let err = match operation() {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_retryable() || attempt >= budget {
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt - 1);
        if let Some(callback) = callback {
            callback.on_retry(attempt, budget, &err, delay.as_secs());
        }
        thread::sleep(delay);
        attempt += 1;
    }
}
