//! Retry logic with exponential backoff and jitter
//! 
//! Used for publishing. Snapshot fetches are deliberately single-shot; a failed
//! fetch is retried by the next scheduled reconciliation pass instead.

use crate::config::Config;
use crate::error::SyncError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error};

/// Retry policy for handling transient failures
#[derive(Debug)]
pub struct RetryPolicy {
    config: Arc<Config>,
    /// Total retries performed (not counting first attempts)
    retries: AtomicU64,
}

impl RetryPolicy {
    /// Create a new retry policy
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            retries: AtomicU64::new(0),
        }
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, SyncError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let max_attempts = self.config.max_retries() + 1; // +1 for initial attempt
        let mut last_error = None;

        for attempt in 0..max_attempts {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(error) => {
                    if !error.is_retryable() {
                        debug!("Non-retryable error: {}", error);
                        return Err(error);
                    }

                    // Don't sleep after the last attempt
                    if attempt < max_attempts - 1 {
                        let delay = self.calculate_delay(attempt);
                        debug!("Attempt {} failed, retrying in {:?}: {}", attempt + 1, delay, error);
                        self.retries.fetch_add(1, Ordering::Relaxed);
                        sleep(delay).await;
                    } else {
                        error!("All {} attempts failed, giving up", max_attempts);
                    }

                    last_error = Some(error);
                }
            }
        }

        Err(last_error.unwrap_or(SyncError::RetryLimitExceeded {
            attempts: max_attempts,
        }))
    }

    /// Calculate delay for exponential backoff with jitter
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_retry_delay();
        let max_delay = self.config.max_retry_delay();
        let multiplier = self.config.retry_multiplier();

        let exponential_delay = base_delay.as_millis() as f64 * multiplier.powi(attempt as i32);
        let mut delay = Duration::from_millis(exponential_delay as u64).min(max_delay);

        // 25% jitter
        if self.config.retry_jitter() {
            let jitter_range = delay.as_millis() as u64 / 4;
            if jitter_range > 0 {
                let jitter = fastrand::u64(0..=jitter_range);
                delay = delay.saturating_add(Duration::from_millis(jitter));
            }
        }

        delay.min(max_delay)
    }

    /// Number of retries performed so far
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}
