//! Bounded retry with exponential backoff for session setup
//!
//! Session initialization and tool discovery against a cold runtime can fail
//! transiently. The client retries them a few times with a growing delay
//! (2 s, then 3 s, then 4.5 s by default) before giving up.

use crate::mcp::error::MCPOperationError;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Configuration for retry behavior with exponential backoff
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth)
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Three retries starting at 2 seconds, growing by 1.5x
    pub fn session_default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 1.5,
        }
    }

    /// Disable retries (for testing or when retries are undesired)
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            backoff_multiplier: 1.0,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::session_default()
    }
}

/// Decision about whether to retry after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation after waiting
    Retry,
    /// Fail immediately without retrying
    FailImmediately,
}

/// Type alias for boxed future to simplify retry function signatures
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Delay before retry number `attempt + 1`
pub fn calculate_backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let base_delay = config.initial_delay.as_millis() as f64;
    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = (base_delay * multiplier) as u64;

    Duration::from_millis(delay_ms).min(config.max_delay)
}

/// Local retry policy for session setup errors
///
/// Authorization failures are escalated to the token refresh wrapper instead
/// of being retried with the same credential.
pub fn should_retry_session_error(error: &MCPOperationError) -> RetryDecision {
    if error.is_retryable() {
        RetryDecision::Retry
    } else {
        RetryDecision::FailImmediately
    }
}

/// Execute an operation with retry logic and exponential backoff
pub async fn retry_with_backoff<'a, F, T, E>(
    name: &str,
    mut operation: F,
    config: &RetryConfig,
    should_retry: impl Fn(&E) -> RetryDecision,
) -> Result<T, E>
where
    F: FnMut() -> BoxFuture<'a, Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        let error = match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    info!("{} succeeded on retry attempt {}", name, attempt);
                }
                return Ok(result);
            }
            Err(error) => error,
        };

        if should_retry(&error) == RetryDecision::FailImmediately {
            debug!("{} failed with non-retryable error: {}", name, error);
            return Err(error);
        }
        if attempt >= config.max_attempts {
            if config.max_attempts > 0 {
                warn!(
                    "{} failed after {} retry attempts: {}",
                    name, config.max_attempts, error
                );
            }
            return Err(error);
        }

        let delay = calculate_backoff_delay(attempt, config);
        attempt += 1;
        warn!(
            "{} failed ({}), retrying in {:.1}s (attempt {}/{})",
            name,
            error,
            delay.as_secs_f64(),
            attempt,
            config.max_attempts
        );
        sleep(delay).await;
    }
}
