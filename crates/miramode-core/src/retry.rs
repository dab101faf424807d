//! Retry logic for BLE operations.
//!
//! Connecting to a controller is flaky: it may still be advertising to a
//! previous central, or the adapter may drop the first attempt.
//!
//! # Example
//!
//! ```
//! use miramode_core::{RetryConfig, with_retry, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! let config = RetryConfig::for_connect();
//!
//! let result = with_retry(&config, "connect", || async {
//!     Ok::<_, Error>(42)
//! }).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{ConnectionFailureReason, Error, Result};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 means no retries).
    pub max_retries: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Backoff multiplier (1.0 = constant delay, 2.0 = double each time).
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Default settings with a custom retry count.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// No retries.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Connection attempts.
    ///
    /// Ten attempts in total, one second apart, with no backoff. A
    /// controller that is busy with another phone usually frees up within
    /// a few seconds.
    pub fn for_connect() -> Self {
        Self {
            max_retries: 9,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Minimal retries with very short delays.
    pub fn quick() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    /// Set maximum number of retries.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set initial delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier.
    #[must_use]
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            // up to 25%
            capped_delay * (1.0 + rand::rng().random::<f64>() * 0.25)
        } else {
            capped_delay
        };

        Duration::from_secs_f64(final_delay)
    }
}

/// Execute an async operation with retry logic.
///
/// Non-retryable errors (see [`is_retryable`]) are returned immediately.
/// Otherwise the last error is returned once all attempts are spent.
pub async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded after {} retries", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(e) if !is_retryable(&e) || attempt >= config.max_retries => return Err(e),
            Err(e) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    operation_name,
                    attempt + 1,
                    config.max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Whether an error may succeed on a later attempt.
///
/// Transport-level failures are retryable. Protocol answers (refusals,
/// unexpected events, bad data) and caller mistakes are not.
pub fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Timeout { .. }
        | Error::Bluetooth(_)
        | Error::NotConnected
        | Error::WriteFailed { .. } => true,
        Error::ConnectionFailed { reason, .. } => !matches!(
            reason,
            ConnectionFailureReason::AdapterUnavailable
        ),
        Error::InvalidData(_)
        | Error::DeviceNotFound(_)
        | Error::CharacteristicNotFound { .. }
        | Error::Cancelled
        | Error::InvalidConfig(_)
        | Error::InvalidArgument(_)
        | Error::NotPaired
        | Error::CommandFailed { .. }
        | Error::UnknownStatus(_)
        | Error::UnexpectedResponse { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceNotFoundReason;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries)
            .initial_delay(Duration::from_millis(1))
            .jitter(false)
    }

    #[test]
    fn test_retry_config_presets() {
        assert_eq!(RetryConfig::default().max_retries, 3);
        assert_eq!(RetryConfig::none().max_retries, 0);

        let connect = RetryConfig::for_connect();
        assert_eq!(connect.max_retries + 1, 10);
        assert_eq!(connect.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(connect.delay_for_attempt(8), Duration::from_secs(1));
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig {
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_millis(300),
            jitter: false,
            max_retries: 5,
        };

        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(300));
    }

    #[test]
    fn test_jitter_bounds() {
        let config = RetryConfig::default().initial_delay(Duration::from_millis(100));
        for _ in 0..20 {
            let delay = config.delay_for_attempt(0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(125));
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&Error::timeout("test", Duration::from_secs(1))));
        assert!(is_retryable(&Error::connection_failed(
            None,
            ConnectionFailureReason::BleError("test".to_string()),
        )));
        assert!(!is_retryable(&Error::connection_failed(
            None,
            ConnectionFailureReason::AdapterUnavailable,
        )));
        assert!(is_retryable(&Error::NotConnected));
        assert!(!is_retryable(&Error::InvalidData("test".to_string())));
        assert!(!is_retryable(&Error::DeviceNotFound(
            DeviceNotFoundReason::NotFound {
                identifier: "test".to_string()
            }
        )));
        assert!(!is_retryable(&Error::NotPaired));
        assert!(!is_retryable(&Error::command_failed("pair client")));
        assert!(!is_retryable(&Error::UnknownStatus(0x02)));
    }

    #[tokio::test]
    async fn test_with_retry_immediate_success() {
        let result = with_retry(&fast(3), "test", || async { Ok::<_, Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_with_retry_eventual_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&fast(3), "test", || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::NotConnected)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_all_fail() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&fast(2), "test", || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(Error::connection_failed(
                    None,
                    ConnectionFailureReason::Timeout,
                ))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::ConnectionFailed { .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retry_non_retryable_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = Arc::clone(&attempts);

        let result: Result<i32> = with_retry(&fast(3), "test", || {
            let attempts = Arc::clone(&attempts_clone);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(Error::device_not_found("Mira"))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::DeviceNotFound(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
