//! Retry utilities with exponential backoff for resilient API calls.

use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::config::RetrySettings;
use crate::sources::ProviderError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any single delay, server hints included
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum total time to spend on retries (including delays)
    pub max_total_time: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            backoff_multiplier: 2.0,
            max_total_time: Duration::from_secs(300),
        }
    }
}

impl RetryConfig {
    /// A policy that retries without sleeping
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_total_time: Duration::from_secs(60),
        }
    }

    /// Build from the `[retry]` config section
    pub fn from_settings(settings: &RetrySettings) -> Self {
        let backoff_multiplier = sane_multiplier(settings.backoff_multiplier);
        if backoff_multiplier != settings.backoff_multiplier {
            tracing::warn!(
                "Ignoring retry backoff_multiplier {}, using {}",
                settings.backoff_multiplier,
                backoff_multiplier
            );
        }
        Self {
            max_attempts: settings.max_attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            backoff_multiplier,
            max_total_time: Duration::from_secs(settings.max_total_secs),
        }
    }

    /// Set the maximum number of attempts
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before the retry following failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32, transient: &TransientError) -> Duration {
        let backoff = self.initial_delay.as_secs_f64()
            * sane_multiplier(self.backoff_multiplier).powf(attempt.saturating_sub(1) as f64);
        let backoff = Duration::from_secs_f64(backoff.min(self.max_delay.as_secs_f64()));

        let delay = match transient.server_hint() {
            Some(hint) => backoff.max(hint),
            None => backoff,
        };
        delay.min(self.max_delay)
    }
}

/// Backoff never shrinks; negative, NaN and infinite multipliers fall back to 1.0
fn sane_multiplier(multiplier: f64) -> f64 {
    if multiplier.is_finite() && multiplier >= 1.0 {
        multiplier
    } else {
        1.0
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, PartialEq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded (with optional retry-after seconds)
    RateLimit(Option<u64>),
    /// Server error (5xx)
    ServerError(u16),
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Check if a ProviderError represents a transient error
    pub fn from_provider_error(err: &ProviderError) -> Option<Self> {
        match err {
            ProviderError::RateLimit { retry_after } => Some(TransientError::RateLimit(*retry_after)),
            ProviderError::Network(_) => Some(TransientError::Network),
            ProviderError::Timeout => Some(TransientError::Timeout),
            ProviderError::Server { status } => Some(TransientError::ServerError(*status)),
            ProviderError::Api(_) | ProviderError::Parse(_) | ProviderError::InvalidRequest(_) => {
                None
            }
        }
    }

    /// Delay requested by the server, if any
    pub fn server_hint(&self) -> Option<Duration> {
        match self {
            TransientError::RateLimit(Some(seconds)) => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}

/// Execute an async operation with retry logic
///
/// Transient failures are retried with exponential backoff until `max_attempts`
/// or `max_total_time` is reached; the last error is then returned. Permanent
/// errors are returned immediately.
pub async fn with_retry<T, F, Fut>(
    config: RetryConfig,
    label: &str,
    operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut attempts = 0;
    let mut total_elapsed = Duration::ZERO;
    let mut operation = operation;

    loop {
        attempts += 1;

        let error = match timeout(config.max_total_time, operation()).await {
            Ok(Ok(result)) => {
                if attempts > 1 {
                    tracing::info!(
                        "{} succeeded on attempt {} after {} transient failures",
                        label,
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Ok(Err(error)) => error,
            Err(_) => ProviderError::Timeout,
        };

        let Some(transient) = TransientError::from_provider_error(&error) else {
            return Err(error);
        };

        let delay = config.delay_for(attempts, &transient);
        total_elapsed += delay;

        if attempts >= config.max_attempts || total_elapsed >= config.max_total_time {
            tracing::warn!(
                "{} failed after {} attempts (total delay: {:?}): {}",
                label,
                attempts,
                total_elapsed,
                error
            );
            return Err(error);
        }

        tracing::debug!(
            "{}: transient error on attempt {}: {:?}, retrying in {:?}",
            label,
            attempts,
            transient,
            delay
        );

        if !delay.is_zero() {
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(RetryConfig::immediate(3), "test", move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Ok("success")
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(RetryConfig::immediate(4), "test", move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    let count = *call_count.borrow();
                    if count < 3 {
                        Err(ProviderError::RateLimit { retry_after: Some(30) })
                    } else {
                        Ok("success")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_at_ceiling() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<(), ProviderError> = {
            let call_count = call_count.clone();
            with_retry(RetryConfig::immediate(3), "test", move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(ProviderError::Server { status: 502 })
                }
            })
        }
        .await;

        assert_eq!(result, Err(ProviderError::Server { status: 502 }));
        assert_eq!(*call_count.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_permanent_error() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<&str, ProviderError> = {
            let call_count = call_count.clone();
            with_retry(RetryConfig::immediate(5), "test", move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(ProviderError::Api("Invalid API key".to_string()))
                }
            })
        }
        .await;

        assert!(matches!(result, Err(ProviderError::Api(_))));
        assert_eq!(*call_count.borrow(), 1);
    }

    #[test]
    fn test_transient_error_detection() {
        assert!(TransientError::from_provider_error(&ProviderError::RateLimit {
            retry_after: None
        })
        .is_some());
        assert!(
            TransientError::from_provider_error(&ProviderError::Network("refused".into()))
                .is_some()
        );
        assert!(
            TransientError::from_provider_error(&ProviderError::Parse("invalid json".into()))
                .is_none()
        );
    }

    #[test]
    fn test_backoff_delays() {
        let config = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            max_total_time: Duration::from_secs(60),
        };

        assert_eq!(
            config.delay_for(1, &TransientError::Network),
            Duration::from_secs(1)
        );
        assert_eq!(
            config.delay_for(3, &TransientError::Network),
            Duration::from_secs(4)
        );
        assert_eq!(
            config.delay_for(6, &TransientError::Network),
            Duration::from_secs(10)
        );
        assert_eq!(
            config.delay_for(1, &TransientError::RateLimit(Some(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            config.delay_for(1, &TransientError::RateLimit(Some(600))),
            Duration::from_secs(10)
        );
        assert_eq!(
            RetryConfig::immediate(3).delay_for(2, &TransientError::RateLimit(Some(30))),
            Duration::ZERO
        );
    }

    #[test]
    fn test_bad_backoff_multiplier_falls_back_to_constant_delay() {
        for multiplier in [-2.0, f64::NAN, f64::INFINITY, 0.5] {
            let settings = RetrySettings {
                backoff_multiplier: multiplier,
                ..RetrySettings::default()
            };
            let config = RetryConfig::from_settings(&settings);
            assert_eq!(config.backoff_multiplier, 1.0);
            assert_eq!(
                config.delay_for(2, &TransientError::Network),
                Duration::from_millis(settings.initial_delay_ms)
            );
        }

        let config = RetryConfig {
            backoff_multiplier: -2.0,
            ..RetryConfig::default()
        };
        assert_eq!(
            config.delay_for(2, &TransientError::Network),
            config.initial_delay
        );
    }
}
