use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one)
    pub max_attempts: u32,
    /// Initial delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles the delay each time)
    pub backoff_multiplier: f64,
    /// Upper bound for a wait requested by the server (Retry-After)
    pub max_hinted_delay: Duration,
}

/// What to do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up and return the error immediately
    Fail,
    /// Retry after the regular backoff delay
    Retry,
    /// Retry after the given delay (capped by `max_hinted_delay`)
    RetryAfter(Duration),
}

impl RetryConfig {
    /// Create a new retry configuration
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_hinted_delay: Duration::from_secs(60),
        }
    }

    /// Set the maximum delay between retries
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set the backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Set the cap applied to server-provided retry delays
    pub fn with_max_hinted_delay(mut self, max_hinted_delay: Duration) -> Self {
        self.max_hinted_delay = max_hinted_delay;
        self
    }

    /// Preset: DeepL batch requests.
    ///
    /// `max_retries` counts retries after the first attempt. With the defaults
    /// (4 retries, 1s base) the waits are 1s, 2s, 4s, 8s.
    pub fn deepl(max_retries: u32, base_delay: Duration) -> Self {
        Self::new(max_retries.saturating_add(1), base_delay)
            .with_max_delay(Duration::from_secs(30))
            .with_backoff_multiplier(2.0)
    }

    /// Calculate the delay for a given attempt number (0-indexed)
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

/// Execute an async operation with retries, letting the error decide how long to wait.
///
/// `classify` maps each error to a [`RetryDecision`]. A `RetryAfter` decision
/// replaces the exponential backoff for the next wait, which is how a
/// server-provided `Retry-After` is honored.
///
/// # Panics
/// Panics if `config.max_attempts` is 0
pub async fn with_retry_policy<T, E, F, Fut, C>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    classify: C,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    C: Fn(&E) -> RetryDecision,
{
    assert!(
        config.max_attempts >= 1,
        "RetryConfig.max_attempts must be >= 1, got {}",
        config.max_attempts
    );

    let mut last_error: Option<E> = None;
    let mut hinted_delay: Option<Duration> = None;

    for attempt in 0..config.max_attempts {
        // Wait before retry (except for first attempt)
        let delay = match hinted_delay.take() {
            Some(hint) => hint.min(config.max_hinted_delay),
            None => config.delay_for_attempt(attempt),
        };
        if !delay.is_zero() {
            debug!(
                "{}: Retry attempt {}/{} after {:?}",
                operation_name,
                attempt + 1,
                config.max_attempts,
                delay
            );
            sleep(delay).await;
        }

        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        "{}: Succeeded on attempt {}/{}",
                        operation_name,
                        attempt + 1,
                        config.max_attempts
                    );
                }
                return Ok(result);
            }
            Err(e) => {
                match classify(&e) {
                    RetryDecision::Fail => {
                        debug!(
                            "{}: Error is not retryable, failing immediately: {}",
                            operation_name, e
                        );
                        return Err(e);
                    }
                    RetryDecision::Retry => {}
                    RetryDecision::RetryAfter(wait) => hinted_delay = Some(wait),
                }

                let remaining = config.max_attempts - attempt - 1;
                if remaining > 0 {
                    warn!(
                        "{}: Attempt {}/{} failed ({}), {} retries remaining",
                        operation_name,
                        attempt + 1,
                        config.max_attempts,
                        e,
                        remaining
                    );
                } else {
                    warn!(
                        "{}: All {} attempts failed. Last error: {}",
                        operation_name, config.max_attempts, e
                    );
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.expect("At least one attempt should have been made"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_config_new_sets_defaults() {
        let config = RetryConfig::new(3, Duration::from_secs(1));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_hinted_delay, Duration::from_secs(60));
    }

    #[test]
    fn test_retry_config_deepl_counts_first_attempt() {
        let config = RetryConfig::deepl(4, Duration::from_secs(1));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_retry_config_deepl_zero_retries_is_single_attempt() {
        let config = RetryConfig::deepl(0, Duration::from_millis(10));
        assert_eq!(config.max_attempts, 1);
    }

    #[test]
    fn test_retry_config_deepl_saturates() {
        let config = RetryConfig::deepl(u32::MAX, Duration::from_millis(10));
        assert_eq!(config.max_attempts, u32::MAX);
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::new(4, Duration::from_secs(1)).with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_max_capping_strict() {
        let config = RetryConfig::new(10, Duration::from_secs(2))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(2.0);

        // attempt 1: 2s, attempt 2: 4s, attempt 3: 8s (capped to 5s)
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(9), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_calculation_with_multiplier_1() {
        let config = RetryConfig::new(5, Duration::from_secs(1)).with_backoff_multiplier(1.0);

        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(1));
    }

    fn always_retry<E>(_: &E) -> RetryDecision {
        RetryDecision::Retry
    }

    #[tokio::test]
    async fn test_policy_succeeds_first_attempt() {
        let config = RetryConfig::new(3, Duration::from_millis(10));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<u32, &str> = with_retry_policy(
            &config,
            "test",
            || {
                let c = counter_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                }
            },
            always_retry,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_policy_succeeds_after_failures() {
        let config = RetryConfig::new(3, Duration::from_millis(10));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<u32, &str> = with_retry_policy(
            &config,
            "test",
            || {
                let c = counter_clone.clone();
                async move {
                    let attempt = c.fetch_add(1, Ordering::SeqCst);
                    if attempt < 2 {
                        Err("temporary failure")
                    } else {
                        Ok(42)
                    }
                }
            },
            always_retry,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_policy_all_attempts_fail() {
        let config = RetryConfig::new(3, Duration::from_millis(10));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<u32, &str> = with_retry_policy(
            &config,
            "test",
            || {
                let c = counter_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("permanent failure")
                }
            },
            always_retry,
        )
        .await;

        assert_eq!(result.unwrap_err(), "permanent failure");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_policy_retryable_then_non_retryable() {
        let config = RetryConfig::new(5, Duration::from_millis(10));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<&str, &str> = with_retry_policy(
            &config,
            "test",
            || {
                let c = counter_clone.clone();
                async move {
                    let attempt = c.fetch_add(1, Ordering::SeqCst);
                    match attempt {
                        0 => Err("500 server error"),
                        _ => Err("400 bad request"),
                    }
                }
            },
            |e: &&str| {
                if e.contains("500") {
                    RetryDecision::Retry
                } else {
                    RetryDecision::Fail
                }
            },
        )
        .await;

        assert_eq!(result.unwrap_err(), "400 bad request");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    #[should_panic(expected = "max_attempts must be >= 1")]
    async fn test_policy_panics_on_zero_attempts() {
        let config = RetryConfig::new(0, Duration::from_millis(100));

        let _result: Result<(), &str> =
            with_retry_policy(&config, "zero_attempts", || async { Ok(()) }, always_retry).await;
    }

    #[tokio::test]
    async fn test_last_error_is_returned() {
        let config = RetryConfig::new(3, Duration::from_millis(5));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<(), String> = with_retry_policy(
            &config,
            "error_test",
            || {
                let c = counter_clone.clone();
                async move {
                    let attempt = c.fetch_add(1, Ordering::SeqCst);
                    Err(format!("error on attempt {}", attempt + 1))
                }
            },
            always_retry,
        )
        .await;

        assert_eq!(result.unwrap_err(), "error on attempt 3");
    }

    // ==================== Retry-After Tests ====================

    #[tokio::test]
    async fn test_policy_retry_after_overrides_backoff() {
        // Backoff would wait 10s; the hint asks for 50ms
        let config = RetryConfig::new(2, Duration::from_secs(10));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let start = std::time::Instant::now();
        let result: Result<u32, &str> = with_retry_policy(
            &config,
            "hinted",
            || {
                let c = counter_clone.clone();
                async move {
                    match c.fetch_add(1, Ordering::SeqCst) {
                        0 => Err("429"),
                        _ => Ok(7),
                    }
                }
            },
            |_| RetryDecision::RetryAfter(Duration::from_millis(50)),
        )
        .await;
        let elapsed = start.elapsed();

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(elapsed >= Duration::from_millis(50), "got {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "got {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_policy_hint_is_capped() {
        let config = RetryConfig::new(2, Duration::from_millis(10))
            .with_max_hinted_delay(Duration::from_millis(20));

        let start = std::time::Instant::now();
        let result: Result<(), &str> = with_retry_policy(
            &config,
            "capped",
            || async { Err("429") },
            |_| RetryDecision::RetryAfter(Duration::from_secs(3600)),
        )
        .await;

        assert!(result.is_err());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_policy_fail_stops_immediately() {
        let config = RetryConfig::new(5, Duration::from_millis(10));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<(), &str> = with_retry_policy(
            &config,
            "fatal",
            || {
                let c = counter_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err("quota exceeded")
                }
            },
            |_| RetryDecision::Fail,
        )
        .await;

        assert_eq!(result.unwrap_err(), "quota exceeded");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_policy_hint_applies_only_to_next_wait() {
        // First failure hints 1ms, second failure falls back to backoff (attempt 2 -> 20ms)
        let config = RetryConfig::new(3, Duration::from_millis(10));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: Result<(), &str> = with_retry_policy(
            &config,
            "mixed",
            || {
                let c = counter_clone.clone();
                async move {
                    match c.fetch_add(1, Ordering::SeqCst) {
                        0 => Err("rate limited"),
                        _ => Err("server error"),
                    }
                }
            },
            |e: &&str| {
                if e.contains("rate") {
                    RetryDecision::RetryAfter(Duration::from_millis(1))
                } else {
                    RetryDecision::Retry
                }
            },
        )
        .await;

        assert_eq!(result.unwrap_err(), "server error");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
