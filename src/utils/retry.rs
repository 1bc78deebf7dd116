//! Retry logic with exponential backoff
//!
//! This module provides configurable retry functionality with
//! exponential backoff and jitter for handling transient failures
//! from the generation service and from storage.

use crate::error::{PhraseError, Result};
use crate::utils::network::is_retryable_error;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Errors that the default retry predicate knows how to classify.
///
/// The predicate only inspects the rendered message, but transport-level
/// failures (the request never produced a response) get a wider set of
/// retryable tokens than everything else.
pub trait RetryableError: fmt::Display {
    fn is_transport(&self) -> bool {
        false
    }
}

impl RetryableError for std::io::Error {
    fn is_transport(&self) -> bool {
        use std::io::ErrorKind;
        matches!(
            self.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
                | ErrorKind::BrokenPipe
                | ErrorKind::TimedOut
        )
    }
}

impl RetryableError for String {}

/// Receives a callback before every retry suspension.
pub trait RetryObserver: Send + Sync {
    /// Called after attempt `attempt` failed with a retryable error and
    /// before the executor sleeps for `next_delay`.
    fn on_retry(&self, attempt: u32, error: &dyn fmt::Display, next_delay: Duration);
}

impl<O: RetryObserver + ?Sized> RetryObserver for Arc<O> {
    fn on_retry(&self, attempt: u32, error: &dyn fmt::Display, next_delay: Duration) {
        (**self).on_retry(attempt, error, next_delay)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_retry(&self, _attempt: u32, _error: &dyn fmt::Display, _next_delay: Duration) {}
}

/// Logs every retry at WARN with the operation name as context.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    operation: String,
}

impl TracingObserver {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }
}

impl RetryObserver for TracingObserver {
    fn on_retry(&self, attempt: u32, error: &dyn fmt::Display, next_delay: Duration) {
        warn!(
            operation = %self.operation,
            attempt,
            error = %error,
            next_delay_ms = next_delay.as_millis() as u64,
            "Attempt failed, retrying"
        );
    }
}

/// Adapts a plain closure into a `RetryObserver`.
pub struct ClosureObserver<F> {
    callback: F,
}

impl<F> ClosureObserver<F>
where
    F: Fn(u32, &dyn fmt::Display, Duration) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> RetryObserver for ClosureObserver<F>
where
    F: Fn(u32, &dyn fmt::Display, Duration) + Send + Sync,
{
    fn on_retry(&self, attempt: u32, error: &dyn fmt::Display, next_delay: Duration) {
        (self.callback)(attempt, error, next_delay)
    }
}

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

pub struct RetryOptions<E> {
    /// Total number of calls allowed, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Fraction of the computed delay added as random jitter, in `[0, 1)`.
    pub jitter_factor: f64,
    is_retryable: Predicate<E>,
    observer: Arc<dyn RetryObserver>,
}

impl<E: RetryableError + 'static> Default for RetryOptions<E> {
    fn default() -> Self {
        Self::new(|error: &E| is_retryable_error(error))
    }
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_multiplier: self.backoff_multiplier,
            jitter_factor: self.jitter_factor,
            is_retryable: Arc::clone(&self.is_retryable),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter_factor", &self.jitter_factor)
            .finish_non_exhaustive()
    }
}

impl<E> RetryOptions<E> {
    /// Default timings with a caller-supplied retryability predicate.
    ///
    /// Use this for error types that do not implement `RetryableError`.
    pub fn new<P>(predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            is_retryable: Arc::new(predicate),
            observer: Arc::new(NoOpObserver),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Replace the retryability predicate entirely.
    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Arc::new(predicate);
        self
    }

    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: RetryObserver + 'static,
    {
        self.observer = Arc::new(observer);
        self
    }

    pub fn is_retryable(&self, error: &E) -> bool {
        (self.is_retryable)(error)
    }

    /// Check the numeric settings. The executor itself tolerates bad
    /// values, this is for options coming from configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(PhraseError::config("max_attempts must be at least 1"));
        }

        if self.backoff_multiplier <= 1.0 || !self.backoff_multiplier.is_finite() {
            return Err(PhraseError::config(format!(
                "backoff_multiplier must be greater than 1, got {}",
                self.backoff_multiplier
            )));
        }

        if !(0.0..1.0).contains(&self.jitter_factor) {
            return Err(PhraseError::config(format!(
                "jitter_factor must be in [0, 1), got {}",
                self.jitter_factor
            )));
        }

        if self.max_delay < self.initial_delay {
            return Err(PhraseError::config(
                "max_delay must not be smaller than initial_delay",
            ));
        }

        Ok(())
    }
}

/// Outcome of `with_exponential_backoff`.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The value of the successful call, or the error of the last call made.
    pub outcome: std::result::Result<T, E>,
    /// Number of calls actually made.
    pub attempts: u32,
    /// Wall-clock time across all attempts, delays included.
    pub total_time: Duration,
}

impl<T, E> RetryResult<T, E> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&E> {
        self.outcome.as_ref().err()
    }

    pub fn total_time_ms(&self) -> u64 {
        self.total_time.as_millis() as u64
    }

    pub fn into_result(self) -> std::result::Result<T, E> {
        self.outcome
    }
}

/// Exponential delay before the retry that follows `attempt` (1-indexed),
/// capped at `max_delay`, without jitter.
pub fn base_delay<E>(options: &RetryOptions<E>, attempt: u32) -> Duration {
    Duration::from_millis(base_delay_ms(options, attempt).floor() as u64)
}

fn base_delay_ms<E>(options: &RetryOptions<E>, attempt: u32) -> f64 {
    let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
    let initial_ms = options.initial_delay.as_millis() as f64;
    let max_ms = options.max_delay.as_millis() as f64;

    (initial_ms * options.backoff_multiplier.powi(exponent)).min(max_ms)
}

/// `base_delay` plus a jitter drawn uniformly from `[0, delay * jitter_factor)`,
/// floored to whole milliseconds.
pub fn calculate_delay<E>(options: &RetryOptions<E>, attempt: u32) -> Duration {
    let delay_ms = base_delay_ms(options, attempt);

    let jitter_factor = if options.jitter_factor.is_finite() {
        options.jitter_factor.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let jitter_ms = delay_ms * jitter_factor * rand::thread_rng().gen::<f64>();

    Duration::from_millis((delay_ms + jitter_ms).floor() as u64)
}

/// Run `operation` until it succeeds, hits a non-retryable error, or
/// `max_attempts` calls have been made.
///
/// The operation may be invoked several times, so it must tolerate being
/// re-run. Delays are awaited with `tokio::time::sleep` and never block the
/// runtime. A `max_attempts` of zero is treated as one.
pub async fn with_exponential_backoff<T, E, F, Fut>(
    mut operation: F,
    options: &RetryOptions<E>,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = options.max_attempts.max(1);
    let start = Instant::now();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(data) => {
                debug!(attempt, "Operation succeeded");
                return RetryResult {
                    outcome: Ok(data),
                    attempts: attempt,
                    total_time: start.elapsed(),
                };
            }
            Err(error) => {
                if attempt >= max_attempts {
                    warn!(attempts = attempt, error = %error, "Retry attempts exhausted");
                    return RetryResult {
                        outcome: Err(error),
                        attempts: attempt,
                        total_time: start.elapsed(),
                    };
                }

                if !options.is_retryable(&error) {
                    debug!(attempt, error = %error, "Non-retryable error, giving up");
                    return RetryResult {
                        outcome: Err(error),
                        attempts: attempt,
                        total_time: start.elapsed(),
                    };
                }

                let delay = calculate_delay(options, attempt);
                options.observer.on_retry(attempt, &error, delay);

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// `with_exponential_backoff` for callers that only want the `Result`.
pub async fn retry_with_backoff<T, F, Fut>(
    operation: F,
    options: &RetryOptions<PhraseError>,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_exponential_backoff(operation, options)
        .await
        .into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn test_options() -> RetryOptions<PhraseError> {
        RetryOptions::default()
            .with_initial_delay(Duration::from_millis(10))
            .with_max_delay(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let result = with_exponential_backoff(
            || async { Ok::<_, PhraseError>("ok") },
            &RetryOptions::default(),
        )
        .await;

        assert!(result.is_success());
        assert_eq!(result.data(), Some(&"ok"));
        assert_eq!(result.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result = with_exponential_backoff(
            || {
                let calls = calls_clone.clone();
                async move {
                    let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if call < 3 {
                        Err(PhraseError::generation(503, "Service Unavailable"))
                    } else {
                        Ok(call)
                    }
                }
            },
            &test_options().with_max_attempts(5),
        )
        .await;

        assert!(result.is_success());
        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_attempts_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: RetryResult<(), PhraseError> = with_exponential_backoff(
            || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(PhraseError::generation(429, "rate limit exceeded"))
                }
            },
            &test_options(),
        )
        .await;

        assert!(!result.is_success());
        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            result.error(),
            Some(PhraseError::GenerationError { status: 429, .. })
        ));
    }

    #[tokio::test]
    async fn test_non_retryable_error_stops_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: RetryResult<(), PhraseError> = with_exponential_backoff(
            || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(PhraseError::EmptyInput)
                }
            },
            &test_options().with_max_attempts(4),
        )
        .await;

        assert!(!result.is_success());
        assert_eq!(result.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_single_attempt_never_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let result: RetryResult<(), PhraseError> = with_exponential_backoff(
            || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(PhraseError::timeout("deadline exceeded"))
                }
            },
            &test_options().with_max_attempts(1),
        )
        .await;

        assert_eq!(result.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_max_attempts_makes_one_call() {
        let result: RetryResult<(), PhraseError> = with_exponential_backoff(
            || async { Err(PhraseError::timeout("timeout")) },
            &test_options().with_max_attempts(0),
        )
        .await;

        assert_eq!(result.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_sees_each_retry() {
        let seen: Arc<Mutex<Vec<(u32, String, Duration)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let options = test_options()
            .with_jitter_factor(0.0)
            .with_observer(ClosureObserver::new(move |attempt, error, delay| {
                sink.lock()
                    .unwrap()
                    .push((attempt, error.to_string(), delay));
            }));

        let result: RetryResult<(), PhraseError> = with_exponential_backoff(
            || async { Err(PhraseError::generation(502, "Bad Gateway")) },
            &options,
        )
        .await;

        assert_eq!(result.attempts, 3);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 1);
        assert_eq!(seen[0].2, Duration::from_millis(10));
        assert_eq!(seen[1].0, 2);
        assert_eq!(seen[1].2, Duration::from_millis(20));
        assert!(seen[0].1.contains("502"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_time_includes_delays() {
        let options = test_options().with_jitter_factor(0.0);

        let result: RetryResult<(), PhraseError> = with_exponential_backoff(
            || async { Err(PhraseError::generation(500, "Internal Server Error")) },
            &options,
        )
        .await;

        // 10ms after the first failure, 20ms after the second
        assert!(result.total_time >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_custom_predicate_overrides_default() {
        let options: RetryOptions<String> = RetryOptions::new(|_: &String| false)
            .with_initial_delay(Duration::from_millis(1));

        let result: RetryResult<(), String> =
            with_exponential_backoff(|| async { Err("503".to_string()) }, &options).await;

        assert_eq!(result.attempts, 1);
    }

    #[test]
    fn test_base_delay_is_exponential_and_capped() {
        let options = test_options();

        assert_eq!(base_delay(&options, 1), Duration::from_millis(10));
        assert_eq!(base_delay(&options, 2), Duration::from_millis(20));
        assert_eq!(base_delay(&options, 3), Duration::from_millis(40));
        assert_eq!(base_delay(&options, 5), Duration::from_millis(100));
        assert_eq!(base_delay(&options, 60), Duration::from_millis(100));
    }

    #[test]
    fn test_delay_is_non_decreasing_and_bounded() {
        let options = test_options().with_jitter_factor(0.5);
        let ceiling = Duration::from_millis(150);

        let mut previous = Duration::ZERO;
        for attempt in 1..=20 {
            let base = base_delay(&options, attempt);
            assert!(base >= previous, "base delay decreased at attempt {}", attempt);
            previous = base;

            let jittered = calculate_delay(&options, attempt);
            assert!(jittered >= base);
            assert!(jittered <= ceiling, "delay {:?} above ceiling", jittered);
        }
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(test_options().validate().is_ok());
        assert!(test_options().with_max_attempts(0).validate().is_err());
        assert!(test_options().with_backoff_multiplier(1.0).validate().is_err());
        assert!(test_options().with_jitter_factor(1.0).validate().is_err());
        assert!(test_options().with_jitter_factor(-0.1).validate().is_err());
        assert!(test_options()
            .with_max_delay(Duration::from_millis(1))
            .validate()
            .is_err());
    }
}
