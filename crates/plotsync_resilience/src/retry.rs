//! Retry with exponential backoff.

use crate::cancel::{CancellationToken, Sleeper, ThreadSleeper};
use crate::classify::{Classify, ErrorClass};
use crate::config::RetryConfig;
use thiserror::Error;
use tracing::{debug, warn};

/// Outcome of a failed [`RetryExecutor`] run.
#[derive(Error, Debug)]
pub enum RetryError<E> {
    /// Every allowed attempt failed with a retryable error.
    #[error("still failing after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// The error from the final attempt.
        last: E,
    },

    /// A non-retryable error, raised without retrying.
    #[error("{0}")]
    Failed(E),

    /// The token was cancelled before the loop finished.
    #[error("cancelled after {attempts} attempts")]
    Cancelled {
        /// Attempts made before cancellation.
        attempts: u32,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Cancelled { attempts } => {
                Some(*attempts)
            }
            RetryError::Failed(_) => None,
        }
    }

    /// The underlying error, if there was one.
    pub fn into_inner(self) -> Option<E> {
        match self {
            RetryError::Exhausted { last, .. } | RetryError::Failed(last) => Some(last),
            RetryError::Cancelled { .. } => None,
        }
    }
}

/// Runs an operation, retrying transient failures with backoff.
#[derive(Debug, Clone)]
pub struct RetryExecutor<S = ThreadSleeper> {
    config: RetryConfig,
    sleeper: S,
}

impl RetryExecutor<ThreadSleeper> {
    /// Creates an executor that blocks the calling thread between attempts.
    pub fn new(config: RetryConfig) -> Self {
        Self::with_sleeper(config, ThreadSleeper)
    }
}

impl<S: Sleeper> RetryExecutor<S> {
    /// Creates an executor with a custom sleeper.
    pub fn with_sleeper(config: RetryConfig, sleeper: S) -> Self {
        Self { config, sleeper }
    }

    /// Gets the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Runs `op`, classifying errors with [`Classify`].
    ///
    /// `op` receives the 1-indexed attempt number.
    pub fn execute<T, E, F>(&self, token: &CancellationToken, op: F) -> Result<T, RetryError<E>>
    where
        E: Classify + std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        self.execute_classified(token, |e: &E| e.class(), op)
    }

    /// Runs `op`, classifying errors with `classify`.
    ///
    /// Only [`ErrorClass::Transient`] errors are retried; anything else is
    /// returned at once as [`RetryError::Failed`].
    pub fn execute_classified<T, E, C, F>(
        &self,
        token: &CancellationToken,
        classify: C,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        E: std::fmt::Display,
        C: Fn(&E) -> ErrorClass,
        F: FnMut(u32) -> Result<T, E>,
    {
        let mut attempt = 0u32;
        loop {
            if token.is_cancelled() {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
            attempt += 1;

            let error = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            if !classify(&error).is_retryable() {
                return Err(RetryError::Failed(error));
            }
            if attempt > self.config.max_retries {
                warn!(attempts = attempt, error = %error, "retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            }

            let delay = self.config.delay_for_attempt(attempt);
            debug!(attempt, ?delay, error = %error, "transient failure, backing off");
            if !self.sleeper.sleep(delay, token) {
                return Err(RetryError::Cancelled { attempts: attempt });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::RecordingSleeper;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::time::Duration;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Reset,
        Malformed,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Classify for TestError {
        fn class(&self) -> ErrorClass {
            match self {
                TestError::Reset => ErrorClass::Transient,
                TestError::Malformed => ErrorClass::Permanent,
            }
        }
    }

    #[test]
    fn backoff_then_exhausted() {
        let sleeper = RecordingSleeper::new();
        let executor = RetryExecutor::with_sleeper(RetryConfig::standard(), &sleeper);
        let calls = Cell::new(0);

        let result: Result<(), _> = executor.execute(&CancellationToken::new(), |_| {
            calls.set(calls.get() + 1);
            Err(TestError::Reset)
        });

        match result {
            Err(RetryError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 4);
                assert_eq!(last, TestError::Reset);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(calls.get(), 4);
        assert_eq!(
            sleeper.delays(),
            [
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000)
            ]
        );
    }

    #[test]
    fn permanent_error_is_not_retried() {
        let sleeper = RecordingSleeper::new();
        let executor = RetryExecutor::with_sleeper(RetryConfig::standard(), &sleeper);

        let result: Result<(), _> =
            executor.execute(&CancellationToken::new(), |_| Err(TestError::Malformed));

        assert!(matches!(result, Err(RetryError::Failed(TestError::Malformed))));
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let sleeper = RecordingSleeper::new();
        let executor = RetryExecutor::with_sleeper(RetryConfig::quick(), &sleeper);

        let result = executor.execute(&CancellationToken::new(), |attempt| {
            if attempt < 3 {
                Err(TestError::Reset)
            } else {
                Ok(attempt)
            }
        });

        assert_eq!(result.unwrap(), 3);
        assert_eq!(
            sleeper.delays(),
            [Duration::from_millis(500), Duration::from_millis(1000)]
        );
    }

    #[test]
    fn cancellation_aborts_the_wait() {
        let sleeper = RecordingSleeper::cancelling_on(1);
        let executor = RetryExecutor::with_sleeper(RetryConfig::standard(), &sleeper);
        let token = CancellationToken::new();

        let result: Result<(), _> = executor.execute(&token, |_| Err(TestError::Reset));

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancelled_token_makes_no_attempt() {
        let token = CancellationToken::new();
        token.cancel();
        let executor = RetryExecutor::with_sleeper(RetryConfig::standard(), RecordingSleeper::new());

        let result: Result<(), RetryError<TestError>> = executor.execute(&token, |_| unreachable!());
        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 0 })));
    }

    #[test]
    fn custom_classifier() {
        let executor = RetryExecutor::with_sleeper(RetryConfig::no_retry(), RecordingSleeper::new());
        let result: Result<(), RetryError<&str>> = executor.execute_classified(
            &CancellationToken::new(),
            |_| ErrorClass::Transient,
            |_| Err("reset"),
        );
        assert_eq!(result.unwrap_err().attempts(), Some(1));
    }

    proptest! {
        #[test]
        fn attempts_never_exceed_budget(max_retries in 0u32..6) {
            let sleeper = RecordingSleeper::new();
            let config = RetryConfig::standard().with_max_retries(max_retries);
            let executor = RetryExecutor::with_sleeper(config, &sleeper);

            let result: Result<(), _> =
                executor.execute(&CancellationToken::new(), |_| Err(TestError::Reset));

            prop_assert_eq!(result.unwrap_err().attempts(), Some(max_retries + 1));
            prop_assert_eq!(sleeper.delays().len() as u32, max_retries);
        }
    }
}
