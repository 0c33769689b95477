//! Circuit breaker.
//!
//! ```text
//!            failures >= threshold
//!   Closed ───────────────────────▶ Open
//!     ▲                              │ timeout elapsed
//!     │ half_open_requests successes ▼
//!     └────────────────────────── HalfOpen ──any failure──▶ Open
//! ```

use crate::classify::Classify;
use crate::config::BreakerConfig;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// The real monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Calls pass through; consecutive failures are counted.
    Closed,
    /// Calls fail fast without running.
    Open,
    /// Calls run on probation.
    HalfOpen,
}

impl CircuitState {
    /// Returns the string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

/// Error from [`CircuitBreaker::call`].
#[derive(Error, Debug)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation did not run.
    #[error("circuit open, retry in {remaining:?}")]
    Open {
        /// Time until the circuit half-opens.
        remaining: Duration,
    },

    /// The operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    last_failure: Option<Instant>,
}

/// Stops calling a failing dependency for a cooldown period.
///
/// Only transient failures count towards opening the circuit. A
/// validation or permanent error means the dependency answered: it clears
/// the failure streak while closed, but does not count towards closing a
/// half-open circuit.
#[derive(Debug)]
pub struct CircuitBreaker<C: Clock = SystemClock> {
    config: BreakerConfig,
    clock: C,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker<SystemClock> {
    /// Creates a closed breaker on the system clock.
    pub fn new(config: BreakerConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Creates a closed breaker on a custom clock.
    pub fn with_clock(config: BreakerConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                last_failure: None,
            }),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state, without applying a pending open-to-half-open transition.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Runs `op` through the breaker.
    pub fn call<T, E, F>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        E: Classify,
        F: FnOnce() -> Result<T, E>,
    {
        self.acquire().map_err(|remaining| BreakerError::Open { remaining })?;
        match op() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                if error.class().is_retryable() {
                    self.record_failure();
                } else {
                    self.record_answered();
                }
                Err(BreakerError::Inner(error))
            }
        }
    }

    /// Forces the circuit open, as if a failure had just happened.
    pub fn trip(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure = Some(self.clock.now());
        inner.half_open_successes = 0;
        if inner.state != CircuitState::Open {
            info!(from = inner.state.as_str(), "circuit tripped open");
            inner.state = CircuitState::Open;
        }
    }

    /// Forces the circuit closed and clears its counters.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Closed {
            info!(from = inner.state.as_str(), "circuit reset");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.half_open_successes = 0;
        inner.last_failure = None;
    }

    /// Admits a call, or returns the time left until the circuit half-opens.
    fn acquire(&self) -> Result<(), Duration> {
        let mut inner = self.inner.lock();
        if inner.state != CircuitState::Open {
            return Ok(());
        }
        let now = self.clock.now();
        let elapsed = inner
            .last_failure
            .map_or(self.config.timeout, |at| now.saturating_duration_since(at));
        if elapsed < self.config.timeout {
            return Err(self.config.timeout - elapsed);
        }
        info!("circuit half-open");
        inner.state = CircuitState::HalfOpen;
        inner.half_open_successes = 0;
        Ok(())
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.half_open_requests {
                    info!("circuit closed");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    fn record_answered(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Closed {
            inner.consecutive_failures = 0;
        }
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.last_failure = Some(self.clock.now());
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    info!(
                        failures = inner.consecutive_failures,
                        "circuit opened"
                    );
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                info!("circuit reopened from half-open");
                inner.state = CircuitState::Open;
                inner.half_open_successes = 0;
            }
            CircuitState::Open => {}
        }
    }
}
