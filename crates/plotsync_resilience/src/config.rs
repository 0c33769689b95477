//! Configuration for retries, the circuit breaker and the remote client.

use plotsync_core::Rules;
use plotsync_protocol::Request;
use std::time::Duration;

/// Configuration for retry behavior.
///
/// `max_retries` counts retries, not attempts: an operation runs at most
/// `max_retries + 1` times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration.
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// For reads: 2 retries, 500ms base, 2s cap.
    pub fn quick() -> Self {
        Self::new(2, Duration::from_millis(500), Duration::from_secs(2))
    }

    /// For writes: 3 retries, 1s base, 10s cap.
    pub fn standard() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10))
    }

    /// For expensive operations: 3 retries, 2s base, 15s cap.
    pub fn heavy() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(15))
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Sets the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base delay.
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry `retry` (1-indexed): `min(base * 2^(retry-1), max)`.
    pub fn delay_for_attempt(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Configuration for a circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open after the last failure.
    pub timeout: Duration,
    /// Consecutive half-open successes that close the circuit.
    pub half_open_requests: u32,
}

impl BreakerConfig {
    /// Sets the failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Sets the open timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the number of half-open successes needed to close.
    pub fn with_half_open_requests(mut self, requests: u32) -> Self {
        self.half_open_requests = requests.max(1);
        self
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            half_open_requests: 3,
        }
    }
}

/// Configuration for [`crate::RemoteClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Retry policy for queries and display commands.
    pub read: RetryConfig,
    /// Retry policy for state-changing commands.
    pub write: RetryConfig,
    /// Retry policy for whole-collection replacements and composites.
    pub heavy: RetryConfig,
    /// Stamp every request with a fresh `requestId`.
    pub idempotency_keys: bool,
    /// Circuit breaker settings.
    pub breaker: BreakerConfig,
    /// Rules commands are checked against before they are sent.
    pub rules: Rules,
}

impl ClientConfig {
    /// Sets the read retry policy.
    pub fn with_read(mut self, retry: RetryConfig) -> Self {
        self.read = retry;
        self
    }

    /// Sets the write retry policy.
    pub fn with_write(mut self, retry: RetryConfig) -> Self {
        self.write = retry;
        self
    }

    /// Sets the heavy retry policy.
    pub fn with_heavy(mut self, retry: RetryConfig) -> Self {
        self.heavy = retry;
        self
    }

    /// Enables or disables idempotency keys.
    pub fn with_idempotency_keys(mut self, enabled: bool) -> Self {
        self.idempotency_keys = enabled;
        self
    }

    /// Sets the circuit breaker settings.
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Sets the local validation rules.
    pub fn with_rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    /// Picks the retry policy for a request.
    ///
    /// Non-idempotent requests are never retried unless idempotency keys
    /// are enabled.
    pub fn retry_for(&self, request: &Request) -> RetryConfig {
        if !self.idempotency_keys && !request.is_idempotent() {
            return RetryConfig::no_retry();
        }
        match request {
            Request::Query(_) => self.read.clone(),
            Request::Command(command) if command.kind().is_display_only() => self.read.clone(),
            Request::Command(command) if command.is_heavy() => self.heavy.clone(),
            Request::Command(_) | Request::History(_) => self.write.clone(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read: RetryConfig::quick(),
            write: RetryConfig::standard(),
            heavy: RetryConfig::heavy(),
            idempotency_keys: true,
            breaker: BreakerConfig::default(),
            rules: Rules::default(),
        }
    }
}
