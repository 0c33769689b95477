//! Store configuration.

use crate::history::DEFAULT_MAX_HISTORY;
use plotsync_core::{Rules, TimePolicy};
use std::time::Duration;

/// Configuration for a [`crate::StateStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Undo entries kept per document; the oldest are dropped first.
    pub max_history: usize,

    /// Longest a subscriber may run before it is evicted.
    pub handler_timeout: Duration,

    /// Whether `TimeState.current` must lie within `[start, end]`.
    pub time_policy: TimePolicy,

    /// Dispatch failures retained until taken.
    pub max_dispatch_errors: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            handler_timeout: Duration::from_millis(250),
            time_policy: TimePolicy::Unconstrained,
            max_dispatch_errors: 256,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-document history cap.
    #[must_use]
    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.max_history = max_history;
        self
    }

    /// Sets the subscriber time budget.
    #[must_use]
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Sets the time policy.
    #[must_use]
    pub fn with_time_policy(mut self, policy: TimePolicy) -> Self {
        self.time_policy = policy;
        self
    }

    /// Sets how many dispatch failures are retained.
    #[must_use]
    pub fn with_max_dispatch_errors(mut self, max: usize) -> Self {
        self.max_dispatch_errors = max;
        self
    }

    /// Validation rules derived from this configuration.
    pub fn rules(&self) -> Rules {
        Rules::with_time_policy(self.time_policy)
    }
}
