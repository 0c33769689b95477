//! Health-driven circuit control.

use crate::breaker::{CircuitBreaker, Clock};
use crate::cancel::CancellationToken;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

/// Default poll interval.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(10);

/// A health check against the remote side, e.g. `GET /health`.
pub trait HealthProbe: Send + Sync {
    /// Returns true if the remote side is healthy.
    fn check(&self) -> bool;
}

impl<F: Fn() -> bool + Send + Sync> HealthProbe for F {
    fn check(&self) -> bool {
        self()
    }
}

/// Polls a probe and drives a breaker from the result.
///
/// An unhealthy probe trips the breaker regardless of call outcomes; the
/// first healthy probe afterwards resets it.
pub struct HealthMonitor<P: HealthProbe, C: Clock> {
    probe: P,
    breaker: Arc<CircuitBreaker<C>>,
    interval: Duration,
    last_healthy: Mutex<Option<bool>>,
}

impl<P: HealthProbe + 'static, C: Clock + 'static> HealthMonitor<P, C> {
    /// Creates a monitor with the default interval.
    pub fn new(probe: P, breaker: Arc<CircuitBreaker<C>>) -> Self {
        Self {
            probe,
            breaker,
            interval: DEFAULT_HEALTH_INTERVAL,
            last_healthy: Mutex::new(None),
        }
    }

    /// Sets the poll interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Gets the poll interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Result of the most recent poll.
    pub fn last_healthy(&self) -> Option<bool> {
        *self.last_healthy.lock()
    }

    /// Runs the probe once and updates the breaker.
    pub fn poll_once(&self) -> bool {
        let healthy = self.probe.check();
        let previous = self.last_healthy.lock().replace(healthy);
        if !healthy {
            if previous != Some(false) {
                warn!("health probe failed, opening circuit");
            }
            self.breaker.trip();
        } else if previous == Some(false) {
            info!("health probe recovered, closing circuit");
            self.breaker.reset();
        }
        healthy
    }

    /// Polls on a background thread until `token` is cancelled.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("plotsync-health".into())
            .spawn(move || loop {
                self.poll_once();
                if token.wait_timeout(self.interval) {
                    break;
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{CircuitState, ManualClock};
    use crate::config::BreakerConfig;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn breaker() -> Arc<CircuitBreaker<ManualClock>> {
        Arc::new(CircuitBreaker::with_clock(
            BreakerConfig::default(),
            ManualClock::new(),
        ))
    }

    #[test]
    fn unhealthy_trips_and_recovery_resets() {
        let healthy = Arc::new(AtomicBool::new(true));
        let flag = healthy.clone();
        let breaker = breaker();
        let monitor = HealthMonitor::new(move || flag.load(Ordering::SeqCst), breaker.clone());

        assert!(monitor.poll_once());
        assert_eq!(breaker.state(), CircuitState::Closed);

        healthy.store(false, Ordering::SeqCst);
        assert!(!monitor.poll_once());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(monitor.last_healthy(), Some(false));

        healthy.store(true, Ordering::SeqCst);
        assert!(monitor.poll_once());
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn background_polling_stops_on_cancel() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let monitor = Arc::new(
            HealthMonitor::new(
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                },
                breaker(),
            )
            .with_interval(Duration::from_millis(5)),
        );

        let token = CancellationToken::new();
        let handle = monitor.spawn(token.clone()).unwrap();
        thread::sleep(Duration::from_millis(40));
        token.cancel();
        handle.join().unwrap();

        assert!(polls.load(Ordering::SeqCst) >= 1);
    }
}
