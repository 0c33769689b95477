//! # plotsync Resilience
//!
//! Guards commands that cross the transport boundary.
//!
//! This crate provides:
//! - `RetryExecutor`: exponential backoff over any `FnMut(u32) -> Result`,
//!   with central error classification and cancellable waits
//! - `CircuitBreaker`: closed / open / half-open fail-fast guard
//! - `HealthMonitor`: drives a breaker from a periodic health probe
//! - `RemoteClient`: sends protocol requests over a `CommandTransport`
//!   with per-request retry presets and idempotency keys
//!
//! ## Retry accounting
//!
//! `RetryConfig::max_retries` counts retries. With the standard preset an
//! operation runs up to four times, sleeping 1s, 2s and 4s in between,
//! and the fourth transient failure becomes `RetryExhausted`.
//!
//! In-process callers talk to the state store directly and never go
//! through this crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod breaker;
mod cancel;
mod classify;
mod client;
mod config;
mod error;
mod health;
mod retry;
mod transport;

pub use breaker::{BreakerError, CircuitBreaker, CircuitState, Clock, ManualClock, SystemClock};
pub use cancel::{CancellationToken, RecordingSleeper, Sleeper, ThreadSleeper};
pub use classify::{Classify, ErrorClass};
pub use client::RemoteClient;
pub use config::{BreakerConfig, ClientConfig, RetryConfig};
pub use error::{ClientError, ClientResult};
pub use health::{HealthMonitor, HealthProbe, DEFAULT_HEALTH_INTERVAL};
pub use retry::{RetryError, RetryExecutor};
pub use transport::{CommandTransport, MockTransport, TransportError};
