//! Cancellation and interruptible waits.

use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// A shared flag that aborts retry loops and background monitors.
///
/// Cloning yields a handle to the same flag. Waits blocked in
/// [`CancellationToken::wait_timeout`] wake immediately on cancel.
/// Cancelling a token also cancels every token derived from it with
/// [`CancellationToken::child_token`], but not the other way round.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

#[derive(Debug, Default)]
struct TokenInner {
    cancelled: Mutex<bool>,
    signal: Condvar,
    children: Mutex<Vec<Weak<TokenInner>>>,
}

impl TokenInner {
    fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.signal.notify_all();
        // Flag first: `attach` checks it under the children lock.
        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

impl CancellationToken {
    /// Creates an uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels the token and its children, waking every waiter.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// A new token that is cancelled along with this one but can also be
    /// cancelled on its own.
    pub fn child_token(&self) -> CancellationToken {
        let child = CancellationToken::new();
        self.attach(&child);
        child
    }

    /// Makes `child` cancel whenever this token does. A child attached to
    /// an already cancelled token is cancelled at once.
    pub fn attach(&self, child: &CancellationToken) {
        let mut children = self.inner.children.lock();
        if self.is_cancelled() {
            drop(children);
            child.cancel();
            return;
        }
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(&child.inner));
    }

    /// Checks if the token was cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Blocks for up to `timeout`. Returns true if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.inner.cancelled.lock();
        while !*cancelled {
            if self
                .inner
                .signal
                .wait_until(&mut cancelled, deadline)
                .timed_out()
            {
                break;
            }
        }
        *cancelled
    }
}

/// Waits between retry attempts.
pub trait Sleeper: Send + Sync {
    /// Waits for `delay`. Returns false if `token` was cancelled first.
    fn sleep(&self, delay: Duration, token: &CancellationToken) -> bool;
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, delay: Duration, token: &CancellationToken) -> bool {
        (**self).sleep(delay, token)
    }
}

/// Blocks the current thread, waking early on cancellation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration, token: &CancellationToken) -> bool {
        !token.wait_timeout(delay)
    }
}

/// Records requested delays without waiting.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
    cancel_on: Option<usize>,
}

impl RecordingSleeper {
    /// Creates a recording sleeper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels `token` during the `n`th sleep (1-indexed).
    pub fn cancelling_on(n: usize) -> Self {
        Self {
            delays: Mutex::new(Vec::new()),
            cancel_on: Some(n),
        }
    }

    /// Delays requested so far.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration, token: &CancellationToken) -> bool {
        let mut delays = self.delays.lock();
        delays.push(delay);
        if self.cancel_on == Some(delays.len()) {
            token.cancel();
        }
        !token.is_cancelled()
    }
}
