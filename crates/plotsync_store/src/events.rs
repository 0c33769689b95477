//! Change events and the subscriber registry.
//!
//! Dispatch is synchronous and runs in registration order after a
//! transition commits. Every handler runs against a snapshot of the
//! registry, so a handler may subscribe or unsubscribe (itself or others)
//! while an event is being delivered.
//!
//! A handler that returns an error or panics is reported and skipped; it
//! cannot roll back the transition or stop later handlers. A handler that
//! runs longer than the configured timeout is reported and evicted.

use parking_lot::{Mutex, RwLock};
use plotsync_core::{DocumentId, SliceKind, StateSlice};
use plotsync_protocol::{DataPayload, ImagePayload, LogMessage};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Names the events a handler can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A document's feature collection changed.
    FeatureCollectionChanged,
    /// A document's time state changed.
    TimeChanged,
    /// A document's viewport changed.
    ViewportChanged,
    /// A document's selection changed.
    SelectionChanged,
    /// The active document pointer moved.
    ActiveDocumentChanged,
    /// A document was opened.
    DocumentOpened,
    /// A document was closed and its state discarded.
    DocumentClosed,
    /// Text, data or an image should be shown.
    Display,
    /// A remote client sent a log line.
    Log,
}

impl EventKind {
    /// The change event for a slice.
    pub fn for_slice(kind: SliceKind) -> Self {
        match kind {
            SliceKind::FeatureCollection => EventKind::FeatureCollectionChanged,
            SliceKind::Time => EventKind::TimeChanged,
            SliceKind::Viewport => EventKind::ViewportChanged,
            SliceKind::Selection => EventKind::SelectionChanged,
        }
    }
}

/// Something to show to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayContent {
    /// Plain text.
    Text(String),
    /// Structured data.
    Data(DataPayload),
    /// An image.
    Image(ImagePayload),
}

/// An event delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// One slice of one document has a new value.
    SliceChanged {
        /// The document.
        document_id: DocumentId,
        /// The slice's new value.
        slice: StateSlice,
    },
    /// The active document pointer moved.
    ActiveDocumentChanged {
        /// Previously active document.
        previous: Option<DocumentId>,
        /// Newly active document.
        current: Option<DocumentId>,
    },
    /// A document was opened with empty state.
    DocumentOpened {
        /// The document.
        document_id: DocumentId,
    },
    /// A document was closed.
    DocumentClosed {
        /// The document.
        document_id: DocumentId,
    },
    /// Content for display panels.
    Display {
        /// Document the command was addressed to, if any.
        document_id: Option<DocumentId>,
        /// What to show.
        content: DisplayContent,
    },
    /// A forwarded log line.
    Log {
        /// Document the command was addressed to, if any.
        document_id: Option<DocumentId>,
        /// The log line.
        message: LogMessage,
    },
}

impl StoreEvent {
    /// The event's kind.
    pub fn kind(&self) -> EventKind {
        match self {
            StoreEvent::SliceChanged { slice, .. } => EventKind::for_slice(slice.kind()),
            StoreEvent::ActiveDocumentChanged { .. } => EventKind::ActiveDocumentChanged,
            StoreEvent::DocumentOpened { .. } => EventKind::DocumentOpened,
            StoreEvent::DocumentClosed { .. } => EventKind::DocumentClosed,
            StoreEvent::Display { .. } => EventKind::Display,
            StoreEvent::Log { .. } => EventKind::Log,
        }
    }
}

/// Error type handlers may return.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A subscriber callback.
pub type Handler = Arc<dyn Fn(&StoreEvent) -> Result<(), HandlerError> + Send + Sync>;

/// Identifies a subscription; pass it to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionToken(u64);

impl SubscriptionToken {
    /// Returns the raw token value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Why a handler failed.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchFailure {
    /// The handler returned an error.
    Error(String),
    /// The handler panicked.
    Panic(String),
    /// The handler ran past its time budget and was evicted.
    Overrun(Duration),
}

/// A reported subscriber failure.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchError {
    /// The failing subscription.
    pub token: SubscriptionToken,
    /// The event being delivered.
    pub event: EventKind,
    /// What went wrong.
    pub failure: DispatchFailure,
}

struct Subscriber {
    token: SubscriptionToken,
    kind: EventKind,
    handler: Handler,
    active: AtomicBool,
}

/// Registry of `(event kind -> handlers)` with synchronous dispatch.
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<Subscriber>>>,
    next_token: AtomicU64,
    handler_timeout: Duration,
    errors: Mutex<VecDeque<DispatchError>>,
    max_errors: usize,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new(handler_timeout: Duration, max_errors: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            next_token: AtomicU64::new(1),
            handler_timeout,
            errors: Mutex::new(VecDeque::new()),
            max_errors,
        }
    }

    /// Registers a handler for one kind of event.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionToken
    where
        F: Fn(&StoreEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let token = SubscriptionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Arc::new(Subscriber {
            token,
            kind,
            handler: Arc::new(handler),
            active: AtomicBool::new(true),
        }));
        token
    }

    /// Removes a handler. Returns false if it was already gone.
    ///
    /// Takes effect immediately, including for an event currently being
    /// dispatched.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut subscribers = self.subscribers.write();
        match subscribers.iter().position(|s| s.token == token) {
            Some(pos) => {
                subscribers.remove(pos).active.store(false, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Delivers an event to every matching handler, in registration order.
    pub fn dispatch(&self, event: &StoreEvent) {
        let kind = event.kind();
        let targets: Vec<Arc<Subscriber>> = self
            .subscribers
            .read()
            .iter()
            .filter(|s| s.kind == kind)
            .cloned()
            .collect();

        for subscriber in targets {
            if !subscriber.active.load(Ordering::SeqCst) {
                continue;
            }
            let started = Instant::now();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscriber.handler)(event)));
            let elapsed = started.elapsed();

            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => self.report(subscriber.token, kind, DispatchFailure::Error(e.to_string())),
                Err(payload) => self.report(
                    subscriber.token,
                    kind,
                    DispatchFailure::Panic(panic_message(payload.as_ref())),
                ),
            }
            if elapsed > self.handler_timeout {
                self.unsubscribe(subscriber.token);
                self.report(subscriber.token, kind, DispatchFailure::Overrun(elapsed));
            }
        }
    }

    /// Drains the retained dispatch failures, oldest first.
    pub fn take_errors(&self) -> Vec<DispatchError> {
        self.errors.lock().drain(..).collect()
    }

    fn report(&self, token: SubscriptionToken, event: EventKind, failure: DispatchFailure) {
        warn!(token = token.0, ?event, ?failure, "subscriber failed");
        if self.max_errors == 0 {
            return;
        }
        let mut errors = self.errors.lock();
        if errors.len() == self.max_errors {
            errors.pop_front();
        }
        errors.push_back(DispatchError {
            token,
            event,
            failure,
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotsync_core::SelectionState;
    use std::thread;

    fn bus() -> EventBus {
        EventBus::new(Duration::from_millis(200), 8)
    }

    fn selection_event() -> StoreEvent {
        StoreEvent::SliceChanged {
            document_id: DocumentId::new("doc"),
            slice: StateSlice::Selection(Some(SelectionState::default())),
        }
    }

    fn recorder(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl Fn(&StoreEvent) -> Result<(), HandlerError> + Send + Sync + 'static {
        let log = log.clone();
        move |_| {
            log.lock().push(name);
            Ok(())
        }
    }

    #[test]
    fn dispatches_in_registration_order_by_kind() {
        let bus = bus();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(EventKind::SelectionChanged, recorder(&log, "first"));
        bus.subscribe(EventKind::TimeChanged, recorder(&log, "time"));
        bus.subscribe(EventKind::SelectionChanged, recorder(&log, "second"));

        bus.dispatch(&selection_event());
        assert_eq!(*log.lock(), ["first", "second"]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let bus = bus();
        let token = bus.subscribe(EventKind::Log, |_| Ok(()));
        assert!(bus.unsubscribe(token));
        assert!(!bus.unsubscribe(token));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn failures_do_not_stop_later_handlers() {
        let bus = bus();
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = bus.subscribe(
            EventKind::SelectionChanged,
            |_| Err("listener broke".into()),
        );
        let panicking = bus.subscribe(
            EventKind::SelectionChanged,
            |_| panic!("listener exploded"),
        );
        bus.subscribe(EventKind::SelectionChanged, recorder(&log, "survivor"));

        bus.dispatch(&selection_event());

        assert_eq!(*log.lock(), ["survivor"]);
        let errors = bus.take_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].token, failing);
        assert_eq!(errors[0].failure, DispatchFailure::Error("listener broke".into()));
        assert_eq!(errors[1].token, panicking);
        assert_eq!(errors[1].failure, DispatchFailure::Panic("listener exploded".into()));
        assert!(bus.take_errors().is_empty());
    }

    #[test]
    fn unsubscribing_a_later_handler_during_dispatch_skips_it() {
        let bus = Arc::new(bus());
        let log = Arc::new(Mutex::new(Vec::new()));
        let victim: Arc<Mutex<Option<SubscriptionToken>>> = Arc::new(Mutex::new(None));

        let bus_ref = Arc::downgrade(&bus);
        let victim_ref = victim.clone();
        bus.subscribe(
            EventKind::SelectionChanged,
            move |_| {
                if let (Some(bus), Some(token)) = (bus_ref.upgrade(), *victim_ref.lock()) {
                    bus.unsubscribe(token);
                }
                Ok(())
            },
        );
        let token = bus.subscribe(EventKind::SelectionChanged, recorder(&log, "victim"));
        *victim.lock() = Some(token);

        bus.dispatch(&selection_event());
        assert!(log.lock().is_empty());
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn slow_handler_is_evicted() {
        let bus = EventBus::new(Duration::from_millis(5), 8);
        let token = bus.subscribe(
            EventKind::SelectionChanged,
            |_| {
                thread::sleep(Duration::from_millis(30));
                Ok(())
            },
        );

        bus.dispatch(&selection_event());

        assert_eq!(bus.subscriber_count(), 0);
        let errors = bus.take_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].token, token);
        assert!(matches!(errors[0].failure, DispatchFailure::Overrun(_)));
    }

    #[test]
    fn error_channel_is_bounded() {
        let bus = EventBus::new(Duration::from_secs(1), 2);
        bus.subscribe(EventKind::SelectionChanged, |_| Err("nope".into()));
        for _ in 0..5 {
            bus.dispatch(&selection_event());
        }
        assert_eq!(bus.take_errors().len(), 2);
    }
}
