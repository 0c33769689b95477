//! Envelope handling for remote clients.

use crate::error::StoreResult;
use crate::store::StateStore;
use parking_lot::{Condvar, Mutex};
use plotsync_core::DocumentId;
use plotsync_protocol::{
    decode_request, AddressedRequest, ErrorCode, HistoryAction, Query, Request, RequestEnvelope,
    ResponseEnvelope,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::debug;

/// Default number of responses remembered for duplicate detection.
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Bounded FIFO of responses keyed by request ID.
struct ResponseCache {
    order: VecDeque<String>,
    entries: HashMap<String, ResponseEnvelope>,
    capacity: usize,
}

impl ResponseCache {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::new(),
            entries: HashMap::new(),
            capacity,
        }
    }

    fn get(&self, request_id: &str) -> Option<ResponseEnvelope> {
        self.entries.get(request_id).cloned()
    }

    fn insert(&mut self, request_id: String, response: ResponseEnvelope) {
        if self.capacity == 0 || self.entries.contains_key(&request_id) {
            return;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(request_id.clone());
        self.entries.insert(request_id, response);
    }
}

/// A keyed request being executed. Duplicates wait on it.
struct Pending {
    owner: ThreadId,
    response: Mutex<Option<ResponseEnvelope>>,
    done: Condvar,
}

impl Pending {
    fn new() -> Self {
        Self {
            owner: thread::current().id(),
            response: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn wait(&self) -> ResponseEnvelope {
        let mut response = self.response.lock();
        loop {
            if let Some(response) = response.as_ref() {
                return response.clone();
            }
            self.done.wait(&mut response);
        }
    }

    fn finish(&self, response: ResponseEnvelope) {
        let mut slot = self.response.lock();
        if slot.is_none() {
            *slot = Some(response);
        }
        self.done.notify_all();
    }
}

struct Requests {
    cache: ResponseCache,
    in_flight: HashMap<String, Arc<Pending>>,
}

enum Claim {
    Cached(ResponseEnvelope),
    Wait(Arc<Pending>),
    Run(Arc<Pending>),
}

/// Clears an in-flight entry even if execution unwinds, so waiters wake.
struct InFlightGuard<'a> {
    requests: &'a Mutex<Requests>,
    request_id: &'a str,
    pending: Arc<Pending>,
}

impl InFlightGuard<'_> {
    fn complete(self, response: &ResponseEnvelope) {
        self.requests
            .lock()
            .cache
            .insert(self.request_id.to_string(), response.clone());
        self.pending.finish(response.clone());
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.requests.lock().in_flight.remove(self.request_id);
        self.pending.finish(ResponseEnvelope::error(
            ErrorCode::Internal,
            format!("request {} did not complete", self.request_id),
        ));
    }
}

/// Serves wire envelopes against a [`StateStore`].
///
/// A request carrying a `requestId` seen recently is answered with the
/// cached response and not executed again, so a client may safely retry
/// `addFeatures` after losing a response. A duplicate that arrives while
/// the first copy is still running waits for its result. No lock is held
/// while a request executes, so subscribers may call back into the service.
pub struct CommandService {
    store: Arc<StateStore>,
    requests: Mutex<Requests>,
}

impl CommandService {
    /// Creates a service over a store.
    pub fn new(store: Arc<StateStore>) -> Self {
        Self::with_cache_capacity(store, DEFAULT_CACHE_CAPACITY)
    }

    /// Creates a service remembering up to `capacity` responses.
    pub fn with_cache_capacity(store: Arc<StateStore>, capacity: usize) -> Self {
        Self {
            store,
            requests: Mutex::new(Requests {
                cache: ResponseCache::new(capacity),
                in_flight: HashMap::new(),
            }),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Handles one request envelope. Never fails: errors become error
    /// responses.
    pub fn handle(&self, envelope: &RequestEnvelope) -> ResponseEnvelope {
        let Some(request_id) = &envelope.request_id else {
            return self.respond(envelope);
        };

        let pending = match self.claim(request_id) {
            Claim::Cached(response) => {
                debug!(request_id = %request_id, command = %envelope.command, "replaying cached response");
                return response;
            }
            Claim::Wait(pending) => {
                if pending.owner == thread::current().id() {
                    return ResponseEnvelope::error(
                        ErrorCode::Malformed,
                        format!("request {request_id} is already running on this thread"),
                    );
                }
                debug!(request_id = %request_id, "waiting for duplicate in flight");
                return pending.wait();
            }
            Claim::Run(pending) => pending,
        };

        let guard = InFlightGuard {
            requests: &self.requests,
            request_id,
            pending,
        };
        let response = self.respond(envelope);
        guard.complete(&response);
        response
    }

    fn claim(&self, request_id: &str) -> Claim {
        let mut requests = self.requests.lock();
        if let Some(response) = requests.cache.get(request_id) {
            return Claim::Cached(response);
        }
        if let Some(pending) = requests.in_flight.get(request_id) {
            return Claim::Wait(pending.clone());
        }
        let pending = Arc::new(Pending::new());
        requests
            .in_flight
            .insert(request_id.to_string(), pending.clone());
        Claim::Run(pending)
    }

    fn respond(&self, envelope: &RequestEnvelope) -> ResponseEnvelope {
        let result = decode_request(envelope)
            .map_err(Into::into)
            .and_then(|request| self.execute(request));
        match result {
            Ok(value) => ResponseEnvelope::success(value),
            Err(e) => {
                debug!(command = %envelope.command, code = %e.code(), error = %e, "request failed");
                e.to_response()
            }
        }
    }

    /// Executes a decoded request.
    pub fn execute(&self, request: AddressedRequest) -> StoreResult<Value> {
        let AddressedRequest {
            document_id,
            request,
            ..
        } = request;

        match request {
            Request::Command(command) if command.kind().is_display_only() => {
                let target = document_id.or_else(|| self.store.active_document());
                self.store.forward(target.as_ref(), command)?;
                Ok(Value::Null)
            }
            Request::Command(command) => {
                let id = self.store.resolve(document_id.as_ref())?;
                self.store.apply_command(&id, command)?;
                Ok(Value::Null)
            }
            Request::Query(query) => self.query(document_id.as_ref(), query),
            Request::History(action) => {
                let id = self.store.resolve(document_id.as_ref())?;
                let changed = match action {
                    HistoryAction::Undo => self.store.undo(&id)?,
                    HistoryAction::Redo => self.store.redo(&id)?,
                };
                Ok(Value::Bool(changed))
            }
        }
    }

    fn query(&self, document_id: Option<&DocumentId>, query: Query) -> StoreResult<Value> {
        match query {
            Query::ListDocuments => Ok(serde_json::to_value(self.store.document_ids())?),
            Query::ActiveDocument => Ok(serde_json::to_value(self.store.active_document())?),
            Query::SelectedFeatures => {
                let id = self.store.resolve(document_id)?;
                Ok(serde_json::to_value(self.store.selected_features(&id)?)?)
            }
            Query::FeatureCollection | Query::Selection | Query::Time | Query::Viewport => {
                let id = self.store.resolve(document_id)?;
                let state = self.store.snapshot(&id)?;
                let value = match query {
                    Query::FeatureCollection => serde_json::to_value(&state.feature_collection)?,
                    Query::Selection => serde_json::to_value(&state.selection_state)?,
                    Query::Time => serde_json::to_value(&state.time_state)?,
                    _ => serde_json::to_value(state.viewport_state)?,
                };
                Ok(value)
            }
        }
    }
}
