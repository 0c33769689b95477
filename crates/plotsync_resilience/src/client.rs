//! Resilient client for remote commands.

use crate::breaker::{BreakerError, CircuitBreaker, Clock, SystemClock};
use crate::cancel::{CancellationToken, Sleeper, ThreadSleeper};
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::retry::{RetryError, RetryExecutor};
use crate::transport::CommandTransport;
use plotsync_core::{DocumentId, Validate};
use plotsync_protocol::{
    AddressedRequest, Command, HistoryAction, Query, Request, RequestEnvelope,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Sends requests over a transport with retry, backoff and a circuit breaker.
///
/// Every request gets a fresh `requestId` (when enabled) that stays the
/// same across its retries, so the serving side can drop duplicates.
/// Commands are validated locally first; an invalid one is never sent.
///
/// [`RemoteClient::cancel`] stops every request on the client. To abort
/// only the work for one document, send with a token of its own:
///
/// ```rust
/// # use plotsync_resilience::{ClientConfig, MockTransport, RemoteClient};
/// # use plotsync_protocol::{AddressedRequest, Query};
/// let client = RemoteClient::new(MockTransport::new(), ClientConfig::default());
/// let document = client.child_token();
/// document.cancel();
/// let request = AddressedRequest::new(Query::Time);
/// assert!(client.send_with(&request, &document).is_err());
/// assert!(client.send(&request).is_ok());
/// ```
pub struct RemoteClient<T: CommandTransport, S: Sleeper = ThreadSleeper, C: Clock = SystemClock> {
    transport: T,
    config: ClientConfig,
    breaker: Arc<CircuitBreaker<C>>,
    sleeper: S,
    token: CancellationToken,
}

impl<T: CommandTransport> RemoteClient<T> {
    /// Creates a client with a fresh breaker built from `config`.
    pub fn new(transport: T, config: ClientConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(config.breaker.clone()));
        Self::with_parts(transport, config, breaker, ThreadSleeper)
    }
}

impl<T: CommandTransport, S: Sleeper, C: Clock> RemoteClient<T, S, C> {
    /// Creates a client from explicit parts.
    pub fn with_parts(
        transport: T,
        config: ClientConfig,
        breaker: Arc<CircuitBreaker<C>>,
        sleeper: S,
    ) -> Self {
        Self {
            transport,
            config,
            breaker,
            sleeper,
            token: CancellationToken::new(),
        }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The breaker guarding this client.
    pub fn breaker(&self) -> &Arc<CircuitBreaker<C>> {
        &self.breaker
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// A handle that cancels every in-flight and future request.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// A token for a subset of requests, such as one document's. It is
    /// also cancelled when the whole client is.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Cancels in-flight and future retries of every request. Meant for
    /// shutdown; use [`RemoteClient::send_with`] to cancel selectively.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Sends one request and returns its result value.
    pub fn send(&self, request: &AddressedRequest) -> ClientResult<Value> {
        self.run(request, &self.token)
    }

    /// Sends one request that stops retrying when either `token` or the
    /// client is cancelled.
    pub fn send_with(
        &self,
        request: &AddressedRequest,
        token: &CancellationToken,
    ) -> ClientResult<Value> {
        let call = token.child_token();
        self.token.attach(&call);
        self.run(request, &call)
    }

    fn run(&self, request: &AddressedRequest, token: &CancellationToken) -> ClientResult<Value> {
        if let Request::Command(command) = &request.request {
            let report = command.validate(&self.config.rules);
            if !report.is_valid() {
                debug!(command = %command.kind(), "invalid command not sent");
                return Err(report.into());
            }
        }

        let mut envelope = request.to_envelope()?;
        if self.config.idempotency_keys && envelope.request_id.is_none() {
            envelope.request_id = Some(Uuid::new_v4().to_string());
        }

        let retry = self.config.retry_for(&request.request);
        let executor = RetryExecutor::with_sleeper(retry, &self.sleeper);
        let result = executor.execute(token, |attempt| {
            debug!(command = %envelope.command, attempt, "sending request");
            self.send_once(&envelope)
        });

        result.map_err(|e| match e {
            RetryError::Failed(error) => error,
            RetryError::Exhausted { attempts, last } => ClientError::RetryExhausted {
                attempts,
                last: Box::new(last),
            },
            RetryError::Cancelled { attempts } => ClientError::Cancelled { attempts },
        })
    }

    /// Sends a command to a document (or the active one).
    pub fn command(&self, document: Option<&DocumentId>, command: Command) -> ClientResult<()> {
        self.send(&address(command, document)).map(|_| ())
    }

    /// Runs a query against a document (or the active one).
    pub fn query(&self, document: Option<&DocumentId>, query: Query) -> ClientResult<Value> {
        self.send(&address(query, document))
    }

    /// Undoes the last change. Returns true if anything changed.
    pub fn undo(&self, document: Option<&DocumentId>) -> ClientResult<bool> {
        self.history(document, HistoryAction::Undo)
    }

    /// Redoes the last undone change. Returns true if anything changed.
    pub fn redo(&self, document: Option<&DocumentId>) -> ClientResult<bool> {
        self.history(document, HistoryAction::Redo)
    }

    fn history(&self, document: Option<&DocumentId>, action: HistoryAction) -> ClientResult<bool> {
        let value = self.send(&address(action, document))?;
        Ok(value.as_bool().unwrap_or(false))
    }

    fn send_once(&self, envelope: &RequestEnvelope) -> ClientResult<Value> {
        self.breaker
            .call(|| {
                let response = self.transport.send(envelope)?;
                response.into_result().map_err(ClientError::from)
            })
            .map_err(|e| match e {
                BreakerError::Open { remaining } => ClientError::CircuitOpen { remaining },
                BreakerError::Inner(error) => error,
            })
    }
}

fn address(
    request: impl Into<plotsync_protocol::Request>,
    document: Option<&DocumentId>,
) -> AddressedRequest {
    let request = AddressedRequest::new(request);
    match document {
        Some(id) => request.with_document(id.clone()),
        None => request,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{CircuitState, ManualClock};
    use crate::cancel::RecordingSleeper;
    use crate::config::{BreakerConfig, RetryConfig};
    use crate::transport::{MockTransport, TransportError};
    use plotsync_core::{SelectionState, ViewportState};
    use plotsync_protocol::{ErrorCode, ResponseEnvelope};
    use serde_json::json;
    use std::time::Duration;

    fn client(
        config: ClientConfig,
    ) -> RemoteClient<MockTransport, RecordingSleeper, ManualClock> {
        let breaker = Arc::new(CircuitBreaker::with_clock(
            config.breaker.clone(),
            ManualClock::new(),
        ));
        RemoteClient::with_parts(MockTransport::new(), config, breaker, RecordingSleeper::new())
    }

    fn select() -> Command {
        Command::SetSelection(SelectionState::new(vec!["a".into()]))
    }

    #[test]
    fn request_id_is_stable_across_retries() {
        let client = client(ClientConfig::default());
        client.transport().push_failures(TransportError::Timeout, 2);

        client.command(None, select()).unwrap();

        let sent = client.transport().sent();
        assert_eq!(sent.len(), 3);
        let id = sent[0].request_id.clone().unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert!(sent.iter().all(|e| e.request_id.as_deref() == Some(id.as_str())));
    }

    #[test]
    fn exhaustion_carries_attempts_and_last_error() {
        let client = client(ClientConfig::default());
        client.transport().push_failures(TransportError::Timeout, 10);

        let err = client.command(None, select()).unwrap_err();
        match &err {
            ClientError::RetryExhausted { attempts, last } => {
                assert_eq!(*attempts, 4);
                assert_eq!(last.code(), ErrorCode::Timeout.as_i32());
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(err.code(), 1001);
    }

    #[test]
    fn invalid_commands_are_never_sent() {
        let client = client(ClientConfig::default());
        client.transport().push_failures(TransportError::Timeout, 10);

        let err = client
            .command(
                None,
                Command::SetViewport(ViewportState::new(0.0, 60.0, 10.0, 50.0)),
            )
            .unwrap_err();
        match &err {
            ClientError::Validation { errors, .. } => assert!(!errors.is_empty()),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(client.transport().sent().is_empty());
        assert!(client.sleeper.delays().is_empty());
    }

    #[test]
    fn validation_errors_are_not_retried() {
        let client = client(ClientConfig::default());
        client.transport().push_reply(Ok(ResponseEnvelope::error(
            ErrorCode::Validation,
            "bounds: expected 4 values, got 3",
        )));

        let err = client.command(None, select()).unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
        assert_eq!(client.transport().sent().len(), 1);
    }

    #[test]
    fn reads_use_the_quick_preset() {
        let client = client(ClientConfig::default());
        client.transport().push_failures(TransportError::Unavailable("down".into()), 1);
        client
            .transport()
            .push_reply(Ok(ResponseEnvelope::success(json!({"selectedIds": []}))));

        let value = client.query(None, Query::Selection).unwrap();
        assert_eq!(value, json!({"selectedIds": []}));
        assert_eq!(client.sleeper.delays(), [Duration::from_millis(500)]);
    }

    #[test]
    fn open_circuit_fails_fast() {
        let config = ClientConfig::default()
            .with_write(RetryConfig::no_retry())
            .with_breaker(BreakerConfig::default().with_failure_threshold(2));
        let client = client(config);
        client.transport().push_failures(TransportError::Timeout, 2);

        for _ in 0..2 {
            let _ = client.command(None, select());
        }
        assert_eq!(client.breaker().state(), CircuitState::Open);

        let err = client.command(None, select()).unwrap_err();
        assert!(matches!(err, ClientError::CircuitOpen { .. }));
        assert_eq!(client.transport().sent().len(), 2);
    }

    #[test]
    fn cancelled_client_does_not_send() {
        let client = client(ClientConfig::default());
        client.cancel();
        let err = client.undo(None).unwrap_err();
        assert!(matches!(err, ClientError::Cancelled { attempts: 0 }));
        assert!(client.transport().sent().is_empty());
    }

    #[test]
    fn cancelling_one_document_leaves_others_alone() {
        let client = client(ClientConfig::default());
        let doc_a = client.child_token();
        let doc_b = client.child_token();
        doc_a.cancel();

        let to = |id: &str| address(select(), Some(&DocumentId::new(id)));
        let err = client.send_with(&to("A"), &doc_a).unwrap_err();
        assert!(matches!(err, ClientError::Cancelled { attempts: 0 }));

        client
            .transport()
            .push_reply(Ok(ResponseEnvelope::success(Value::Null)));
        assert!(client.send_with(&to("B"), &doc_b).is_ok());
        assert!(client.command(Some(&DocumentId::new("B")), select()).is_ok());
        assert_eq!(client.transport().sent().len(), 2);

        client.cancel();
        assert!(doc_b.is_cancelled());
        assert!(matches!(
            client.send_with(&to("B"), &CancellationToken::new()),
            Err(ClientError::Cancelled { attempts: 0 })
        ));
    }

    #[test]
    fn per_call_token_aborts_backoff() {
        let breaker = Arc::new(CircuitBreaker::with_clock(
            ClientConfig::default().breaker,
            ManualClock::new(),
        ));
        let client = RemoteClient::with_parts(
            MockTransport::new(),
            ClientConfig::default(),
            breaker,
            RecordingSleeper::cancelling_on(1),
        );
        client.transport().push_failures(TransportError::Timeout, 10);

        let document = client.child_token();
        let err = client
            .send_with(&address(select(), None), &document)
            .unwrap_err();
        assert!(matches!(err, ClientError::Cancelled { attempts: 1 }));
        // Only the per-call token was cancelled.
        assert!(!document.is_cancelled());
        assert!(!client.cancellation_token().is_cancelled());
    }

    #[test]
    fn history_returns_changed_flag() {
        let client = client(ClientConfig::default());
        client
            .transport()
            .push_reply(Ok(ResponseEnvelope::success(json!(true))));
        let doc = DocumentId::new("plot-1");
        assert!(client.redo(Some(&doc)).unwrap());

        let sent = client.transport().sent();
        assert_eq!(sent[0].command, "redo");
        assert_eq!(sent[0].params["documentId"], json!("plot-1"));
    }
}
