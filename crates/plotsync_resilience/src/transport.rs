//! Transport abstraction for remote commands.

use crate::classify::{Classify, ErrorClass};
use parking_lot::Mutex;
use plotsync_protocol::{ErrorCode, RequestEnvelope, ResponseEnvelope};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Failures below the protocol: the envelope never got an answer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection dropped mid-request.
    #[error("connection reset: {0}")]
    ConnectionReset(String),

    /// No answer in time.
    #[error("request timed out")]
    Timeout,

    /// The peer is not reachable right now.
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    /// The peer answered with something that is not an envelope.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Wire-equivalent error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            TransportError::ConnectionReset(_) | TransportError::Unavailable(_) => {
                ErrorCode::Unavailable
            }
            TransportError::Timeout => ErrorCode::Timeout,
            TransportError::Malformed(_) => ErrorCode::Malformed,
        }
    }
}

impl Classify for TransportError {
    fn class(&self) -> ErrorClass {
        match self {
            TransportError::Malformed(_) => ErrorClass::Permanent,
            _ => ErrorClass::Transient,
        }
    }
}

/// Delivers request envelopes and returns their responses.
///
/// Framing is the implementation's concern.
pub trait CommandTransport: Send + Sync {
    /// Sends one envelope and waits for its response.
    fn send(&self, envelope: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError>;
}

impl<T: CommandTransport + ?Sized> CommandTransport for Arc<T> {
    fn send(&self, envelope: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError> {
        (**self).send(envelope)
    }
}

/// A scripted transport for testing.
///
/// Replies are consumed in order; once the script runs out every request
/// gets `{"result": null}`.
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<ResponseEnvelope, TransportError>>>,
    sent: Mutex<Vec<RequestEnvelope>>,
}

impl MockTransport {
    /// Creates an empty mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a reply.
    pub fn push_reply(&self, reply: Result<ResponseEnvelope, TransportError>) {
        self.script.lock().push_back(reply);
    }

    /// Queues `n` copies of a transport failure.
    pub fn push_failures(&self, error: TransportError, n: usize) {
        let mut script = self.script.lock();
        for _ in 0..n {
            script.push_back(Err(error.clone()));
        }
    }

    /// Envelopes sent so far.
    pub fn sent(&self) -> Vec<RequestEnvelope> {
        self.sent.lock().clone()
    }
}

impl CommandTransport for MockTransport {
    fn send(&self, envelope: &RequestEnvelope) -> Result<ResponseEnvelope, TransportError> {
        self.sent.lock().push(envelope.clone());
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(ResponseEnvelope::ok()))
    }
}
