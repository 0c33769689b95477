//! # plotsync Protocol
//!
//! Command protocol and wire envelopes for plotsync.
//!
//! This crate provides:
//! - The closed `Command` taxonomy and its payload contracts
//! - Read-only `Query` and `HistoryAction` requests
//! - JSON wire envelopes (`{"command", "params"}` in, `{"result"}` or
//!   `{"error"}` out) and their error codes
//! - Decoding of envelopes into typed requests at the boundary
//!
//! This is a pure protocol crate with no I/O operations. Transport framing
//! is left to the host.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod decode;
mod envelope;
mod error;
mod request;

pub use command::{Command, CommandKind, DataPayload, ImagePayload, LogLevel, LogMessage};
pub use decode::{decode_command, decode_request};
pub use envelope::{ErrorBody, ErrorCode, RequestEnvelope, ResponseEnvelope};
pub use error::{ProtocolError, ProtocolResult};
pub use request::{AddressedRequest, HistoryAction, Query, Request};
